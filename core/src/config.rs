//! Client configuration.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEP_ALIVE: &str = "5m";

/// Settings shared by every call made through one `OllamaClient`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Prefix for every request path. Trailing slashes are stripped.
    pub base_url: String,
    /// Bounds connect, send and response headers for every call, and the
    /// body read for non-streaming calls.
    pub timeout: Duration,
    /// Bounds the read of a streaming body. `None` means a stalled stream
    /// blocks the consumer until the server closes the connection.
    pub read_timeout: Option<Duration>,
    /// How long the server keeps a model loaded after a call. Used when a
    /// request does not set its own `keep_alive`.
    pub keep_alive: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ApiError::missing("base_url"));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
            read_timeout: None,
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        })
    }

    /// Build a configuration from the environment.
    ///
    /// Reads `OLLAMA_HOST` (default `http://127.0.0.1:11434`). A bare
    /// `host:port` is taken to mean plain HTTP.
    pub fn from_env() -> Result<Self, ApiError> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self::new(&normalize_host(&host))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    /// Join an operation path such as `api/generate` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.is_empty() || host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
