//! Blocking HTTP transport.
//!
//! # Design
//! `Transport` is the only place the client touches the network. It takes an
//! `HttpRequest` and returns the status plus the body as an unread
//! `BufRead`. Buffering, status interpretation and JSON decoding all happen
//! above this seam, so the executor behaves the same over `ureq`, a host's
//! own client, or a test double.
//!
//! The body is owned by whoever holds the `TransportResponse`; dropping it
//! closes the underlying connection.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};

/// Response body, not yet read.
pub type Body = Box<dyn BufRead + Send>;

/// Status line and live body of a response whose headers have arrived.
pub struct TransportResponse {
    pub status: u16,
    pub body: Body,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse").field("status", &self.status).finish_non_exhaustive()
    }
}

/// Executes one request and returns as soon as response headers arrive.
///
/// Non-success statuses are data, not errors: implementations return them
/// as an ordinary `TransportResponse` and report only failures to complete
/// the exchange (connect, timeout, I/O) as `ApiError::Transport`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<TransportResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<TransportResponse, ApiError> {
        (**self).send(request)
    }
}

/// `Transport` backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    read_timeout: Option<Duration>,
}

impl UreqTransport {
    /// `read_timeout` bounds streaming body reads; `None` leaves them
    /// unbounded. Buffered calls are bounded by the request's own timeout.
    pub fn new(read_timeout: Option<Duration>) -> Self {
        // 4xx/5xx come back as responses so the executor can read the body.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent, read_timeout }
    }

    /// Apply headers and timeouts. A streaming call is bounded up to the
    /// response headers; its body gets `read_timeout` instead.
    fn prepare<B>(&self, mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let timeout = Some(request.timeout);
        if request.stream {
            builder
                .config()
                .timeout_connect(timeout)
                .timeout_send_request(timeout)
                .timeout_send_body(timeout)
                .timeout_recv_response(timeout)
                .timeout_recv_body(self.read_timeout)
                .build()
        } else {
            builder.config().timeout_global(timeout).build()
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<TransportResponse, ApiError> {
        let url = request.path.as_str();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();

        let response = match request.method {
            HttpMethod::Get => self.prepare(self.agent.get(url), request).call(),
            HttpMethod::Post => self.prepare(self.agent.post(url), request).send(body),
            // The service reads the model name from the DELETE body.
            HttpMethod::Delete => self
                .prepare(self.agent.delete(url).force_send_body(), request)
                .send(body),
        }?;

        let status = response.status().as_u16();
        let reader = response.into_body().into_reader();
        Ok(TransportResponse {
            status,
            body: Box::new(BufReader::new(reader)),
        })
    }
}
