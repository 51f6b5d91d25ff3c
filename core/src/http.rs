//! HTTP request/response descriptions exchanged with a `Transport`.
//!
//! # Design
//! The client never builds transport-specific request objects. Each API
//! operation produces an `HttpRequest` as plain data; a `Transport` executes
//! it. Hosts that do their own I/O can stop at `build_*`, run the request
//! however they like, and feed the buffered result back through
//! `OllamaClient::parse_json` as an `HttpResponse`.

use std::time::Duration;

/// HTTP method for a request. The service only uses these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One outbound call, fully described before it is executed.
///
/// Built by `OllamaClient::build_*` methods and not modified afterwards.
/// `stream` tells the executor whether to hand back the live body as an
/// `EventStream` or to buffer and parse it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub stream: bool,
    pub timeout: Duration,
}

/// A buffered HTTP response, as produced by a host executing an
/// `HttpRequest` on its own.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

pub(crate) fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
