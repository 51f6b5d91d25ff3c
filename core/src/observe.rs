//! Call observation hooks.
//!
//! # Design
//! The library never configures logging on its own. An `Observer` is handed
//! to the client at construction and is told about each request, each
//! response status, each error, and the end of each stream. The default,
//! `TracingObserver`, forwards those to `tracing` events; whether they go
//! anywhere is up to the subscriber the application installs.

use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::stream::StreamState;

/// Receives lifecycle notifications for calls made by an `OllamaClient`.
///
/// Every method has an empty default body, so implementors only override
/// what they care about.
pub trait Observer: Send + Sync {
    /// A request is about to be handed to the transport.
    fn on_request(&self, _request: &HttpRequest) {}

    /// Response headers arrived.
    fn on_response(&self, _request: &HttpRequest, _status: u16) {}

    /// A call or a stream failed. Called once per error.
    fn on_error(&self, _request: &HttpRequest, _error: &ApiError) {}

    /// A stream released its body after yielding `events`. `state` tells a
    /// clean end (`Finished`) from an error (`Failed`) or a handle dropped
    /// early (`Abandoned`).
    fn on_stream_end(&self, _request: &HttpRequest, _state: StreamState, _events: usize) {}
}

impl<T: Observer + ?Sized> Observer for std::sync::Arc<T> {
    fn on_request(&self, request: &HttpRequest) {
        (**self).on_request(request)
    }

    fn on_response(&self, request: &HttpRequest, status: u16) {
        (**self).on_response(request, status)
    }

    fn on_error(&self, request: &HttpRequest, error: &ApiError) {
        (**self).on_error(request, error)
    }

    fn on_stream_end(&self, request: &HttpRequest, state: StreamState, events: usize) {
        (**self).on_stream_end(request, state, events)
    }
}

/// Forwards call events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_request(&self, request: &HttpRequest) {
        tracing::debug!(
            method = request.method.as_str(),
            url = %request.path,
            stream = request.stream,
            "sending request"
        );
    }

    fn on_response(&self, request: &HttpRequest, status: u16) {
        tracing::debug!(method = request.method.as_str(), url = %request.path, status, "response received");
    }

    fn on_error(&self, request: &HttpRequest, error: &ApiError) {
        tracing::warn!(
            method = request.method.as_str(),
            url = %request.path,
            kind = ?error.kind(),
            status = error.status_code(),
            "request failed: {error}"
        );
    }

    fn on_stream_end(&self, request: &HttpRequest, state: StreamState, events: usize) {
        tracing::debug!(url = %request.path, ?state, events, "stream closed");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
