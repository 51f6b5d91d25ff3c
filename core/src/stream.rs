//! NDJSON stream decoding.
//!
//! # Design
//! `EventStream` is a pull-based iterator over a live response body. Each
//! `next()` reads lines until it finds a non-blank one, parses it as a JSON
//! object and yields it. Nothing is read ahead: at most one line is held in
//! memory at a time.
//!
//! The first failure (I/O error or bad JSON) is yielded once and ends the
//! stream. Whenever the stream closes, for any reason, the body is dropped
//! right away; dropping an unfinished `EventStream` drops it too. There is
//! no other way to reach the connection, so it is released exactly once.
//!
//! An `EventStream` is single-pass and exclusively owned. It is `Send`, so
//! it can be moved to another thread, but it is neither `Clone` nor meant to
//! be shared.

use std::io::BufRead;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::observe::{NoopObserver, Observer};
use crate::transport::Body;

/// One decoded NDJSON record.
pub type Event = Map<String, Value>;

/// Where an `EventStream` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Body is live and nothing has been read yet.
    Open,
    /// At least one read happened and the body is still live.
    Reading,
    /// The body reached its end.
    Finished,
    /// A read or decode error ended the stream.
    Failed,
    /// The handle was dropped before the body reached its end.
    Abandoned,
}

/// Lazy, single-pass sequence of events decoded from an NDJSON body.
pub struct EventStream {
    body: Option<Body>,
    state: StreamState,
    line: Vec<u8>,
    line_no: usize,
    events: usize,
    request: Option<HttpRequest>,
    observer: Arc<dyn Observer>,
}

impl EventStream {
    /// Decode events from any buffered reader.
    pub fn new(body: impl BufRead + Send + 'static) -> Self {
        Self::from_body(Box::new(body), None, Arc::new(NoopObserver))
    }

    pub(crate) fn from_body(body: Body, request: Option<HttpRequest>, observer: Arc<dyn Observer>) -> Self {
        Self {
            body: Some(body),
            state: StreamState::Open,
            line: Vec::new(),
            line_no: 0,
            events: 0,
            request,
            observer,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of events yielded so far.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Drain the stream, concatenating the string field `key` of every
    /// event. Events without that field contribute nothing.
    ///
    /// For `generate` the field is `response`; the token text of a chat
    /// stream sits under `message.content` and is not reachable this way.
    pub fn collect_text(self, key: &str) -> Result<String, ApiError> {
        let mut text = String::new();
        for event in self {
            if let Some(chunk) = event?.get(key).and_then(Value::as_str) {
                text.push_str(chunk);
            }
        }
        Ok(text)
    }

    /// Read the next non-blank line into `self.line`. `Ok(false)` at end of
    /// body.
    fn read_line(&mut self) -> Result<bool, ApiError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(false);
        };
        self.state = StreamState::Reading;
        loop {
            self.line.clear();
            let read = body
                .read_until(b'\n', &mut self.line)
                .map_err(|e| ApiError::Transport(format!("stream interrupted: {e}")))?;
            if read == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            if !self.line.trim_ascii().is_empty() {
                return Ok(true);
            }
        }
    }

    fn close(&mut self, state: StreamState) {
        if self.body.take().is_some() {
            self.state = state;
            if let Some(request) = &self.request {
                self.observer.on_stream_end(request, state, self.events);
            }
        }
    }

    fn fail(&mut self, error: ApiError) -> ApiError {
        if let Some(request) = &self.request {
            self.observer.on_error(request, &error);
        }
        self.close(StreamState::Failed);
        error
    }
}

impl Iterator for EventStream {
    type Item = Result<Event, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_line() {
            Ok(true) => {}
            Ok(false) => {
                self.close(StreamState::Finished);
                return None;
            }
            Err(e) => return Some(Err(self.fail(e))),
        }

        let parsed = serde_json::from_slice::<Event>(self.line.trim_ascii());
        match parsed {
            Ok(event) => {
                self.events += 1;
                Some(Ok(event))
            }
            Err(e) => {
                let error = ApiError::Decode(format!("line {}: {e}", self.line_no));
                Some(Err(self.fail(error)))
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close(StreamState::Abandoned);
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("state", &self.state)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// True for the final record of a stream, which carries `"done": true`
/// along with timing and token statistics.
pub fn is_done(event: &Event) -> bool {
    event.get("done").and_then(Value::as_bool).unwrap_or(false)
}
