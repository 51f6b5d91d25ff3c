//! Blocking client for the Ollama inference service.
//!
//! # Overview
//! Generates text, runs multi-turn chat, manages local models
//! (create/copy/delete/list/show), moves models to and from a registry
//! (push/pull) and computes embeddings. Streaming operations return an
//! `EventStream` that decodes the NDJSON response body one line per pull.
//!
//! # Design
//! - `OllamaClient` holds a `ClientConfig`, a `Transport` and an `Observer`
//!   and keeps no per-call state.
//! - Each operation is split into `build_*` (validates input, produces an
//!   `HttpRequest`) and an executor step, so hosts that do their own I/O can
//!   stop after building and hand a buffered `HttpResponse` to `parse_json`.
//! - Every failure is an `ApiError`; `ApiError::kind` tells validation,
//!   transport, server and decode failures apart.
//! - Logging goes through the injected `Observer`. The default forwards to
//!   `tracing`; the library never installs a subscriber.
//!
//! ```no_run
//! use ollama_core::{GenerateRequest, OllamaClient};
//!
//! let client = OllamaClient::new("http://127.0.0.1:11434")?;
//! for event in client.generate_stream(&GenerateRequest::new("llama2", "Why is the sky blue?"))? {
//!     let event = event?;
//!     print!("{}", event.get("response").and_then(|v| v.as_str()).unwrap_or_default());
//! }
//! # Ok::<(), ollama_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observe;
pub mod stream;
pub mod transport;
pub mod types;

pub use client::{OllamaClient, Reply};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use observe::{NoopObserver, Observer, TracingObserver};
pub use stream::{is_done, Event, EventStream, StreamState};
pub use transport::{Body, Transport, TransportResponse, UreqTransport};
pub use types::{
    ChatRequest, CopyRequest, CreateRequest, EmbeddingsRequest, Format, GenerateRequest, Message, ModelName, Options,
    Role, TransferRequest,
};
