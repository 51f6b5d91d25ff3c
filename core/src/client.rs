//! Request building, execution and the per-operation API surface.
//!
//! # Design
//! Every operation goes through the same three steps:
//! 1. `build_*` validates the typed payload and produces an `HttpRequest`.
//!    Nothing touches the network if a required field is blank.
//! 2. The executor (`execute_json` / `execute_stream`) hands the request to
//!    the `Transport` and interprets the status.
//! 3. Non-streaming calls read and parse the whole body; streaming calls
//!    return an `EventStream` over the still-open body.
//!
//! Streaming and non-streaming variants are separate methods (`pull` vs
//! `pull_stream`) so the return type always matches the `stream` flag that
//! was sent. Nothing is retried and nothing is cached.

use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{is_success, HttpMethod, HttpRequest, HttpResponse};
use crate::observe::{Observer, TracingObserver};
use crate::stream::EventStream;
use crate::transport::{Transport, TransportResponse, UreqTransport};
use crate::types::{
    ChatRequest, CopyRequest, CreateRequest, EmbeddingsRequest, GenerateRequest, ModelName, TransferRequest,
};

/// Result of `OllamaClient::execute`, shaped by `HttpRequest::stream`.
#[derive(Debug)]
pub enum Reply {
    Json(Value),
    Stream(EventStream),
}

/// Blocking client for the inference service.
///
/// Holds configuration, a transport and an observer; no per-call state.
/// Cloning is cheap and clones share the transport.
#[derive(Clone)]
pub struct OllamaClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn Observer>,
}

/// Payload with the `stream` flag appended.
#[derive(Serialize)]
struct Streamed<'a, T> {
    #[serde(flatten)]
    payload: &'a T,
    stream: bool,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self::from_config(ClientConfig::new(base_url)?))
    }

    /// Client over `UreqTransport`, reporting to `TracingObserver`.
    pub fn from_config(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.read_timeout);
        Self {
            config,
            transport: Arc::new(transport),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_generate(&self, input: &GenerateRequest, stream: bool) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let payload = GenerateRequest {
            keep_alive: Some(self.keep_alive(&input.keep_alive)),
            ..input.clone()
        };
        self.build_streamed(HttpMethod::Post, "api/generate", &payload, stream)
    }

    pub fn build_chat(&self, input: &ChatRequest, stream: bool) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let payload = ChatRequest {
            keep_alive: Some(self.keep_alive(&input.keep_alive)),
            ..input.clone()
        };
        self.build_streamed(HttpMethod::Post, "api/chat", &payload, stream)
    }

    pub fn build_create(&self, input: &CreateRequest, stream: bool) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_streamed(HttpMethod::Post, "api/create", input, stream)
    }

    pub fn build_tags(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "api/tags", None, false)
    }

    pub fn build_show(&self, input: &ModelName) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_buffered(HttpMethod::Post, "api/show", input)
    }

    pub fn build_copy(&self, input: &CopyRequest) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_buffered(HttpMethod::Post, "api/copy", input)
    }

    pub fn build_delete(&self, input: &ModelName) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_buffered(HttpMethod::Delete, "api/delete", input)
    }

    pub fn build_pull(&self, input: &TransferRequest, stream: bool) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_streamed(HttpMethod::Post, "api/pull", input, stream)
    }

    pub fn build_push(&self, input: &TransferRequest, stream: bool) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.build_streamed(HttpMethod::Post, "api/push", input, stream)
    }

    pub fn build_embeddings(&self, input: &EmbeddingsRequest) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        let payload = EmbeddingsRequest {
            keep_alive: Some(self.keep_alive(&input.keep_alive)),
            ..input.clone()
        };
        self.build_buffered(HttpMethod::Post, "api/embeddings", &payload)
    }

    /// Interpret a response the caller fetched itself.
    pub fn parse_json(&self, response: HttpResponse) -> Result<Value, ApiError> {
        parse_body(response.status, response.body.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Executor
    // -----------------------------------------------------------------------

    /// Run a request, returning a stream or a parsed value depending on
    /// `request.stream`.
    pub fn execute(&self, request: HttpRequest) -> Result<Reply, ApiError> {
        if request.stream {
            self.execute_stream(request).map(Reply::Stream)
        } else {
            self.execute_json(&request).map(Reply::Json)
        }
    }

    /// Run a request and parse the whole body as one JSON document.
    pub fn execute_json(&self, request: &HttpRequest) -> Result<Value, ApiError> {
        let result = self.send(request).and_then(|response| {
            let status = response.status;
            let body = read_body(response)?;
            parse_body(status, &body)
        });
        self.observe(request, result)
    }

    /// Run a request and decode its body lazily, one NDJSON line per pull.
    pub fn execute_stream(&self, request: HttpRequest) -> Result<EventStream, ApiError> {
        let response = match self.send(&request) {
            Ok(response) => response,
            Err(e) => return self.observe(&request, Err(e)),
        };
        if !is_success(response.status) {
            let status = response.status;
            let result = read_body(response).and_then(|body| Err(server_error(status, &body)));
            return self.observe(&request, result);
        }
        Ok(EventStream::from_body(response.body, Some(request), self.observer.clone()))
    }

    // -----------------------------------------------------------------------
    // API surface
    // -----------------------------------------------------------------------

    /// Generate a completion and return the single final record.
    pub fn generate(&self, input: &GenerateRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_generate(input, false)?)
    }

    /// Generate a completion token by token.
    pub fn generate_stream(&self, input: &GenerateRequest) -> Result<EventStream, ApiError> {
        self.execute_stream(self.build_generate(input, true)?)
    }

    pub fn chat(&self, input: &ChatRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_chat(input, false)?)
    }

    pub fn chat_stream(&self, input: &ChatRequest) -> Result<EventStream, ApiError> {
        self.execute_stream(self.build_chat(input, true)?)
    }

    pub fn create(&self, input: &CreateRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_create(input, false)?)
    }

    /// Create a model, yielding `{"status": ...}` progress records.
    pub fn create_stream(&self, input: &CreateRequest) -> Result<EventStream, ApiError> {
        self.execute_stream(self.build_create(input, true)?)
    }

    /// List locally available models.
    pub fn tags(&self) -> Result<Value, ApiError> {
        self.execute_json(&self.build_tags())
    }

    pub fn show(&self, input: &ModelName) -> Result<Value, ApiError> {
        self.execute_json(&self.build_show(input)?)
    }

    pub fn copy(&self, input: &CopyRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_copy(input)?)
    }

    pub fn delete(&self, input: &ModelName) -> Result<Value, ApiError> {
        self.execute_json(&self.build_delete(input)?)
    }

    pub fn pull(&self, input: &TransferRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_pull(input, false)?)
    }

    /// Pull a model, yielding download progress records.
    pub fn pull_stream(&self, input: &TransferRequest) -> Result<EventStream, ApiError> {
        self.execute_stream(self.build_pull(input, true)?)
    }

    pub fn push(&self, input: &TransferRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_push(input, false)?)
    }

    pub fn push_stream(&self, input: &TransferRequest) -> Result<EventStream, ApiError> {
        self.execute_stream(self.build_push(input, true)?)
    }

    pub fn embeddings(&self, input: &EmbeddingsRequest) -> Result<Value, ApiError> {
        self.execute_json(&self.build_embeddings(input)?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn keep_alive(&self, requested: &Option<String>) -> String {
        requested.clone().unwrap_or_else(|| self.config.keep_alive.clone())
    }

    fn build_streamed<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &T,
        stream: bool,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(&Streamed { payload, stream })?;
        Ok(self.request(method, path, Some(body), stream))
    }

    fn build_buffered<T: Serialize>(&self, method: HttpMethod, path: &str, payload: &T) -> Result<HttpRequest, ApiError> {
        let body = to_json(payload)?;
        Ok(self.request(method, path, Some(body), false))
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<String>, stream: bool) -> HttpRequest {
        let headers = match body {
            Some(_) => vec![("content-type".to_string(), "application/json".to_string())],
            None => Vec::new(),
        };
        HttpRequest {
            method,
            path: self.config.url(path),
            headers,
            body,
            stream,
            timeout: self.config.timeout,
        }
    }

    fn send(&self, request: &HttpRequest) -> Result<TransportResponse, ApiError> {
        self.observer.on_request(request);
        let response = self.transport.send(request)?;
        self.observer.on_response(request, response.status);
        Ok(response)
    }

    fn observe<T>(&self, request: &HttpRequest, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            self.observer.on_error(request, e);
        }
        result
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient").field("config", &self.config).finish_non_exhaustive()
    }
}

fn to_json<T: Serialize>(payload: &T) -> Result<String, ApiError> {
    serde_json::to_string(payload).map_err(|e| ApiError::Validation(format!("payload is not serializable: {e}")))
}

/// Read a body to the end and release it.
fn read_body(mut response: TransportResponse) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    response
        .body
        .read_to_end(&mut body)
        .map_err(|e| ApiError::Transport(format!("reading body: {e}")))?;
    Ok(body)
}

/// Error bodies are kept as text even when they are not valid UTF-8.
fn server_error(status: u16, body: &[u8]) -> ApiError {
    ApiError::Server {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

/// Map a buffered response to a JSON value or an error.
///
/// The service answers `copy` and `delete` with an empty 200; that becomes
/// `Value::Null`.
fn parse_body(status: u16, body: &[u8]) -> Result<Value, ApiError> {
    if !is_success(status) {
        return Err(server_error(status, body));
    }
    let text = std::str::from_utf8(body).map_err(|e| ApiError::Decode(format!("body is not UTF-8: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::stream::tests::SpyBody;
    use crate::stream::StreamState;
    use crate::types::{Message, Options};

    /// Records every request and answers from a queue of canned responses.
    #[derive(Default)]
    struct SpyTransport {
        calls: Mutex<Vec<HttpRequest>>,
        replies: Mutex<VecDeque<Result<(u16, Vec<u8>), String>>>,
        drops: Arc<AtomicUsize>,
    }

    impl SpyTransport {
        fn replying(replies: &[(u16, &str)]) -> Arc<Self> {
            let spy = Self::default();
            spy.replies
                .lock()
                .unwrap()
                .extend(replies.iter().map(|(s, b)| Ok((*s, b.as_bytes().to_vec()))));
            Arc::new(spy)
        }

        fn replying_bytes(status: u16, body: &[u8]) -> Arc<Self> {
            let spy = Self::default();
            spy.replies.lock().unwrap().push_back(Ok((status, body.to_vec())));
            Arc::new(spy)
        }

        fn failing(message: &str) -> Arc<Self> {
            let spy = Self::default();
            spy.replies.lock().unwrap().push_back(Err(message.to_string()));
            Arc::new(spy)
        }

        fn calls(&self) -> Vec<HttpRequest> {
            self.calls.lock().unwrap().clone()
        }

        fn drops(&self) -> usize {
            self.drops.load(Ordering::SeqCst)
        }
    }

    impl Transport for SpyTransport {
        fn send(&self, request: &HttpRequest) -> Result<TransportResponse, ApiError> {
            self.calls.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().pop_front().expect("no canned reply left");
            let (status, bytes) = reply.map_err(ApiError::Transport)?;
            let mut body = SpyBody::from_bytes(bytes);
            body.drops = self.drops.clone();
            Ok(TransportResponse {
                status,
                body: Box::new(body),
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        log: Mutex<Vec<String>>,
    }

    impl Observer for RecordingObserver {
        fn on_request(&self, request: &HttpRequest) {
            self.log.lock().unwrap().push(format!("request {}", request.method.as_str()));
        }

        fn on_response(&self, _request: &HttpRequest, status: u16) {
            self.log.lock().unwrap().push(format!("response {status}"));
        }

        fn on_error(&self, _request: &HttpRequest, error: &ApiError) {
            self.log.lock().unwrap().push(format!("error {:?}", error.kind()));
        }

        fn on_stream_end(&self, _request: &HttpRequest, state: StreamState, events: usize) {
            self.log.lock().unwrap().push(format!("end {state:?} {events}"));
        }
    }

    fn client(transport: &Arc<SpyTransport>) -> OllamaClient {
        OllamaClient::new("http://localhost:11434").unwrap().with_transport(transport.clone())
    }

    fn body_of(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    // --- validation ---

    #[test]
    fn blank_required_fields_never_reach_the_transport() {
        let spy = SpyTransport::replying(&[]);
        let c = client(&spy);

        let failures = vec![
            c.generate(&GenerateRequest::new("", "why is the sky blue")).unwrap_err(),
            c.generate(&GenerateRequest::new("llama2", "   ")).unwrap_err(),
            c.generate_stream(&GenerateRequest::new(" ", "hi")).unwrap_err(),
            c.chat(&ChatRequest::new("llama2", Vec::new())).unwrap_err(),
            c.chat_stream(&ChatRequest::new("\t", vec![Message::user("hi")])).unwrap_err(),
            c.create(&CreateRequest::new("")).unwrap_err(),
            c.create_stream(&CreateRequest::new(" ")).unwrap_err(),
            c.show(&ModelName::new("")).unwrap_err(),
            c.copy(&CopyRequest::new("llama2", "")).unwrap_err(),
            c.copy(&CopyRequest::new("", "backup")).unwrap_err(),
            c.delete(&ModelName::new("\n")).unwrap_err(),
            c.pull(&TransferRequest::new("")).unwrap_err(),
            c.pull_stream(&TransferRequest::new(" ")).unwrap_err(),
            c.push(&TransferRequest::new("")).unwrap_err(),
            c.push_stream(&TransferRequest::new("")).unwrap_err(),
            c.embeddings(&EmbeddingsRequest::new("llama2", "")).unwrap_err(),
        ];

        for err in failures {
            assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
        }
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn blank_base_url_is_a_validation_error() {
        assert_eq!(OllamaClient::new(" ").unwrap_err().kind(), ErrorKind::Validation);
    }

    // --- request building ---

    #[test]
    fn generate_request_shape() {
        let spy = SpyTransport::replying(&[]);
        let req = client(&spy)
            .build_generate(&GenerateRequest::new("llama2", "Why is the sky blue"), true)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:11434/api/generate");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert!(req.stream);
        assert_eq!(req.timeout, std::time::Duration::from_secs(10));

        let body = body_of(&req);
        assert_eq!(body["model"], "llama2");
        assert_eq!(body["stream"], true);
        assert_eq!(body["keep_alive"], "5m");
        assert!(body["system"].is_null());
    }

    #[test]
    fn explicit_keep_alive_wins() {
        let spy = SpyTransport::replying(&[]);
        let input = ChatRequest {
            keep_alive: Some("0".to_string()),
            options: Some(Options {
                seed: Some(42),
                ..Default::default()
            }),
            ..ChatRequest::new("llama2", vec![Message::user("hi")])
        };
        let body = body_of(&client(&spy).build_chat(&input, false).unwrap());
        assert_eq!(body["keep_alive"], "0");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"], json!({"seed": 42}));
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn tags_has_no_body() {
        let spy = SpyTransport::replying(&[]);
        let req = client(&spy).build_tags();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:11434/api/tags");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn delete_sends_name_in_body() {
        let spy = SpyTransport::replying(&[]);
        let req = client(&spy).build_delete(&ModelName::new("llama2")).unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(body_of(&req), json!({"name": "llama2"}));
        assert!(!req.stream);
    }

    // --- non-streaming execution ---

    #[test]
    fn success_returns_parsed_body() {
        let spy = SpyTransport::replying(&[(200, r#"{"response":"ok"}"#)]);
        let value = client(&spy).generate(&GenerateRequest::new("llama2", "hi")).unwrap();
        assert_eq!(value, json!({"response": "ok"}));
        assert_eq!(spy.calls().len(), 1);
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn server_error_keeps_status_and_body() {
        let spy = SpyTransport::replying(&[(500, "\"boom\"")]);
        let err = client(&spy).show(&ModelName::new("llama2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status_code(), Some(500));
        assert!(err.message().contains("boom"));
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn non_utf8_error_body_keeps_status() {
        let spy = SpyTransport::replying_bytes(500, b"boom \xff\xfe");
        let err = client(&spy).tags().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status_code(), Some(500));
        assert!(err.message().contains("boom"));
        assert_eq!(spy.drops(), 1);

        let spy = SpyTransport::replying_bytes(503, b"\xffdown");
        let err = client(&spy).pull_stream(&TransferRequest::new("llama2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status_code(), Some(503));
        assert!(err.message().contains("down"));
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn non_utf8_success_body_is_a_decode_error() {
        let spy = SpyTransport::replying_bytes(200, b"{\"a\":\"\xff\"}");
        let err = client(&spy).tags().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn invalid_json_body_is_a_decode_error() {
        let spy = SpyTransport::replying(&[(200, "<html>")]);
        let err = client(&spy).tags().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn empty_success_body_is_null() {
        let spy = SpyTransport::replying(&[(200, "")]);
        let value = client(&spy).copy(&CopyRequest::new("llama2", "llama2-backup")).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let spy = SpyTransport::failing("connection refused");
        let err = client(&spy).tags().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.message().contains("connection refused"));
        assert_eq!(spy.calls().len(), 1);
    }

    #[test]
    fn show_twice_returns_equal_values() {
        let body = r#"{"modelfile":"FROM llama2","parameters":"stop [INST]","template":"{{ .Prompt }}"}"#;
        let spy = SpyTransport::replying(&[(200, body), (200, body)]);
        let c = client(&spy);
        let first = c.show(&ModelName::new("llama2")).unwrap();
        let second = c.show(&ModelName::new("llama2")).unwrap();
        assert_eq!(first, second);
        assert_eq!(spy.calls().len(), 2);
    }

    #[test]
    fn parse_json_for_host_driven_io() {
        let spy = SpyTransport::replying(&[]);
        let response = HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: r#"{"error":"model 'nope' not found"}"#.to_string(),
        };
        let err = client(&spy).parse_json(response).unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    // --- streaming execution ---

    #[test]
    fn stream_yields_one_event_per_line() {
        let spy = SpyTransport::replying(&[(200, "{\"a\":1}\n\n{\"b\":2}\n")]);
        let events: Vec<Value> = client(&spy)
            .generate_stream(&GenerateRequest::new("llama2", "hi"))
            .unwrap()
            .map(|e| Value::Object(e.unwrap()))
            .collect();
        assert_eq!(events, vec![json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn stream_stops_at_malformed_line() {
        let spy = SpyTransport::replying(&[(200, "{\"a\":1}\n not-json\n{\"b\":2}\n")]);
        let mut stream = client(&spy).pull_stream(&TransferRequest::new("llama2")).unwrap();
        assert_eq!(stream.next().unwrap().unwrap()["a"], 1);
        assert_eq!(stream.next().unwrap().unwrap_err().kind(), ErrorKind::Decode);
        assert!(stream.next().is_none());
        assert_eq!(stream.state(), StreamState::Failed);
    }

    #[test]
    fn stream_server_error_reads_body_and_fails() {
        let spy = SpyTransport::replying(&[(404, r#"{"error":"model 'x' not found"}"#)]);
        let err = client(&spy).chat_stream(&ChatRequest::new("x", vec![Message::user("hi")])).unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert!(err.message().contains("not found"));
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn abandoned_stream_releases_body_once() {
        let spy = SpyTransport::replying(&[(200, "{\"status\":\"a\"}\n{\"status\":\"b\"}\n{\"status\":\"c\"}\n")]);
        let mut stream = client(&spy).push_stream(&TransferRequest::new("me/llama2")).unwrap();
        stream.next().unwrap().unwrap();
        assert_eq!(spy.drops(), 0);
        drop(stream);
        assert_eq!(spy.drops(), 1);
    }

    #[test]
    fn execute_dispatches_on_stream_flag() {
        let spy = SpyTransport::replying(&[(200, "{\"status\":\"success\"}\n"), (200, r#"{"status":"success"}"#)]);
        let c = client(&spy);
        let input = CreateRequest {
            modelfile: Some("FROM llama2".to_string()),
            ..CreateRequest::new("mario")
        };

        let streamed = c.execute(c.build_create(&input, true).unwrap()).unwrap();
        assert!(matches!(streamed, Reply::Stream(_)));
        let buffered = c.execute(c.build_create(&input, false).unwrap()).unwrap();
        assert!(matches!(buffered, Reply::Json(ref v) if v["status"] == "success"));
    }

    // --- observation ---

    #[test]
    fn observer_sees_each_error_once() {
        let spy = SpyTransport::replying(&[(200, "{\"a\":1}\nbad\n"), (500, "boom")]);
        let observer = Arc::new(RecordingObserver::default());
        let c = client(&spy).with_observer(observer.clone());

        let stream = c.generate_stream(&GenerateRequest::new("llama2", "hi")).unwrap();
        assert!(stream.collect::<Result<Vec<_>, _>>().is_err());
        assert!(c.tags().is_err());

        assert_eq!(
            *observer.log.lock().unwrap(),
            vec![
                "request POST",
                "response 200",
                "error Decode",
                "end Failed 1",
                "request GET",
                "response 500",
                "error Server",
            ]
        );
    }

    #[test]
    fn observer_tells_abandoned_streams_from_finished_ones() {
        let records = "{\"a\":1}\n{\"a\":2}\n";
        let spy = SpyTransport::replying(&[(200, records), (200, records)]);
        let observer = Arc::new(RecordingObserver::default());
        let c = client(&spy).with_observer(observer.clone());
        let input = GenerateRequest::new("llama2", "hi");

        assert_eq!(c.generate_stream(&input).unwrap().count(), 2);
        let mut partial = c.generate_stream(&input).unwrap();
        assert!(partial.next().unwrap().is_ok());
        drop(partial);

        assert_eq!(spy.drops(), 2);
        assert_eq!(
            *observer.log.lock().unwrap(),
            vec![
                "request POST",
                "response 200",
                "end Finished 2",
                "request POST",
                "response 200",
                "end Abandoned 1",
            ]
        );
    }
}
