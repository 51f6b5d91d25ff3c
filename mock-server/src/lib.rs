//! In-memory fake of the Ollama HTTP API.
//!
//! Serves every endpoint the client uses. "Models" are just names in a map;
//! generation echoes the prompt back word by word. Streaming calls (the
//! default when `stream` is absent, as on the real service) answer with
//! NDJSON, everything else with one JSON document. Failures use the
//! service's `{"error": "..."}` body.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub name: String,
    pub digest: String,
    pub size: u64,
    pub modelfile: String,
}

impl Model {
    fn new(name: &str, modelfile: String) -> Self {
        Self {
            name: name.to_string(),
            digest: format!("sha256:{}", Uuid::new_v4().simple()),
            size: 3_825_819_519,
            modelfile,
        }
    }
}

#[derive(Deserialize)]
pub struct GenerateInput {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    pub stream: Option<bool>,
}

#[derive(Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub stream: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateInput {
    #[serde(default)]
    pub name: String,
    pub modelfile: Option<String>,
    pub path: Option<String>,
    pub stream: Option<bool>,
}

#[derive(Deserialize)]
pub struct NameInput {
    #[serde(default)]
    pub name: String,
    pub stream: Option<bool>,
}

#[derive(Deserialize)]
pub struct CopyInput {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Deserialize)]
pub struct EmbeddingsInput {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
}

pub type Db = Arc<RwLock<HashMap<String, Model>>>;

/// Error reply with the service's `{"error": "..."}` body.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn not_found(name: &str) -> Failure {
    Failure(StatusCode::NOT_FOUND, format!("model '{name}' not found"))
}

fn required(field: &str, value: &str) -> Result<(), Failure> {
    if value.trim().is_empty() {
        return Err(Failure(StatusCode::BAD_REQUEST, format!("{field} is required")));
    }
    Ok(())
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/chat", post(chat))
        .route("/api/create", post(create))
        .route("/api/tags", get(tags))
        .route("/api/show", post(show))
        .route("/api/copy", post(copy))
        .route("/api/delete", delete(remove))
        .route("/api/pull", post(pull))
        .route("/api/push", post(push))
        .route("/api/embeddings", post(embeddings))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// NDJSON with every record when streaming, otherwise just `summary`.
fn reply(stream: Option<bool>, records: Vec<Value>, summary: Value) -> Response {
    if !stream.unwrap_or(true) {
        return Json(summary).into_response();
    }
    let mut body = String::new();
    for record in records {
        body.push_str(&record.to_string());
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}

fn words(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

async fn find(db: &Db, name: &str) -> Result<Model, Failure> {
    db.read().await.get(name).cloned().ok_or_else(|| not_found(name))
}

async fn generate(State(db): State<Db>, Json(input): Json<GenerateInput>) -> Result<Response, Failure> {
    required("model", &input.model)?;
    find(&db, &input.model).await?;

    let tokens = words(&input.prompt);
    let mut records: Vec<Value> = tokens
        .iter()
        .map(|t| json!({ "model": input.model, "response": t, "done": false }))
        .collect();
    let done = json!({
        "model": input.model,
        "response": "",
        "done": true,
        "context": [1, 2, 3],
        "eval_count": tokens.len(),
    });
    records.push(done);
    let summary = json!({
        "model": input.model,
        "response": input.prompt,
        "done": true,
        "context": [1, 2, 3],
        "eval_count": tokens.len(),
    });
    Ok(reply(input.stream, records, summary))
}

async fn chat(State(db): State<Db>, Json(input): Json<ChatInput>) -> Result<Response, Failure> {
    required("model", &input.model)?;
    if input.messages.is_empty() {
        return Err(Failure(StatusCode::BAD_REQUEST, "messages is required".to_string()));
    }
    find(&db, &input.model).await?;

    let last = input
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let tokens = words(&last);
    let mut records: Vec<Value> = tokens
        .iter()
        .map(|t| {
            json!({
                "model": input.model,
                "message": { "role": "assistant", "content": t },
                "done": false,
            })
        })
        .collect();
    records.push(json!({
        "model": input.model,
        "message": { "role": "assistant", "content": "" },
        "done": true,
        "eval_count": tokens.len(),
    }));
    let summary = json!({
        "model": input.model,
        "message": { "role": "assistant", "content": last },
        "done": true,
        "eval_count": tokens.len(),
    });
    Ok(reply(input.stream, records, summary))
}

async fn create(State(db): State<Db>, Json(input): Json<CreateInput>) -> Result<Response, Failure> {
    required("name", &input.name)?;
    let modelfile = match (input.modelfile, input.path) {
        (Some(modelfile), _) => modelfile,
        (None, Some(path)) => format!("# loaded from {path}"),
        (None, None) => return Err(Failure(StatusCode::BAD_REQUEST, "modelfile or path is required".to_string())),
    };
    db.write()
        .await
        .insert(input.name.clone(), Model::new(&input.name, modelfile));

    let records = ["reading model metadata", "creating system layer", "writing manifest", "success"]
        .iter()
        .map(|s| json!({ "status": s }))
        .collect();
    Ok(reply(input.stream, records, json!({ "status": "success" })))
}

async fn tags(State(db): State<Db>) -> Json<Value> {
    let models = db.read().await;
    let mut list: Vec<&Model> = models.values().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    let entries: Vec<Value> = list
        .into_iter()
        .map(|m| json!({ "name": m.name, "digest": m.digest, "size": m.size }))
        .collect();
    Json(json!({ "models": entries }))
}

async fn show(State(db): State<Db>, Json(input): Json<NameInput>) -> Result<Json<Value>, Failure> {
    required("name", &input.name)?;
    let model = find(&db, &input.name).await?;
    Ok(Json(json!({
        "modelfile": model.modelfile,
        "parameters": "",
        "template": "{{ .Prompt }}",
        "details": { "format": "gguf", "family": "llama", "digest": model.digest },
    })))
}

async fn copy(State(db): State<Db>, Json(input): Json<CopyInput>) -> Result<StatusCode, Failure> {
    required("source", &input.source)?;
    required("destination", &input.destination)?;
    let mut models = db.write().await;
    let mut model = models.get(&input.source).cloned().ok_or_else(|| not_found(&input.source))?;
    model.name = input.destination.clone();
    models.insert(input.destination, model);
    Ok(StatusCode::OK)
}

async fn remove(State(db): State<Db>, Json(input): Json<NameInput>) -> Result<StatusCode, Failure> {
    required("name", &input.name)?;
    let mut models = db.write().await;
    models
        .remove(&input.name)
        .map(|_| StatusCode::OK)
        .ok_or_else(|| not_found(&input.name))
}

async fn pull(State(db): State<Db>, Json(input): Json<NameInput>) -> Result<Response, Failure> {
    required("name", &input.name)?;
    let model = {
        let mut models = db.write().await;
        models
            .entry(input.name.clone())
            .or_insert_with(|| Model::new(&input.name, format!("FROM {}", input.name)))
            .clone()
    };

    let half = model.size / 2;
    let records = vec![
        json!({ "status": "pulling manifest" }),
        json!({ "status": "downloading", "digest": model.digest, "total": model.size, "completed": half }),
        json!({ "status": "downloading", "digest": model.digest, "total": model.size, "completed": model.size }),
        json!({ "status": "verifying sha256 digest" }),
        json!({ "status": "writing manifest" }),
        json!({ "status": "success" }),
    ];
    Ok(reply(input.stream, records, json!({ "status": "success" })))
}

async fn push(State(db): State<Db>, Json(input): Json<NameInput>) -> Result<Response, Failure> {
    required("name", &input.name)?;
    let model = find(&db, &input.name).await?;

    let records = vec![
        json!({ "status": "retrieving manifest" }),
        json!({ "status": "starting upload", "digest": model.digest, "total": model.size }),
        json!({ "status": "pushing manifest" }),
        json!({ "status": "success" }),
    ];
    Ok(reply(input.stream, records, json!({ "status": "success" })))
}

async fn embeddings(State(db): State<Db>, Json(input): Json<EmbeddingsInput>) -> Result<Json<Value>, Failure> {
    required("model", &input.model)?;
    required("prompt", &input.prompt)?;
    find(&db, &input.model).await?;

    // Deterministic per prompt, so equal prompts embed equally.
    let embedding: Vec<f64> = input
        .prompt
        .bytes()
        .take(8)
        .map(|b| f64::from(b) / 255.0)
        .collect();
    Ok(Json(json!({ "embedding": embedding })))
}
