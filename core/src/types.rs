//! Request payloads for the inference service API.
//!
//! # Design
//! One struct per operation, carrying exactly the fields that operation
//! accepts. Required fields are plain `String`s checked by `validate()`;
//! optional top-level fields are `Option`s that serialize as `null` when
//! unset, so every payload has a fixed, predictable key set. The exceptions
//! are `Options` and `Message::images`, which are omitted when unset because
//! the server treats their absence and their zero value differently.
//!
//! The `stream` flag is not a field here: the client adds it from the
//! method that was called (`generate` vs `generate_stream`), so payload and
//! return shape cannot disagree.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Response format constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Base64-encoded images, for multimodal models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Model runtime parameters. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfs_z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Payload for `api/generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub options: Option<Options>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    /// Context returned by a previous generate call, to continue from it.
    #[serde(default)]
    pub context: Option<Vec<i64>>,
    #[serde(default)]
    pub raw: Option<bool>,
    /// Falls back to `ClientConfig::keep_alive` when unset.
    #[serde(default)]
    pub keep_alive: Option<String>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("model", &self.model)?;
        require("prompt", &self.prompt)
    }
}

/// Payload for `api/chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub options: Option<Options>,
    #[serde(default)]
    pub keep_alive: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("model", &self.model)?;
        if self.messages.is_empty() {
            return Err(ApiError::missing("messages"));
        }
        Ok(())
    }
}

/// Payload for `api/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    /// Contents of the Modelfile.
    #[serde(default)]
    pub modelfile: Option<String>,
    /// Path to a Modelfile on the server's filesystem.
    #[serde(default)]
    pub path: Option<String>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)
    }
}

/// Payload naming a single model, for `api/show` and `api/delete`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelName {
    pub name: String,
}

impl ModelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)
    }
}

/// Payload for `api/copy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub source: String,
    pub destination: String,
}

impl CopyRequest {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("source", &self.source)?;
        require("destination", &self.destination)
    }
}

/// Payload for registry transfers: `api/pull` and `api/push`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub name: String,
    /// Allow plain-HTTP or self-signed registries.
    #[serde(default)]
    pub insecure: Option<bool>,
}

impl TransferRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insecure: None,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)
    }
}

/// Payload for `api/embeddings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Options>,
    #[serde(default)]
    pub keep_alive: Option<String>,
}

impl EmbeddingsRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        require("model", &self.model)?;
        require("prompt", &self.prompt)
    }
}

/// Blank and whitespace-only strings count as missing.
fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::missing(field));
    }
    Ok(())
}
