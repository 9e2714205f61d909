//! Embedding status and the Embedding & Retrieval Service payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// State of one embedding key (a document id or a profile signature).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingState {
    #[default]
    Pending,
    Embedding,
    Success,
    Error,
}

impl std::fmt::Display for EmbeddingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Embedding => write!(f, "embedding"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status entry of a per-key status map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingStatus {
    pub state: EmbeddingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EmbeddingStatus {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn embedding() -> Self {
        Self {
            state: EmbeddingState::Embedding,
            ..Self::default()
        }
    }

    pub fn success() -> Self {
        Self {
            state: EmbeddingState::Success,
            error: None,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: EmbeddingState::Error,
            error: Some(message.into()),
            completed_at: Some(Utc::now()),
        }
    }

    /// Queued or running.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, EmbeddingState::Pending | EmbeddingState::Embedding)
    }

    pub fn is_success(&self) -> bool {
        self.state == EmbeddingState::Success
    }

    pub fn is_error(&self) -> bool {
        self.state == EmbeddingState::Error
    }
}

/// Response of the profile-embed operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileEmbedResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

/// Response of the document-embed operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub chunks_created: u32,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub document_type: Option<String>,
}

/// Response of the raw-text embed operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextEmbedding {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dimensions: usize,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub processing_time: f64,
}

/// One retrieved context excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub metadata: JsonValue,
}

/// Response of the context-retrieve operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub contexts: Vec<RetrievedContext>,
    #[serde(default)]
    pub has_context: bool,
    #[serde(default)]
    pub processing_time: f64,
}

/// Per-user chunk counts kept by the retrieval index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagUserStats {
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(default)]
    pub profile_chunks: u64,
    #[serde(default)]
    pub document_chunks: u64,
    #[serde(default)]
    pub unique_documents: u64,
}

/// Response of the stats fetch operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagStats {
    #[serde(default)]
    pub user_stats: RagUserStats,
    #[serde(default)]
    pub embedding_stats: JsonValue,
    #[serde(default)]
    pub system_ready: bool,
}

/// Response of the stats clear operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cleared: bool,
}
