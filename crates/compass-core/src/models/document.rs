//! Document records and the upload protocol types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Declared document type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Transcript,
    SatScore,
    ActScore,
    ToeflScore,
    IeltsScore,
    Recommendation,
    PersonalStatement,
    BankStatement,
    I20,
    Passport,
    Visa,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::SatScore => "sat_score",
            Self::ActScore => "act_score",
            Self::ToeflScore => "toefl_score",
            Self::IeltsScore => "ielts_score",
            Self::Recommendation => "recommendation",
            Self::PersonalStatement => "personal_statement",
            Self::BankStatement => "bank_statement",
            Self::I20 => "i20",
            Self::Passport => "passport",
            Self::Visa => "visa",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map_err(|_| format!("Invalid document type: {}", s))
    }
}

/// Server-side processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Successful,
    ValidationFailed,
    Failed,
    Error,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl DocumentStatus {
    /// Documents in this status are eligible for embedding.
    pub fn is_embeddable(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Server-side processing is still outstanding.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Outcome of server-side document validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetadata {
    #[serde(default)]
    pub validation_passed: Option<bool>,
    #[serde(default)]
    pub validation_confidence: Option<f64>,
    #[serde(default)]
    pub validation_notes: String,
}

/// A document owned by the user's document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    #[serde(flatten)]
    pub validation: ValidationMetadata,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Request body for an upload ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTicketRequest {
    pub title: String,
    pub document_type: DocumentType,
    pub filename: String,
    pub file_size: u64,
}

/// Single-use authorization for a direct transfer to the blob store.
///
/// Deliberately not `Clone`: the transfer phase consumes it.
#[derive(Debug, Deserialize)]
pub struct UploadTicket {
    pub document_id: Uuid,
    pub upload_url: String,
    #[serde(default)]
    pub upload_fields: BTreeMap<String, String>,
    pub s3_key: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Time-limited download link for a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub download_url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// File contents selected for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk; the file name is the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Internal(format!("Invalid file path: {}", path.display())))?
            .to_string();
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, content))
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Lowercase extension with leading dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }
}

/// Phase of a single upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Requesting,
    Transferring,
    Confirming,
    Done,
    Failed,
}

impl UploadPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Legal transitions: the three working phases advance strictly in
    /// order, and any working phase may fail.
    pub fn can_advance_to(&self, next: UploadPhase) -> bool {
        matches!(
            (self, next),
            (Self::Requesting, Self::Transferring)
                | (Self::Transferring, Self::Confirming)
                | (Self::Confirming, Self::Done)
                | (Self::Requesting, Self::Failed)
                | (Self::Transferring, Self::Failed)
                | (Self::Confirming, Self::Failed)
        )
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requesting => "requesting",
            Self::Transferring => "transferring",
            Self::Confirming => "confirming",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of one upload attempt, kept for diagnostics after it ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSession {
    pub phase: UploadPhase,
    /// Transfer progress in percent, 0..=100.
    pub progress: u8,
    pub document_id: Option<Uuid>,
    pub storage_key: Option<String>,
    /// Phase that was active when the attempt failed.
    pub failed_in: Option<UploadPhase>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            phase: UploadPhase::Requesting,
            progress: 0,
            document_id: None,
            storage_key: None,
            failed_in: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to the next phase, rejecting illegal transitions.
    pub fn advance(&mut self, next: UploadPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::Internal(format!(
                "Illegal upload transition {} -> {}",
                self.phase, next
            )));
        }
        if next == UploadPhase::Done {
            self.progress = 100;
            self.finished_at = Some(Utc::now());
        }
        self.phase = next;
        Ok(())
    }

    /// Record a failure in the current phase. No-op once terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.phase.is_terminal() {
            return;
        }
        self.failed_in = Some(self.phase);
        self.phase = UploadPhase::Failed;
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
    }

    /// Raise progress; values never decrease and are capped at 100.
    pub fn record_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }
}
