//! Error types for the compass client.
//!
//! Every failure that can leave a component is one of these variants. The
//! upload-phase variants keep "nothing happened" (`RequestFailed`) apart from
//! "bytes may exist but the record is not visible" (`ConfirmFailed`).

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using compass's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Client-side precondition failure. No network call is made when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file size {size} bytes exceeds maximum allowed size of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("file is empty")]
    EmptyFile,

    #[error("file name is required")]
    MissingFileName,

    #[error("file extension {extension} is not allowed (allowed: {allowed})")]
    ExtensionNotAllowed { extension: String, allowed: String },

    #[error("document title is required")]
    EmptyTitle,

    #[error("message is required")]
    EmptyMessage,

    #[error("query is required")]
    EmptyQuery,

    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    /// Name of the violated constraint, stable across releases.
    pub fn constraint(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "max_file_size",
            Self::EmptyFile => "non_empty_file",
            Self::MissingFileName => "file_name",
            Self::ExtensionNotAllowed { .. } => "allowed_extension",
            Self::EmptyTitle => "title",
            Self::EmptyMessage => "message",
            Self::EmptyQuery => "query",
            Self::Field { field, .. } => *field,
        }
    }
}

/// Core error type for compass operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Client-side precondition failure
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Upload ticket could not be obtained; nothing was created server-side
    #[error("Upload request failed: {message}")]
    RequestFailed {
        message: String,
        status: Option<u16>,
    },

    /// Transfer to the blob store failed; the provisional document is orphaned
    #[error("Upload transfer failed for document {document_id}: {message}")]
    TransferFailed { document_id: Uuid, message: String },

    /// Bytes reached the blob store but the record was not confirmed
    #[error("Upload confirmation failed for document {document_id}: {message}")]
    ConfirmFailed {
        document_id: Uuid,
        storage_key: String,
        message: String,
    },

    /// 401/403 after a failed refresh; local credentials have been cleared
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 5xx response; credentials retained
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success response
    #[error("Request rejected ({status}): {message}")]
    Api { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure or timeout
    #[error("Network error: {0}")]
    Transport(String),

    /// Chat precondition not met
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error reading a local file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether repeating the same call can succeed without side effects.
    ///
    /// Transfer and confirm failures are never retryable: tickets are
    /// single-use and a repeated request+transfer duplicates storage.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::Transport(_) | Self::Server { .. }
        )
    }

    /// Whether the endpoint itself is missing (404/405/501), as opposed to
    /// a failure of the operation.
    pub fn is_endpoint_unavailable(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => matches!(status, 404 | 405),
            Self::Server { status, .. } => *status == 501,
            Self::RequestFailed {
                status: Some(status),
                ..
            } => matches!(status, 404 | 405 | 501),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::RequestFailed { status, .. } => *status,
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Severity rank for upload outcomes; confirm failures rank highest.
    pub fn upload_severity(&self) -> u8 {
        match self {
            Self::ConfirmFailed { .. } => 3,
            Self::TransferFailed { .. } => 2,
            Self::RequestFailed { .. } => 1,
            _ => 0,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Serialization(e.to_string())
        } else if e.is_timeout() {
            Error::Transport(format!("request timed out: {}", e))
        } else {
            Error::Transport(e.to_string())
        }
    }
}
