//! Centralized default constants for the compass client.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// UPLOAD
// =============================================================================

/// Maximum upload size in bytes (25 MB).
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Maximum length of a sanitized document title, in characters.
pub const TITLE_MAX_CHARS: usize = 100;

/// File extensions accepted for upload (lowercase, with leading dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".jpg", ".jpeg", ".png", ".gif", ".txt",
];

/// Chunk size used when streaming a file to the blob store.
pub const TRANSFER_CHUNK_BYTES: usize = 64 * 1024;

// =============================================================================
// NETWORK
// =============================================================================

/// Default timeout for Account Service calls, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for a blob store transfer, in seconds.
pub const TRANSFER_TIMEOUT_SECS: u64 = 120;

/// Default Account Service base URL.
pub const API_URL: &str = "http://localhost:8000";

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Default number of contexts returned by context retrieval.
pub const RETRIEVE_TOP_K: u32 = 5;

/// Upper bound accepted by the retrieval endpoint.
pub const RETRIEVE_TOP_K_MAX: u32 = 20;

/// Maximum characters accepted by the raw-text embed endpoint.
pub const EMBED_TEXT_MAX_CHARS: usize = 50_000;

// =============================================================================
// CHAT
// =============================================================================

/// Title length the server derives from a first message.
pub const CONVERSATION_TITLE_CHARS: usize = 50;

/// Title given to conversations created without an initial message.
pub const NEW_CONVERSATION_TITLE: &str = "new conversation";

// =============================================================================
// SESSION
// =============================================================================

/// Interval between document collection refreshes while processing is
/// outstanding, in milliseconds.
pub const DOCUMENT_POLL_INTERVAL_MS: u64 = 5_000;

/// Broadcast channel capacity for the session event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;
