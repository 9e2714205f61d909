//! # compass-core
//!
//! Core types, traits, and abstractions for the compass assistant client.
//!
//! This crate provides the data model, the error taxonomy, and the service
//! traits that the HTTP client and the RAG orchestration crates build on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod file_safety;
pub mod models;
pub mod signature;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result, ValidationError};
pub use events::{EventBus, EventEnvelope, SessionEvent};
pub use file_safety::{detect_content_type, sanitize_title, validate_upload, UploadPolicy};
pub use models::*;
pub use signature::{canonical_form, ProfileSignature};
pub use traits::*;
