//! # compass-rag
//!
//! Client-side RAG orchestration for the compass assistant.
//!
//! This crate provides:
//! - The three-phase document upload pipeline (request, transfer, confirm)
//! - Document embedding tracking with one job per completed document
//! - Signature-based profile change detection with single-flight
//!   re-embedding
//! - A readiness verdict combining profile and document embedding state
//! - The chat session and its reconciliation with server state
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use compass_client::{ClientConfig, CompassClient, HttpBlobStore};
//! use compass_rag::{CompassSession, SessionConfig};
//!
//! let config = ClientConfig::from_env();
//! let client = Arc::new(CompassClient::new(config.clone())?);
//! client.login("ada", "secret").await?;
//!
//! let session = CompassSession::new(
//!     client.clone(),
//!     client.clone(),
//!     Arc::new(HttpBlobStore::new(&config)?),
//!     SessionConfig::from_env(),
//! )?;
//! session.start().await?;
//! let poller = session.start_polling();
//!
//! let reply = session
//!     .conversations()
//!     .send_message("Which schools fit my profile?", None)
//!     .await?;
//! println!("{}", reply.ai_message.content);
//!
//! poller.shutdown().await?;
//! ```

pub mod action;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod poller;
pub mod profile;
pub mod profile_sync;
pub mod readiness;
pub mod session;
pub mod status_map;
pub mod tracker;
pub mod upload;

#[cfg(test)]
mod testing;

// Re-export core types
pub use compass_core::*;

pub use action::{ActionSnapshot, ActionState};
pub use config::SessionConfig;
pub use conversation::{ChatContext, ConversationSession};
pub use documents::{DocumentCollection, DocumentLibrary};
pub use poller::{DocumentPoller, PollerHandle};
pub use profile::ProfileStore;
pub use profile_sync::{
    ProfileChange, ProfileChangeDetector, ProfileEmbeddingSynchronizer, SyncDecision,
};
pub use readiness::{RagReadiness, RagReadinessAggregator};
pub use session::CompassSession;
pub use status_map::StatusMap;
pub use tracker::{summarize, DocumentEmbeddingSummary, DocumentEmbeddingTracker};
pub use upload::{ProgressCallback, UploadPipeline};
