//! Core data models for the compass client.
//!
//! These types are shared across all compass crates and mirror the JSON
//! shapes of the Account Service and the Embedding & Retrieval Service.

pub mod conversation;
pub mod document;
pub mod embedding;
pub mod profile;

pub use conversation::*;
pub use document::*;
pub use embedding::*;
pub use profile::*;
