//! # compass-client
//!
//! reqwest implementations of the compass service traits.
//!
//! [`CompassClient`] covers the Account Service and the Embedding &
//! Retrieval Service behind one authenticated connection pool;
//! [`HttpBlobStore`] performs the unauthenticated direct transfer.
//!
//! ```no_run
//! use compass_client::{ClientConfig, CompassClient};
//! use compass_core::ProfileApi;
//!
//! # async fn demo() -> compass_core::Result<()> {
//! let client = CompassClient::new(ClientConfig::from_env())?;
//! client.login("ada", "secret").await?;
//! let profile = client.fetch_profile().await?;
//! println!("{}", profile.user.display_name());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod blob;
pub mod client;
pub mod config;
mod conversations;
mod documents;
mod form;
mod profile;
mod rag;
pub mod status;

pub use auth::{Credentials, TokenStore};
pub use blob::HttpBlobStore;
pub use client::CompassClient;
pub use config::ClientConfig;
