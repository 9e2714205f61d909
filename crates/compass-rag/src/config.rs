//! Session configuration.

use std::time::Duration;

use compass_core::defaults;
use compass_core::{Error, Result, UploadPolicy};

/// Behaviour switches for one orchestrated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upload size limit and extension allow-list.
    pub upload: UploadPolicy,
    /// Fall back to the legacy single-request upload when the ticket
    /// endpoint is missing (404/405/501).
    pub allow_direct_fallback: bool,
    /// Refresh interval for the document poller, in milliseconds.
    pub document_poll_interval_ms: u64,
    /// Drop terminal embedding statuses for documents that leave
    /// `completed`, so they are embedded again when they return.
    pub invalidate_on_regression: bool,
    /// Ask the server to use retrieval context when replying.
    pub use_rag: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            upload: UploadPolicy::default(),
            allow_direct_fallback: true,
            document_poll_interval_ms: defaults::DOCUMENT_POLL_INTERVAL_MS,
            invalidate_on_regression: false,
            use_rag: true,
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SessionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `COMPASS_MAX_UPLOAD_BYTES` | `26214400` | Upload size limit |
    /// | `COMPASS_ALLOWED_EXTENSIONS` | `.pdf,.doc,...` | Comma-separated allow-list |
    /// | `COMPASS_DIRECT_UPLOAD_FALLBACK` | `true` | Legacy upload when tickets are unavailable |
    /// | `COMPASS_DOCUMENT_POLL_MS` | `5000` | Document poll interval |
    /// | `COMPASS_INVALIDATE_ON_REGRESSION` | `false` | Re-embed reprocessed documents |
    /// | `COMPASS_USE_RAG` | `true` | Request retrieval context for chat |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_bytes = std::env::var("COMPASS_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.upload.max_bytes);

        let allowed_extensions = std::env::var("COMPASS_ALLOWED_EXTENSIONS")
            .ok()
            .map(|v| parse_extensions(&v))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.upload.allowed_extensions);

        let document_poll_interval_ms = std::env::var("COMPASS_DOCUMENT_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.document_poll_interval_ms);

        Self {
            upload: UploadPolicy {
                max_bytes,
                allowed_extensions,
            },
            allow_direct_fallback: env_bool("COMPASS_DIRECT_UPLOAD_FALLBACK")
                .unwrap_or(defaults.allow_direct_fallback),
            document_poll_interval_ms,
            invalidate_on_regression: env_bool("COMPASS_INVALIDATE_ON_REGRESSION")
                .unwrap_or(defaults.invalidate_on_regression),
            use_rag: env_bool("COMPASS_USE_RAG").unwrap_or(defaults.use_rag),
        }
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload = policy;
        self
    }

    pub fn with_direct_fallback(mut self, enabled: bool) -> Self {
        self.allow_direct_fallback = enabled;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.document_poll_interval_ms = interval_ms;
        self
    }

    pub fn with_invalidate_on_regression(mut self, enabled: bool) -> Self {
        self.invalidate_on_regression = enabled;
        self
    }

    pub fn with_use_rag(mut self, enabled: bool) -> Self {
        self.use_rag = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.document_poll_interval_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_bytes == 0 {
            return Err(Error::Config("max upload size must be greater than zero".to_string()));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(Error::Config("extension allow-list cannot be empty".to_string()));
        }
        if let Some(bad) = self
            .upload
            .allowed_extensions
            .iter()
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(Error::Config(format!(
                "allowed extensions must start with '.', got: {}",
                bad
            )));
        }
        if self.document_poll_interval_ms == 0 {
            return Err(Error::Config("document poll interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// `"pdf, .TXT"` -> `[".pdf", ".txt"]`
fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| if e.starts_with('.') { e } else { format!(".{}", e) })
        .collect()
}
