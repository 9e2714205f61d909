//! Client configuration.

use compass_core::defaults;
use compass_core::{Error, Result};

/// Connection settings shared by every service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the Account Service, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Timeout for Account Service and embedding calls, in seconds.
    pub timeout_seconds: u64,
    /// Timeout for a blob store transfer, in seconds.
    pub transfer_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECS,
            transfer_timeout_seconds: defaults::TRANSFER_TIMEOUT_SECS,
            user_agent: format!("compass/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `COMPASS_API_URL` | `http://localhost:8000` | Account Service base URL |
    /// | `COMPASS_TIMEOUT_SECS` | `30` | Per-request timeout |
    /// | `COMPASS_TRANSFER_TIMEOUT_SECS` | `120` | Blob store transfer timeout |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("COMPASS_API_URL").unwrap_or(defaults.base_url);

        let timeout_seconds = std::env::var("COMPASS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        let transfer_timeout_seconds = std::env::var("COMPASS_TRANSFER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.transfer_timeout_seconds);

        Self {
            base_url,
            timeout_seconds,
            transfer_timeout_seconds,
            user_agent: defaults.user_agent,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_transfer_timeout(mut self, seconds: u64) -> Self {
        self.transfer_timeout_seconds = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("base_url cannot be empty".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.timeout_seconds == 0 || self.transfer_timeout_seconds == 0 {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }

    /// Absolute URL for an API path such as `/api/profile/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
