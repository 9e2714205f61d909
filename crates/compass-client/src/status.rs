//! Mapping of HTTP responses onto the compass error taxonomy.

use compass_core::Error;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Coarse class of a non-success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 401: token missing or expired; eligible for one refresh.
    Unauthorized,
    /// 403: authenticated but not permitted.
    Forbidden,
    NotFound,
    /// Any other 4xx.
    Rejected,
    /// 5xx.
    ServerError,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::ServerError,
            _ => Self::Rejected,
        }
    }
}

/// Error body returned by the Account Service: `{error, details?}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    details: Option<JsonValue>,
}

/// Human-readable message from a response body, falling back to the raw
/// text (truncated) when the body is not the usual JSON shape.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let headline = parsed.error.or(parsed.detail);
        let details = match parsed.details {
            Some(JsonValue::String(s)) => Some(s),
            Some(JsonValue::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        match (headline, details) {
            (Some(h), Some(d)) => return format!("{}: {}", h, d),
            (Some(h), None) => return h,
            (None, Some(d)) => return d,
            (None, None) => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Convert a non-success status and body into an [`Error`].
pub fn to_error(status: u16, body: &str) -> Error {
    let message = error_message(status, body);
    match StatusClass::from_status(status) {
        StatusClass::Unauthorized | StatusClass::Forbidden => Error::Auth(message),
        StatusClass::NotFound => Error::NotFound(message),
        StatusClass::ServerError => Error::Server { status, message },
        StatusClass::Rejected => Error::Api { status, message },
    }
}
