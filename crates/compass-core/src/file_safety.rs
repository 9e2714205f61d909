//! Upload precondition checks and title sanitization.
//!
//! Everything here runs before any network call: a file that fails these
//! checks never reaches the Account Service or the Blob Store.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::defaults;
use crate::error::ValidationError;
use crate::models::UploadFile;

/// Characters removed from titles outright.
const TITLE_STRIP_CHARS: &[char] = &['<', '>', '"', '\'', '&', '\\', '/'];

/// Content types for extensions whose files may carry no magic bytes.
static EXTENSION_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("txt", "text/plain"),
        ("pdf", "application/pdf"),
        ("doc", "application/msword"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
    ]
    .into_iter()
    .collect()
});

/// Size and extension limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Lowercase extensions with a leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: defaults::MAX_UPLOAD_BYTES,
            allowed_extensions: defaults::ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    pub fn allows_extension(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.allowed_extensions.iter().any(|a| *a == ext)
    }
}

/// Validate a file and title against `policy`.
///
/// Returns the sanitized title on success. Checks run in a fixed order
/// (name, emptiness, size, extension, title) so the reported constraint is
/// deterministic when several are violated.
pub fn validate_upload(
    file: &UploadFile,
    title: &str,
    policy: &UploadPolicy,
) -> Result<String, ValidationError> {
    if file.file_name.trim().is_empty() {
        return Err(ValidationError::MissingFileName);
    }

    let size = file.size();
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > policy.max_bytes {
        return Err(ValidationError::FileTooLarge {
            size,
            max: policy.max_bytes,
        });
    }

    let extension = file.extension().unwrap_or_default();
    if !policy.allows_extension(&extension) {
        return Err(ValidationError::ExtensionNotAllowed {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
            allowed: policy.allowed_extensions.join(", "),
        });
    }

    sanitize_title(title)
}

/// Sanitize a document title.
///
/// Strips markup and path characters, control characters, and `..`
/// sequences, collapses whitespace, and truncates to
/// [`defaults::TITLE_MAX_CHARS`] characters. A title with nothing left is
/// rejected.
pub fn sanitize_title(raw: &str) -> Result<String, ValidationError> {
    let stripped: String = raw
        .chars()
        .filter(|c| !TITLE_STRIP_CHARS.contains(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut without_parents = stripped;
    while without_parents.contains("..") {
        without_parents = without_parents.replace("..", "");
    }

    let collapsed = without_parents.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(defaults::TITLE_MAX_CHARS).collect();
    let title = truncated.trim();

    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// Content type for the blob part of an upload.
///
/// Magic bytes win; files without a signature (plain text, legacy .doc)
/// fall back to the extension, then to `application/octet-stream`.
pub fn detect_content_type(filename: &str, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| mime_from_extension(ext))
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_MIME.get(ext.to_lowercase().as_str()).copied()
}
