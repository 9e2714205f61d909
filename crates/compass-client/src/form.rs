//! Multipart helpers shared by the avatar, legacy upload, and blob transfer
//! requests.

use reqwest::multipart::Part;

use compass_core::{detect_content_type, UploadFile};

/// File part named after the upload, typed from its magic bytes.
///
/// A content type that fails to parse is dropped rather than failing the
/// request; the receiving side sniffs the type itself.
pub(crate) fn file_part(file: &UploadFile) -> Part {
    let content_type = detect_content_type(&file.file_name, &file.content);
    untyped_part(file)
        .mime_str(&content_type)
        .unwrap_or_else(|_| untyped_part(file))
}

fn untyped_part(file: &UploadFile) -> Part {
    Part::stream_with_length(file.content.clone(), file.size()).file_name(file.file_name.clone())
}
