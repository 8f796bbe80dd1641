//! MIME type allow-list for downloads.

/// MIME types a download may be tagged with.
pub const ALLOWED_MIME_TYPES: &[&str] = &["text/plain", "text/markdown", "application/json", "text/csv"];

pub const MARKDOWN_MIME: &str = "text/markdown";
pub const JSON_MIME: &str = "application/json";

/// Case-insensitive exact match (after trimming) against [`ALLOWED_MIME_TYPES`].
pub fn is_allowed(mime: &str) -> bool {
    let mime = mime.trim();
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime))
}

/// Canonical lowercase form of an allowed MIME type.
pub fn normalize(mime: &str) -> Option<&'static str> {
    let mime = mime.trim();
    ALLOWED_MIME_TYPES
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(mime))
}
