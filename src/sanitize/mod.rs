//! Sanitizers for message content, filenames and MIME types.

pub mod content;
pub mod filename;
pub mod mime;

pub use content::{ContentSanitizer, sanitize_content, sanitize_value};
pub use filename::{
    FALLBACK_FILENAME, MAX_FILENAME_LEN, export_filename, sanitize_filename,
    sanitize_filename_value,
};

use crate::error::Result;

/// Content sanitization step injected into the transcript formatter.
pub trait Sanitizer {
    fn sanitize(&self, text: &str) -> Result<String>;
}
