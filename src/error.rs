//! Error taxonomy for the export pipeline.

use thiserror::Error;

use crate::transcript::Sender;

/// Boxed cause reported by an environment capability (clipboard, downloads).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Structural failure of a message list or a single message.
    #[error("{}", describe_invalid(*index, *field, reason))]
    InvalidInput {
        index: Option<usize>,
        field: Option<&'static str>,
        reason: String,
    },

    #[error("unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    #[error("download failed: {source}")]
    Download {
        #[source]
        source: BoxError,
    },

    #[error("failed to copy to clipboard: {source}")]
    Clipboard {
        #[source]
        source: BoxError,
    },

    #[error("failed to format transcript: {source}")]
    Format {
        #[source]
        source: BoxError,
    },

    #[error("no {} message found", sender.as_str())]
    NotFound { sender: Sender },
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ExportError::InvalidInput {
            index: None,
            field: None,
            reason: reason.into(),
        }
    }

    pub fn invalid_field(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        ExportError::InvalidInput {
            index: Some(index),
            field: Some(field),
            reason: reason.into(),
        }
    }

    pub fn download(source: impl Into<BoxError>) -> Self {
        ExportError::Download {
            source: source.into(),
        }
    }

    pub fn clipboard(source: impl Into<BoxError>) -> Self {
        ExportError::Clipboard {
            source: source.into(),
        }
    }

    pub fn format(source: impl Into<BoxError>) -> Self {
        ExportError::Format {
            source: source.into(),
        }
    }
}

fn describe_invalid(index: Option<usize>, field: Option<&str>, reason: &str) -> String {
    match (index, field) {
        (Some(index), Some(field)) => format!("invalid message at index {index}: {field} {reason}"),
        (Some(index), None) => format!("invalid message at index {index}: {reason}"),
        (None, Some(field)) => format!("invalid message: {field} {reason}"),
        (None, None) => format!("invalid input: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_names_index_and_field() {
        let err = ExportError::invalid_field(3, "content", "must be a non-empty string");
        assert_eq!(
            err.to_string(),
            "invalid message at index 3: content must be a non-empty string"
        );
    }

    #[test]
    fn format_error_keeps_cause() {
        let inner = ExportError::invalid("messages must be an array");
        let err = ExportError::format(inner);
        assert!(err.to_string().contains("messages must be an array"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn not_found_uses_sender_name() {
        let err = ExportError::NotFound { sender: Sender::Ai };
        assert_eq!(err.to_string(), "no ai message found");
    }
}
