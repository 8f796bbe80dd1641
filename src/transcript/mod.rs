//! Transcript handling: types, validation, selection, and formatting.

mod format;
mod select;
mod types;
mod validate;

pub use format::{DEFAULT_TITLE, EXPORT_VERSION, TranscriptFormatter};
pub use select::most_recent;
pub use types::{ExportDocument, ExportMetadata, ExportedMessage, Message, Sender};
pub use validate::{parse_message, parse_messages, validate, validate_message};
