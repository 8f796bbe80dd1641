//! Render transcripts as Markdown or JSON export documents.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;

use super::types::{ExportDocument, ExportMetadata, ExportedMessage, Message};
use super::validate::validate_message;
use crate::error::{ExportError, Result};
use crate::sanitize::{ContentSanitizer, Sanitizer};

/// Schema version written into every JSON export.
pub const EXPORT_VERSION: &str = "1.0";

pub const DEFAULT_TITLE: &str = "Chat Export";

const LOCALE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute]:[second] [period]"
);

/// Markdown/JSON renderer. Every message's content goes through the
/// injected [`Sanitizer`] before it is written out.
#[derive(Debug, Clone)]
pub struct TranscriptFormatter<S = ContentSanitizer> {
    sanitizer: S,
    title: String,
    offset: UtcOffset,
}

impl Default for TranscriptFormatter<ContentSanitizer> {
    fn default() -> Self {
        Self::new(ContentSanitizer)
    }
}

impl<S: Sanitizer> TranscriptFormatter<S> {
    pub fn new(sanitizer: S) -> Self {
        Self {
            sanitizer,
            title: DEFAULT_TITLE.to_string(),
            offset: local_offset(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Offset used when rendering human-readable timestamps.
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn to_markdown(&self, messages: &[Message]) -> Result<String> {
        self.to_markdown_at(messages, OffsetDateTime::now_utc())
    }

    pub fn to_markdown_at(&self, messages: &[Message], exported_at: OffsetDateTime) -> Result<String> {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# {}", self.title));
        lines.push(String::new());
        lines.push(format!("**Exported:** {}", self.locale_time(exported_at)?));
        lines.push(format!("**Messages:** {}", messages.len()));
        lines.push(String::new());
        lines.push("---".into());
        lines.push(String::new());

        for message in messages {
            let section = self.render_section(message).map_err(as_format_error)?;
            lines.push(section);
            lines.push(String::new());
            lines.push("---".into());
            lines.push(String::new());
        }

        debug!(count = messages.len(), "rendered markdown export");
        Ok(lines.join("\n"))
    }

    /// Render one message on its own, re-checking its fields first.
    pub fn single_to_markdown(&self, message: &Message) -> Result<String> {
        validate_message(message)?;
        self.render_section(message).map_err(as_format_error)
    }

    pub fn to_json(&self, messages: &[Message]) -> Result<String> {
        self.to_json_at(messages, OffsetDateTime::now_utc())
    }

    pub fn to_json_at(&self, messages: &[Message], exported_at: OffsetDateTime) -> Result<String> {
        let document = self.to_document(messages, exported_at)?;
        let json = serde_json::to_string_pretty(&document).map_err(ExportError::format)?;
        debug!(count = messages.len(), "rendered json export");
        Ok(json)
    }

    pub fn to_document(&self, messages: &[Message], exported_at: OffsetDateTime) -> Result<ExportDocument> {
        let messages = messages
            .iter()
            .map(|message| {
                Ok(ExportedMessage {
                    id: message.id.clone(),
                    content: self.sanitizer.sanitize(&message.content)?,
                    sender: message.sender,
                    timestamp: message.timestamp,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(as_format_error)?;

        Ok(ExportDocument {
            export_metadata: ExportMetadata {
                export_date: exported_at,
                title: self.title.clone(),
                message_count: messages.len(),
                version: EXPORT_VERSION.to_string(),
            },
            messages,
        })
    }

    fn render_section(&self, message: &Message) -> Result<String> {
        let content = self.sanitizer.sanitize(&message.content)?;
        let timestamp = self.locale_time(message.timestamp)?;
        Ok(format!("## {}\n*{}*\n\n{}", message.sender.label(), timestamp, content))
    }

    fn locale_time(&self, at: OffsetDateTime) -> Result<String> {
        at.to_offset(self.offset)
            .format(LOCALE_FORMAT)
            .map_err(ExportError::format)
    }
}

/// Wrap a per-message failure as a format error, without nesting format errors.
fn as_format_error(err: ExportError) -> ExportError {
    match err {
        err @ ExportError::Format { .. } => err,
        other => ExportError::format(other),
    }
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}
