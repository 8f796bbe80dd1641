//! Types for transcript messages and export documents.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }

    /// Heading label used in Markdown exports
    pub fn label(self) -> &'static str {
        match self {
            Sender::User => "👤 User",
            Sender::Ai => "🤖 AI Assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "user" => Some(Sender::User),
            "ai" | "assistant" => Some(Sender::Ai),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat message as supplied by the conversation view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        sender: Sender,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender,
            timestamp,
        }
    }
}

/// JSON export document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_metadata: ExportMetadata,
    pub messages: Vec<ExportedMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    #[serde(with = "time::serde::rfc3339")]
    pub export_date: OffsetDateTime,
    pub title: String,
    pub message_count: usize,
    pub version: String,
}

/// A message as written into the JSON export (content already sanitized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}
