//! Structural validation of message lists.
//!
//! Untrusted input arrives as JSON and goes through [`parse_messages`], which
//! rejects a malformed message as a unit and reports the first offending
//! index and field. Typed lists built in-process go through [`validate`].

use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use super::types::{Message, Sender};
use crate::error::{ExportError, Result};

/// Check a typed message list before exporting it.
pub fn validate(messages: &[Message]) -> Result<()> {
    if messages.is_empty() {
        return Err(ExportError::invalid("no messages to export"));
    }
    for (index, message) in messages.iter().enumerate() {
        check_message(message).map_err(|(field, reason)| {
            ExportError::invalid_field(index, field, reason)
        })?;
    }
    Ok(())
}

/// Check the fields of a single typed message.
pub fn validate_message(message: &Message) -> Result<()> {
    check_message(message).map_err(|(field, reason)| ExportError::InvalidInput {
        index: None,
        field: Some(field),
        reason: reason.to_string(),
    })
}

fn check_message(message: &Message) -> std::result::Result<(), (&'static str, &'static str)> {
    if message.id.is_empty() {
        return Err(("id", "must be a non-empty string"));
    }
    if message.content.is_empty() {
        return Err(("content", "must be a non-empty string"));
    }
    if !has_exportable_year(message.timestamp) {
        return Err(("timestamp", "year must be between 0 and 9999"));
    }
    Ok(())
}

/// RFC 3339 output only covers four-digit years, in UTC and in the stored offset.
fn has_exportable_year(timestamp: OffsetDateTime) -> bool {
    let years = 0..=9999;
    years.contains(&timestamp.year())
        && timestamp
            .checked_to_offset(UtcOffset::UTC)
            .is_some_and(|utc| years.contains(&utc.year()))
}

/// Parse a JSON array of messages, validating every element.
pub fn parse_messages(value: &Value) -> Result<Vec<Message>> {
    let items = value
        .as_array()
        .ok_or_else(|| ExportError::invalid("messages must be an array"))?;
    if items.is_empty() {
        return Err(ExportError::invalid("no messages to export"));
    }
    let messages = items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_message(index, item))
        .collect::<Result<Vec<_>>>()?;
    debug!(count = messages.len(), "parsed messages");
    Ok(messages)
}

/// Parse a single JSON message; `index` is only used for error reporting.
pub fn parse_message(index: usize, value: &Value) -> Result<Message> {
    let obj = value.as_object().ok_or_else(|| ExportError::InvalidInput {
        index: Some(index),
        field: None,
        reason: "message must be an object".to_string(),
    })?;

    let id = non_empty_string(obj.get("id"))
        .ok_or_else(|| ExportError::invalid_field(index, "id", "must be a non-empty string"))?;
    let content = non_empty_string(obj.get("content")).ok_or_else(|| {
        ExportError::invalid_field(index, "content", "must be a non-empty string")
    })?;
    let sender = obj
        .get("sender")
        .and_then(|v| v.as_str())
        .and_then(Sender::parse)
        .ok_or_else(|| ExportError::invalid_field(index, "sender", "must be \"user\" or \"ai\""))?;
    let timestamp = obj
        .get("timestamp")
        .and_then(parse_timestamp)
        .ok_or_else(|| ExportError::invalid_field(index, "timestamp", "must be a valid time"))?;

    Ok(Message {
        id,
        content,
        sender,
        timestamp,
    })
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?;
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
    let timestamp = match value {
        Value::String(text) => OffsetDateTime::parse(text.trim(), &Rfc3339).ok(),
        Value::Number(num) => {
            let millis = if let Some(ms) = num.as_i64() {
                i128::from(ms)
            } else {
                let ms = num.as_f64()?;
                if !ms.is_finite() {
                    return None;
                }
                ms.trunc() as i128
            };
            OffsetDateTime::from_unix_timestamp_nanos(millis.checked_mul(1_000_000)?).ok()
        }
        _ => None,
    };
    timestamp.filter(|timestamp| has_exportable_year(*timestamp))
}
