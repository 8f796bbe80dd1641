use super::types::{Message, Sender};

/// Last message (by input order) written by `sender`, if any.
pub fn most_recent(messages: &[Message], sender: Sender) -> Option<&Message> {
    messages.iter().rev().find(|m| m.sender == sender)
}
