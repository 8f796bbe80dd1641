//! Message content sanitization.
//!
//! Denylist stripping of script/style blocks, dangerous tags, inline event
//! handlers and executable URI schemes, followed by a character allow-list.
//! This is scoped to Markdown/plain-text exports; it is not an HTML sanitizer.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

use super::Sanitizer;
use crate::error::Result;

static SCRIPT_OR_STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").unwrap()
});

static UNCLOSED_SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:script|style)\b[^>]*>?").unwrap());

static DANGEROUS_OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:iframe|object|embed|applet|form|input|button|textarea)\b[^>]*>").unwrap()
});

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s*\bon\w+\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap()
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<[^<>"']*(?:(?:"[^"]*"|'[^']*')[^<>"']*)*>"#).unwrap());

static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());

static HTML_DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)data:text/html").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{3,}").unwrap());

static DISALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"[^\w\s\p{Emoji}\p{Emoji_Presentation}\p{Emoji_Modifier}\p{Emoji_Component}.,;:!?()\[\]{}"'`~@#$%^&*+=|\-_/\\<>]"#,
    )
    .unwrap()
});

/// Default content sanitizer used by the transcript formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSanitizer;

impl Sanitizer for ContentSanitizer {
    fn sanitize(&self, text: &str) -> Result<String> {
        Ok(sanitize_content(text))
    }
}

/// Neutralize injected markup in message text.
pub fn sanitize_content(text: &str) -> String {
    let text = strip_until_stable(&SCRIPT_OR_STYLE_BLOCK, text.to_string());
    let text = strip_until_stable(&UNCLOSED_SCRIPT_OR_STYLE, text);
    let text = strip_until_stable(&DANGEROUS_OPEN_TAG, text);
    let text = strip_event_handlers(text);
    let text = strip_until_stable(&JAVASCRIPT_SCHEME, text);
    let text = HTML_DATA_URI.replace_all(&text, "data:text/plain");
    let text = WHITESPACE_RUN.replace_all(&text, "  ");
    let text = DISALLOWED_CHARS.replace_all(&text, "");
    text.trim().to_string()
}

/// Sanitize a dynamically-typed value; anything but a string yields "".
pub fn sanitize_value(value: &Value) -> String {
    value.as_str().map(sanitize_content).unwrap_or_default()
}

// Removing a match can splice a new one together ("<scr<script></script>ipt>"),
// so keep stripping until nothing matches. Every pass shrinks the text.
fn strip_until_stable(pattern: &Regex, mut text: String) -> String {
    while let Cow::Owned(next) = pattern.replace_all(&text, "") {
        text = next;
    }
    text
}

/// Remove `on*=` attributes from tags, leaving text outside tags alone.
fn strip_event_handlers(mut text: String) -> String {
    loop {
        let next = TAG
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                strip_until_stable(&EVENT_HANDLER, caps[0].to_string())
            })
            .into_owned();
        if next == text {
            return text;
        }
        text = next;
    }
}
