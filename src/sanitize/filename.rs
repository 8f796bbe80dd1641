//! Filename sanitization for downloads.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;
use time::OffsetDateTime;
use time::macros::format_description;

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_FILENAME: &str = "export_file";

/// Maximum length of a sanitized filename, in characters.
pub const MAX_FILENAME_LEN: usize = 100;

/// An extension (dot included) is only kept if it fits in this many characters.
const MAX_EXTENSION_LEN: usize = 10;

static TRAVERSAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{1,2}[/\\]").unwrap());

static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*\\/.]"#).unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Defuse path traversal and filesystem-reserved characters in `name`.
///
/// The result is never empty, is at most [`MAX_FILENAME_LEN`] characters, and
/// sanitizing it again returns it unchanged.
pub fn sanitize_filename(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    let stripped = strip_traversal(trimmed);
    let (raw_base, extension) = split_extension(&stripped);
    let mut base = clean_base(raw_base);

    if base.is_empty() {
        if extension.is_empty() {
            return FALLBACK_FILENAME.to_string();
        }
        base = FALLBACK_FILENAME.to_string();
    }

    let total = base.chars().count() + extension.chars().count();
    if total > MAX_FILENAME_LEN {
        let keep = MAX_FILENAME_LEN - extension.chars().count();
        base = base
            .chars()
            .take(keep)
            .collect::<String>()
            .trim_end_matches(['.', '_'])
            .to_string();
        if base.is_empty() {
            base = FALLBACK_FILENAME.to_string();
        }
    }

    format!("{base}{extension}")
}

/// Sanitize a dynamically-typed value; anything but a string yields the fallback.
pub fn sanitize_filename_value(value: &Value) -> String {
    match value.as_str() {
        Some(name) => sanitize_filename(name),
        None => FALLBACK_FILENAME.to_string(),
    }
}

/// Build `{prefix}_{timestamp}.{extension}` and sanitize it.
pub fn export_filename(prefix: &str, extension: &str, now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!(
            "[year]-[month]-[day]T[hour]-[minute]-[second]"
        ))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    let extension = extension.trim_start_matches('.');
    let name = if extension.is_empty() {
        format!("{prefix}_{stamp}")
    } else {
        format!("{prefix}_{stamp}.{extension}")
    };
    sanitize_filename(&name)
}

fn strip_traversal(name: &str) -> String {
    let mut text = name.to_string();
    loop {
        let next = match TRAVERSAL.replace_all(&text, "") {
            Cow::Owned(next) => next,
            Cow::Borrowed(_) => text.clone(),
        };
        let next = next.trim_start_matches(['/', '\\']).to_string();
        if next == text {
            return text;
        }
        text = next;
    }
}

/// Split off a short alphanumeric extension, returned with its dot.
fn split_extension(name: &str) -> (&str, &str) {
    let Some(dot) = name.rfind('.') else {
        return (name, "");
    };
    let (base, extension) = name.split_at(dot);
    let suffix = &extension[1..];
    let valid = !base.is_empty()
        && !suffix.is_empty()
        && extension.chars().count() <= MAX_EXTENSION_LEN
        && suffix.chars().all(|c| c.is_ascii_alphanumeric());
    if valid { (base, extension) } else { (name, "") }
}

fn clean_base(base: &str) -> String {
    let replaced = RESERVED_CHARS.replace_all(base, "_");
    let visible: String = replaced.chars().filter(|c| !c.is_control()).collect();
    let collapsed = WHITESPACE.replace_all(&visible, "_");
    collapsed.trim_matches(['.', '_']).to_string()
}
