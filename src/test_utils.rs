//! Shared test utilities.
//!
//! All tests that manipulate environment variables must use the shared
//! `env_lock()` to prevent race conditions.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use time::macros::datetime;

use crate::clipboard::{ClipboardEnv, FieldId};
use crate::download::{Blob, DownloadEnv, ObjectUrl, TriggerId};
use crate::error::{BoxError, ExportError, Result};
use crate::sanitize::Sanitizer;
use crate::transcript::{Message, Sender};

/// Global lock for tests that modify environment variables.
/// All such tests MUST hold this lock to prevent race conditions.
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for temporarily setting an environment variable.
pub struct EnvGuard {
    key: String,
    old: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let old = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            old,
        }
    }

    pub fn remove(key: &str) -> Self {
        let old = std::env::var(key).ok();
        unsafe {
            std::env::remove_var(key);
        }
        Self {
            key: key.to_string(),
            old,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(val) = &self.old {
            unsafe {
                std::env::set_var(&self.key, val);
            }
        } else {
            unsafe {
                std::env::remove_var(&self.key);
            }
        }
    }
}

/// Message with a fixed timestamp (2024-01-15 10:30:00 UTC).
pub fn message(id: &str, content: &str, sender: Sender) -> Message {
    Message::new(id, content, sender, datetime!(2024-01-15 10:30:00 UTC))
}

/// Sanitizer that always fails.
pub struct FailingSanitizer;

impl Sanitizer for FailingSanitizer {
    fn sanitize(&self, _text: &str) -> Result<String> {
        Err(ExportError::invalid("sanitizer exploded"))
    }
}

/// In-memory clipboard that records which path each copy took.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub secure: bool,
    pub has_api: bool,
    pub fail_api: bool,
    pub fail_select: bool,
    pub refuse_copy: bool,
    pub api_writes: Vec<String>,
    pub legacy_copies: Vec<String>,
    pub fields_created: usize,
    pub live_fields: HashMap<FieldId, String>,
    selected: Option<FieldId>,
}

impl MemoryClipboard {
    pub fn secure() -> Self {
        Self {
            secure: true,
            has_api: true,
            ..Default::default()
        }
    }

    pub fn insecure() -> Self {
        Self {
            secure: false,
            has_api: true,
            ..Default::default()
        }
    }

    /// Last text that reached the clipboard by either path.
    pub fn last_copied(&self) -> Option<&str> {
        self.legacy_copies
            .last()
            .or(self.api_writes.last())
            .map(String::as_str)
    }
}

impl ClipboardEnv for MemoryClipboard {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn has_clipboard_api(&self) -> bool {
        self.has_api
    }

    fn write_text(&mut self, text: &str) -> std::result::Result<(), BoxError> {
        if self.fail_api {
            return Err("permission denied".into());
        }
        self.api_writes.push(text.to_string());
        Ok(())
    }

    fn create_selection_field(&mut self, text: &str) -> std::result::Result<FieldId, BoxError> {
        self.fields_created += 1;
        let id = FieldId(self.fields_created as u64);
        self.live_fields.insert(id, text.to_string());
        Ok(id)
    }

    fn select_field(&mut self, field: FieldId) -> std::result::Result<(), BoxError> {
        if self.fail_select {
            return Err("select failed".into());
        }
        self.selected = Some(field);
        Ok(())
    }

    fn exec_copy(&mut self) -> std::result::Result<bool, BoxError> {
        if self.refuse_copy {
            return Ok(false);
        }
        let field = self.selected.ok_or("nothing selected")?;
        let text = self.live_fields.get(&field).ok_or("field missing")?;
        self.legacy_copies.push(text.clone());
        Ok(true)
    }

    fn remove_field(&mut self, field: FieldId) {
        self.live_fields.remove(&field);
        if self.selected == Some(field) {
            self.selected = None;
        }
    }
}

/// In-memory downloads that keep every clicked blob.
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    pub fail_trigger: bool,
    pub fail_click: bool,
    pub urls_created: usize,
    pub clicked: Vec<(String, Blob)>,
    pub live_urls: HashMap<ObjectUrl, Blob>,
    pub live_triggers: HashMap<TriggerId, (ObjectUrl, String)>,
    pub(crate) next_trigger: u64,
}

impl DownloadEnv for MemoryDownloads {
    fn create_object_url(&mut self, blob: Blob) -> std::result::Result<ObjectUrl, BoxError> {
        self.urls_created += 1;
        let url = ObjectUrl(format!("blob:test/{}", self.urls_created));
        self.live_urls.insert(url.clone(), blob);
        Ok(url)
    }

    fn revoke_object_url(&mut self, url: &ObjectUrl) {
        self.live_urls.remove(url);
    }

    fn create_trigger(&mut self, href: &ObjectUrl, save_as: &str) -> std::result::Result<TriggerId, BoxError> {
        if self.fail_trigger {
            return Err("trigger creation failed".into());
        }
        self.next_trigger += 1;
        let id = TriggerId(self.next_trigger);
        self.live_triggers.insert(id, (href.clone(), save_as.to_string()));
        Ok(id)
    }

    fn click(&mut self, trigger: TriggerId) -> std::result::Result<(), BoxError> {
        if self.fail_click {
            return Err("click blocked".into());
        }
        let (url, name) = self.live_triggers.get(&trigger).ok_or("unknown trigger")?;
        let blob = self.live_urls.get(url).ok_or("url revoked")?;
        self.clicked.push((name.clone(), blob.clone()));
        Ok(())
    }

    fn remove_trigger(&mut self, trigger: TriggerId) {
        self.live_triggers.remove(&trigger);
    }
}
