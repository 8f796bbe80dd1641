//! Clipboard writes with a selection-based fallback.
//!
//! The privileged path writes straight to the system clipboard and is only
//! taken in a secure context. Otherwise the text is staged in a temporary
//! selection field, copied with the platform's legacy copy command, and the
//! field is removed before returning, whatever the outcome.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{BoxError, ExportError, Result};
use crate::terminal;

/// Handle to a temporary selection field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u64);

/// Clipboard capabilities provided by the environment
pub trait ClipboardEnv {
    fn is_secure_context(&self) -> bool;
    fn has_clipboard_api(&self) -> bool;
    /// Privileged clipboard write.
    fn write_text(&mut self, text: &str) -> std::result::Result<(), BoxError>;
    fn create_selection_field(&mut self, text: &str) -> std::result::Result<FieldId, BoxError>;
    fn select_field(&mut self, field: FieldId) -> std::result::Result<(), BoxError>;
    /// Legacy copy of the current selection; `Ok(false)` means the command was refused.
    fn exec_copy(&mut self) -> std::result::Result<bool, BoxError>;
    fn remove_field(&mut self, field: FieldId);
}

pub struct ClipboardWriter<E> {
    env: E,
}

impl<E: ClipboardEnv> ClipboardWriter<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn copy(&mut self, text: &str) -> Result<()> {
        if self.env.is_secure_context() && self.env.has_clipboard_api() {
            match self.env.write_text(text) {
                Ok(()) => {
                    debug!(bytes = text.len(), "copied via clipboard api");
                    return Ok(());
                }
                Err(err) => warn!("clipboard api failed, falling back to selection copy: {err}"),
            }
        } else {
            debug!("clipboard api unavailable, using selection copy");
        }

        copy_via_selection(&mut self.env, text).map_err(ExportError::clipboard)?;
        debug!(bytes = text.len(), "copied via selection fallback");
        Ok(())
    }
}

fn copy_via_selection<E: ClipboardEnv>(env: &mut E, text: &str) -> std::result::Result<(), BoxError> {
    let field = env.create_selection_field(text)?;
    let mut guard = FieldGuard { env, field };
    guard.env.select_field(field)?;
    if !guard.env.exec_copy()? {
        return Err("copy command was rejected".into());
    }
    Ok(())
}

/// Removes the selection field when it goes out of scope.
struct FieldGuard<'a, E: ClipboardEnv> {
    env: &'a mut E,
    field: FieldId,
}

impl<E: ClipboardEnv> Drop for FieldGuard<'_, E> {
    fn drop(&mut self) {
        self.env.remove_field(self.field);
    }
}

/// Native clipboard: `arboard` when a graphical session is present and the
/// platform keeps its contents after exit, the platform copy command otherwise.
pub struct SystemClipboard {
    secure: bool,
    clipboard: Option<arboard::Clipboard>,
    fields: HashMap<FieldId, NamedTempFile>,
    selected: Option<FieldId>,
    next_id: u64,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::for_platform(terminal::is_graphical_session(), std::env::consts::OS)
    }

    fn for_platform(secure: bool, os: &str) -> Self {
        let clipboard = if secure && api_outlives_process(os) {
            match arboard::Clipboard::new() {
                Ok(clipboard) => Some(clipboard),
                Err(err) => {
                    debug!("system clipboard unavailable: {err}");
                    None
                }
            }
        } else {
            debug!(os, "using copy command instead of clipboard api");
            None
        };
        Self {
            secure,
            clipboard,
            fields: HashMap::new(),
            selected: None,
            next_id: 0,
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardEnv for SystemClipboard {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn has_clipboard_api(&self) -> bool {
        self.clipboard.is_some()
    }

    fn write_text(&mut self, text: &str) -> std::result::Result<(), BoxError> {
        let clipboard = self
            .clipboard
            .as_mut()
            .ok_or("system clipboard unavailable")?;
        clipboard.set_text(text.to_string())?;
        Ok(())
    }

    fn create_selection_field(&mut self, text: &str) -> std::result::Result<FieldId, BoxError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        self.next_id += 1;
        let id = FieldId(self.next_id);
        self.fields.insert(id, file);
        Ok(id)
    }

    fn select_field(&mut self, field: FieldId) -> std::result::Result<(), BoxError> {
        if !self.fields.contains_key(&field) {
            return Err(format!("unknown selection field {}", field.0).into());
        }
        self.selected = Some(field);
        Ok(())
    }

    fn exec_copy(&mut self) -> std::result::Result<bool, BoxError> {
        let field = self.selected.ok_or("nothing selected")?;
        let staged = self.fields.get(&field).ok_or("selection field was removed")?;
        let mut found = false;
        for (program, args) in copy_commands() {
            let input = File::open(staged.path())?;
            let status = match Command::new(program)
                .args(*args)
                .stdin(Stdio::from(input))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) => status,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            found = true;
            if status.success() {
                debug!(program, "copied with legacy command");
                return Ok(true);
            }
            warn!(program, %status, "copy command failed");
        }
        if !found {
            let names: Vec<&str> = copy_commands().iter().map(|(program, _)| *program).collect();
            return Err(format!("no clipboard command found (tried {})", names.join(", ")).into());
        }
        Ok(false)
    }

    fn remove_field(&mut self, field: FieldId) {
        self.fields.remove(&field);
        if self.selected == Some(field) {
            self.selected = None;
        }
    }
}

/// X11 and Wayland selections are served by the process that set them, so
/// text written through `arboard` disappears when the CLI exits. The copy
/// commands there (`wl-copy`, `xclip`, `xsel`) keep serving it.
fn api_outlives_process(os: &str) -> bool {
    !matches!(os, "linux" | "freebsd" | "dragonfly" | "netbsd" | "openbsd")
}

fn copy_commands() -> &'static [(&'static str, &'static [&'static str])] {
    if cfg!(target_os = "macos") {
        &[("pbcopy", &[])]
    } else if cfg!(target_os = "windows") {
        &[("clip", &[])]
    } else {
        &[
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ]
    }
}
