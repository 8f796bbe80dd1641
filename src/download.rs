//! File downloads: validated MIME type, sanitized filename, scoped handles.

use rand::RngCore;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{BoxError, ExportError, Result};
use crate::sanitize::{mime, sanitize_filename};

/// Content tagged with a validated MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Retrievable handle for a blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(pub String);

/// Handle to a synthetic save-as trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(pub u64);

/// Download capabilities provided by the environment
pub trait DownloadEnv {
    fn create_object_url(&mut self, blob: Blob) -> std::result::Result<ObjectUrl, BoxError>;
    fn revoke_object_url(&mut self, url: &ObjectUrl);
    fn create_trigger(&mut self, href: &ObjectUrl, save_as: &str) -> std::result::Result<TriggerId, BoxError>;
    fn click(&mut self, trigger: TriggerId) -> std::result::Result<(), BoxError>;
    fn remove_trigger(&mut self, trigger: TriggerId);
}

pub struct FileDownloader<E> {
    env: E,
}

impl<E: DownloadEnv> FileDownloader<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Save `content` as `filename`, returning the sanitized name actually used.
    ///
    /// The MIME type is checked before anything is created; a rejected type
    /// fails the whole download.
    pub fn download(&mut self, content: &str, filename: &str, mime_type: &str) -> Result<String> {
        let mime = mime::normalize(mime_type)
            .ok_or_else(|| ExportError::UnsupportedMimeType(mime_type.trim().to_string()))?;
        let name = sanitize_filename(filename);
        if name != filename {
            debug!(requested = filename, used = %name, "sanitized download filename");
        }

        let blob = Blob {
            bytes: content.as_bytes().to_vec(),
            mime,
        };
        let mut handles = Handles {
            env: &mut self.env,
            url: None,
            trigger: None,
        };
        let url = handles
            .env
            .create_object_url(blob)
            .map_err(ExportError::download)?;
        handles.url = Some(url.clone());
        let trigger = handles
            .env
            .create_trigger(&url, &name)
            .map_err(ExportError::download)?;
        handles.trigger = Some(trigger);
        handles.env.click(trigger).map_err(ExportError::download)?;

        debug!(file = %name, mime, bytes = content.len(), "download triggered");
        Ok(name)
    }
}

/// Releases the trigger and the object URL when it goes out of scope.
struct Handles<'a, E: DownloadEnv> {
    env: &'a mut E,
    url: Option<ObjectUrl>,
    trigger: Option<TriggerId>,
}

impl<E: DownloadEnv> Drop for Handles<'_, E> {
    fn drop(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            self.env.remove_trigger(trigger);
        }
        if let Some(url) = self.url.take() {
            self.env.revoke_object_url(&url);
        }
    }
}

/// Native downloads: clicked triggers are written as files into one directory.
pub struct DirectoryDownloads {
    dir: PathBuf,
    blobs: HashMap<ObjectUrl, Blob>,
    triggers: HashMap<TriggerId, (ObjectUrl, String)>,
    saved: Vec<PathBuf>,
    next_trigger: u64,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            blobs: HashMap::new(),
            triggers: HashMap::new(),
            saved: Vec::new(),
            next_trigger: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    pub fn live_handles(&self) -> usize {
        self.blobs.len() + self.triggers.len()
    }
}

impl DownloadEnv for DirectoryDownloads {
    fn create_object_url(&mut self, blob: Blob) -> std::result::Result<ObjectUrl, BoxError> {
        let mut id = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut id);
        let url = ObjectUrl(format!("blob:chatexport/{}", hex::encode(id)));
        self.blobs.insert(url.clone(), blob);
        Ok(url)
    }

    fn revoke_object_url(&mut self, url: &ObjectUrl) {
        self.blobs.remove(url);
    }

    fn create_trigger(&mut self, href: &ObjectUrl, save_as: &str) -> std::result::Result<TriggerId, BoxError> {
        if !self.blobs.contains_key(href) {
            return Err(format!("unknown object url: {}", href.0).into());
        }
        if save_as.is_empty() || save_as.contains(['/', '\\']) || save_as.contains("..") {
            return Err(format!("refusing unsafe save-as name: {save_as}").into());
        }
        self.next_trigger += 1;
        let id = TriggerId(self.next_trigger);
        self.triggers.insert(id, (href.clone(), save_as.to_string()));
        Ok(id)
    }

    fn click(&mut self, trigger: TriggerId) -> std::result::Result<(), BoxError> {
        let (url, name) = self.triggers.get(&trigger).ok_or("unknown download trigger")?;
        let blob = self.blobs.get(url).ok_or("object url was revoked")?;
        fs::create_dir_all(&self.dir)?;
        let path = write_unique(&self.dir, name, &blob.bytes)?;
        debug!(path = %path.display(), "saved download");
        self.saved.push(path);
        Ok(())
    }

    fn remove_trigger(&mut self, trigger: TriggerId) {
        self.triggers.remove(&trigger);
    }
}

/// Write into `dir/name`, or `dir/name_N.ext` if that name is taken.
fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    for attempt in 0..1000 {
        let candidate = if attempt == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{stem}_{attempt}{ext}"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(candidate);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
    warn!(name, "no free filename after 1000 attempts");
    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free filename for {name}"),
    ))
}
