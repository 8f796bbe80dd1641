pub mod actions;
pub mod clipboard;
pub mod config;
pub mod download;
pub mod error;
pub mod operation;
pub mod sanitize;
pub mod terminal;
pub mod transcript;

#[cfg(test)]
mod test_utils;

pub use actions::{ActionBoard, ExportAction, ExportFormat, Exporter, Outcome};
pub use clipboard::{ClipboardEnv, ClipboardWriter, SystemClipboard};
pub use config::Config;
pub use download::{DirectoryDownloads, DownloadEnv, FileDownloader};
pub use error::{ExportError, Result};
pub use operation::{Operation, OperationState, ResetDelays, SystemClock, TimerQueue};
pub use transcript::{Message, Sender, TranscriptFormatter};
