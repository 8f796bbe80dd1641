//! UI actions and the pipelines behind them.
//!
//! Each action validates the transcript, renders it, and hands the result to
//! the clipboard or to a download. [`ActionBoard`] keeps one independent
//! [`Operation`] per action so their states never interfere.

use std::rc::Rc;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::clipboard::{ClipboardEnv, ClipboardWriter};
use crate::download::{DownloadEnv, FileDownloader};
use crate::error::{ExportError, Result};
use crate::operation::{Operation, OperationState, ResetDelays, TimerQueue};
use crate::sanitize::{Sanitizer, export_filename, mime};
use crate::transcript::{Message, Sender, TranscriptFormatter, most_recent, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Markdown => mime::MARKDOWN_MIME,
            ExportFormat::Json => mime::JSON_MIME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportAction {
    CopyMarkdown,
    CopyJson,
    SaveMarkdown,
    SaveJson,
    CopyLastAi,
    CopyLastUser,
}

impl ExportAction {
    pub const ALL: [ExportAction; 6] = [
        ExportAction::CopyMarkdown,
        ExportAction::CopyJson,
        ExportAction::SaveMarkdown,
        ExportAction::SaveJson,
        ExportAction::CopyLastAi,
        ExportAction::CopyLastUser,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ExportAction::CopyMarkdown => "copy-markdown",
            ExportAction::CopyJson => "copy-json",
            ExportAction::SaveMarkdown => "save-markdown",
            ExportAction::SaveJson => "save-json",
            ExportAction::CopyLastAi => "copy-last-ai",
            ExportAction::CopyLastUser => "copy-last-user",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportAction::CopyMarkdown => "Copy as Markdown",
            ExportAction::CopyJson => "Copy as JSON",
            ExportAction::SaveMarkdown => "Save as Markdown",
            ExportAction::SaveJson => "Save as JSON",
            ExportAction::CopyLastAi => "Copy last AI reply",
            ExportAction::CopyLastUser => "Copy last user message",
        }
    }

    pub fn copy(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Markdown => ExportAction::CopyMarkdown,
            ExportFormat::Json => ExportAction::CopyJson,
        }
    }

    pub fn save(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Markdown => ExportAction::SaveMarkdown,
            ExportFormat::Json => ExportAction::SaveJson,
        }
    }

    pub fn copy_last(sender: Sender) -> Self {
        match sender {
            Sender::Ai => ExportAction::CopyLastAi,
            Sender::User => ExportAction::CopyLastUser,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for ExportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// What a finished pipeline produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Copied { bytes: usize },
    Saved { filename: String },
}

/// Runs export pipelines over a clipboard and a download environment.
pub struct Exporter<C, D, S = crate::sanitize::ContentSanitizer> {
    formatter: TranscriptFormatter<S>,
    clipboard: ClipboardWriter<C>,
    downloader: FileDownloader<D>,
    filename_prefix: String,
}

impl<C: ClipboardEnv, D: DownloadEnv, S: Sanitizer> Exporter<C, D, S> {
    pub fn new(formatter: TranscriptFormatter<S>, clipboard: C, downloads: D) -> Self {
        Self {
            formatter,
            clipboard: ClipboardWriter::new(clipboard),
            downloader: FileDownloader::new(downloads),
            filename_prefix: "chat_export".to_string(),
        }
    }

    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = prefix.into();
        self
    }

    pub fn clipboard(&self) -> &C {
        self.clipboard.env()
    }

    pub fn downloads(&self) -> &D {
        self.downloader.env()
    }

    pub fn run(&mut self, action: ExportAction, messages: &[Message]) -> Result<Outcome> {
        debug!(action = action.id(), count = messages.len(), "running export pipeline");
        match action {
            ExportAction::CopyMarkdown => self.copy(messages, ExportFormat::Markdown),
            ExportAction::CopyJson => self.copy(messages, ExportFormat::Json),
            ExportAction::SaveMarkdown => self.save(messages, ExportFormat::Markdown),
            ExportAction::SaveJson => self.save(messages, ExportFormat::Json),
            ExportAction::CopyLastAi => self.copy_last(messages, Sender::Ai),
            ExportAction::CopyLastUser => self.copy_last(messages, Sender::User),
        }
    }

    pub fn copy(&mut self, messages: &[Message], format: ExportFormat) -> Result<Outcome> {
        let text = self.render(messages, format)?;
        self.clipboard.copy(&text)?;
        info!(format = format.extension(), bytes = text.len(), "copied transcript");
        Ok(Outcome::Copied { bytes: text.len() })
    }

    pub fn save(&mut self, messages: &[Message], format: ExportFormat) -> Result<Outcome> {
        self.save_at(messages, format, OffsetDateTime::now_utc())
    }

    /// Like [`Exporter::save`] with an explicit timestamp for the filename.
    pub fn save_at(
        &mut self,
        messages: &[Message],
        format: ExportFormat,
        now: OffsetDateTime,
    ) -> Result<Outcome> {
        let text = self.render(messages, format)?;
        let requested = export_filename(&self.filename_prefix, format.extension(), now);
        let filename = self.downloader.download(&text, &requested, format.mime())?;
        info!(file = %filename, "saved transcript");
        Ok(Outcome::Saved { filename })
    }

    /// Copy the newest message from `sender`. The list itself is not
    /// validated; the chosen message is re-checked while rendering.
    pub fn copy_last(&mut self, messages: &[Message], sender: Sender) -> Result<Outcome> {
        let message = most_recent(messages, sender).ok_or(ExportError::NotFound { sender })?;
        let text = self.formatter.single_to_markdown(message)?;
        self.clipboard.copy(&text)?;
        info!(sender = sender.as_str(), id = %message.id, "copied last message");
        Ok(Outcome::Copied { bytes: text.len() })
    }

    fn render(&self, messages: &[Message], format: ExportFormat) -> Result<String> {
        validate(messages)?;
        match format {
            ExportFormat::Markdown => self.formatter.to_markdown(messages),
            ExportFormat::Json => self.formatter.to_json(messages),
        }
    }
}

/// One [`Operation`] per [`ExportAction`], all on the same timer queue.
pub struct ActionBoard {
    timers: Rc<TimerQueue>,
    operations: Vec<Operation>,
}

impl ActionBoard {
    pub fn new(timers: Rc<TimerQueue>, delays: ResetDelays) -> Self {
        let operations = ExportAction::ALL
            .iter()
            .map(|action| Operation::new(action.id(), Rc::clone(&timers), delays))
            .collect();
        Self { timers, operations }
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn operation(&self, action: ExportAction) -> &Operation {
        &self.operations[action.index()]
    }

    pub fn state(&self, action: ExportAction) -> OperationState {
        self.operation(action).state()
    }

    pub fn subscribe(&self, action: ExportAction, listener: impl Fn(&OperationState) + 'static) {
        self.operation(action).subscribe(listener);
    }

    /// Run `action` through its exporter pipeline under its own operation.
    pub fn run<C, D, S>(
        &self,
        action: ExportAction,
        exporter: &mut Exporter<C, D, S>,
        messages: &[Message],
    ) -> OperationState
    where
        C: ClipboardEnv,
        D: DownloadEnv,
        S: Sanitizer,
    {
        self.operation(action)
            .trigger(|| exporter.run(action, messages).map(|_| ()))
    }

    /// Fire any auto-resets that are due.
    pub fn tick(&self) -> usize {
        self.timers.run_due()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::ManualClock;
    use crate::test_utils::{MemoryClipboard, MemoryDownloads, message};
    use std::cell::RefCell;
    use std::time::Duration;
    use time::UtcOffset;
    use time::macros::datetime;

    type TestExporter = Exporter<MemoryClipboard, MemoryDownloads>;

    fn exporter() -> TestExporter {
        Exporter::new(
            TranscriptFormatter::default().with_offset(UtcOffset::UTC),
            MemoryClipboard::secure(),
            MemoryDownloads::default(),
        )
    }

    fn board() -> (ActionBoard, ManualClock) {
        let clock = ManualClock::default();
        let timers = Rc::new(TimerQueue::new(clock.clone()));
        (ActionBoard::new(timers, ResetDelays::default()), clock)
    }

    fn conversation() -> Vec<Message> {
        vec![
            message("1", "What is 2+2?", Sender::User),
            message("2", "It is 4.", Sender::Ai),
            message("3", "Thanks <script>x()</script>", Sender::User),
            message("4", "You're welcome 😊", Sender::Ai),
        ]
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = ExportAction::ALL.iter().map(|a| a.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ExportAction::ALL.len());
    }

    #[test]
    fn copy_markdown_reaches_clipboard() {
        let mut exporter = exporter();
        let outcome = exporter.run(ExportAction::CopyMarkdown, &conversation()).unwrap();
        let copied = exporter.clipboard().last_copied().unwrap().to_string();
        assert_eq!(outcome, Outcome::Copied { bytes: copied.len() });
        assert!(copied.starts_with("# Chat Export"));
        assert!(copied.contains("**Messages:** 4"));
        assert!(!copied.contains("<script"));
    }

    #[test]
    fn copy_json_is_parseable() {
        let mut exporter = exporter();
        exporter.run(ExportAction::CopyJson, &conversation()).unwrap();
        let copied = exporter.clipboard().last_copied().unwrap();
        let value: serde_json::Value = serde_json::from_str(copied).unwrap();
        assert_eq!(value["messages"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn save_uses_prefix_timestamp_and_mime() {
        let mut exporter = exporter().with_filename_prefix("support chat");
        let outcome = exporter
            .save_at(&conversation(), ExportFormat::Json, datetime!(2024-03-05 07:08:09 UTC))
            .unwrap();
        let expected = "support_chat_2024-03-05T07-08-09.json";
        assert_eq!(
            outcome,
            Outcome::Saved {
                filename: expected.to_string()
            }
        );
        let (name, blob) = &exporter.downloads().clicked[0];
        assert_eq!(name, expected);
        assert_eq!(blob.mime, "application/json");
    }

    #[test]
    fn invalid_list_never_reaches_boundaries() {
        let mut exporter = exporter();
        let err = exporter.run(ExportAction::SaveMarkdown, &[]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
        let bad = vec![message("1", "ok", Sender::User), message("2", "", Sender::Ai)];
        assert!(exporter.run(ExportAction::CopyMarkdown, &bad).is_err());
        assert_eq!(exporter.downloads().urls_created, 0);
        assert!(exporter.clipboard().last_copied().is_none());
    }

    #[test]
    fn copy_last_picks_latest_from_sender() {
        let mut exporter = exporter();
        exporter.run(ExportAction::CopyLastAi, &conversation()).unwrap();
        let copied = exporter.clipboard().last_copied().unwrap();
        assert!(copied.starts_with("## 🤖 AI Assistant"));
        assert!(copied.ends_with("You're welcome 😊"));

        exporter.run(ExportAction::CopyLastUser, &conversation()).unwrap();
        let copied = exporter.clipboard().last_copied().unwrap();
        assert!(copied.ends_with("Thanks"));
    }

    #[test]
    fn copy_last_without_match_is_not_found() {
        let mut exporter = exporter();
        let only_user = vec![message("1", "hello?", Sender::User)];
        let err = exporter.copy_last(&only_user, Sender::Ai).unwrap_err();
        assert!(matches!(err, ExportError::NotFound { sender: Sender::Ai }));
        assert_eq!(err.to_string(), "no ai message found");
        assert!(matches!(
            exporter.copy_last(&[], Sender::User),
            Err(ExportError::NotFound { .. })
        ));
    }

    #[test]
    fn board_reports_success_and_resets() {
        let (board, clock) = board();
        let mut exporter = exporter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        board.subscribe(ExportAction::CopyMarkdown, move |s| sink.borrow_mut().push(s.clone()));

        let state = board.run(ExportAction::CopyMarkdown, &mut exporter, &conversation());
        assert_eq!(state, OperationState::Success);
        assert_eq!(*seen.borrow(), vec![OperationState::Loading, OperationState::Success]);

        clock.advance(Duration::from_millis(2000));
        assert_eq!(board.tick(), 1);
        assert_eq!(board.state(ExportAction::CopyMarkdown), OperationState::Idle);
    }

    #[test]
    fn board_surfaces_pipeline_errors() {
        let (board, _) = board();
        let mut exporter = exporter();
        let state = board.run(ExportAction::CopyLastAi, &mut exporter, &[]);
        assert_eq!(state.error_message(), Some("no ai message found"));
    }

    #[test]
    fn board_actions_are_independent() {
        let (board, clock) = board();
        let mut exporter = exporter();
        board.run(ExportAction::SaveJson, &mut exporter, &[]);
        board.run(ExportAction::CopyJson, &mut exporter, &conversation());
        assert!(matches!(board.state(ExportAction::SaveJson), OperationState::Error(_)));
        assert_eq!(board.state(ExportAction::CopyJson), OperationState::Success);
        assert_eq!(board.state(ExportAction::CopyMarkdown), OperationState::Idle);

        clock.advance(Duration::from_millis(2000));
        board.tick();
        assert_eq!(board.state(ExportAction::CopyJson), OperationState::Idle);
        assert!(matches!(board.state(ExportAction::SaveJson), OperationState::Error(_)));
    }
}
