use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::cell::RefCell;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatexport::transcript::parse_messages;
use chatexport::{
    ActionBoard,
    Config,
    DirectoryDownloads,
    ExportAction,
    ExportFormat,
    Exporter,
    OperationState,
    Outcome,
    Sender,
    SystemClipboard,
    SystemClock,
    TimerQueue,
};

mod interactive;

#[derive(Parser)]
#[command(name = "chatexport", version, about = "Export chat transcripts to Markdown or JSON")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the whole transcript to the clipboard
    #[command(name = "copy")]
    Copy {
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// JSON array of messages (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Save the transcript as a file
    #[command(name = "save")]
    Save {
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory to save into (default from ~/.chatexport/config.toml or ~/Downloads)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Copy the most recent message from one sender
    #[command(name = "copy-last")]
    CopyLast {
        #[arg(long, value_enum, default_value_t = Sender::Ai)]
        sender: Sender,
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Pick export actions interactively
    #[command(name = "export")]
    Export {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// View or modify config (~/.chatexport/config.toml)
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current config
    Show,
    /// Set a config value
    Set {
        /// Key to set (title, filename_prefix, download_dir, success_reset_ms, error_reset_ms, utc_offset)
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

pub(crate) type NativeExporter = Exporter<SystemClipboard, DirectoryDownloads>;

/// Everything one invocation needs to run actions against the raw input.
pub(crate) struct Session {
    board: ActionBoard,
    exporter: NativeExporter,
    input: Value,
}

impl Session {
    fn new(config: &Config, out_dir: Option<PathBuf>, input: Value) -> Result<Self> {
        let timers = Rc::new(TimerQueue::new(SystemClock::default()));
        let board = ActionBoard::new(timers, config.reset_delays());
        let dir = out_dir.unwrap_or_else(|| config.resolved_download_dir());
        let exporter = Exporter::new(
            config.formatter()?,
            SystemClipboard::new(),
            DirectoryDownloads::new(dir),
        )
        .with_filename_prefix(config.filename_prefix.clone());
        Ok(Self {
            board,
            exporter,
            input,
        })
    }

    /// Parse the input and run `action` under its operation.
    pub(crate) fn run(&mut self, action: ExportAction) -> (OperationState, Option<Outcome>) {
        let outcome = RefCell::new(None);
        let exporter = &mut self.exporter;
        let input = &self.input;
        let state = self.board.operation(action).trigger(|| {
            let messages = parse_messages(input)?;
            let result = exporter.run(action, &messages)?;
            outcome.replace(Some(result));
            Ok::<(), chatexport::ExportError>(())
        });
        (state, outcome.into_inner())
    }

    pub(crate) fn state(&self, action: ExportAction) -> OperationState {
        self.board.state(action)
    }

    pub(crate) fn tick(&self) -> usize {
        self.board.tick()
    }

    /// Full path of the last file written, if any.
    pub(crate) fn last_saved(&self) -> Option<&Path> {
        self.exporter.downloads().saved().last().map(PathBuf::as_path)
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatexport=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Copy { format, input } => {
            run_once(ExportAction::copy(format), input.as_deref(), None)?;
        }
        Commands::Save {
            format,
            input,
            out_dir,
        } => {
            run_once(ExportAction::save(format), input.as_deref(), out_dir)?;
        }
        Commands::CopyLast { sender, input } => {
            run_once(ExportAction::copy_last(sender), input.as_deref(), None)?;
        }
        Commands::Export { input, out_dir } => {
            let config = Config::load().unwrap_or_default();
            let value = read_input(input.as_deref())?;
            let mut session = Session::new(&config, out_dir, value)?;
            interactive::run(&mut session)?;
        }
        Commands::Config { action } => {
            handle_config(action)?;
        }
    }
    Ok(())
}

fn run_once(action: ExportAction, input: Option<&Path>, out_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let value = read_input(input)?;
    let mut session = Session::new(&config, out_dir, value)?;
    let (state, outcome) = session.run(action);
    match (state, outcome) {
        (OperationState::Success, Some(Outcome::Saved { filename })) => {
            // Print the saved path to stdout (for piping)
            match session.last_saved() {
                Some(path) => println!("{}", path.display()),
                None => println!("{filename}"),
            }
        }
        (OperationState::Success, Some(Outcome::Copied { bytes })) => {
            eprintln!("{}: copied {bytes} bytes to clipboard", action.label());
        }
        (OperationState::Error(message), _) => bail!("{message}"),
        (state, _) => bail!("{} ended in unexpected state: {state}", action.id()),
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => read_stdin()?,
    };
    serde_json::from_str(&raw).context("input is not valid JSON")
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

fn handle_config(action: Option<ConfigAction>) -> Result<()> {
    match action {
        None | Some(ConfigAction::Show) => {
            let config = Config::load().unwrap_or_default();
            println!("title = \"{}\"", config.title);
            println!("filename_prefix = \"{}\"", config.filename_prefix);
            match &config.download_dir {
                Some(dir) => println!("download_dir = \"{}\"", dir.display()),
                None => println!(
                    "download_dir = (default: {})",
                    config.resolved_download_dir().display()
                ),
            }
            println!("success_reset_ms = {}", config.success_reset_ms);
            println!("error_reset_ms = {}", config.error_reset_ms);
            println!("utc_offset = \"{}\"", config.utc_offset);
        }
        Some(ConfigAction::Set { key, value }) => {
            let mut config = Config::load().unwrap_or_default();
            config.set(&key, &value)?;
            let path = config.save()?;
            println!("saved to {}", path.display());
        }
        Some(ConfigAction::Reset) => {
            let config = Config::default();
            let path = config.save()?;
            println!("reset to defaults at {}", path.display());
        }
    }
    Ok(())
}
