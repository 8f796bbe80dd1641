use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use time::UtcOffset;
use time::macros::format_description;

use crate::operation::ResetDelays;
use crate::transcript::{DEFAULT_TITLE, TranscriptFormatter};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Title written at the top of every export
    #[serde(default = "default_title")]
    pub title: String,

    /// Base name for saved files (timestamp and extension are appended)
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Where saved exports go (default: ~/Downloads, else the current directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// How long a success state stays visible, in milliseconds
    #[serde(default = "default_success_reset_ms")]
    pub success_reset_ms: u64,

    /// How long an error state stays visible, in milliseconds
    #[serde(default = "default_error_reset_ms")]
    pub error_reset_ms: u64,

    /// Offset for human-readable timestamps: "local" or "+HH:MM"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_filename_prefix() -> String {
    "chat_export".to_string()
}

fn default_success_reset_ms() -> u64 {
    2000
}

fn default_error_reset_ms() -> u64 {
    4000
}

fn default_utc_offset() -> String {
    "local".to_string()
}

fn home_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home))
}

fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".chatexport").join("config.toml"))
}

/// Parse "local", "Z", or a "+HH:MM" / "-HH:MM" offset.
pub fn parse_utc_offset(value: &str) -> Result<UtcOffset> {
    let value = value.trim();
    match value.to_lowercase().as_str() {
        "local" => return Ok(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)),
        "z" | "utc" => return Ok(UtcOffset::UTC),
        _ => {}
    }
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid utc_offset: {value} (expected local or +HH:MM)"))
}

impl Config {
    /// Load config from ~/.chatexport/config.toml, returning defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to ~/.chatexport/config.toml
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Update one key from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "title" => self.title = value.to_string(),
            "filename_prefix" | "prefix" => {
                if value.trim().is_empty() {
                    bail!("filename_prefix must not be empty");
                }
                self.filename_prefix = value.to_string();
            }
            "download_dir" => {
                self.download_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "success_reset_ms" => {
                self.success_reset_ms = value
                    .trim()
                    .parse()
                    .context("success_reset_ms must be a number of milliseconds")?;
            }
            "error_reset_ms" => {
                self.error_reset_ms = value
                    .trim()
                    .parse()
                    .context("error_reset_ms must be a number of milliseconds")?;
            }
            "utc_offset" => {
                parse_utc_offset(value)?;
                self.utc_offset = value.trim().to_string();
            }
            _ => bail!(
                "unknown key: {key} (valid: title, filename_prefix, download_dir, success_reset_ms, error_reset_ms, utc_offset)"
            ),
        }
        Ok(())
    }

    pub fn reset_delays(&self) -> ResetDelays {
        ResetDelays {
            success: Duration::from_millis(self.success_reset_ms),
            error: Duration::from_millis(self.error_reset_ms),
        }
    }

    pub fn formatter(&self) -> Result<TranscriptFormatter> {
        Ok(TranscriptFormatter::default()
            .with_title(self.title.clone())
            .with_offset(parse_utc_offset(&self.utc_offset)?))
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.download_dir {
            return dir.clone();
        }
        if let Ok(home) = home_dir() {
            let downloads = home.join("Downloads");
            if downloads.is_dir() {
                return downloads;
            }
        }
        PathBuf::from(".")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: default_title(),
            filename_prefix: default_filename_prefix(),
            download_dir: None,
            success_reset_ms: default_success_reset_ms(),
            error_reset_ms: default_error_reset_ms(),
            utc_offset: default_utc_offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{EnvGuard, env_lock};
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = Config {
            title: "Support chat".to_string(),
            filename_prefix: "support".to_string(),
            download_dir: Some(PathBuf::from("/tmp/exports")),
            success_reset_ms: 1000,
            error_reset_ms: 6000,
            utc_offset: "+02:00".to_string(),
        };

        let content = toml::to_string_pretty(&config).unwrap();
        fs::write(&path, &content).unwrap();

        let loaded: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.title, "Chat Export");
        assert_eq!(config.filename_prefix, "chat_export");
        assert_eq!(config.reset_delays(), ResetDelays::default());
        assert_eq!(config.utc_offset, "local");
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn config_partial_parse() {
        let content = "success_reset_ms = 500\n";
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.success_reset_ms, 500);
        assert_eq!(config.error_reset_ms, 4000);
        assert_eq!(config.title, "Chat Export");
    }

    #[test]
    fn set_validates_values() {
        let mut config = Config::default();
        config.set("utc_offset", "-05:30").unwrap();
        assert_eq!(config.utc_offset, "-05:30");
        assert!(config.set("utc_offset", "pacific").is_err());
        assert!(config.set("success_reset_ms", "soon").is_err());
        assert!(config.set("filename_prefix", "  ").is_err());
        assert!(config.set("nope", "x").is_err());

        config.set("download_dir", "/tmp/x").unwrap();
        assert_eq!(config.download_dir, Some(PathBuf::from("/tmp/x")));
        config.set("download_dir", "").unwrap();
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("Z").unwrap(), UtcOffset::UTC);
        assert_eq!(
            parse_utc_offset("+05:30").unwrap(),
            UtcOffset::from_hms(5, 30, 0).unwrap()
        );
        assert!(parse_utc_offset("0530").is_err());
    }

    #[test]
    fn load_and_save_use_home() {
        let _lock = env_lock();
        let tmp = TempDir::new().unwrap();
        let _home = EnvGuard::set("HOME", tmp.path().to_str().unwrap());

        assert_eq!(Config::load().unwrap(), Config::default());

        let mut config = Config::default();
        config.set("title", "Saved").unwrap();
        let path = config.save().unwrap();
        assert_eq!(path, tmp.path().join(".chatexport").join("config.toml"));
        assert_eq!(Config::load().unwrap().title, "Saved");
    }

    #[test]
    fn download_dir_falls_back_to_cwd() {
        let _lock = env_lock();
        let tmp = TempDir::new().unwrap();
        let _home = EnvGuard::set("HOME", tmp.path().to_str().unwrap());
        assert_eq!(Config::default().resolved_download_dir(), PathBuf::from("."));

        fs::create_dir_all(tmp.path().join("Downloads")).unwrap();
        assert_eq!(
            Config::default().resolved_download_dir(),
            tmp.path().join("Downloads")
        );
    }
}
