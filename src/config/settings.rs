//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory, unless
//! a path is given explicitly. A missing file means defaults.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::report::{DEFAULT_TCP_TIMEOUT, DEFAULT_UDP_TIMEOUT};
use crate::scanner::DEFAULT_CONCURRENCY;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/halfscan)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the per-user directories. Nothing is created on disk.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("org", "halfscan", "halfscan").ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// How a finished report is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

/// Persisted scan defaults. Command-line flags override every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub tcp_timeout_ms: u64,
    pub udp_timeout_ms: u64,
    pub tcp_concurrency: usize,
    pub udp_concurrency: usize,
    /// Maximum probes per second, 0 for unlimited.
    pub rate_limit: u32,
    pub output_format: OutputFormat,
    pub show_closed: bool,
    /// Service table JSON used instead of the built-in one.
    pub services_file: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tcp_timeout_ms: DEFAULT_TCP_TIMEOUT.as_millis() as u64,
            udp_timeout_ms: DEFAULT_UDP_TIMEOUT.as_millis() as u64,
            tcp_concurrency: DEFAULT_CONCURRENCY,
            udp_concurrency: DEFAULT_CONCURRENCY,
            rate_limit: 0,
            output_format: OutputFormat::Plain,
            show_closed: false,
            services_file: None,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    pub fn udp_timeout(&self) -> Duration {
        Duration::from_millis(self.udp_timeout_ms)
    }
}
