//! Configuration for the linkstat ledger and probe.
//!
//! Configuration is stored in TOML. Values resolve in this order, later entries
//! winning:
//!
//! 1. Built-in defaults
//! 2. The config file (platform config directory, or an explicit path)
//! 3. Environment variables with the `LINKSTAT_` prefix
//!
//! ## Example Configuration File
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/linkstat"
//! completed_file = "AllTasks.json"
//! pending_links_file = "ProcessTasksLinks.json"
//! pending_numbers_file = "ProcessTasksNums.json"
//!
//! [probe]
//! timeout_secs = 10
//!
//! [service]
//! shutdown_timeout_secs = 30
//! durability = "best_effort"
//! strict_replay = false
//! ```
//!
//! ```rust
//! use linkstat_core::Config;
//!
//! let config: Config = toml::from_str("[probe]\ntimeout_secs = 3\n")?;
//! assert_eq!(config.probe.timeout_secs, 3);
//! assert_eq!(config.storage.completed_file.to_str(), Some("AllTasks.json"));
//! # Ok::<(), toml::de::Error>(())
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the ledger directory
pub const ENV_DATA_DIR: &str = "LINKSTAT_DATA_DIR";
/// Environment variable overriding the completed ledger file name
pub const ENV_COMPLETED_FILE: &str = "LINKSTAT_COMPLETED_FILE";
/// Environment variable overriding the pending link ledger file name
pub const ENV_PENDING_LINKS_FILE: &str = "LINKSTAT_PENDING_LINKS_FILE";
/// Environment variable overriding the pending number ledger file name
pub const ENV_PENDING_NUMBERS_FILE: &str = "LINKSTAT_PENDING_NUMBERS_FILE";
/// Environment variable overriding the probe timeout, in seconds
pub const ENV_PROBE_TIMEOUT_SECS: &str = "LINKSTAT_PROBE_TIMEOUT_SECS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger file locations
    pub storage: StorageConfig,
    /// Reachability probe settings
    pub probe: ProbeConfig,
    /// Processing service lifecycle settings
    pub service: ServiceConfig,
}

/// Where the three ledgers live.
///
/// Relative file names resolve against `data_dir`; absolute ones are used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ledger files
    pub data_dir: PathBuf,
    /// Completed-results ledger
    pub completed_file: PathBuf,
    /// Pending link submissions ledger
    pub pending_links_file: PathBuf,
    /// Pending report requests ledger
    pub pending_numbers_file: PathBuf,
}

/// Reachability probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-URL request timeout
    pub timeout_secs: u64,
    /// User agent sent with every probe
    pub user_agent: String,
}

/// Processing service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on draining background persistence at shutdown
    pub shutdown_timeout_secs: u64,
    /// When the pending entry of a link submission is cleared
    pub durability: Durability,
    /// Fail service construction when the completed ledger cannot be replayed
    pub strict_replay: bool,
}

/// When a link submission's pending entry is removed relative to durable persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Clear the pending entry right after the in-memory commit.
    ///
    /// A crash before the background append lands loses the result with no
    /// pending trace left for recovery.
    #[default]
    BestEffort,
    /// Clear the pending entry only after the completed ledger append succeeds.
    ///
    /// A crash between the append and the clear replays the submission during
    /// recovery, producing a duplicate result under a new number.
    AtLeastOnce,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storage"),
            completed_file: PathBuf::from("AllTasks.json"),
            pending_links_file: PathBuf::from("ProcessTasksLinks.json"),
            pending_numbers_file: PathBuf::from("ProcessTasksNums.json"),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("linkstat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
            durability: Durability::BestEffort,
            strict_replay: false,
        }
    }
}

impl StorageConfig {
    /// Storage rooted at `data_dir` with the default file names
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    #[must_use]
    pub fn completed_path(&self) -> PathBuf {
        self.resolve(&self.completed_file)
    }

    #[must_use]
    pub fn pending_links_path(&self) -> PathBuf {
        self.resolve(&self.pending_links_file)
    }

    #[must_use]
    pub fn pending_numbers_path(&self) -> PathBuf {
        self.resolve(&self.pending_numbers_file)
    }
}

impl ProbeConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServiceConfig {
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Config {
    /// Load from the platform config directory, falling back to defaults when
    /// no file exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from an explicit path, then apply environment overrides.
    ///
    /// Unlike [`Config::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Platform-specific location of `config.toml`:
    /// - Linux: `~/.config/linkstat/config.toml`
    /// - macOS: `~/Library/Application Support/dev.linkstat.linkstat/config.toml`
    /// - Windows: `%APPDATA%\linkstat\linkstat\config\config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "linkstat", "linkstat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply `LINKSTAT_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(file) = non_empty(ENV_COMPLETED_FILE) {
            self.storage.completed_file = PathBuf::from(file.trim());
        }
        if let Some(file) = non_empty(ENV_PENDING_LINKS_FILE) {
            self.storage.pending_links_file = PathBuf::from(file.trim());
        }
        if let Some(file) = non_empty(ENV_PENDING_NUMBERS_FILE) {
            self.storage.pending_numbers_file = PathBuf::from(file.trim());
        }
        if let Some(secs) = non_empty(ENV_PROBE_TIMEOUT_SECS) {
            self.probe.timeout_secs = secs.trim().parse().map_err(|e| {
                Error::Config(format!("{ENV_PROBE_TIMEOUT_SECS} must be a whole number: {e}"))
            })?;
        }
        Ok(())
    }
}
