//! Configuration file support for kneemark.
//!
//! Settings come from a JSON file (explicit path or the per-user default),
//! then environment variables (a `.env` file is loaded by the binary), then
//! command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BASE_DIR, STATUS_FILE_NAME};
use crate::model::DatasetType;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Get all log levels in order from least to most verbose.
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::all()
            .iter()
            .copied()
            .find(|level| level.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "log_level".to_string(),
                value: s.to_string(),
            })
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable naming the dataset root.
pub const ENV_BASE_DIR: &str = "BASE_DIR";
/// Environment variable naming the status index file.
pub const ENV_STATUS_FILE: &str = "STATUS_FILE";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "KNEEMARK_LOG_LEVEL";

/// Location of the dataset table for each dataset type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePaths {
    /// Table for `DATASET_AXIAL`
    pub axial: PathBuf,
    /// Table for `DATASET_SAGITTAL`
    pub sagittal: PathBuf,
    /// Table for `DATASET_DYNAMIC`
    pub dynamic: PathBuf,
}

impl TablePaths {
    /// Tables stored inside each dataset directory
    /// (`<base>/DATASET_AXIAL/dataset_axial.csv`, ...).
    pub fn under(base_dir: &Path) -> Self {
        let table = |dataset: DatasetType| {
            base_dir.join(dataset.dir_name()).join(format!(
                "dataset_{}.csv",
                dataset.name().to_lowercase()
            ))
        };
        Self {
            axial: table(DatasetType::Axial),
            sagittal: table(DatasetType::Sagittal),
            dynamic: table(DatasetType::Dynamic),
        }
    }

    /// Table for a dataset type.
    pub fn get(&self, dataset: DatasetType) -> &Path {
        match dataset {
            DatasetType::Axial => &self.axial,
            DatasetType::Sagittal => &self.sagittal,
            DatasetType::Dynamic => &self.dynamic,
        }
    }

    /// Replace the table for a dataset type.
    pub fn set(&mut self, dataset: DatasetType, path: PathBuf) {
        match dataset {
            DatasetType::Axial => self.axial = path,
            DatasetType::Sagittal => self.sagittal = path,
            DatasetType::Dynamic => self.dynamic = path,
        }
    }
}

impl Default for TablePaths {
    fn default() -> Self {
        Self::under(Path::new(DEFAULT_BASE_DIR))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Root directory holding the `DATASET_<TYPE>` directories
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Global status index file
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// Dataset table per dataset type
    #[serde(default)]
    pub tables: TablePaths,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BASE_DIR)
}

fn default_status_file() -> PathBuf {
    default_base_dir().join(STATUS_FILE_NAME)
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            base_dir: default_base_dir(),
            status_file: default_status_file(),
            tables: TablePaths::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Configuration rooted at `base_dir`, with the status index and tables inside it.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            status_file: base_dir.join(STATUS_FILE_NAME),
            tables: TablePaths::under(&base_dir),
            base_dir,
            ..Self::new()
        }
    }

    /// Move the dataset root. The status index and tables follow it unless
    /// they were set somewhere else explicitly.
    pub fn rebase(&mut self, base_dir: impl Into<PathBuf>) {
        let base_dir = base_dir.into();
        if self.status_file == self.base_dir.join(STATUS_FILE_NAME) {
            self.status_file = base_dir.join(STATUS_FILE_NAME);
        }
        let old_tables = TablePaths::under(&self.base_dir);
        let new_tables = TablePaths::under(&base_dir);
        for &dataset in DatasetType::all() {
            if self.tables.get(dataset) == old_tables.get(dataset) {
                self.tables.set(dataset, new_tables.get(dataset).to_path_buf());
            }
        }
        self.base_dir = base_dir;
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "kneemark-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("kneemark").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("kneemark")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from_path(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Resolve the configuration file: an explicit path must load, the
    /// default path is used when present, otherwise built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::load_from_default_path().unwrap_or_default()),
        }
    }

    /// Apply overrides from environment-style variables.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`. Recognized keys are
    /// `BASE_DIR`, `STATUS_FILE`, `DATASET_AXIAL`, `DATASET_SAGITTAL`,
    /// `DATASET_DYNAMIC` and `KNEEMARK_LOG_LEVEL`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(base_dir) = lookup(ENV_BASE_DIR) {
            self.rebase(base_dir);
        }
        if let Some(status_file) = lookup(ENV_STATUS_FILE) {
            self.status_file = PathBuf::from(status_file);
        }
        for &dataset in DatasetType::all() {
            if let Some(table) = lookup(&dataset.dir_name()) {
                self.tables.set(dataset, PathBuf::from(table));
            }
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.parse()?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A setting has a value that cannot be used
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
