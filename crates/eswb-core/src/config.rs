//! Configuration system for the ESWB extractor

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FirmwareError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub logging: LoggingConfig,
}

/// Extraction settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Reject containers with a foreign magic or out-of-bounds entries before
    /// anything is written
    pub strict: bool,
    pub naming: OutputNaming,
    pub error_policy: ErrorPolicy,
    /// Directory for extracted payloads; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
}

/// How output files are named
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputNaming {
    /// `<stem>_<TYPE><suffix>`; entries sharing a payload type overwrite
    /// each other
    #[default]
    ByType,
    /// `<stem>_<index>_<TYPE><suffix>`
    Indexed,
}

/// What to do when one entry's payload window is out of bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    SkipEntry,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FirmwareError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| FirmwareError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FirmwareError::io(parent, e))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| FirmwareError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| FirmwareError::io(path, e))
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eswb-extract")
            .join("config.toml")
    }
}
