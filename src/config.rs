//! Optional TOML configuration file
//!
//! Values from the file are defaults; command-line flags win.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use cwtail_types::LogFormat;

/// Default poll interval in seconds
const DEFAULT_INTERVAL_SECS: u64 = 3;

/// Contents of `config.toml`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub region: Option<String>,

    /// Poll interval in seconds
    pub interval: Option<u64>,

    pub format: Option<LogFormat>,
    pub filter: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout: Option<u64>,
}

/// Values given on the command line
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub interval: Option<u64>,
    pub format: Option<LogFormat>,
    pub filter: Option<String>,
}

/// Effective settings after merging file, flags and defaults
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub region: Option<String>,
    pub interval: Duration,
    pub format: LogFormat,
    pub filter: String,
    pub request_timeout: Option<Duration>,
}

impl FileConfig {
    /// `<config dir>/cwtail/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cwtail").join("config.toml"))
    }

    /// Load an explicit config file, or the default one if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        match Self::default_path() {
            Some(path) if path.is_file() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides and fill in defaults
    pub fn merge(self, overrides: Overrides) -> Settings {
        Settings {
            region: overrides.region.or(self.region),
            interval: Duration::from_secs(
                overrides
                    .interval
                    .or(self.interval)
                    .unwrap_or(DEFAULT_INTERVAL_SECS),
            ),
            format: overrides.format.or(self.format).unwrap_or_default(),
            filter: overrides.filter.or(self.filter).unwrap_or_default(),
            request_timeout: self.request_timeout.map(Duration::from_secs),
        }
    }
}
