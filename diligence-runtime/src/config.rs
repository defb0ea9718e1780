//! Run configuration, loadable from TOML
//!
//! ```toml
//! [fetch]
//! min_spacing_secs = 1.0
//! max_attempts = 3
//!
//! [endpoints]
//! sourcify = "https://sourcify.dev/server"
//!
//! [report]
//! history_days = 180
//! ```

use diligence_core::DEFAULT_HISTORY_DAYS;
use diligence_net::FetchConfig;
use diligence_sources::{ActivityConfig, Endpoints};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Fetcher settings with durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub min_spacing_secs: f64,
    pub max_attempts: u32,
    pub backoff_base_secs: f64,
    pub request_timeout_secs: f64,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            min_spacing_secs: 1.0,
            max_attempts: 3,
            backoff_base_secs: 1.0,
            request_timeout_secs: 15.0,
            user_agent: None,
        }
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::Invalid(format!("{} must be a non-negative number of seconds, got {}", name, value)))
}

impl FetchSettings {
    pub fn to_fetch_config(&self) -> Result<FetchConfig, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        Ok(FetchConfig {
            min_spacing: seconds("min_spacing_secs", self.min_spacing_secs)?,
            max_attempts: self.max_attempts,
            backoff_base: seconds("backoff_base_secs", self.backoff_base_secs)?,
            request_timeout: seconds("request_timeout_secs", self.request_timeout_secs)?,
            user_agent: self.user_agent.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Trailing TVL points kept in the snapshot history
    pub history_days: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiligenceConfig {
    pub fetch: FetchSettings,
    pub endpoints: Endpoints,
    pub activity: ActivityConfig,
    pub report: ReportSettings,
}

impl DiligenceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.fetch.to_fetch_config()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
