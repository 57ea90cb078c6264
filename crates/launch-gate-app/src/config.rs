//! Launch configuration: TOML file, environment overrides, and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use launch_gate_core::RetryPolicy;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "LAUNCH_GATE_CONFIG";
/// Environment override for the percent-encoded unlock date.
pub const UNLOCK_DATE_ENV: &str = "LAUNCH_GATE_UNLOCK_DATE";
/// Environment override for the percent-encoded base destination.
pub const BASE_DESTINATION_ENV: &str = "LAUNCH_GATE_BASE_DESTINATION";
/// Environment override for the JSON store file.
pub const STORE_PATH_ENV: &str = "LAUNCH_GATE_STORE_PATH";

/// Longest accepted delay or timeout.
const MAX_TIMING_SECS: f64 = 86_400.0;

/// Launch configuration supplied at orchestrator construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchConfig {
    /// Percent-encoded `YYYY-MM-DD` unlock date.
    #[serde(default)]
    pub unlock_date: String,
    /// Percent-encoded base destination identifier.
    #[serde(default)]
    pub base_destination: String,
    /// JSON store file; `None` keeps state in memory only.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Delay and retry tunables.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Delay and retry tunables in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Delayed connectivity re-checks before the alert.
    pub retry_max_attempts: u32,
    /// Seconds between connectivity re-checks.
    pub retry_delay_secs: f64,
    /// Seconds to wait for a push token.
    pub exchange_timeout_secs: f64,
    /// Seconds between a decision and its emitted event.
    pub emission_delay_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: 3,
            retry_delay_secs: 3.0,
            exchange_timeout_secs: 5.0,
            emission_delay_secs: 1.0,
        }
    }
}

/// Validated timing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchTiming {
    /// Connectivity retry policy.
    pub retry: RetryPolicy,
    /// Push-token race timeout.
    pub exchange_timeout: Duration,
    /// Delay before destination-bearing events.
    pub emission_delay: Duration,
}

impl Default for LaunchTiming {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            exchange_timeout: Duration::from_secs(5),
            emission_delay: Duration::from_secs(1),
        }
    }
}

impl LaunchConfig {
    /// Creates a configuration with default timing and in-memory state.
    pub fn new(unlock_date: impl Into<String>, base_destination: impl Into<String>) -> Self {
        Self {
            unlock_date: unlock_date.into(),
            base_destination: base_destination.into(),
            store_path: None,
            timing: TimingConfig::default(),
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Loads the file at `path`, or an empty configuration if it is absent.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] for unreadable files and
    /// [`ConfigError::Parse`] for malformed ones.
    pub fn load_or_empty(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    stage = "config",
                    action = "file_missing",
                    path = %path.display(),
                    "config file absent; relying on environment"
                );
                Ok(Self::new("", ""))
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = present(UNLOCK_DATE_ENV) {
            self.unlock_date = value;
        }
        if let Some(value) = present(BASE_DESTINATION_ENV) {
            self.base_destination = value;
        }
        if let Some(value) = present(STORE_PATH_ENV) {
            self.store_path = Some(PathBuf::from(value));
        }
        self
    }

    /// Converts timing to durations.
    ///
    /// Blank or malformed encoded constants are not rejected here; the launch
    /// flow fails closed on them (closed gate, empty base).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTiming`] for negative, non-finite, or
    /// oversized delays.
    pub fn validate(&self) -> Result<LaunchTiming, ConfigError> {
        let timing = &self.timing;
        Ok(LaunchTiming {
            retry: RetryPolicy {
                max_attempts: timing.retry_max_attempts,
                delay: seconds("retry_delay_secs", timing.retry_delay_secs)?,
            },
            exchange_timeout: seconds("exchange_timeout_secs", timing.exchange_timeout_secs)?,
            emission_delay: seconds("emission_delay_secs", timing.emission_delay_secs)?,
        })
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !(0.0..=MAX_TIMING_SECS).contains(&value) {
        return Err(ConfigError::InvalidTiming { field, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidTiming { field, value })
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but cannot be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A timing value is out of range.
    #[error("invalid timing `{field}` = {value}")]
    InvalidTiming {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
}
