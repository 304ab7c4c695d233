//! Configuration loading for runguard.
//!
//! ```toml
//! [guard]
//! timeout_ms = 10000
//!
//! [logging]
//! filter = "info"
//! ```
//!
//! The file lives at `$RUNGUARD_CONFIG` or `~/.runguard/config.toml`. A missing
//! file is not an error; every field is optional.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use runguard_types::{Deadline, DeadlineError};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "RUNGUARD_CONFIG";
/// Overrides `guard.timeout_ms`.
pub const TIMEOUT_ENV: &str = "RUNGUARD_TIMEOUT_MS";
/// Applied when no source sets a timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Default, Deserialize)]
pub struct RunguardConfig {
    pub guard: Option<GuardConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GuardConfig {
    /// Deadline applied to every run, in milliseconds.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid timeout from {origin}: {source}")]
    InvalidTimeout {
        origin: SettingSource,
        source: DeadlineError,
    },
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

impl ConfigError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::InvalidTimeout { .. } | ConfigError::InvalidEnv { .. } => None,
        }
    }
}

impl RunguardConfig {
    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn timeout_ms(&self) -> Option<u64> {
        self.guard.as_ref().and_then(|guard| guard.timeout_ms)
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.logging
            .as_ref()
            .and_then(|logging| logging.filter.as_deref())
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".runguard").join("config.toml"))
}

/// Where the effective timeout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    Default,
    File,
    Env,
    Flag,
}

impl std::fmt::Display for SettingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SettingSource::Default => "default",
            SettingSource::File => "config file",
            SettingSource::Env => TIMEOUT_ENV,
            SettingSource::Flag => "command line",
        };
        f.write_str(label)
    }
}

/// Guard settings after applying every override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardSettings {
    pub deadline: Deadline,
    pub source: SettingSource,
}

impl GuardSettings {
    /// Resolve the deadline. Precedence: flag, `RUNGUARD_TIMEOUT_MS`, file,
    /// default.
    pub fn resolve(
        config: Option<&RunguardConfig>,
        flag_timeout_ms: Option<u64>,
    ) -> Result<Self, ConfigError> {
        Self::resolve_with_env(config, flag_timeout_ms, env::var(TIMEOUT_ENV).ok())
    }

    fn resolve_with_env(
        config: Option<&RunguardConfig>,
        flag_timeout_ms: Option<u64>,
        env_timeout: Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_timeout = match env_timeout {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u64>().map_err(
                |_| ConfigError::InvalidEnv {
                    var: TIMEOUT_ENV,
                    value: raw.clone(),
                },
            )?),
            _ => None,
        };

        let (millis, source) = if let Some(millis) = flag_timeout_ms {
            (millis, SettingSource::Flag)
        } else if let Some(millis) = env_timeout {
            (millis, SettingSource::Env)
        } else if let Some(millis) = config.and_then(RunguardConfig::timeout_ms) {
            (millis, SettingSource::File)
        } else {
            (DEFAULT_TIMEOUT_MS, SettingSource::Default)
        };

        let deadline = Deadline::from_millis(millis)
            .map_err(|source_err| ConfigError::InvalidTimeout {
                origin: source,
                source: source_err,
            })?;

        tracing::debug!(timeout_ms = millis, source = %source, "Guard timeout resolved");
        Ok(Self { deadline, source })
    }
}
