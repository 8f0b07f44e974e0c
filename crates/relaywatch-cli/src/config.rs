//! Configuration file management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use relaywatch_core::{PollOptions, Preset};
use serde::{Deserialize, Serialize};

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telemetry service connection.
    pub api: ApiConfig,
    /// Polling and chart settings.
    pub monitor: MonitorConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.api.validate();
        errors.extend(self.monitor.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Telemetry service connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Service root (e.g., "https://telemetry.example.com").
    pub base_url: String,
    /// Bearer token. Prefer the RELAYWATCH_TOKEN environment variable.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let url = self.base_url.trim();
        if url.is_empty() {
            errors.push(ValidationError {
                field: "api.base_url".to_string(),
                message: "service URL cannot be empty".to_string(),
            });
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ValidationError {
                field: "api.base_url".to_string(),
                message: format!("'{}' must start with http:// or https://", url),
            });
        }

        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            errors.push(ValidationError {
                field: "api.timeout_secs".to_string(),
                message: format!(
                    "timeout must be between 1 and 300 seconds, got {}",
                    self.timeout_secs
                ),
            });
        }

        errors
    }
}

/// Polling and chart settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between polling cycles.
    pub poll_interval_secs: u64,
    /// Limit on a single sensor fetch, in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Number of axis ticks printed with history.
    pub tick_count: u32,
    /// Window used by `history` when none is given.
    pub default_preset: Preset,
}

/// Upper bound on axis ticks, for both the config file and `--ticks`.
pub const MAX_TICK_COUNT: u32 = 50;

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            fetch_timeout_secs: None,
            tick_count: relaywatch_core::ticks::DEFAULT_TICK_COUNT,
            default_preset: Preset::default(),
        }
    }
}

impl MonitorConfig {
    /// Scheduler options for these settings.
    pub fn poll_options(&self) -> PollOptions {
        let builder = PollOptions::builder().interval(Duration::from_secs(self.poll_interval_secs));
        match self.fetch_timeout_secs {
            Some(secs) => builder.fetch_timeout(Duration::from_secs(secs)).build(),
            None => builder.build(),
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.poll_interval_secs == 0 || self.poll_interval_secs > 3600 {
            errors.push(ValidationError {
                field: "monitor.poll_interval_secs".to_string(),
                message: format!(
                    "poll interval must be between 1 and 3600 seconds, got {}",
                    self.poll_interval_secs
                ),
            });
        }

        if self.fetch_timeout_secs == Some(0) {
            errors.push(ValidationError {
                field: "monitor.fetch_timeout_secs".to_string(),
                message: "fetch timeout must be at least 1 second".to_string(),
            });
        }

        if self.tick_count == 0 || self.tick_count > MAX_TICK_COUNT {
            errors.push(ValidationError {
                field: "monitor.tick_count".to_string(),
                message: format!(
                    "tick count must be between 1 and {}, got {}",
                    MAX_TICK_COUNT, self.tick_count
                ),
            });
        }

        if self.default_preset == Preset::Custom {
            errors.push(ValidationError {
                field: "monitor.default_preset".to_string(),
                message: "'custom' has no window of its own; pick a named preset".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `api.base_url`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("relaywatch")
        .join("config.toml")
}
