//! Clock configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ClockError, ClockResult};

/// Global clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Ceiling, in percent, on how far refresh-rate compensation may snap
    /// the frame-to-refresh weight. Values at or below 0.05 disable snapping.
    pub max_speed_adjust_percent: f64,

    /// Software reference clock settings.
    pub reference: ReferenceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Settings for the software reference clock provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Display refresh rate the provider ticks against (Hz). Zero means the
    /// provider reports itself as not running.
    pub refresh_rate_hz: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "presclock=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            max_speed_adjust_percent: 0.0,
            reference: ReferenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ClockConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> ClockResult<Self> {
        if !path.exists() {
            return Err(ClockError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> ClockResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ClockResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the clock cannot honor.
    pub fn validate(&self) -> ClockResult<()> {
        if !self.max_speed_adjust_percent.is_finite() || self.max_speed_adjust_percent < 0.0 {
            return Err(ClockError::config(format!(
                "max_speed_adjust_percent must be a non-negative number, got {}",
                self.max_speed_adjust_percent
            )));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("presclock").join("config.json")
}
