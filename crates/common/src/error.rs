//! Error types shared across presclock crates.

use std::path::PathBuf;

/// Top-level error type for presclock operations.
///
/// Clock queries themselves never fail; these cover construction,
/// configuration, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("Invalid tick frequency: {message}")]
    InvalidFrequency { message: String },

    #[error("Invalid refresh rate: {message}")]
    InvalidRefreshRate { message: String },

    #[error("Invalid speed adjustment: {message}")]
    InvalidSpeedAdjust { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClockError.
pub type ClockResult<T> = Result<T, ClockError>;

impl ClockError {
    pub fn invalid_frequency(msg: impl Into<String>) -> Self {
        Self::InvalidFrequency {
            message: msg.into(),
        }
    }

    pub fn invalid_refresh_rate(msg: impl Into<String>) -> Self {
        Self::InvalidRefreshRate {
            message: msg.into(),
        }
    }

    pub fn invalid_speed_adjust(msg: impl Into<String>) -> Self {
        Self::InvalidSpeedAdjust {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
