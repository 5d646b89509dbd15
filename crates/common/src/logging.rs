//! Logging and tracing initialization.

use std::fs::File;
use std::path::Path;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. A subscriber that
/// is already installed is left in place. A log file that cannot be opened
/// falls back to stdout with a warning.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file, file_error) = match config.file.as_deref().map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    match (config.json, file) {
        (true, Some(file)) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (true, None) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (false, Some(file)) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (false, None) => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }

    if let Some(e) = file_error {
        tracing::warn!("Failed to open log file {:?}, logging to stdout: {}", config.file, e);
    }
}

/// Open a log file for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_keeps_first_subscriber() {
        init_default_logging();
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            json: true,
            file: None,
        });
        tracing::info!("logging initialized twice");
    }

    #[test]
    fn unopenable_log_file_falls_back() {
        let path = Path::new("/nonexistent-presclock-dir/clock.log");
        assert!(open_log_file(path).is_err());

        init_logging(&LoggingConfig {
            level: "info".to_string(),
            json: false,
            file: Some(path.to_path_buf()),
        });
        assert!(!path.exists());
    }

    #[test]
    fn log_file_is_created_for_append() {
        let path = std::env::temp_dir().join(format!("presclock-{}.log", std::process::id()));
        let file = open_log_file(&path).unwrap();
        drop(file);
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}
