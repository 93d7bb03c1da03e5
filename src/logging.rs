//! `tracing` subscriber setup.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directives}': {message}")]
    InvalidFilter { directives: String, message: String },

    #[error("I/O error while opening log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Install the global fmt subscriber.
///
/// Logs go to stderr, or are appended without ANSI colors to the configured log
/// file. Returns `Ok(false)` when a global subscriber was already installed.
pub fn init_logging(config: &EnvConfig) -> Result<bool, LoggingError> {
    let directives = config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
    let filter = EnvFilter::try_new(directives).map_err(|error| LoggingError::InvalidFilter {
        directives: directives.to_owned(),
        message: error.to_string(),
    })?;

    let installed = match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::OpenFile {
                    path: PathBuf::from(path),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::{init_logging, LoggingError};
    use crate::config::EnvConfig;

    #[test]
    fn invalid_filter_is_rejected() {
        let config = EnvConfig {
            log_filter: Some("opencode_api=verbose".to_owned()),
            ..EnvConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn unopenable_log_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let config = EnvConfig {
            log_file: Some(
                dir.path()
                    .join("missing")
                    .join("sync.log")
                    .display()
                    .to_string(),
            ),
            ..EnvConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::OpenFile { .. })
        ));
    }

    #[test]
    fn second_install_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let config = EnvConfig {
            log_file: Some(dir.path().join("sync.log").display().to_string()),
            ..EnvConfig::default()
        };

        init_logging(&config).expect("first install");
        assert!(!init_logging(&config).expect("second install"));
        assert!(dir.path().join("sync.log").exists());
    }
}
