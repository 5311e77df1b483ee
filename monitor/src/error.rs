//! Error types for the monitor.
//!
//! Each subsystem has its own error enum. [`MonitorError`] folds them
//! together for callers that drive the whole crate.

use thiserror::Error;

use crate::accessor::AccessError;
use crate::config::ConfigError;
use crate::sink::SinkError;
use crate::statefile::StateFileError;

/// Errors that can occur during monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading a watched file failed.
    #[error("file access error: {0}")]
    Access(#[from] AccessError),

    /// Building or using a notification sink failed.
    #[error("notification sink error: {0}")]
    Sink(#[from] SinkError),

    /// Reading or writing persisted state failed.
    #[error("state error: {0}")]
    State(#[from] StateFileError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_env_var_display() {
        let err = ConfigError::MissingEnvVar("LOGWARDEN_LOG_DIR".to_string());
        assert_eq!(
            err.to_string(),
            "missing required environment variable: LOGWARDEN_LOG_DIR"
        );
    }

    #[test]
    fn monitor_error_config_display() {
        let err = MonitorError::Config(ConfigError::NoHomeDirectory);
        assert_eq!(
            err.to_string(),
            "configuration error: failed to determine home directory"
        );
    }

    #[test]
    fn monitor_error_access_conversion() {
        let err: MonitorError = AccessError::NotFound("game.log".to_string()).into();
        assert!(matches!(err, MonitorError::Access(_)));
        assert!(err.to_string().starts_with("file access error"));
    }

    #[test]
    fn monitor_error_sink_display() {
        let err: MonitorError = SinkError::Rejected {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "notification sink error: rejected: 500 - boom");
    }

    #[test]
    fn monitor_error_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: MonitorError = json_err.into();
        assert!(matches!(err, MonitorError::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn monitor_error_state_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: MonitorError = StateFileError::from(io_err).into();
        assert!(matches!(err, MonitorError::State(_)));
    }
}
