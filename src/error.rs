use thiserror::Error;

use crate::limiter::LimiterConfigError;

/// Errors that stop the service from starting or keep it from running.
///
/// Failures inside request handling never use this type; they are
/// [`crate::failure::Failure`] values translated at the recovery boundary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid rate limiter configuration: {0}")]
    LimiterConfig(#[from] LimiterConfigError),

    #[error("Failed to install metrics exporter: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// BSD sysexits code matching this error.
    pub fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            AppError::ConfigError(_) | AppError::LimiterConfig(_) => exitcode::CONFIG,
            AppError::Metrics(_) | AppError::Io(_) => exitcode::UNAVAILABLE,
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
