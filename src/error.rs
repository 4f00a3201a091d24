use std::time::Duration;
use thiserror::Error;

/// Errors raised while acquiring credentials, converting or publishing events.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity provider rejected the client-credentials grant or could not be reached.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// `submit` was called before a client handle was initialized.
    #[error("Graph client not initialized; call initialize() first")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote calendar service answered with a non-success status.
    #[error("Remote API error (HTTP {status}{}): {message}", .code.as_deref().map(|c| format!(", {c}")).unwrap_or_default())]
    RemoteApi {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("iCalendar error: {0}")]
    Ics(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn invalid_argument(message: &str) -> Error {
    Error::InvalidArgument(message.to_string())
}

pub fn ics_error(message: &str) -> Error {
    Error::Ics(message.to_string())
}

pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}
