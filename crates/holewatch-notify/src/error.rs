//! Notifier error types.

use thiserror::Error;

/// Errors from a single message delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,

    /// The bot API rejected the message.
    #[error("API returned status {status}: {description}")]
    Api { status: u16, description: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the bot token; never let it reach a log line.
        let err = err.without_url();
        if err.is_timeout() {
            NotifyError::Timeout
        } else if err.is_connect() {
            NotifyError::Connection(err.to_string())
        } else {
            NotifyError::Http(err.to_string())
        }
    }
}
