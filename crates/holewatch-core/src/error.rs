//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors detected while loading or validating the configuration.
///
/// All of these are startup-time failures; the monitor never runs with a
/// configuration that produced one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: String, value: String },

    #[error("no devices configured")]
    NoDevices,

    #[error("device #{0} has an empty address")]
    EmptyAddress(usize),

    #[error("device address configured twice: {0}")]
    DuplicateAddress(String),

    #[error("device {device} references unknown recipient {recipient:?}")]
    UnknownRecipient { device: String, recipient: String },

    #[error("missing bot token")]
    MissingToken,
}
