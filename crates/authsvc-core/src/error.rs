//! Configuration errors.

use thiserror::Error;

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is missing or empty.
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    /// A value that must be an absolute URL could not be parsed.
    #[error("invalid URL for {field}: {value}")]
    InvalidUrl {
        /// The configuration field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Two identity providers share the same issuer.
    #[error("duplicate identity provider issuer: {0}")]
    DuplicateIssuer(String),

    /// Any other invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
