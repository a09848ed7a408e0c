//! Crypto errors.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error type for crypto operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Certificate could not be decoded or parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signature did not verify.
    #[error("signature verification failed")]
    Verification,

    /// Algorithm is unknown or not usable with the given key.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}
