//! SAML error types.
//!
//! Every failure the protocol engine can report is a variant of
//! [`SamlError`]. The command layer branches on the variant to pick an HTTP
//! status; message text is for logs only.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SamlError {
    /// A required argument was missing or empty. Carries the argument name.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The transport encoding was malformed (base64, deflate, UTF-8, or a
    /// missing parameter).
    #[error("format error: {0}")]
    Format(String),

    /// The message decoded but is not a well-formed SAML message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No identity provider is configured for the issuer.
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// The signature was missing, malformed, or did not verify against the
    /// configured certificate.
    #[error("untrusted response: {0}")]
    UntrustedResponse(String),

    /// The response came from a different issuer than the request was sent to.
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Issuer the request was sent to.
        expected: String,
        /// Issuer named in the response.
        actual: String,
    },

    /// The response does not answer a pending request, or the request was
    /// already answered.
    #[error("unsolicited or replayed response: {0}")]
    UnsolicitedOrReplayedResponse(String),

    /// The current time is outside the assertion validity window.
    #[error("assertion expired: {0}")]
    AssertionExpired(String),

    /// This service provider is not in the assertion audience.
    #[error("audience mismatch: {0}")]
    AudienceMismatch(String),

    /// The identity provider answered with a non-success status.
    #[error("identity provider reported failure: {status}")]
    IdpReportedFailure {
        /// Top-level status code URI.
        status: String,
        /// Status message, if any.
        message: Option<String>,
    },

    /// A pending request with the same identifier already exists.
    #[error("duplicate request id: {0}")]
    DuplicateRequestId(String),

    /// The binding name or URI is not supported.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Configuration could not be turned into a working engine.
    #[error("configuration error: {0}")]
    Config(#[from] authsvc_core::ConfigError),

    /// Key or certificate handling failed.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// Returns true for response validation failures whose details must not
    /// be shown to the browser.
    #[must_use]
    pub const fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Self::UntrustedResponse(_)
                | Self::IssuerMismatch { .. }
                | Self::UnsolicitedOrReplayedResponse(_)
                | Self::AssertionExpired(_)
                | Self::AudienceMismatch(_)
        )
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_)
            | Self::Format(_)
            | Self::InvalidMessage(_)
            | Self::UnknownIssuer(_)
            | Self::UnsupportedBinding(_) => 400,
            Self::UntrustedResponse(_)
            | Self::IssuerMismatch { .. }
            | Self::UnsolicitedOrReplayedResponse(_)
            | Self::AssertionExpired(_)
            | Self::AudienceMismatch(_)
            | Self::IdpReportedFailure { .. } => 403,
            Self::DuplicateRequestId(_) | Self::Config(_) | Self::Crypto(_) => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::InvalidMessage(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Format(format!("invalid base64: {err}"))
    }
}

impl From<authsvc_crypto::CryptoError> for SamlError {
    fn from(err: authsvc_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}
