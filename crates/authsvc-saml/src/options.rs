//! Runtime settings of the service provider.

use authsvc_core::{ConfigError, ServiceProviderConfig};
use chrono::Duration;
use url::Url;

use crate::error::SamlResult;

/// Service provider settings with parsed URLs and durations.
#[derive(Debug, Clone)]
pub struct SpOptions {
    /// Entity ID: issuer of outgoing requests and the required audience.
    pub entity_id: String,
    /// Assertion consumer service URL sent in requests.
    pub acs_url: Option<Url>,
    /// Tolerated clock difference with identity providers.
    pub clock_skew: Duration,
    /// Lifetime of a pending request.
    pub pending_request_ttl: Duration,
    /// Accept SHA-1 signatures and digests.
    pub allow_sha1: bool,
}

impl SpOptions {
    /// Creates options with default tolerances.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            acs_url: None,
            clock_skew: Duration::seconds(authsvc_core::config::DEFAULT_CLOCK_SKEW_SECS as i64),
            pending_request_ttl: Duration::seconds(
                authsvc_core::config::DEFAULT_PENDING_REQUEST_TTL_SECS as i64,
            ),
            allow_sha1: false,
        }
    }

    /// Reads options from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Config`] for settings that fail
    /// [`ServiceProviderConfig::validate`].
    pub fn from_config(config: &ServiceProviderConfig) -> SamlResult<Self> {
        config.validate()?;
        let acs_url = config
            .assertion_consumer_service_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|_| ConfigError::InvalidUrl {
                    field: "service_provider.assertion_consumer_service_url",
                    value: url.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            entity_id: config.entity_id.clone(),
            acs_url,
            clock_skew: to_chrono(config.clock_skew(), "service_provider.clock_skew_secs")?,
            pending_request_ttl: to_chrono(
                config.pending_request_ttl(),
                "service_provider.pending_request_ttl_secs",
            )?,
            allow_sha1: config.allow_sha1,
        })
    }
}

fn to_chrono(duration: std::time::Duration, field: &str) -> Result<Duration, ConfigError> {
    Duration::from_std(duration).map_err(|_| ConfigError::Invalid(format!("{field} is out of range")))
}
