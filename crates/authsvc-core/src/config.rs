//! Service provider configuration.
//!
//! Loaded once at process start by the host. Identity providers keep the
//! order in which they were configured; the first entry is the default
//! provider for sign-in requests that do not name an issuer.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Default tolerance applied to assertion validity windows.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 300;

/// Default lifetime of an unanswered authentication request.
pub const DEFAULT_PENDING_REQUEST_TTL_SECS: u64 = 600;

/// Upper bound for the clock skew and the pending request lifetime (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Binding used when an identity provider entry does not name one.
pub const DEFAULT_BINDING: &str = "redirect";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// This service provider.
    pub service_provider: ServiceProviderConfig,
    /// Trusted identity providers, in configuration order.
    #[serde(default)]
    pub identity_providers: Vec<IdentityProviderEntry>,
}

impl Config {
    /// Creates a configuration with no identity providers.
    #[must_use]
    pub fn new(service_provider: ServiceProviderConfig) -> Self {
        Self {
            service_provider,
            identity_providers: Vec::new(),
        }
    }

    /// Appends an identity provider.
    #[must_use]
    pub fn with_identity_provider(mut self, entry: IdentityProviderEntry) -> Self {
        self.identity_providers.push(entry);
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.service_provider.validate()?;

        if self.identity_providers.is_empty() {
            return Err(ConfigError::Missing("identity_providers"));
        }

        let mut seen = HashSet::new();
        for entry in &self.identity_providers {
            entry.validate()?;
            if !seen.insert(entry.issuer.as_str()) {
                return Err(ConfigError::DuplicateIssuer(entry.issuer.clone()));
            }
        }

        Ok(())
    }
}

/// Settings describing this service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    /// Entity identifier of this service provider. Used as the issuer of
    /// outgoing requests and as the expected audience of assertions.
    pub entity_id: String,

    /// Assertion consumer service URL advertised in outgoing requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Clock skew tolerated when checking assertion validity windows.
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,

    /// Lifetime of a pending authentication request before it is evicted.
    #[serde(default = "default_pending_request_ttl_secs")]
    pub pending_request_ttl_secs: u64,

    /// Accept SHA-1 based signatures and digests.
    #[serde(default)]
    pub allow_sha1: bool,
}

fn default_clock_skew_secs() -> u64 {
    DEFAULT_CLOCK_SKEW_SECS
}

fn default_pending_request_ttl_secs() -> u64 {
    DEFAULT_PENDING_REQUEST_TTL_SECS
}

impl ServiceProviderConfig {
    /// Creates settings with default tolerances.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            assertion_consumer_service_url: None,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            pending_request_ttl_secs: DEFAULT_PENDING_REQUEST_TTL_SECS,
            allow_sha1: false,
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the clock skew tolerance in seconds.
    #[must_use]
    pub const fn with_clock_skew_secs(mut self, secs: u64) -> Self {
        self.clock_skew_secs = secs;
        self
    }

    /// Sets the pending request lifetime in seconds.
    #[must_use]
    pub const fn with_pending_request_ttl_secs(mut self, secs: u64) -> Self {
        self.pending_request_ttl_secs = secs;
        self
    }

    /// Returns the clock skew tolerance.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Returns the pending request lifetime.
    #[must_use]
    pub const fn pending_request_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_request_ttl_secs)
    }

    /// Checks the entity id, the ACS URL and the duration bounds.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.entity_id.trim().is_empty() {
            return Err(ConfigError::Missing("service_provider.entity_id"));
        }
        if let Some(ref acs) = self.assertion_consumer_service_url {
            parse_url("service_provider.assertion_consumer_service_url", acs)?;
        }
        if self.pending_request_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "service_provider.pending_request_ttl_secs must be greater than zero".to_string(),
            ));
        }
        for (field, secs) in [
            ("service_provider.pending_request_ttl_secs", self.pending_request_ttl_secs),
            ("service_provider.clock_skew_secs", self.clock_skew_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{field} must not exceed {MAX_DURATION_SECS}"
                )));
            }
        }
        Ok(())
    }
}

/// One trusted identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderEntry {
    /// Issuer (entity identifier) of the identity provider.
    pub issuer: String,

    /// Single sign-on endpoint that receives authentication requests.
    pub destination_uri: String,

    /// Signing certificate, PEM encoded or base64 DER.
    pub certificate: String,

    /// Binding used to send authentication requests: `redirect` or `post`.
    #[serde(default = "default_binding")]
    pub binding: String,
}

fn default_binding() -> String {
    DEFAULT_BINDING.to_string()
}

impl IdentityProviderEntry {
    /// Creates an entry using the default binding.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        destination_uri: impl Into<String>,
        certificate: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            destination_uri: destination_uri.into(),
            certificate: certificate.into(),
            binding: default_binding(),
        }
    }

    /// Sets the binding name.
    #[must_use]
    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = binding.into();
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("identity_providers.issuer"));
        }
        if self.certificate.trim().is_empty() {
            return Err(ConfigError::Missing("identity_providers.certificate"));
        }
        parse_url("identity_providers.destination_uri", &self.destination_uri)?;
        Ok(())
    }
}

fn parse_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config::new(ServiceProviderConfig::new("https://sp.example.com/saml2"))
            .with_identity_provider(IdentityProviderEntry::new(
                "https://idp.example.com",
                "https://idp.example.com/sso",
                "MIIB",
            ))
            .with_identity_provider(
                IdentityProviderEntry::new(
                    "https://idp2.example.com",
                    "https://idp2.example.com/sso",
                    "MIIC",
                )
                .with_binding("post"),
            )
    }

    #[test]
    fn defaults_are_applied_when_deserializing() {
        let json = r#"{
            "service_provider": { "entity_id": "https://sp.example.com/saml2" },
            "identity_providers": [
                {
                    "issuer": "https://idp.example.com",
                    "destination_uri": "https://idp.example.com/sso",
                    "certificate": "MIIB"
                }
            ]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.service_provider.clock_skew_secs, DEFAULT_CLOCK_SKEW_SECS);
        assert_eq!(
            config.service_provider.pending_request_ttl(),
            Duration::from_secs(DEFAULT_PENDING_REQUEST_TTL_SECS)
        );
        assert!(!config.service_provider.allow_sha1);
        assert_eq!(config.identity_providers[0].binding, "redirect");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn keeps_identity_provider_order() {
        let config = sample();
        let issuers: Vec<_> = config
            .identity_providers
            .iter()
            .map(|e| e.issuer.as_str())
            .collect();
        assert_eq!(issuers, ["https://idp.example.com", "https://idp2.example.com"]);
    }

    #[test]
    fn rejects_duplicate_issuers() {
        let config = sample().with_identity_provider(IdentityProviderEntry::new(
            "https://idp.example.com",
            "https://other.example.com/sso",
            "MIID",
        ));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateIssuer("https://idp.example.com".to_string()))
        );
    }

    #[test]
    fn rejects_missing_identity_providers() {
        let config = Config::new(ServiceProviderConfig::new("https://sp.example.com"));
        assert_eq!(config.validate(), Err(ConfigError::Missing("identity_providers")));
    }

    #[test]
    fn rejects_relative_destination() {
        let config = Config::new(ServiceProviderConfig::new("https://sp.example.com"))
            .with_identity_provider(IdentityProviderEntry::new("idp", "/sso", "MIIB"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "identity_providers.destination_uri", .. })
        ));
    }

    #[test]
    fn rejects_empty_entity_id() {
        let mut config = sample();
        config.service_provider.entity_id = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("service_provider.entity_id"))
        );
    }

    #[test]
    fn bounds_durations() {
        let mut config = sample();
        config.service_provider = config
            .service_provider
            .with_pending_request_ttl_secs(MAX_DURATION_SECS)
            .with_clock_skew_secs(MAX_DURATION_SECS);
        assert!(config.validate().is_ok());

        let ttl = ServiceProviderConfig::new("sp").with_pending_request_ttl_secs(10u64.pow(15));
        assert!(matches!(ttl.validate(), Err(ConfigError::Invalid(_))));

        let skew = ServiceProviderConfig::new("sp").with_clock_skew_secs(MAX_DURATION_SECS + 1);
        assert!(matches!(skew.validate(), Err(ConfigError::Invalid(_))));
    }
}
