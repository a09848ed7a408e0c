//! Identity provider trust registry.
//!
//! Built once from configuration and never mutated afterwards. Certificates
//! are parsed at load time, so a bad trust anchor fails startup rather than
//! the first sign-in.

use std::collections::HashMap;

use authsvc_core::{Config, IdentityProviderEntry};
use authsvc_crypto::VerifyingKey;
use tracing::debug;
use url::Url;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// A trusted identity provider.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    issuer: String,
    destination: Url,
    verifying_key: VerifyingKey,
    binding: SamlBinding,
}

impl IdentityProvider {
    /// Creates an identity provider from already parsed parts.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        destination: Url,
        verifying_key: VerifyingKey,
        binding: SamlBinding,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            destination,
            verifying_key,
            binding,
        }
    }

    /// Builds an identity provider from a configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Config`] for a bad URL, [`SamlError::UnsupportedBinding`]
    /// for an unknown binding name, or [`SamlError::Crypto`] if the certificate
    /// does not parse.
    pub fn from_entry(entry: &IdentityProviderEntry) -> SamlResult<Self> {
        let destination = Url::parse(&entry.destination_uri).map_err(|_| {
            authsvc_core::ConfigError::InvalidUrl {
                field: "destination_uri",
                value: entry.destination_uri.clone(),
            }
        })?;
        let binding = SamlBinding::from_name(&entry.binding)
            .ok_or_else(|| SamlError::UnsupportedBinding(entry.binding.clone()))?;
        let verifying_key = VerifyingKey::from_certificate(&entry.certificate)?;

        Ok(Self::new(entry.issuer.clone(), destination, verifying_key, binding))
    }

    /// Returns the issuer entity ID.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the single sign-on endpoint.
    #[must_use]
    pub const fn destination(&self) -> &Url {
        &self.destination
    }

    /// Returns the trusted signing key.
    #[must_use]
    pub const fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Returns the binding used to send requests.
    #[must_use]
    pub const fn binding(&self) -> SamlBinding {
        self.binding
    }
}

/// Immutable issuer to identity provider mapping, in configuration order.
#[derive(Debug, Clone)]
pub struct IdentityProviderRegistry {
    providers: Vec<IdentityProvider>,
    by_issuer: HashMap<String, usize>,
}

impl IdentityProviderRegistry {
    /// Builds the registry from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any entry fails to
    /// load.
    pub fn from_config(config: &Config) -> SamlResult<Self> {
        config.validate()?;
        let providers = config
            .identity_providers
            .iter()
            .map(IdentityProvider::from_entry)
            .collect::<SamlResult<Vec<_>>>()?;
        let registry = Self::new(providers)?;
        debug!(count = registry.len(), "loaded identity providers");
        Ok(registry)
    }

    /// Builds the registry from identity providers. The first is the default.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Config`] if the list is empty or an issuer repeats.
    pub fn new(providers: Vec<IdentityProvider>) -> SamlResult<Self> {
        if providers.is_empty() {
            return Err(authsvc_core::ConfigError::Missing("identity_providers").into());
        }
        let mut by_issuer = HashMap::with_capacity(providers.len());
        for (index, idp) in providers.iter().enumerate() {
            if by_issuer.insert(idp.issuer.clone(), index).is_some() {
                return Err(authsvc_core::ConfigError::DuplicateIssuer(idp.issuer.clone()).into());
            }
        }
        Ok(Self {
            providers,
            by_issuer,
        })
    }

    /// Looks up an identity provider by issuer.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnknownIssuer`] if no provider has that issuer.
    pub fn get(&self, issuer: &str) -> SamlResult<&IdentityProvider> {
        self.by_issuer
            .get(issuer)
            .and_then(|&i| self.providers.get(i))
            .ok_or_else(|| SamlError::UnknownIssuer(issuer.to_string()))
    }

    /// Returns the first configured identity provider.
    #[must_use]
    pub fn default_provider(&self) -> &IdentityProvider {
        // `new` refuses an empty list.
        &self.providers[0]
    }

    /// Iterates in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &IdentityProvider> {
        self.providers.iter()
    }

    /// Returns the number of identity providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Always false for a constructed registry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
