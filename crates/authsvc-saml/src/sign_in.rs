//! Outgoing authentication requests.

use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

use crate::commands::CommandResult;
use crate::error::SamlResult;
use crate::options::SpOptions;
use crate::registry::IdentityProviderRegistry;
use crate::store::{PendingCorrelation, PendingRequestStore};
use crate::types::{AuthnRequest, SamlBinding, SAML_REQUEST_PARAM};

/// Starts sign-in flows: builds the `AuthnRequest`, records it as pending and
/// binds it for the identity provider.
#[derive(Clone, Copy)]
pub struct RequestBuilder<'a> {
    options: &'a SpOptions,
    registry: &'a IdentityProviderRegistry,
    store: &'a dyn PendingRequestStore,
}

impl<'a> RequestBuilder<'a> {
    /// Creates a request builder.
    #[must_use]
    pub const fn new(
        options: &'a SpOptions,
        registry: &'a IdentityProviderRegistry,
        store: &'a dyn PendingRequestStore,
    ) -> Self {
        Self {
            options,
            registry,
            store,
        }
    }

    /// Begins a sign-in with `issuer`, or the default identity provider.
    ///
    /// Exactly one pending entry is created on success and none on failure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::UnknownIssuer`] if `issuer` is not
    /// registered.
    pub fn begin(
        &self,
        issuer: Option<&str>,
        return_url: Url,
        now: DateTime<Utc>,
    ) -> SamlResult<CommandResult> {
        let idp = match issuer {
            Some(issuer) => self.registry.get(issuer)?,
            None => self.registry.default_provider(),
        };

        let mut request = AuthnRequest::new(self.options.entity_id.as_str())
            .issued_at(now)
            .with_destination(idp.destination().as_str())
            .with_binding(SamlBinding::HttpPost);
        if let Some(ref acs) = self.options.acs_url {
            request = request.with_acs_url(acs.as_str());
        }

        self.store.insert(
            &request.id,
            PendingCorrelation::new(return_url, idp.issuer(), now),
        )?;

        let result = idp
            .binding()
            .encode(&request.to_xml(), idp.destination(), SAML_REQUEST_PARAM);
        match result {
            Ok(result) => {
                debug!(
                    issuer = %idp.issuer(),
                    request_id = %request.id,
                    binding = ?idp.binding(),
                    "sending authentication request"
                );
                Ok(result.no_cache())
            }
            Err(e) => {
                self.store.try_remove(&request.id, now);
                Err(e)
            }
        }
    }
}
