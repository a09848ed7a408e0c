//! Response validation pipeline.
//!
//! Stages run in a fixed order and stop at the first failure:
//!
//! 1. parse, with every `ID` in the document required to be unique;
//! 2. status must be success;
//! 3. signature: the response or every assertion must carry a valid
//!    enveloped signature from the claimed issuer's trusted key;
//! 4. correlation: `InResponseTo` must consume a pending request sent to
//!    the same issuer;
//! 5. conditions: validity window and audience of every assertion;
//! 6. claim extraction.
//!
//! Claims are read from the same parsed tree the signatures were checked on.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SamlError, SamlResult};
use crate::options::SpOptions;
use crate::registry::IdentityProviderRegistry;
use crate::signature::XmlSignatureValidator;
use crate::store::PendingRequestStore;
use crate::types::{expired_at, Assertion, ClaimSet, Response, SAML_NS};
use crate::xml::Element;

/// The outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedResponse {
    /// Claims asserted about the principal.
    pub claims: ClaimSet,
    /// Where the sign-in flow wanted to go.
    pub return_url: Url,
    /// The identity provider that issued the response.
    pub issuer: String,
    /// ID of the response.
    pub response_id: String,
    /// ID of the request the response answered.
    pub request_id: String,
}

/// Validates responses delivered to the assertion consumer service.
#[derive(Clone, Copy)]
pub struct ResponseValidator<'a> {
    options: &'a SpOptions,
    registry: &'a IdentityProviderRegistry,
    store: &'a dyn PendingRequestStore,
}

impl<'a> ResponseValidator<'a> {
    /// Creates a validator.
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

    /// Validates a response document.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error. Every failure is terminal:
    /// a response that consumed its pending request can never be retried.
    pub fn validate(&self, xml: &str, now: DateTime<Utc>) -> SamlResult<ValidatedResponse> {
        match self.run(xml, now) {
            Ok(validated) => {
                info!(
                    issuer = %validated.issuer,
                    request_id = %validated.request_id,
                    subject = %validated.claims.subject(),
                    "SAML response accepted"
                );
                Ok(validated)
            }
            Err(e) => {
                warn!(error = %e, "SAML response rejected");
                Err(e)
            }
        }
    }

    fn run(&self, xml: &str, now: DateTime<Utc>) -> SamlResult<ValidatedResponse> {
        let root = Element::parse(xml)?;
        ensure_unique_ids(&root)?;
        let response = Response::from_element(&root)?;

        if !response.is_success() {
            return Err(SamlError::IdpReportedFailure {
                status: response.status.status_code.value.clone(),
                message: response.status.status_message.clone(),
            });
        }
        if response.assertions.is_empty() {
            return Err(SamlError::InvalidMessage(
                "response carries no assertion".to_string(),
            ));
        }

        let issuer = self.check_signatures(&root, &response)?;
        let (request_id, return_url) = self.correlate(&response, &issuer, now)?;
        self.check_conditions(&response.assertions, now)?;
        let claims = extract_claims(&issuer, &response.assertions)?;

        Ok(ValidatedResponse {
            claims,
            return_url,
            issuer,
            response_id: response.id,
            request_id,
        })
    }

    /// Returns the verified issuer.
    fn check_signatures(&self, root: &Element, response: &Response) -> SamlResult<String> {
        let issuer = response
            .issuer
            .clone()
            .or_else(|| response.assertions.first().map(|a| a.issuer.clone()))
            .ok_or_else(|| SamlError::UntrustedResponse("response names no issuer".to_string()))?;

        if let Some(other) = response.assertions.iter().find(|a| a.issuer != issuer) {
            return Err(SamlError::UntrustedResponse(format!(
                "assertion issuer {} differs from response issuer {issuer}",
                other.issuer
            )));
        }

        let idp = self.registry.get(&issuer).map_err(|_| {
            SamlError::UntrustedResponse(format!("issuer {issuer} is not trusted"))
        })?;
        let verifier =
            XmlSignatureValidator::new(idp.verifying_key()).allow_sha1(self.options.allow_sha1);

        let response_signed = verifier.verify_enveloped(root)?;
        for assertion in root.children_named(SAML_NS, "Assertion") {
            let signed = verifier.verify_enveloped(assertion)?;
            if !response_signed && !signed {
                return Err(SamlError::UntrustedResponse(format!(
                    "assertion {} is not signed",
                    assertion.id().unwrap_or_default()
                )));
            }
        }

        debug!(issuer = %issuer, response_signed, "signature check passed");
        Ok(issuer)
    }

    fn correlate(
        &self,
        response: &Response,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> SamlResult<(String, Url)> {
        let request_id = response.in_response_to.clone().ok_or_else(|| {
            SamlError::UnsolicitedOrReplayedResponse("response has no InResponseTo".to_string())
        })?;

        let bound_elsewhere = response.assertions.iter().any(|a| {
            a.subject
                .as_ref()
                .and_then(|s| s.confirmation.as_ref())
                .and_then(|c| c.in_response_to.as_deref())
                .is_some_and(|id| id != request_id)
        });
        if bound_elsewhere {
            return Err(SamlError::UnsolicitedOrReplayedResponse(format!(
                "assertion confirmation does not answer {request_id}"
            )));
        }

        let pending = self.store.try_remove(&request_id, now).ok_or_else(|| {
            SamlError::UnsolicitedOrReplayedResponse(format!(
                "no pending request {request_id}"
            ))
        })?;
        if pending.issuer != issuer {
            return Err(SamlError::IssuerMismatch {
                expected: pending.issuer,
                actual: issuer.to_string(),
            });
        }

        debug!(request_id = %request_id, "correlation check passed");
        Ok((request_id, pending.return_url))
    }

    fn check_conditions(&self, assertions: &[Assertion], now: DateTime<Utc>) -> SamlResult<()> {
        let skew = self.options.clock_skew;
        for assertion in assertions {
            let conditions = assertion.conditions.as_ref().ok_or_else(|| {
                SamlError::AudienceMismatch(format!(
                    "assertion {} has no audience restriction",
                    assertion.id
                ))
            })?;
            conditions.check_validity(now, skew)?;

            let confirmation_expiry = assertion
                .subject
                .as_ref()
                .and_then(|s| s.confirmation.as_ref())
                .and_then(|c| c.not_on_or_after);
            if let Some(expiry) = confirmation_expiry {
                if expired_at(expiry, now, skew) {
                    return Err(SamlError::AssertionExpired(format!(
                        "subject confirmation of {} expired",
                        assertion.id
                    )));
                }
            }

            if !conditions.allows_audience(&self.options.entity_id) {
                return Err(SamlError::AudienceMismatch(format!(
                    "{} is not an audience of assertion {}",
                    self.options.entity_id, assertion.id
                )));
            }
        }
        Ok(())
    }
}

fn ensure_unique_ids(root: &Element) -> SamlResult<()> {
    let mut seen = HashSet::new();
    for id in root.descendants().into_iter().filter_map(Element::id) {
        if !seen.insert(id) {
            return Err(SamlError::UntrustedResponse(format!("duplicate ID {id}")));
        }
    }
    Ok(())
}

fn extract_claims(issuer: &str, assertions: &[Assertion]) -> SamlResult<ClaimSet> {
    let subject = assertions
        .iter()
        .find_map(|a| a.subject.as_ref())
        .map(|s| s.name_id.clone())
        .ok_or_else(|| SamlError::InvalidMessage("no assertion names a subject".to_string()))?;

    let mut claims = ClaimSet::new(issuer, subject);
    for assertion in assertions {
        claims.add_assertion(assertion);
    }
    Ok(claims)
}
