//! Test harness for end-to-end sign-in flows.
//!
//! [`StubIdp`] plays the identity provider: it reads the `AuthnRequest` the
//! service provider redirects to it, answers with a signed `Response` and
//! posts it back to the assertion consumer service.

use anyhow::Context;
use authsvc_core::{Config, IdentityProviderEntry, ServiceProviderConfig};
use authsvc_crypto::SigningKey;
use authsvc_saml::{
    Assertion, Attribute, AuthnRequest, CommandDispatcher, Conditions, IncomingRequest, NameId,
    Response, SamlBinding, Subject, SubjectConfirmationData, XmlSigner, SAML_REQUEST_PARAM,
    SAML_RESPONSE_PARAM,
};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use url::Url;

/// Entity ID of the service provider under test.
pub const SP_ENTITY_ID: &str = "https://sp.example.com";

/// Assertion consumer service URL of the service provider under test.
pub const SP_ACS_URL: &str = "https://sp.example.com/saml2/acs";

/// Installs a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("authsvc_saml=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A self-contained identity provider with its own key and certificate.
pub struct StubIdp {
    issuer: String,
    sso_url: Url,
    binding: SamlBinding,
    certificate_pem: String,
    signer: XmlSigner,
}

impl StubIdp {
    /// Creates an identity provider with a fresh P-256 key.
    pub fn new(issuer: &str) -> anyhow::Result<Self> {
        let key_pair = rcgen::KeyPair::generate()?;
        let host = Url::parse(issuer)?
            .host_str()
            .context("issuer has no host")?
            .to_string();
        let certificate = rcgen::CertificateParams::new(vec![host])?.self_signed(&key_pair)?;
        let signing_key = SigningKey::ecdsa_from_pkcs8(&key_pair.serialize_der())?;

        Ok(Self {
            issuer: issuer.to_string(),
            sso_url: Url::parse(&format!("{issuer}/sso"))?,
            binding: SamlBinding::HttpRedirect,
            certificate_pem: certificate.pem(),
            signer: XmlSigner::new(signing_key).with_certificate(certificate.der().to_vec()),
        })
    }

    /// Makes the service provider send requests with the POST binding.
    #[must_use]
    pub fn with_post_binding(mut self) -> Self {
        self.binding = SamlBinding::HttpPost;
        self
    }

    /// Returns the issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the single sign-on URL.
    pub fn sso_url(&self) -> &Url {
        &self.sso_url
    }

    /// Returns the configuration entry trusting this identity provider.
    pub fn entry(&self) -> IdentityProviderEntry {
        let binding = match self.binding {
            SamlBinding::HttpRedirect => "redirect",
            SamlBinding::HttpPost => "post",
        };
        IdentityProviderEntry::new(&self.issuer, self.sso_url.as_str(), &self.certificate_pem)
            .with_binding(binding)
    }

    /// Decodes the `AuthnRequest` carried by a redirect location.
    pub fn read_request(&self, location: &Url) -> anyhow::Result<AuthnRequest> {
        let xml = SamlBinding::HttpRedirect
            .decode(&IncomingRequest::get(location.clone()), SAML_REQUEST_PARAM)?;
        Ok(AuthnRequest::parse(&xml)?)
    }

    /// Builds a successful response for `request`, valid at `now`.
    pub fn response_for(&self, request: &AuthnRequest, subject: &str, now: DateTime<Utc>) -> Response {
        let conditions = Conditions::valid_for(now - Duration::minutes(1), Duration::minutes(5))
            .with_audience(&request.issuer);
        self.response_with_conditions(request, subject, conditions, now)
    }

    /// Builds a successful response for `request` with explicit conditions.
    pub fn response_with_conditions(
        &self,
        request: &AuthnRequest,
        subject: &str,
        conditions: Conditions,
        now: DateTime<Utc>,
    ) -> Response {
        let recipient = request
            .assertion_consumer_service_url
            .clone()
            .unwrap_or_else(|| SP_ACS_URL.to_string());
        let assertion = Assertion::new(&self.issuer)
            .issued_at(now)
            .with_subject(
                Subject::new(NameId::email(subject))
                    .with_confirmation(SubjectConfirmationData::for_request(&request.id, recipient.clone())),
            )
            .with_conditions(conditions)
            .with_attribute(Attribute::multi(
                "groups",
                vec!["staff".to_string(), "admins".to_string()],
            ))
            .with_attribute(Attribute::single("displayName", "Test User"));

        Response::success(&self.issuer)
            .in_response_to(&request.id)
            .with_destination(recipient)
            .issued_at(now)
            .with_assertion(assertion)
    }

    /// Signs the whole response.
    pub fn sign(&self, response: &Response) -> anyhow::Result<String> {
        Ok(self.signer.sign(&response.to_xml(), &response.id)?)
    }

    /// Builds the browser's POST to the assertion consumer service.
    pub fn post_to_acs(&self, xml: &str) -> anyhow::Result<IncomingRequest> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(xml);
        Ok(IncomingRequest::post(
            Url::parse(SP_ACS_URL)?,
            vec![(SAML_RESPONSE_PARAM.to_string(), encoded)],
        ))
    }
}

/// Builds a configuration trusting `idps`, in order.
pub fn config(idps: &[&StubIdp]) -> Config {
    idps.iter().fold(
        Config::new(ServiceProviderConfig::new(SP_ENTITY_ID).with_acs_url(SP_ACS_URL)),
        |config, idp| config.with_identity_provider(idp.entry()),
    )
}

/// Builds a dispatcher trusting `idps`.
pub fn dispatcher(idps: &[&StubIdp]) -> anyhow::Result<CommandDispatcher> {
    Ok(CommandDispatcher::from_config(&config(idps))?)
}
