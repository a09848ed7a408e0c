//! SAML AuthnRequest types.
//!
//! Authentication request message sent by the service provider to an identity
//! provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    check_version, escape, format_instant, parse_instant, required_attr, SamlBinding, SAMLP_NS,
    SAML_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML Authentication Request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request. Used as the correlation key.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: String,

    /// The identity provider endpoint the request is sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Binding the identity provider should use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,
}

impl AuthnRequest {
    /// Creates a new authentication request with a fresh ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
        }
    }

    /// Sets the issue instant.
    #[must_use]
    pub const fn issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the response binding.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Parses an `AuthnRequest` document.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if the XML is malformed or not an
    /// `AuthnRequest`.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }

    /// Reads a `samlp:AuthnRequest` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if required parts are missing.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAMLP_NS, "AuthnRequest") {
            return Err(SamlError::InvalidMessage(format!(
                "expected samlp:AuthnRequest, found {}",
                el.qualified_name()
            )));
        }
        check_version(el)?;

        let issuer = el
            .child(SAML_NS, "Issuer")
            .map(|i| i.text().trim().to_string())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| SamlError::InvalidMessage("AuthnRequest has no Issuer".to_string()))?;

        Ok(Self {
            id: required_attr(el, "ID")?.to_string(),
            issue_instant: parse_instant(required_attr(el, "IssueInstant")?, "IssueInstant")?,
            issuer,
            destination: el.attribute("Destination").map(str::to_string),
            assertion_consumer_service_url: el
                .attribute("AssertionConsumerServiceURL")
                .map(str::to_string),
            protocol_binding: el.attribute("ProtocolBinding").map(str::to_string),
        })
    }

    /// Writes the request document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}" Version="2.0" IssueInstant="{}""#,
            escape(&self.id),
            format_instant(&self.issue_instant)
        );
        if let Some(ref destination) = self.destination {
            xml.push_str(&format!(r#" Destination="{}""#, escape(destination)));
        }
        if let Some(ref acs) = self.assertion_consumer_service_url {
            xml.push_str(&format!(
                r#" AssertionConsumerServiceURL="{}""#,
                escape(acs)
            ));
        }
        if let Some(ref binding) = self.protocol_binding {
            xml.push_str(&format!(r#" ProtocolBinding="{}""#, escape(binding)));
        }
        xml.push_str(&format!(
            "><saml:Issuer>{}</saml:Issuer></samlp:AuthnRequest>",
            escape(&self.issuer)
        ));
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_has_fresh_id() {
        let a = AuthnRequest::new("https://sp.example.com");
        let b = AuthnRequest::new("https://sp.example.com");
        assert!(a.id.starts_with("_id"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn writes_and_reads_request() {
        let now = parse_instant("2024-05-01T10:00:00Z", "now").unwrap();
        let request = AuthnRequest::new("https://sp.example.com")
            .issued_at(now)
            .with_destination("https://idp.example.com/sso?a=1&b=2")
            .with_acs_url("https://sp.example.com/acs")
            .with_binding(SamlBinding::HttpPost);

        let xml = request.to_xml();
        assert!(xml.contains(r#"Destination="https://idp.example.com/sso?a=1&amp;b=2""#));
        assert!(xml.contains(SamlBinding::HttpPost.uri()));
        assert_eq!(AuthnRequest::parse(&xml).unwrap(), request);
    }

    #[test]
    fn rejects_wrong_version() {
        let xml = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="_x" Version="1.1" IssueInstant="2024-05-01T10:00:00Z"><saml:Issuer>sp</saml:Issuer></samlp:AuthnRequest>"#
        );
        assert!(matches!(
            AuthnRequest::parse(&xml),
            Err(SamlError::InvalidMessage(_))
        ));
    }
}
