//! SAML Response types.
//!
//! Response messages sent by an identity provider to the assertion consumer
//! service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    check_version, escape, format_instant, parse_instant, required_attr, Assertion, Status,
    SAMLP_NS, SAML_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML Response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// The ID of the request this response answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The URL this response was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The entity ID of the identity provider, if the response names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Assertions carried directly by this response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl Response {
    /// Creates a new success response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            in_response_to: None,
            issue_instant: Utc::now(),
            destination: None,
            issuer: Some(issuer.into()),
            status: Status::success(),
            assertions: Vec::new(),
        }
    }

    /// Creates a new error response.
    #[must_use]
    pub fn error(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            status,
            ..Self::success(issuer)
        }
    }

    /// Sets the ID of the request this response answers.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the issue instant.
    #[must_use]
    pub const fn issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self
    }

    /// Adds an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Returns true if the status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parses a response document.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if the XML is malformed or is not
    /// a well-formed `samlp:Response`.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }

    /// Reads a `samlp:Response` element.
    ///
    /// Only assertions that are direct children of the response are read.
    /// Encrypted assertions are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if required parts are missing.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAMLP_NS, "Response") {
            return Err(SamlError::InvalidMessage(format!(
                "expected samlp:Response, found {}",
                el.qualified_name()
            )));
        }
        check_version(el)?;

        if el.child(SAML_NS, "EncryptedAssertion").is_some() {
            return Err(SamlError::InvalidMessage(
                "encrypted assertions are not supported".to_string(),
            ));
        }

        let status = el
            .child(SAMLP_NS, "Status")
            .ok_or_else(|| SamlError::InvalidMessage("Response has no Status".to_string()))
            .and_then(Status::from_element)?;

        let assertions = el
            .children_named(SAML_NS, "Assertion")
            .map(Assertion::from_element)
            .collect::<SamlResult<Vec<_>>>()?;

        Ok(Self {
            id: required_attr(el, "ID")?.to_string(),
            in_response_to: el.attribute("InResponseTo").map(str::to_string),
            issue_instant: parse_instant(required_attr(el, "IssueInstant")?, "IssueInstant")?,
            destination: el.attribute("Destination").map(str::to_string),
            issuer: el
                .child(SAML_NS, "Issuer")
                .map(|i| i.text().trim().to_string())
                .filter(|i| !i.is_empty()),
            status,
            assertions,
        })
    }

    /// Writes the response document.
    ///
    /// Nested assertions rely on the `saml` prefix declared on the root.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}""#,
            escape(&self.id)
        );
        if let Some(ref id) = self.in_response_to {
            xml.push_str(&format!(r#" InResponseTo="{}""#, escape(id)));
        }
        xml.push_str(&format!(
            r#" Version="2.0" IssueInstant="{}""#,
            format_instant(&self.issue_instant)
        ));
        if let Some(ref destination) = self.destination {
            xml.push_str(&format!(r#" Destination="{}""#, escape(destination)));
        }
        xml.push('>');
        if let Some(ref issuer) = self.issuer {
            xml.push_str(&format!("<saml:Issuer>{}</saml:Issuer>", escape(issuer)));
        }
        xml.push_str(&self.status.to_xml());
        for assertion in &self.assertions {
            xml.push_str(&assertion.to_xml());
        }
        xml.push_str("</samlp:Response>");
        xml
    }
}
