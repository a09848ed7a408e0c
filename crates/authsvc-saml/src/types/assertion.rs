//! SAML Assertion types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    check_version, escape, expired_at, format_instant, optional_instant, parse_instant,
    required_attr, NameId, BEARER_CONFIRMATION, SAML_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML Assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier of the assertion.
    pub id: String,

    /// Time the assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// Entity ID of the issuing identity provider.
    pub issuer: String,

    /// The subject of the assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Validity window and audience restrictions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Attributes from every attribute statement, in document order.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Assertion {
    /// Creates a new assertion issued now.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            subject: None,
            conditions: None,
            attributes: Vec::new(),
        }
    }

    /// Creates a new assertion with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the issue instant.
    #[must_use]
    pub const fn issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Reads a `saml:Assertion` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if required parts are missing or
    /// malformed.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAML_NS, "Assertion") {
            return Err(SamlError::InvalidMessage(format!(
                "expected Assertion, found {}",
                el.qualified_name()
            )));
        }
        check_version(el)?;

        let id = required_attr(el, "ID")?.to_string();
        let issue_instant = parse_instant(required_attr(el, "IssueInstant")?, "IssueInstant")?;
        let issuer = el
            .child(SAML_NS, "Issuer")
            .map(|i| i.text().trim().to_string())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| SamlError::InvalidMessage("Assertion has no Issuer".to_string()))?;

        let subject = el.child(SAML_NS, "Subject").map(Subject::from_element).transpose()?;
        let conditions = el
            .child(SAML_NS, "Conditions")
            .map(Conditions::from_element)
            .transpose()?;

        let mut attributes = Vec::new();
        for statement in el.children_named(SAML_NS, "AttributeStatement") {
            for attr in statement.children_named(SAML_NS, "Attribute") {
                attributes.push(Attribute::from_element(attr)?);
            }
        }

        Ok(Self {
            id,
            issue_instant,
            issuer,
            subject,
            conditions,
            attributes,
        })
    }

    /// Writes the assertion as a standalone XML element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<saml:Assertion xmlns:saml="{SAML_NS}" ID="{}" IssueInstant="{}" Version="2.0"><saml:Issuer>{}</saml:Issuer>"#,
            escape(&self.id),
            format_instant(&self.issue_instant),
            escape(&self.issuer)
        );
        if let Some(ref subject) = self.subject {
            xml.push_str(&subject.to_xml());
        }
        if let Some(ref conditions) = self.conditions {
            xml.push_str(&conditions.to_xml());
        }
        if !self.attributes.is_empty() {
            xml.push_str("<saml:AttributeStatement>");
            for attr in &self.attributes {
                xml.push_str(&attr.to_xml());
            }
            xml.push_str("</saml:AttributeStatement>");
        }
        xml.push_str("</saml:Assertion>");
        xml
    }
}

/// SAML Subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier.
    pub name_id: NameId,

    /// Bearer confirmation data, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<SubjectConfirmationData>,
}

impl Subject {
    /// Creates a subject with the given name ID.
    #[must_use]
    pub const fn new(name_id: NameId) -> Self {
        Self {
            name_id,
            confirmation: None,
        }
    }

    /// Adds bearer confirmation data.
    #[must_use]
    pub fn with_confirmation(mut self, data: SubjectConfirmationData) -> Self {
        self.confirmation = Some(data);
        self
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        let name_id = el
            .child(SAML_NS, "NameID")
            .map(NameId::from_element)
            .filter(|n| !n.value.is_empty())
            .ok_or_else(|| SamlError::InvalidMessage("Subject has no NameID".to_string()))?;

        let confirmation = el
            .children_named(SAML_NS, "SubjectConfirmation")
            .find(|c| c.attribute("Method") == Some(BEARER_CONFIRMATION))
            .and_then(|c| c.child(SAML_NS, "SubjectConfirmationData"))
            .map(SubjectConfirmationData::from_element)
            .transpose()?;

        Ok(Self {
            name_id,
            confirmation,
        })
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from("<saml:Subject>");
        xml.push_str(&self.name_id.to_xml());
        if let Some(ref data) = self.confirmation {
            xml.push_str(&format!(
                r#"<saml:SubjectConfirmation Method="{BEARER_CONFIRMATION}">{}</saml:SubjectConfirmation>"#,
                data.to_xml()
            ));
        }
        xml.push_str("</saml:Subject>");
        xml
    }
}

/// Bearer subject confirmation data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// ID of the request this assertion answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// URL the assertion may be delivered to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// Time after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl SubjectConfirmationData {
    /// Creates confirmation data bound to a request and recipient.
    #[must_use]
    pub fn for_request(request_id: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            in_response_to: Some(request_id.into()),
            recipient: Some(recipient.into()),
            not_on_or_after: None,
        }
    }

    /// Sets the expiry.
    #[must_use]
    pub const fn expires_at(mut self, instant: DateTime<Utc>) -> Self {
        self.not_on_or_after = Some(instant);
        self
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            in_response_to: el.attribute("InResponseTo").map(str::to_string),
            recipient: el.attribute("Recipient").map(str::to_string),
            not_on_or_after: optional_instant(el, "NotOnOrAfter")?,
        })
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from("<saml:SubjectConfirmationData");
        if let Some(ref id) = self.in_response_to {
            xml.push_str(&format!(r#" InResponseTo="{}""#, escape(id)));
        }
        if let Some(ref t) = self.not_on_or_after {
            xml.push_str(&format!(r#" NotOnOrAfter="{}""#, format_instant(t)));
        }
        if let Some(ref r) = self.recipient {
            xml.push_str(&format!(r#" Recipient="{}""#, escape(r)));
        }
        xml.push_str("/>");
        xml
    }
}

/// Assertion conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Earliest time the assertion is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at which the assertion stops being valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions. Each inner list is one `AudienceRestriction`.
    #[serde(default)]
    pub audience_restrictions: Vec<Vec<String>>,
}

impl Conditions {
    /// Creates conditions valid from `now` for `lifetime`.
    #[must_use]
    pub fn valid_for(now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            not_before: Some(now),
            not_on_or_after: Some(now + lifetime),
            audience_restrictions: Vec::new(),
        }
    }

    /// Adds an audience to the first audience restriction.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        match self.audience_restrictions.first_mut() {
            Some(restriction) => restriction.push(audience.into()),
            None => self.audience_restrictions.push(vec![audience.into()]),
        }
        self
    }

    /// Checks the validity window, widened by `skew` on both ends.
    ///
    /// The upper bound is inclusive once skew is applied: an assertion whose
    /// `NotOnOrAfter` is exactly `skew` in the past is still accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::AssertionExpired`] if `now` is outside the window.
    pub fn check_validity(&self, now: DateTime<Utc>, skew: Duration) -> SamlResult<()> {
        if let Some(not_before) = self.not_before {
            if now.checked_add_signed(skew).is_some_and(|late| late < not_before) {
                return Err(SamlError::AssertionExpired(format!(
                    "not valid before {}",
                    format_instant(&not_before)
                )));
            }
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            if expired_at(not_on_or_after, now, skew) {
                return Err(SamlError::AssertionExpired(format!(
                    "expired at {}",
                    format_instant(&not_on_or_after)
                )));
            }
        }
        Ok(())
    }

    /// Returns true if `audience` satisfies every audience restriction and
    /// at least one restriction is present.
    #[must_use]
    pub fn allows_audience(&self, audience: &str) -> bool {
        !self.audience_restrictions.is_empty()
            && self
                .audience_restrictions
                .iter()
                .all(|r| r.iter().any(|a| a == audience))
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        let audience_restrictions = el
            .children_named(SAML_NS, "AudienceRestriction")
            .map(|r| {
                r.children_named(SAML_NS, "Audience")
                    .map(|a| a.text().trim().to_string())
                    .collect()
            })
            .collect();

        Ok(Self {
            not_before: optional_instant(el, "NotBefore")?,
            not_on_or_after: optional_instant(el, "NotOnOrAfter")?,
            audience_restrictions,
        })
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from("<saml:Conditions");
        if let Some(ref t) = self.not_before {
            xml.push_str(&format!(r#" NotBefore="{}""#, format_instant(t)));
        }
        if let Some(ref t) = self.not_on_or_after {
            xml.push_str(&format!(r#" NotOnOrAfter="{}""#, format_instant(t)));
        }
        xml.push('>');
        for restriction in &self.audience_restrictions {
            xml.push_str("<saml:AudienceRestriction>");
            for audience in restriction {
                xml.push_str(&format!("<saml:Audience>{}</saml:Audience>", escape(audience)));
            }
            xml.push_str("</saml:AudienceRestriction>");
        }
        xml.push_str("</saml:Conditions>");
        xml
    }
}

/// SAML Attribute with its values in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,

    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Values.
    #[serde(default)]
    pub values: Vec<String>,
}

impl Attribute {
    /// Creates a single-valued attribute.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::multi(name, vec![value.into()])
    }

    /// Creates a multi-valued attribute.
    #[must_use]
    pub fn multi(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            values,
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            name: required_attr(el, "Name")?.to_string(),
            friendly_name: el.attribute("FriendlyName").map(str::to_string),
            values: el
                .children_named(SAML_NS, "AttributeValue")
                .map(|v| v.text().trim().to_string())
                .collect(),
        })
    }

    fn to_xml(&self) -> String {
        let mut xml = format!(r#"<saml:Attribute Name="{}""#, escape(&self.name));
        if let Some(ref friendly) = self.friendly_name {
            xml.push_str(&format!(r#" FriendlyName="{}""#, escape(friendly)));
        }
        xml.push('>');
        for value in &self.values {
            xml.push_str(&format!(
                "<saml:AttributeValue>{}</saml:AttributeValue>",
                escape(value)
            ));
        }
        xml.push_str("</saml:Attribute>");
        xml
    }
}
