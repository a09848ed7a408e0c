//! SAML Status types.

use serde::{Deserialize, Serialize};

use super::{escape, required_attr, status_codes, SAMLP_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::new(status_codes::SUCCESS),
            status_message: None,
        }
    }

    /// Creates a requester error status.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::REQUESTER),
            status_message: Some(message.into()),
        }
    }

    /// Creates a responder error status.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::RESPONDER),
            status_message: Some(message.into()),
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.value == status_codes::SUCCESS
    }

    /// Reads a `samlp:Status` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if the status code is missing.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        let code = el
            .child(SAMLP_NS, "StatusCode")
            .ok_or_else(|| SamlError::InvalidMessage("Status has no StatusCode".to_string()))?;
        let status_message = el
            .child(SAMLP_NS, "StatusMessage")
            .map(|m| m.text().trim().to_string());

        Ok(Self {
            status_code: StatusCode::from_element(code)?,
            status_message,
        })
    }

    /// Writes the status as XML using the `samlp` prefix.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<samlp:Status>");
        xml.push_str(&self.status_code.to_xml());
        if let Some(ref message) = self.status_message {
            xml.push_str("<samlp:StatusMessage>");
            xml.push_str(&escape(message));
            xml.push_str("</samlp:StatusMessage>");
        }
        xml.push_str("</samlp:Status>");
        xml
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}

/// SAML status code, optionally with a nested sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// The status code URI value.
    pub value: String,

    /// Optional nested status code providing more detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a new status code with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    /// Adds a nested status code.
    #[must_use]
    pub fn with_sub_code(mut self, value: impl Into<String>) -> Self {
        self.status_code = Some(Box::new(Self::new(value)));
        self
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        let value = required_attr(el, "Value")?.to_string();
        let status_code = el
            .child(SAMLP_NS, "StatusCode")
            .map(Self::from_element)
            .transpose()?
            .map(Box::new);
        Ok(Self { value, status_code })
    }

    fn to_xml(&self) -> String {
        match self.status_code {
            Some(ref sub) => format!(
                r#"<samlp:StatusCode Value="{}">{}</samlp:StatusCode>"#,
                escape(&self.value),
                sub.to_xml()
            ),
            None => format!(r#"<samlp:StatusCode Value="{}"/>"#, escape(&self.value)),
        }
    }
}
