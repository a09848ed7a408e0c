//! SAML Name ID types.

use serde::{Deserialize, Serialize};

use super::{escape, NameIdFormat};
use crate::xml::Element;

/// SAML Name ID: the identifier of the subject of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    /// Creates a new email name ID.
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self::new(email).with_format(NameIdFormat::Email)
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Returns the parsed format, if it is one of the known formats.
    #[must_use]
    pub fn parsed_format(&self) -> Option<NameIdFormat> {
        self.format.as_deref().and_then(NameIdFormat::from_uri)
    }

    pub(crate) fn from_element(el: &Element) -> Self {
        Self {
            value: el.text().trim().to_string(),
            format: el.attribute("Format").map(str::to_string),
        }
    }

    pub(crate) fn to_xml(&self) -> String {
        match self.format {
            Some(ref format) => format!(
                r#"<saml:NameID Format="{}">{}</saml:NameID>"#,
                escape(format),
                escape(&self.value)
            ),
            None => format!("<saml:NameID>{}</saml:NameID>", escape(&self.value)),
        }
    }
}

impl std::fmt::Display for NameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}
