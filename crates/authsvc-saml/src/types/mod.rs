//! SAML 2.0 types and data structures.
//!
//! Messages are read from the parsed [`Element`](crate::xml::Element) tree
//! with `from_element` and written with `to_xml`. Writing exists for the
//! outgoing `AuthnRequest` and for test identity providers; the service
//! provider itself never writes a `Response`.

mod assertion;
mod authn_request;
mod claims;
mod constants;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use claims::*;
pub use constants::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

use std::borrow::Cow;

use chrono::{DateTime, Duration, Utc};

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// Formats an instant as `xs:dateTime` in UTC.
pub(crate) fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Returns true if `now` is past `instant` by more than `skew`. An instant
/// too far in the future to add the skew to never expires.
pub(crate) fn expired_at(instant: DateTime<Utc>, now: DateTime<Utc>, skew: Duration) -> bool {
    instant
        .checked_add_signed(skew)
        .is_some_and(|limit| now > limit)
}

/// Parses an `xs:dateTime` value.
pub(crate) fn parse_instant(value: &str, what: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SamlError::InvalidMessage(format!("invalid {what} '{value}': {e}")))
}

pub(crate) fn optional_instant(el: &Element, attr: &str) -> SamlResult<Option<DateTime<Utc>>> {
    el.attribute(attr).map(|v| parse_instant(v, attr)).transpose()
}

pub(crate) fn required_attr<'a>(el: &'a Element, attr: &str) -> SamlResult<&'a str> {
    el.attribute(attr).filter(|v| !v.is_empty()).ok_or_else(|| {
        SamlError::InvalidMessage(format!("{} is missing {attr}", el.local_name()))
    })
}

pub(crate) fn check_version(el: &Element) -> SamlResult<()> {
    match el.attribute("Version") {
        Some(SAML_VERSION) => Ok(()),
        other => Err(SamlError::InvalidMessage(format!(
            "unsupported SAML version: {}",
            other.unwrap_or("none")
        ))),
    }
}

pub(crate) fn escape(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}
