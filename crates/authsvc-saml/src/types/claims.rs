//! Claims released to the application after a response validates.

use serde::{Deserialize, Serialize};

use super::{Assertion, NameId};

/// Claim type under which the subject identifier is carried.
pub const NAME_IDENTIFIER: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";

/// A named claim with its values in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type: an attribute name, or [`NAME_IDENTIFIER`] for the subject.
    pub claim_type: String,

    /// Values.
    pub values: Vec<String>,
}

/// The identity of an authenticated principal.
///
/// The subject is always the first claim. Attributes with the same name in
/// different statements or assertions are merged into one claim, keeping
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    issuer: String,
    subject: NameId,
    claims: Vec<Claim>,
}

impl ClaimSet {
    /// Creates a claim set holding only the subject.
    #[must_use]
    pub fn new(issuer: impl Into<String>, subject: NameId) -> Self {
        let claims = vec![Claim {
            claim_type: NAME_IDENTIFIER.to_string(),
            values: vec![subject.value.clone()],
        }];
        Self {
            issuer: issuer.into(),
            subject,
            claims,
        }
    }

    /// Adds values for an attribute, merging with an existing claim.
    /// An attribute named [`NAME_IDENTIFIER`] is ignored: only the
    /// assertion subject sets that claim.
    pub fn add_attribute(&mut self, name: &str, values: &[String]) {
        if name == NAME_IDENTIFIER {
            return;
        }
        match self.claims.iter_mut().find(|c| c.claim_type == name) {
            Some(claim) => claim.values.extend_from_slice(values),
            None => self.claims.push(Claim {
                claim_type: name.to_string(),
                values: values.to_vec(),
            }),
        }
    }

    /// Adds every attribute of an assertion.
    pub fn add_assertion(&mut self, assertion: &Assertion) {
        for attr in &assertion.attributes {
            self.add_attribute(&attr.name, &attr.values);
        }
    }

    /// Returns the issuer the claims were asserted by.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the subject name ID.
    #[must_use]
    pub const fn subject(&self) -> &NameId {
        &self.subject
    }

    /// Returns all values for a claim type.
    #[must_use]
    pub fn values(&self, claim_type: &str) -> Option<&[String]> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.values.as_slice())
    }

    /// Returns the first value for a claim type.
    #[must_use]
    pub fn first_value(&self, claim_type: &str) -> Option<&str> {
        self.values(claim_type)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Iterates over claims in order.
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    /// Returns the number of claims, including the subject.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Always false: the subject claim is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
