//! XML Signature support for SAML.
//!
//! Enveloped XML-DSig signatures: [`XmlSignatureValidator`] checks a signature
//! against a trusted key, [`XmlSigner`] creates one.
//!
//! Supported signature algorithms are RSA-SHA256/384/512 and
//! ECDSA-SHA256/384/512. RSA-SHA1 and the SHA-1 digest are accepted only when
//! explicitly allowed.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use crate::xml::{C14nMethod, C14nOptions};

/// Enveloped signature transform URI.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Canonicalization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments.
    #[default]
    ExclusiveC14n,
    /// Exclusive C14N with comments.
    ExclusiveC14nWithComments,
    /// C14N 1.0 without comments.
    C14n,
    /// C14N 1.0 with comments.
    C14nWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14n => "http://www.w3.org/2001/10/xml-exc-c14n#",
            Self::ExclusiveC14nWithComments => "http://www.w3.org/2001/10/xml-exc-c14n#WithComments",
            Self::C14n => "http://www.w3.org/TR/2001/REC-xml-c14n-20010315",
            Self::C14nWithComments => {
                "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
            }
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::ExclusiveC14n,
            Self::ExclusiveC14nWithComments,
            Self::C14n,
            Self::C14nWithComments,
        ]
        .into_iter()
        .find(|a| a.uri() == uri)
    }

    /// Returns true for the exclusive variants.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self, Self::ExclusiveC14n | Self::ExclusiveC14nWithComments)
    }

    /// Builds canonicalization options. `inclusive_prefixes` only applies to
    /// the exclusive variants.
    #[must_use]
    pub fn options(&self, inclusive_prefixes: Vec<String>) -> C14nOptions {
        let method = if self.is_exclusive() {
            C14nMethod::Exclusive { inclusive_prefixes }
        } else {
            C14nMethod::Inclusive
        };
        C14nOptions {
            method,
            with_comments: matches!(
                self,
                Self::ExclusiveC14nWithComments | Self::C14nWithComments
            ),
        }
    }
}
