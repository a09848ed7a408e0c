//! XML Signature validation.
//!
//! Only enveloped signatures are accepted: the `ds:Signature` must be a
//! direct child of the element it signs, with a single `Reference` pointing
//! at that element's `ID`. The digest and signature are computed over the
//! parsed tree the caller goes on to read, so nothing outside the verified
//! element can stand in for it.

use authsvc_crypto::{digest, HashAlgorithm, SignatureScheme, VerifyingKey};
use base64::Engine;

use super::{CanonicalizationAlgorithm, ENVELOPED_SIGNATURE};
use crate::error::{SamlError, SamlResult};
use crate::types::{EXC_C14N_NS, XMLDSIG_NS};
use crate::xml::{canonicalize, Element};

/// XML signature validator bound to one trusted key.
#[derive(Debug, Clone, Copy)]
pub struct XmlSignatureValidator<'a> {
    key: &'a VerifyingKey,
    allow_sha1: bool,
}

impl<'a> XmlSignatureValidator<'a> {
    /// Creates a validator that trusts `key` only.
    #[must_use]
    pub const fn new(key: &'a VerifyingKey) -> Self {
        Self {
            key,
            allow_sha1: false,
        }
    }

    /// Allows SHA-1 digests and RSA-SHA1 signatures.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Verifies the enveloped signature of `element`.
    ///
    /// Returns `Ok(false)` if the element carries no signature and `Ok(true)`
    /// if it carries a valid one.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UntrustedResponse`] if a signature is present but
    /// malformed, uses a refused algorithm, or does not verify.
    pub fn verify_enveloped(&self, element: &Element) -> SamlResult<bool> {
        let mut signatures = element.children_named(XMLDSIG_NS, "Signature");
        let Some(signature) = signatures.next() else {
            return Ok(false);
        };
        if signatures.next().is_some() {
            return Err(untrusted("element carries more than one signature"));
        }
        let id = element
            .id()
            .ok_or_else(|| untrusted("signed element has no ID"))?;

        let signed_info = exactly_one(signature, "SignedInfo")?;
        let c14n = algorithm_of(signed_info, "CanonicalizationMethod")
            .and_then(CanonicalizationAlgorithm::from_uri)
            .ok_or_else(|| untrusted("unsupported canonicalization method"))?;
        let scheme = algorithm_of(signed_info, "SignatureMethod")
            .and_then(SignatureScheme::from_xml_dsig_uri)
            .ok_or_else(|| untrusted("unsupported signature method"))?;
        if scheme.is_legacy() && !self.allow_sha1 {
            return Err(untrusted("SHA-1 signatures are not allowed"));
        }

        let reference = exactly_one(signed_info, "Reference")?;
        let expected_uri = format!("#{id}");
        if reference.attribute("URI") != Some(expected_uri.as_str()) {
            return Err(untrusted("reference does not point at the signed element"));
        }

        let reference_c14n = reference_canonicalization(reference)?;
        let digest_alg = algorithm_of(reference, "DigestMethod")
            .and_then(HashAlgorithm::from_xml_dsig_uri)
            .ok_or_else(|| untrusted("unsupported digest method"))?;
        if digest_alg.is_legacy() && !self.allow_sha1 {
            return Err(untrusted("SHA-1 digests are not allowed"));
        }
        let expected_digest = decode_base64(
            &reference
                .child(XMLDSIG_NS, "DigestValue")
                .ok_or_else(|| untrusted("reference has no DigestValue"))?
                .text(),
        )?;

        let signed_bytes = canonicalize(element, &reference_c14n, Some(signature));
        if digest(digest_alg, signed_bytes.as_bytes()) != expected_digest {
            return Err(untrusted("digest mismatch"));
        }

        let signature_value = decode_base64(
            &signature
                .child(XMLDSIG_NS, "SignatureValue")
                .ok_or_else(|| untrusted("signature has no SignatureValue"))?
                .text(),
        )?;
        let prefixes = inclusive_prefixes(
            signed_info.child(XMLDSIG_NS, "CanonicalizationMethod"),
        );
        let canonical_signed_info = canonicalize(signed_info, &c14n.options(prefixes), None);
        self.key
            .verify(scheme, canonical_signed_info.as_bytes(), &signature_value)
            .map_err(|e| untrusted(&format!("signature verification failed: {e}")))?;

        Ok(true)
    }
}

fn untrusted(reason: &str) -> SamlError {
    SamlError::UntrustedResponse(reason.to_string())
}

fn exactly_one<'e>(parent: &'e Element, local_name: &str) -> SamlResult<&'e Element> {
    let mut found = parent
        .child_elements()
        .filter(|e| e.is(XMLDSIG_NS, local_name));
    match (found.next(), found.next()) {
        (Some(el), None) => Ok(el),
        (None, _) => Err(untrusted(&format!("missing {local_name}"))),
        (Some(_), Some(_)) => Err(untrusted(&format!("more than one {local_name}"))),
    }
}

fn algorithm_of<'e>(parent: &'e Element, local_name: &str) -> Option<&'e str> {
    parent
        .child(XMLDSIG_NS, local_name)
        .and_then(|m| m.attribute("Algorithm"))
}

fn inclusive_prefixes(method: Option<&Element>) -> Vec<String> {
    method
        .and_then(|m| m.child(EXC_C14N_NS, "InclusiveNamespaces"))
        .and_then(|n| n.attribute("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Reads the reference transforms: the enveloped-signature transform is
/// required and at most one canonicalization may follow it. Comments are
/// never part of a same-document reference digest.
fn reference_canonicalization(reference: &Element) -> SamlResult<crate::xml::C14nOptions> {
    let transforms: Vec<&Element> = reference
        .child(XMLDSIG_NS, "Transforms")
        .map(|t| t.children_named(XMLDSIG_NS, "Transform").collect())
        .unwrap_or_default();

    let mut enveloped = false;
    let mut c14n: Option<(CanonicalizationAlgorithm, Vec<String>)> = None;
    for transform in transforms {
        let algorithm = transform.attribute("Algorithm").unwrap_or_default();
        if algorithm == ENVELOPED_SIGNATURE {
            enveloped = true;
        } else if let Some(alg) = CanonicalizationAlgorithm::from_uri(algorithm) {
            if c14n.is_some() {
                return Err(untrusted("more than one canonicalization transform"));
            }
            c14n = Some((alg, inclusive_prefixes(Some(transform))));
        } else {
            return Err(untrusted("unsupported transform"));
        }
    }
    if !enveloped {
        return Err(untrusted("signature is not enveloped"));
    }

    let (alg, prefixes) = c14n.unwrap_or((CanonicalizationAlgorithm::C14n, Vec::new()));
    let mut options = alg.options(prefixes);
    options.with_comments = false;
    Ok(options)
}

fn decode_base64(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|_| untrusted("invalid base64 in signature"))
}
