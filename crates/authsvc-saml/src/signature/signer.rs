//! XML Signature creation.
//!
//! Produces enveloped signatures of the kind [`super::XmlSignatureValidator`]
//! accepts. Identity providers sign responses; the service provider uses this
//! only for test identity providers and tooling.

use authsvc_crypto::{digest, HashAlgorithm, SigningKey};
use base64::Engine;

use super::{CanonicalizationAlgorithm, ENVELOPED_SIGNATURE};
use crate::error::{SamlError, SamlResult};
use crate::types::{SAML_NS, XMLDSIG_NS};
use crate::xml::{canonicalize, C14nOptions, Element};

/// XML document signer.
#[derive(Debug)]
pub struct XmlSigner {
    key: SigningKey,
    certificate_der: Option<Vec<u8>>,
    canonicalization: CanonicalizationAlgorithm,
    digest: HashAlgorithm,
}

impl XmlSigner {
    /// Creates a signer using exclusive canonicalization and SHA-256 digests.
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self {
            key,
            certificate_der: None,
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14n,
            digest: HashAlgorithm::Sha256,
        }
    }

    /// Embeds the certificate in `KeyInfo`. Validators ignore it for trust.
    #[must_use]
    pub fn with_certificate(mut self, certificate_der: Vec<u8>) -> Self {
        self.certificate_der = Some(certificate_der);
        self
    }

    /// Sets the `SignedInfo` canonicalization algorithm.
    #[must_use]
    pub const fn with_canonicalization(mut self, algorithm: CanonicalizationAlgorithm) -> Self {
        self.canonicalization = algorithm;
        self
    }

    /// Sets the reference digest algorithm.
    #[must_use]
    pub const fn with_digest(mut self, algorithm: HashAlgorithm) -> Self {
        self.digest = algorithm;
        self
    }

    /// Signs the element with `ID` equal to `reference_id` and returns the
    /// whole document, serialized canonically.
    ///
    /// The signature is inserted right after the element's `saml:Issuer`, or
    /// as its first child if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidArgument`] if no element has that ID,
    /// [`SamlError::InvalidMessage`] if the document does not parse, and
    /// [`SamlError::Crypto`] if signing fails.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let mut root = Element::parse(xml)?;
        let target = root
            .find_by_id_mut(reference_id)
            .ok_or(SamlError::InvalidArgument("reference_id"))?;

        let reference_digest = digest(
            self.digest,
            canonicalize(target, &C14nOptions::exclusive(), None).as_bytes(),
        );
        let signed_info = self.signed_info(reference_id, &reference_digest);

        let mut signed_info_el = Element::parse(&signed_info)?;
        signed_info_el.inherit_namespaces(target.namespaces());
        let canonical = canonicalize(
            &signed_info_el,
            &self.canonicalization.options(Vec::new()),
            None,
        );
        let signature_value = self.key.sign(canonical.as_bytes())?;

        let engine = base64::engine::general_purpose::STANDARD;
        let mut signature = format!(
            r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{}</ds:SignatureValue>"#,
            engine.encode(signature_value)
        );
        if let Some(ref cert) = self.certificate_der {
            signature.push_str(&format!(
                "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>",
                engine.encode(cert)
            ));
        }
        signature.push_str("</ds:Signature>");

        let position = target.position_after(SAML_NS, "Issuer");
        target.insert_child(position, Element::parse(&signature)?);

        let mut options = C14nOptions::inclusive();
        options.with_comments = true;
        Ok(canonicalize(&root, &options, None))
    }

    fn signed_info(&self, reference_id: &str, reference_digest: &[u8]) -> String {
        format!(
            concat!(
                r#"<ds:SignedInfo xmlns:ds="{ns}">"#,
                r#"<ds:CanonicalizationMethod Algorithm="{c14n}"/>"#,
                r#"<ds:SignatureMethod Algorithm="{sig}"/>"#,
                r##"<ds:Reference URI="#{id}">"##,
                "<ds:Transforms>",
                r#"<ds:Transform Algorithm="{enveloped}"/>"#,
                r#"<ds:Transform Algorithm="{exc}"/>"#,
                "</ds:Transforms>",
                r#"<ds:DigestMethod Algorithm="{digest}"/>"#,
                "<ds:DigestValue>{value}</ds:DigestValue>",
                "</ds:Reference>",
                "</ds:SignedInfo>"
            ),
            ns = XMLDSIG_NS,
            c14n = self.canonicalization.uri(),
            sig = self.key.scheme().xml_dsig_uri(),
            id = quick_xml::escape::escape(reference_id),
            enveloped = ENVELOPED_SIGNATURE,
            exc = CanonicalizationAlgorithm::ExclusiveC14n.uri(),
            digest = self.digest.xml_dsig_uri(),
            value = base64::engine::general_purpose::STANDARD.encode(reference_digest),
        )
    }
}
