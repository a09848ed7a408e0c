//! Signing keys and certificate-backed verifying keys.
//!
//! A [`VerifyingKey`] is the trust anchor for one identity provider. It is
//! built from that provider's X.509 certificate and never from key material
//! carried inside a message.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    rsa::KeySize,
    signature::{
        self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm,
        ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
        ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};
use base64::Engine;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey as SubjectPublicKey;

use crate::algorithm::{EcCurve, SignatureScheme};
use crate::error::{CryptoError, CryptoResult};

/// Kind of public key held by a [`VerifyingKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA key, stored as a DER `RSAPublicKey`.
    Rsa,
    /// EC key on the given curve, stored as an uncompressed point.
    Ec(EcCurve),
}

/// Public key used to verify signatures from one issuer.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    kind: KeyKind,
    key: Vec<u8>,
    key_id: String,
}

impl VerifyingKey {
    /// Builds a key from certificate text: PEM, or base64-encoded DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not decode to a certificate with a
    /// supported public key.
    pub fn from_certificate(text: &str) -> CryptoResult<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with("-----BEGIN") {
            return Self::from_certificate_pem(trimmed);
        }

        let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CryptoError::InvalidCertificate(format!("invalid base64: {e}")))?;
        Self::from_certificate_der(&der)
    }

    /// Builds a key from a PEM-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM block or the certificate is invalid.
    pub fn from_certificate_pem(pem: &str) -> CryptoResult<Self> {
        let (_, block) = parse_x509_pem(pem.as_bytes())
            .map_err(|e| CryptoError::InvalidCertificate(format!("invalid PEM: {e}")))?;
        if block.label != "CERTIFICATE" {
            return Err(CryptoError::InvalidCertificate(format!(
                "expected CERTIFICATE block, found {}",
                block.label
            )));
        }
        Self::from_certificate_der(&block.contents)
    }

    /// Builds a key from a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed or carries a key
    /// type other than RSA or EC on P-256, P-384 or P-521.
    pub fn from_certificate_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("failed to parse: {e}")))?;

        let spki = cert.public_key();
        let key = spki.subject_public_key.data.to_vec();

        let kind = match spki.parsed() {
            Ok(SubjectPublicKey::RSA(_)) => KeyKind::Rsa,
            Ok(SubjectPublicKey::EC(_)) => {
                let curve = EcCurve::from_point_len(key.len()).ok_or_else(|| {
                    CryptoError::UnsupportedAlgorithm(format!(
                        "EC point of {} bytes",
                        key.len()
                    ))
                })?;
                KeyKind::Ec(curve)
            }
            Ok(_) => {
                return Err(CryptoError::UnsupportedAlgorithm(
                    "certificate key is neither RSA nor EC".to_string(),
                ))
            }
            Err(e) => return Err(CryptoError::InvalidCertificate(e.to_string())),
        };

        Ok(Self::new(kind, key))
    }

    /// Builds an RSA key from a DER `RSAPublicKey`.
    #[must_use]
    pub fn rsa_from_der(der: &[u8]) -> Self {
        Self::new(KeyKind::Rsa, der.to_vec())
    }

    fn new(kind: KeyKind, key: Vec<u8>) -> Self {
        let key_id = generate_key_id(&key);
        Self { kind, key, key_id }
    }

    /// Returns the key kind.
    #[must_use]
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns a short identifier derived from the key, for logging.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Verifies `sig` over `data`.
    ///
    /// ECDSA signatures use the fixed-width `r || s` encoding of XML-DSig.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedAlgorithm`] if the scheme does not
    /// fit the key, and [`CryptoError::Verification`] if the signature is bad.
    pub fn verify(&self, scheme: SignatureScheme, data: &[u8], sig: &[u8]) -> CryptoResult<()> {
        let alg: &'static dyn VerificationAlgorithm = match (self.kind, scheme) {
            (KeyKind::Rsa, SignatureScheme::RsaSha1) => {
                &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
            }
            (KeyKind::Rsa, SignatureScheme::RsaSha256) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (KeyKind::Rsa, SignatureScheme::RsaSha384) => &signature::RSA_PKCS1_2048_8192_SHA384,
            (KeyKind::Rsa, SignatureScheme::RsaSha512) => &signature::RSA_PKCS1_2048_8192_SHA512,
            (KeyKind::Ec(EcCurve::P256), SignatureScheme::EcdsaSha256) => {
                &signature::ECDSA_P256_SHA256_FIXED
            }
            (KeyKind::Ec(EcCurve::P384), SignatureScheme::EcdsaSha384) => {
                &signature::ECDSA_P384_SHA384_FIXED
            }
            (KeyKind::Ec(EcCurve::P521), SignatureScheme::EcdsaSha512) => {
                &signature::ECDSA_P521_SHA512_FIXED
            }
            (kind, scheme) => {
                return Err(CryptoError::UnsupportedAlgorithm(format!(
                    "{scheme:?} cannot be used with a {kind:?} key"
                )))
            }
        };

        UnparsedPublicKey::new(alg, &self.key)
            .verify(data, sig)
            .map_err(|_| CryptoError::Verification)
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("kind", &self.kind)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

enum KeyPairInner {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

/// Private key that produces signatures under a fixed scheme.
pub struct SigningKey {
    inner: KeyPairInner,
    scheme: SignatureScheme,
}

impl SigningKey {
    /// Loads an RSA key from PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if `scheme` is not an RSA scheme or the key is invalid.
    pub fn rsa_from_pkcs8(pkcs8_der: &[u8], scheme: SignatureScheme) -> CryptoResult<Self> {
        ensure_rsa(scheme)?;
        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?;
        Ok(Self {
            inner: KeyPairInner::Rsa(key_pair),
            scheme,
        })
    }

    /// Generates a fresh 2048-bit RSA key.
    ///
    /// # Errors
    ///
    /// Returns an error if `scheme` is not an RSA scheme or generation fails.
    pub fn generate_rsa(scheme: SignatureScheme) -> CryptoResult<Self> {
        ensure_rsa(scheme)?;
        let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA: {e}")))?;
        Ok(Self {
            inner: KeyPairInner::Rsa(key_pair),
            scheme,
        })
    }

    /// Loads an ECDSA key from PKCS#8 DER. The curve picks the scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not on P-256, P-384 or P-521.
    pub fn ecdsa_from_pkcs8(pkcs8_der: &[u8]) -> CryptoResult<Self> {
        let candidates = [
            (&ECDSA_P256_SHA256_FIXED_SIGNING, EcCurve::P256),
            (&ECDSA_P384_SHA384_FIXED_SIGNING, EcCurve::P384),
            (&ECDSA_P521_SHA512_FIXED_SIGNING, EcCurve::P521),
        ];

        for (alg, curve) in candidates {
            if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(alg, pkcs8_der) {
                return Ok(Self {
                    inner: KeyPairInner::Ecdsa(key_pair),
                    scheme: SignatureScheme::ecdsa_for(curve),
                });
            }
        }

        Err(CryptoError::InvalidKey(
            "not a PKCS#8 EC key on a supported curve".to_string(),
        ))
    }

    /// Returns the scheme used by [`SigningKey::sign`].
    ///
    /// SHA-1 schemes are accepted for verification only; signing with one
    /// fails.
    #[must_use]
    pub const fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let rng = SystemRandom::new();

        match &self.inner {
            KeyPairInner::Rsa(key_pair) => {
                let padding = match self.scheme {
                    SignatureScheme::RsaSha256 => &signature::RSA_PKCS1_SHA256,
                    SignatureScheme::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                    SignatureScheme::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                    other => {
                        return Err(CryptoError::UnsupportedAlgorithm(format!(
                            "{other:?} with an RSA key"
                        )))
                    }
                };
                let mut out = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &rng, data, &mut out)
                    .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(out)
            }
            KeyPairInner::Ecdsa(key_pair) => {
                let sig = key_pair
                    .sign(&rng, data)
                    .map_err(|e| CryptoError::Signing(format!("ECDSA signing failed: {e}")))?;
                Ok(sig.as_ref().to_vec())
            }
        }
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match &self.inner {
            KeyPairInner::Rsa(key_pair) => VerifyingKey::rsa_from_der(key_pair.public_key().as_ref()),
            KeyPairInner::Ecdsa(key_pair) => {
                let point = key_pair.public_key().as_ref().to_vec();
                let curve = match self.scheme {
                    SignatureScheme::EcdsaSha384 => EcCurve::P384,
                    SignatureScheme::EcdsaSha512 => EcCurve::P521,
                    _ => EcCurve::P256,
                };
                VerifyingKey::new(KeyKind::Ec(curve), point)
            }
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

fn ensure_rsa(scheme: SignatureScheme) -> CryptoResult<()> {
    if scheme.is_rsa() {
        Ok(())
    } else {
        Err(CryptoError::UnsupportedAlgorithm(format!(
            "{scheme:?} is not an RSA scheme"
        )))
    }
}

/// Generates a key ID from the public key bytes.
fn generate_key_id(public_key: &[u8]) -> String {
    let hash = crate::sha256(public_key);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&hash[..8])
}
