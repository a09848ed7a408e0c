//! # authsvc-crypto
//!
//! Digest and signature primitives for authsvc, built on aws-lc-rs.
//!
//! ## Supported algorithms
//!
//! - RSA PKCS#1 v1.5 with SHA-256, SHA-384 and SHA-512
//! - ECDSA on P-256, P-384 and P-521 with the matching SHA-2 digest
//! - RSA with SHA-1 and the SHA-1 digest, for legacy identity providers only
//!
//! Trust anchors are X.509 certificates. Only the subject public key is
//! used; chain building and revocation are left to whoever provisions the
//! certificate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod keys;

pub use algorithm::{EcCurve, HashAlgorithm, SignatureScheme};
pub use error::{CryptoError, CryptoResult};
pub use hash::{digest, sha256};
pub use keys::{SigningKey, VerifyingKey};
