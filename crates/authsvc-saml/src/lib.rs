//! SAML 2.0 service provider protocol engine.
//!
//! Sends authentication requests to trusted identity providers and validates
//! the responses that come back, releasing the asserted claims only after the
//! signature, correlation and conditions checks all pass.
//!
//! # Architecture
//!
//! - [`types`] - SAML messages and the released [`ClaimSet`]
//! - [`xml`] - namespace-aware XML tree and canonicalization
//! - [`signature`] - enveloped XML-DSig validation and signing
//! - [`bindings`] - HTTP-Redirect and HTTP-POST transport
//! - [`registry`] - trusted identity providers
//! - [`store`] - pending request correlation
//! - [`sign_in`] - the request builder
//! - [`validator`] - the response validation pipeline
//! - [`commands`] - sign-in, ACS and not-found commands
//! - [`http`] - axum response mapping and router
//!
//! # Example
//!
//! ```rust,ignore
//! use authsvc_saml::{Command, CommandDispatcher, IncomingRequest};
//!
//! let dispatcher = CommandDispatcher::from_config(&config)?;
//! let result = dispatcher.run(Command::SignIn, &IncomingRequest::get(url), Utc::now());
//! ```
//!
//! # Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod commands;
pub mod error;
pub mod http;
pub mod options;
pub mod registry;
pub mod sign_in;
pub mod signature;
pub mod store;
pub mod types;
pub mod validator;
pub mod xml;

pub use bindings::IncomingRequest;
pub use commands::{Command, CommandDispatcher, CommandResult};
pub use error::{SamlError, SamlResult};
pub use http::{saml_router, SamlState};
pub use options::SpOptions;
pub use registry::{IdentityProvider, IdentityProviderRegistry};
pub use sign_in::RequestBuilder;
pub use signature::{XmlSignatureValidator, XmlSigner};
pub use store::{InMemoryPendingRequestStore, PendingCorrelation, PendingRequestStore};
pub use types::*;
pub use validator::{ResponseValidator, ValidatedResponse};
