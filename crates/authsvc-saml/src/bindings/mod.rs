//! SAML bindings implementation.
//!
//! - **HTTP-Redirect** - deflated, base64-encoded and URL-encoded into a query
//!   parameter of a `303 See Other` location.
//! - **HTTP-POST** - base64-encoded into a hidden field of an auto-submitting
//!   HTML form.
//!
//! Bindings only transport messages. They never look at the pending request
//! store or the identity provider registry and never trust what they decode.
//!
//! ```rust,ignore
//! use authsvc_saml::{IncomingRequest, SamlBinding};
//!
//! let result = SamlBinding::HttpRedirect.encode(&xml, &destination, "SAMLRequest")?;
//! let xml = SamlBinding::HttpPost.decode(&request, "SAMLResponse")?;
//! ```

mod post;
mod redirect;

use axum::http::Method;
use url::Url;

use crate::commands::CommandResult;
use crate::error::SamlResult;
use crate::types::SamlBinding;

/// The parts of an inbound HTTP request the engine reads.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Request method.
    pub method: Method,
    /// Full request URL, including the query.
    pub url: Url,
    /// Decoded form fields of a POST body, in order.
    pub form: Vec<(String, String)>,
}

impl IncomingRequest {
    /// Creates a GET request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: Vec::new(),
        }
    }

    /// Creates a POST request with already decoded form fields.
    #[must_use]
    pub const fn post(url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url,
            form,
        }
    }

    /// Creates a POST request from an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn post_form_urlencoded(url: Url, body: &str) -> Self {
        let form = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        Self::post(url, form)
    }

    /// Returns the first form-decoded query parameter with the given name.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Returns the first form field with the given name.
    #[must_use]
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl SamlBinding {
    /// Encodes `message` for delivery to `destination` under `param_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::InvalidArgument`] if `message` or
    /// `param_name` is empty.
    pub fn encode(
        &self,
        message: &str,
        destination: &Url,
        param_name: &str,
    ) -> SamlResult<CommandResult> {
        match self {
            Self::HttpRedirect => redirect::encode(message, destination, param_name),
            Self::HttpPost => post::encode(message, destination, param_name),
        }
    }

    /// Extracts the message carried in `param_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Format`] if the parameter is absent or any
    /// decoding stage rejects it.
    pub fn decode(&self, request: &IncomingRequest, param_name: &str) -> SamlResult<String> {
        match self {
            Self::HttpRedirect => redirect::decode(request, param_name),
            Self::HttpPost => post::decode(request, param_name),
        }
    }

    /// Returns true if `request` has the shape this binding decodes.
    /// Nothing is decoded.
    #[must_use]
    pub fn can_decode(&self, request: &IncomingRequest, param_name: &str) -> bool {
        match self {
            Self::HttpRedirect => {
                request.method == Method::GET && redirect::raw_query_param(&request.url, param_name).is_some()
            }
            Self::HttpPost => request.method == Method::POST && request.form_field(param_name).is_some(),
        }
    }
}
