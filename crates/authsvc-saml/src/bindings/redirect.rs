//! HTTP-Redirect binding.

use std::borrow::Cow;
use std::io::{Read, Write};

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use url::Url;

use super::IncomingRequest;
use crate::commands::CommandResult;
use crate::error::{SamlError, SamlResult};

/// Upper bound on an inflated message.
const MAX_INFLATED_LEN: u64 = 1024 * 1024;

pub(super) fn encode(message: &str, destination: &Url, param_name: &str) -> SamlResult<CommandResult> {
    if message.is_empty() {
        return Err(SamlError::InvalidArgument("message"));
    }
    if param_name.is_empty() {
        return Err(SamlError::InvalidArgument("param_name"));
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(message.as_bytes())
        .map_err(|e| SamlError::Format(format!("deflate failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SamlError::Format(format!("deflate failed: {e}")))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);

    let separator = if destination.query().is_some() { '&' } else { '?' };
    let location = format!(
        "{destination}{separator}{}={}",
        urlencoding::encode(param_name),
        urlencoding::encode(&encoded)
    );
    let location = Url::parse(&location).map_err(|_| SamlError::InvalidArgument("destination"))?;

    Ok(CommandResult::redirect(location))
}

pub(super) fn decode(request: &IncomingRequest, param_name: &str) -> SamlResult<String> {
    let encoded = raw_query_param(&request.url, param_name)
        .ok_or_else(|| SamlError::Format(format!("missing {param_name} query parameter")))?;

    let compressed = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_INFLATED_LEN + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| SamlError::Format(format!("invalid deflate stream: {e}")))?;
    if inflated.len() as u64 > MAX_INFLATED_LEN {
        return Err(SamlError::Format("inflated message too large".to_string()));
    }

    String::from_utf8(inflated).map_err(|e| SamlError::Format(format!("invalid UTF-8: {e}")))
}

/// Reads a query parameter with percent-decoding only. A literal `+` stays a
/// `+`, since unencoded base64 is common in the wild.
pub(super) fn raw_query_param<'u>(url: &'u Url, name: &str) -> Option<Cow<'u, str>> {
    url.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).ok()?;
        (key == name).then(|| urlencoding::decode(value).ok()).flatten()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request_for(location: &Url) -> IncomingRequest {
        IncomingRequest::get(location.clone())
    }

    #[test]
    fn encode_produces_single_parameter_redirect() {
        let dest = Url::parse("https://idp.example.com/sso").unwrap();
        let result = encode("<samlp:AuthnRequest/>", &dest, "SAMLRequest").unwrap();

        assert_eq!(result.status, StatusCode::SEE_OTHER);
        let location = result.location.unwrap();
        assert_eq!(location.path(), "/sso");
        let params: Vec<_> = location.query_pairs().collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "SAMLRequest");
        assert!(!params[0].1.is_empty());

        assert_eq!(
            decode(&request_for(&location), "SAMLRequest").unwrap(),
            "<samlp:AuthnRequest/>"
        );
    }

    #[test]
    fn encode_appends_to_existing_query() {
        let dest = Url::parse("https://idp.example.com/sso?tenant=a").unwrap();
        let location = encode("x", &dest, "SAMLRequest").unwrap().location.unwrap();
        let names: Vec<_> = location.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(names, ["tenant", "SAMLRequest"]);
    }

    #[test]
    fn encode_rejects_empty_arguments() {
        let dest = Url::parse("https://idp.example.com/sso").unwrap();
        assert_eq!(
            encode("", &dest, "SAMLRequest").unwrap_err(),
            SamlError::InvalidArgument("message")
        );
        assert_eq!(
            encode("x", &dest, "").unwrap_err(),
            SamlError::InvalidArgument("param_name")
        );
    }

    #[test]
    fn raw_query_param_keeps_literal_plus() {
        let url = Url::parse("https://sp.example.com/?a=1&SAMLRequest=ab+c%2Bd%3D").unwrap();
        assert_eq!(raw_query_param(&url, "SAMLRequest").as_deref(), Some("ab+c+d="));
        assert_eq!(raw_query_param(&url, "a").as_deref(), Some("1"));
        assert!(raw_query_param(&url, "b").is_none());
    }

    #[test]
    fn decode_failures_are_format_errors() {
        for query in ["", "?SAMLRequest=%%%", "?SAMLRequest=bm90IGRlZmxhdGU="] {
            let url = Url::parse(&format!("https://sp.example.com/{query}")).unwrap();
            assert!(
                matches!(decode(&request_for(&url), "SAMLRequest"), Err(SamlError::Format(_))),
                "query {query:?}"
            );
        }
    }
}
