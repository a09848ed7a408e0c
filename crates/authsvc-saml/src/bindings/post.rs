//! HTTP-POST binding.

use axum::http::Method;
use base64::Engine;
use url::Url;

use super::IncomingRequest;
use crate::commands::CommandResult;
use crate::error::{SamlError, SamlResult};

pub(super) fn encode(message: &str, destination: &Url, param_name: &str) -> SamlResult<CommandResult> {
    if message.is_empty() {
        return Err(SamlError::InvalidArgument("message"));
    }
    if param_name.is_empty() {
        return Err(SamlError::InvalidArgument("param_name"));
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(message);
    Ok(CommandResult::html(auto_submit_form(
        destination.as_str(),
        param_name,
        &encoded,
    )))
}

pub(super) fn decode(request: &IncomingRequest, param_name: &str) -> SamlResult<String> {
    if request.method != Method::POST {
        return Err(SamlError::Format(format!(
            "POST binding requires POST, got {}",
            request.method
        )));
    }
    let encoded = request
        .form_field(param_name)
        .ok_or_else(|| SamlError::Format(format!("missing {param_name} form field")))?;

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    String::from_utf8(bytes).map_err(|e| SamlError::Format(format!("invalid UTF-8: {e}")))
}

fn auto_submit_form(action: &str, name: &str, value: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN"
"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
<body onload="document.forms[0].submit()">
<noscript>
<p>
<strong>Note:</strong> Since your browser does not support JavaScript, 
you must press the Continue button once to proceed.
</p>
</noscript>
<form action="{}" 
method="post">
<div>
<input type="hidden" name="{}" 
value="{}"/>
</div>
<noscript>
<div>
<input type="submit" value="Continue"/>
</div>
</noscript>
</form>
</body>
</html>"#,
        html_escape(action),
        html_escape(name),
        html_escape(value)
    )
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn post_with(value: &str) -> IncomingRequest {
        IncomingRequest::post(
            Url::parse("https://sp.example.com/acs").unwrap(),
            vec![("SAMLResponse".to_string(), value.to_string())],
        )
    }

    #[test]
    fn encode_renders_auto_submit_form() {
        let dest = Url::parse("http://www.example.com/acs").unwrap();
        let result = encode("<root><content>data</content></root>", &dest, "SAMLMessageName").unwrap();

        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.content_type, Some("text/html"));
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\"
\"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">
<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\">
<body onload=\"document.forms[0].submit()\">
<noscript>
<p>
<strong>Note:</strong> Since your browser does not support JavaScript, 
you must press the Continue button once to proceed.
</p>
</noscript>
<form action=\"http://www.example.com/acs\" 
method=\"post\">
<div>
<input type=\"hidden\" name=\"SAMLMessageName\" 
value=\"PHJvb3Q+PGNvbnRlbnQ+ZGF0YTwvY29udGVudD48L3Jvb3Q+\"/>
</div>
<noscript>
<div>
<input type=\"submit\" value=\"Continue\"/>
</div>
</noscript>
</form>
</body>
</html>";
        assert_eq!(result.content.as_deref(), Some(expected));
    }

    #[test]
    fn action_is_escaped() {
        let dest = Url::parse("https://idp.example.com/sso?a=1&b=2").unwrap();
        let html = encode("x", &dest, "SAMLRequest").unwrap().content.unwrap();
        assert!(html.contains(r#"action="https://idp.example.com/sso?a=1&amp;b=2""#));
    }

    #[test]
    fn encode_rejects_empty_arguments() {
        let dest = Url::parse("http://host").unwrap();
        assert_eq!(
            encode("", &dest, "-").unwrap_err(),
            SamlError::InvalidArgument("message")
        );
        assert_eq!(
            encode("-", &dest, "").unwrap_err(),
            SamlError::InvalidArgument("param_name")
        );
    }

    #[test]
    fn decode_reads_form_field() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("responsestring");
        assert_eq!(decode(&post_with(&encoded), "SAMLResponse").unwrap(), "responsestring");
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(matches!(
            decode(&post_with("foo"), "SAMLResponse"),
            Err(SamlError::Format(_))
        ));
        assert!(matches!(
            decode(&post_with("Zm9v"), "SAMLRequest"),
            Err(SamlError::Format(_))
        ));
        let get = IncomingRequest::get(Url::parse("https://sp.example.com/acs?SAMLResponse=Zm9v").unwrap());
        assert!(matches!(decode(&get, "SAMLResponse"), Err(SamlError::Format(_))));
    }
}
