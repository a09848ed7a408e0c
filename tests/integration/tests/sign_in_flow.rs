//! Sign-in flow tests: request building through to the released claims.

use authsvc_integration_tests::{dispatcher, StubIdp, SP_ACS_URL, SP_ENTITY_ID};
use authsvc_saml::{Command, IncomingRequest, SamlBinding, SamlError, NAME_IDENTIFIER, SAML_REQUEST_PARAM};
use chrono::Utc;
use url::Url;

use crate::common::{TestEnv, IDP_ISSUER, OTHER_ISSUER};

#[test]
fn end_to_end_sign_in() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();

    let result = env.sign_in("?ReturnUrl=%2Fprofile", now)?;
    assert_eq!(result.status.as_u16(), 303);
    assert_eq!(result.cache_control, Some("no-cache"));
    assert_eq!(env.sp.store().len(), 1);

    let location = result.location.expect("redirect location");
    assert_eq!(location.host_str(), Some("idp.example.com"));
    let params: Vec<_> = location.query_pairs().collect();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].0, SAML_REQUEST_PARAM);
    assert!(!params[0].1.is_empty());

    let request = env.idp.read_request(&location)?;
    assert_eq!(request.issuer, SP_ENTITY_ID);
    assert_eq!(request.assertion_consumer_service_url.as_deref(), Some(SP_ACS_URL));
    assert_eq!(request.protocol_binding.as_deref(), Some(SamlBinding::HttpPost.uri()));

    let xml = env.idp.sign(&env.idp.response_for(&request, "alice@example.com", now))?;
    let result = env.acs(&xml, now)?;

    assert_eq!(result.status.as_u16(), 303);
    assert_eq!(
        result.location.as_ref().map(Url::as_str),
        Some("https://sp.example.com/profile")
    );
    let claims = result.principal.expect("principal");
    assert_eq!(claims.issuer(), IDP_ISSUER);
    assert_eq!(claims.first_value(NAME_IDENTIFIER), Some("alice@example.com"));
    assert_eq!(
        claims.values("groups").map(<[String]>::to_vec),
        Some(vec!["staff".to_string(), "admins".to_string()])
    );
    assert_eq!(claims.first_value("displayName"), Some("Test User"));
    assert!(env.sp.store().is_empty());
    Ok(())
}

#[test]
fn default_provider_is_first_configured() -> anyhow::Result<()> {
    let first = StubIdp::new(OTHER_ISSUER)?;
    let second = StubIdp::new(IDP_ISSUER)?;
    let sp = dispatcher(&[&first, &second])?;

    let url = Url::parse("https://sp.example.com/saml2/signin")?;
    let result = sp.run(Command::SignIn, &IncomingRequest::get(url), Utc::now());
    let location = result.location.expect("redirect location");
    assert_eq!(location.host_str(), first.sso_url().host_str());
    Ok(())
}

#[test]
fn explicit_issuer_selects_provider() -> anyhow::Result<()> {
    let first = StubIdp::new(OTHER_ISSUER)?;
    let second = StubIdp::new(IDP_ISSUER)?;
    let sp = dispatcher(&[&first, &second])?;

    let url = Url::parse("https://sp.example.com/saml2/signin?issuer=https%253A%252F%252Fidp.example.com")?;
    let result = sp.run(Command::SignIn, &IncomingRequest::get(url), Utc::now());
    let location = result.location.expect("redirect location");
    assert_eq!(location.host_str(), Some("idp.example.com"));
    Ok(())
}

#[test]
fn unknown_issuer_creates_no_pending_request() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let url = Url::parse("https://sp.example.com/saml2/signin?issuer=https%3A%2F%2Fnobody.example.com")?;
    let request = IncomingRequest::get(url);

    let err = env
        .sp
        .execute(Command::SignIn, &request, Utc::now())
        .expect_err("unknown issuer must fail");
    assert_eq!(err, SamlError::UnknownIssuer("https://nobody.example.com".to_string()));
    assert!(env.sp.store().is_empty());
    Ok(())
}

#[test]
fn post_binding_provider_gets_auto_submit_form() -> anyhow::Result<()> {
    let idp = StubIdp::new(IDP_ISSUER)?.with_post_binding();
    let sp = dispatcher(&[&idp])?;

    let url = Url::parse("https://sp.example.com/saml2/signin")?;
    let result = sp.run(Command::SignIn, &IncomingRequest::get(url), Utc::now());

    assert_eq!(result.status.as_u16(), 200);
    assert_eq!(result.content_type, Some("text/html"));
    let html = result.content.expect("form body");
    assert!(html.contains(r#"action="https://idp.example.com/sso""#));
    assert!(html.contains(r#"name="SAMLRequest""#));
    assert_eq!(sp.store().len(), 1);
    Ok(())
}

#[test]
fn foreign_return_url_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let result = env.sign_in("?ReturnUrl=https%3A%2F%2Fevil.example.com%2F", Utc::now())?;
    assert_eq!(result.status.as_u16(), 400);
    assert!(env.sp.store().is_empty());
    Ok(())
}

#[test]
fn unrecognized_requests_are_not_found() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let url = Url::parse("https://sp.example.com/saml2/other")?;
    let request = IncomingRequest::post(url, Vec::new());

    assert_eq!(env.sp.dispatch(&request, Utc::now()).status.as_u16(), 404);
    assert_eq!(
        env.sp.run(Command::from_name("logout"), &request, Utc::now()).status.as_u16(),
        404
    );
    Ok(())
}
