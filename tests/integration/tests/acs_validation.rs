//! Assertion consumer service rejections.

use authsvc_integration_tests::{dispatcher, StubIdp, SP_ENTITY_ID};
use authsvc_saml::{
    status_codes, AuthnRequest, Command, CommandDispatcher, Conditions, Response, SamlError,
    Status,
};
use chrono::{DateTime, Duration, Utc};

use crate::common::{fixed_now, TestEnv, IDP_ISSUER, OTHER_ISSUER};

/// Starts a sign-in against the default provider and returns the request
/// the identity provider received.
fn begin(sp: &CommandDispatcher, idp: &StubIdp, now: DateTime<Utc>) -> anyhow::Result<AuthnRequest> {
    let url = url::Url::parse("https://sp.example.com/saml2/signin")?;
    let result = sp.run(Command::SignIn, &authsvc_saml::IncomingRequest::get(url), now);
    anyhow::ensure!(result.status.as_u16() == 303, "sign-in failed: {result:?}");
    let location = result.location.ok_or_else(|| anyhow::anyhow!("no location"))?;
    idp.read_request(&location)
}

#[test]
fn replayed_response_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();
    let request = begin(&env.sp, &env.idp, now)?;
    let xml = env.idp.sign(&env.idp.response_for(&request, "alice@example.com", now))?;

    assert_eq!(env.acs(&xml, now)?.status.as_u16(), 303);

    let replay = env.acs(&xml, now)?;
    assert_eq!(replay.status.as_u16(), 403);
    assert_eq!(replay.content.as_deref(), Some("Forbidden"));
    assert!(replay.principal.is_none());

    let err = env
        .sp
        .response_validator()
        .validate(&xml, now)
        .expect_err("replay must fail");
    assert!(matches!(err, SamlError::UnsolicitedOrReplayedResponse(_)));
    Ok(())
}

#[test]
fn unsolicited_response_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();
    let request = AuthnRequest::new(SP_ENTITY_ID);
    let xml = env.idp.sign(&env.idp.response_for(&request, "alice@example.com", now))?;

    let err = env
        .sp
        .response_validator()
        .validate(&xml, now)
        .expect_err("unsolicited response must fail");
    assert!(matches!(err, SamlError::UnsolicitedOrReplayedResponse(_)));
    Ok(())
}

#[test]
fn response_signed_with_another_key_is_untrusted() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let impostor = StubIdp::new(IDP_ISSUER)?;
    let now = Utc::now();
    let request = begin(&env.sp, &env.idp, now)?;
    let xml = impostor.sign(&impostor.response_for(&request, "mallory@example.com", now))?;

    let err = env
        .sp
        .response_validator()
        .validate(&xml, now)
        .expect_err("foreign key must fail");
    assert!(matches!(err, SamlError::UntrustedResponse(_)));
    // rejected before correlation
    assert_eq!(env.sp.store().len(), 1);
    Ok(())
}

#[test]
fn tampered_response_is_untrusted() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();
    let request = begin(&env.sp, &env.idp, now)?;
    let xml = env.idp.sign(&env.idp.response_for(&request, "alice@example.com", now))?;
    let tampered = xml.replace("alice@example.com", "mallory@example.com");
    assert_ne!(xml, tampered);

    let result = env.acs(&tampered, now)?;
    assert_eq!(result.status.as_u16(), 403);
    assert!(result.principal.is_none());
    Ok(())
}

#[test]
fn response_from_another_provider_is_an_issuer_mismatch() -> anyhow::Result<()> {
    let first = StubIdp::new(IDP_ISSUER)?;
    let second = StubIdp::new(OTHER_ISSUER)?;
    let sp = dispatcher(&[&first, &second])?;
    let now = Utc::now();

    let request = begin(&sp, &first, now)?;
    let xml = second.sign(&second.response_for(&request, "alice@example.com", now))?;

    let err = sp
        .response_validator()
        .validate(&xml, now)
        .expect_err("issuer mismatch must fail");
    assert_eq!(
        err,
        SamlError::IssuerMismatch {
            expected: IDP_ISSUER.to_string(),
            actual: OTHER_ISSUER.to_string(),
        }
    );
    assert!(sp.store().is_empty());
    Ok(())
}

#[test]
fn expiry_honors_clock_skew_boundary() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = fixed_now();

    // NotOnOrAfter exactly one skew in the past is still accepted.
    let request = begin(&env.sp, &env.idp, now)?;
    let conditions = Conditions::valid_for(now - Duration::minutes(10), Duration::minutes(5))
        .with_audience(SP_ENTITY_ID);
    let response = env
        .idp
        .response_with_conditions(&request, "alice@example.com", conditions, now);
    assert_eq!(env.acs(&env.idp.sign(&response)?, now)?.status.as_u16(), 303);

    // One second later it is not.
    let request = begin(&env.sp, &env.idp, now)?;
    let conditions = Conditions::valid_for(
        now - Duration::minutes(10) - Duration::seconds(1),
        Duration::minutes(5),
    )
    .with_audience(SP_ENTITY_ID);
    let response = env
        .idp
        .response_with_conditions(&request, "alice@example.com", conditions, now);
    let err = env
        .sp
        .response_validator()
        .validate(&env.idp.sign(&response)?, now)
        .expect_err("expired assertion must fail");
    assert!(matches!(err, SamlError::AssertionExpired(_)));
    Ok(())
}

#[test]
fn not_yet_valid_assertion_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = fixed_now();
    let request = begin(&env.sp, &env.idp, now)?;
    let conditions = Conditions::valid_for(now + Duration::minutes(6), Duration::minutes(5))
        .with_audience(SP_ENTITY_ID);
    let response = env
        .idp
        .response_with_conditions(&request, "alice@example.com", conditions, now);

    let err = env
        .sp
        .response_validator()
        .validate(&env.idp.sign(&response)?, now)
        .expect_err("future assertion must fail");
    assert!(matches!(err, SamlError::AssertionExpired(_)));
    Ok(())
}

#[test]
fn assertion_for_another_audience_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();
    let request = begin(&env.sp, &env.idp, now)?;
    let conditions = Conditions::valid_for(now, Duration::minutes(5))
        .with_audience("https://other-sp.example.com");
    let response = env
        .idp
        .response_with_conditions(&request, "alice@example.com", conditions, now);

    let err = env
        .sp
        .response_validator()
        .validate(&env.idp.sign(&response)?, now)
        .expect_err("wrong audience must fail");
    assert!(matches!(err, SamlError::AudienceMismatch(_)));
    Ok(())
}

#[test]
fn identity_provider_failure_is_reported() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();
    let request = begin(&env.sp, &env.idp, now)?;
    let response = Response::error(IDP_ISSUER, Status::responder_error("account locked"))
        .in_response_to(&request.id)
        .issued_at(now);
    let xml = env.idp.sign(&response)?;

    let err = env
        .sp
        .response_validator()
        .validate(&xml, now)
        .expect_err("failure status must fail");
    match err {
        SamlError::IdpReportedFailure { status, message } => {
            assert_eq!(status, status_codes::RESPONDER);
            assert_eq!(message.as_deref(), Some("account locked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(env.acs(&xml, now)?.status.as_u16(), 403);
    Ok(())
}

#[test]
fn garbage_post_is_a_bad_request() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let url = url::Url::parse("https://sp.example.com/saml2/acs")?;
    let request = authsvc_saml::IncomingRequest::post(
        url,
        vec![("SAMLResponse".to_string(), "not base64!".to_string())],
    );
    assert_eq!(env.sp.run(Command::Acs, &request, Utc::now()).status.as_u16(), 400);
    Ok(())
}
