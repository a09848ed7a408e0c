//! Many browsers signing in at once against one dispatcher.

use authsvc_saml::{Command, IncomingRequest, NAME_IDENTIFIER};
use chrono::Utc;
use tokio::task::JoinSet;
use url::Url;

use crate::common::TestEnv;

const FLOWS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_ins_all_complete() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();

    let mut sign_ins = JoinSet::new();
    for i in 0..FLOWS {
        let sp = env.sp.clone();
        sign_ins.spawn(async move {
            let url = Url::parse(&format!(
                "https://sp.example.com/saml2/signin?ReturnUrl=%2Fpage%2F{i}"
            ))?;
            let result = sp.run(Command::SignIn, &IncomingRequest::get(url), now);
            anyhow::ensure!(result.status.as_u16() == 303, "sign-in failed: {result:?}");
            let location = result.location.ok_or_else(|| anyhow::anyhow!("no location"))?;
            Ok::<_, anyhow::Error>((i, location))
        });
    }

    let mut responses = Vec::with_capacity(FLOWS);
    while let Some(joined) = sign_ins.join_next().await {
        let (i, location) = joined??;
        let request = env.idp.read_request(&location)?;
        let subject = format!("user{i}@example.com");
        let xml = env.idp.sign(&env.idp.response_for(&request, &subject, now))?;
        responses.push((i, env.idp.post_to_acs(&xml)?));
    }
    assert_eq!(env.sp.store().len(), FLOWS);

    let mut completions = JoinSet::new();
    for (i, post) in responses {
        let sp = env.sp.clone();
        completions.spawn(async move { (i, sp.run(Command::Acs, &post, now)) });
    }

    while let Some(joined) = completions.join_next().await {
        let (i, result) = joined?;
        assert_eq!(result.status.as_u16(), 303);
        assert_eq!(
            result.location.as_ref().map(Url::path),
            Some(format!("/page/{i}").as_str())
        );
        let claims = result.principal.expect("principal");
        assert_eq!(
            claims.first_value(NAME_IDENTIFIER),
            Some(format!("user{i}@example.com").as_str())
        );
    }
    assert!(env.sp.store().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_succeed_once() -> anyhow::Result<()> {
    let env = TestEnv::new()?;
    let now = Utc::now();

    let url = Url::parse("https://sp.example.com/saml2/signin")?;
    let result = env.sp.run(Command::SignIn, &IncomingRequest::get(url), now);
    let location = result.location.expect("redirect location");
    let request = env.idp.read_request(&location)?;
    let xml = env.idp.sign(&env.idp.response_for(&request, "alice@example.com", now))?;
    let post = env.idp.post_to_acs(&xml)?;

    let mut attempts = JoinSet::new();
    for _ in 0..16 {
        let sp = env.sp.clone();
        let post = post.clone();
        attempts.spawn(async move { sp.run(Command::Acs, &post, now).status.as_u16() });
    }

    let mut accepted = 0;
    let mut refused = 0;
    while let Some(status) = attempts.join_next().await {
        match status? {
            303 => accepted += 1,
            403 => refused += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(refused, 15);
    assert!(env.sp.store().is_empty());
    Ok(())
}
