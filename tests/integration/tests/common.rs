//! Common test fixtures.

use authsvc_integration_tests::{dispatcher, init_tracing, StubIdp};
use authsvc_saml::{Command, CommandDispatcher, CommandResult, IncomingRequest};
use chrono::{DateTime, TimeZone, Utc};
use url::Url;

pub const IDP_ISSUER: &str = "https://idp.example.com";
pub const OTHER_ISSUER: &str = "https://other-idp.example.com";

/// One service provider trusting one stub identity provider.
pub struct TestEnv {
    pub idp: StubIdp,
    pub sp: CommandDispatcher,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        init_tracing();
        let idp = StubIdp::new(IDP_ISSUER)?;
        let sp = dispatcher(&[&idp])?;
        Ok(Self { idp, sp })
    }

    /// Runs the sign-in command and returns its result.
    pub fn sign_in(&self, query: &str, now: DateTime<Utc>) -> anyhow::Result<CommandResult> {
        let url = Url::parse(&format!("https://sp.example.com/saml2/signin{query}"))?;
        Ok(self.sp.run(Command::SignIn, &IncomingRequest::get(url), now))
    }

    /// Posts a signed response to the ACS.
    pub fn acs(&self, xml: &str, now: DateTime<Utc>) -> anyhow::Result<CommandResult> {
        Ok(self.sp.run(Command::Acs, &self.idp.post_to_acs(xml)?, now))
    }
}

/// A fixed instant on a whole second, for boundary tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().unwrap_or_else(Utc::now)
}
