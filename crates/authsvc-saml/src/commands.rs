//! Commands and their results.
//!
//! A [`CommandResult`] is the single output shape of every command. The host
//! maps it onto its HTTP response; [`crate::http`] does that for axum.

use std::sync::Arc;

use authsvc_core::Config;
use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::bindings::IncomingRequest;
use crate::error::{SamlError, SamlResult};
use crate::options::SpOptions;
use crate::registry::IdentityProviderRegistry;
use crate::sign_in::RequestBuilder;
use crate::store::{InMemoryPendingRequestStore, PendingRequestStore};
use crate::types::{ClaimSet, SamlBinding, SAML_REQUEST_PARAM, SAML_RESPONSE_PARAM};
use crate::validator::ResponseValidator;

/// Query parameter naming the identity provider to sign in with.
pub const ISSUER_PARAM: &str = "issuer";

/// Query or form parameter naming where to go after sign-in.
pub const RETURN_URL_PARAM: &str = "ReturnUrl";

/// The outcome of a command, independent of any HTTP framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// HTTP status.
    pub status: StatusCode,
    /// Redirect target.
    pub location: Option<Url>,
    /// Response body.
    pub content: Option<String>,
    /// Body content type.
    pub content_type: Option<&'static str>,
    /// `Cache-Control` directive.
    pub cache_control: Option<&'static str>,
    /// The signed-in principal, after a successful response.
    pub principal: Option<ClaimSet>,
}

impl CommandResult {
    fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            location: None,
            content: None,
            content_type: None,
            cache_control: None,
            principal: None,
        }
    }

    /// A `303 See Other` redirect.
    #[must_use]
    pub fn redirect(location: Url) -> Self {
        Self {
            location: Some(location),
            ..Self::with_status(StatusCode::SEE_OTHER)
        }
    }

    /// A `200 OK` HTML page.
    #[must_use]
    pub fn html(content: String) -> Self {
        Self {
            content: Some(content),
            content_type: Some("text/html"),
            ..Self::with_status(StatusCode::OK)
        }
    }

    /// A `404 Not Found`.
    #[must_use]
    pub fn not_found() -> Self {
        Self::with_status(StatusCode::NOT_FOUND)
    }

    /// Maps an error to a result. The body is the bare reason phrase; error
    /// details stay in the logs.
    #[must_use]
    pub fn from_error(error: &SamlError) -> Self {
        let status = StatusCode::from_u16(error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            content: Some(status.canonical_reason().unwrap_or("Error").to_string()),
            content_type: Some("text/plain"),
            cache_control: Some("no-cache"),
            ..Self::with_status(status)
        }
    }

    /// Forbids caching.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.cache_control = Some("no-cache");
        self
    }

    /// Attaches the signed-in principal.
    #[must_use]
    pub fn with_principal(mut self, claims: ClaimSet) -> Self {
        self.principal = Some(claims);
        self
    }
}

/// Commands the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Begin sign-in: send an `AuthnRequest` to an identity provider.
    SignIn,
    /// Assertion consumer service: validate a posted response.
    Acs,
    /// Anything else.
    NotFound,
}

impl Command {
    /// Resolves a command by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("signin") {
            Self::SignIn
        } else if name.eq_ignore_ascii_case("acs") {
            Self::Acs
        } else {
            Self::NotFound
        }
    }

    /// Picks a command from the shape of the request.
    #[must_use]
    pub fn for_request(request: &IncomingRequest) -> Self {
        if SamlBinding::HttpPost.can_decode(request, SAML_RESPONSE_PARAM) {
            Self::Acs
        } else if request.method == Method::GET
            && !SamlBinding::HttpRedirect.can_decode(request, SAML_RESPONSE_PARAM)
            && !SamlBinding::HttpRedirect.can_decode(request, SAML_REQUEST_PARAM)
        {
            Self::SignIn
        } else {
            Self::NotFound
        }
    }
}

/// Runs commands against one configured service provider.
///
/// Cheap to clone; clones share the pending request store.
#[derive(Clone)]
pub struct CommandDispatcher {
    options: Arc<SpOptions>,
    registry: Arc<IdentityProviderRegistry>,
    store: Arc<dyn PendingRequestStore>,
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        options: SpOptions,
        registry: IdentityProviderRegistry,
        store: Arc<dyn PendingRequestStore>,
    ) -> Self {
        Self {
            options: Arc::new(options),
            registry: Arc::new(registry),
            store,
        }
    }

    /// Builds a dispatcher with an in-memory pending request store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &Config) -> SamlResult<Self> {
        let registry = IdentityProviderRegistry::from_config(config)?;
        let options = SpOptions::from_config(&config.service_provider)?;
        let store = Arc::new(InMemoryPendingRequestStore::new(options.pending_request_ttl));
        Ok(Self::new(options, registry, store))
    }

    /// Returns the service provider options.
    #[must_use]
    pub fn options(&self) -> &SpOptions {
        &self.options
    }

    /// Returns the identity provider registry.
    #[must_use]
    pub fn registry(&self) -> &IdentityProviderRegistry {
        &self.registry
    }

    /// Returns the pending request store.
    #[must_use]
    pub fn store(&self) -> &dyn PendingRequestStore {
        self.store.as_ref()
    }

    /// Returns a request builder over this dispatcher's state.
    #[must_use]
    pub fn request_builder(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(&self.options, &self.registry, self.store.as_ref())
    }

    /// Returns a response validator over this dispatcher's state.
    #[must_use]
    pub fn response_validator(&self) -> ResponseValidator<'_> {
        ResponseValidator::new(&self.options, &self.registry, self.store.as_ref())
    }

    /// Runs a command.
    ///
    /// # Errors
    ///
    /// Returns the command's typed failure.
    pub fn execute(
        &self,
        command: Command,
        request: &IncomingRequest,
        now: DateTime<Utc>,
    ) -> SamlResult<CommandResult> {
        match command {
            Command::SignIn => self.sign_in(request, now),
            Command::Acs => self.acs(request, now),
            Command::NotFound => Ok(CommandResult::not_found()),
        }
    }

    /// Runs a command and turns failures into error results.
    #[must_use]
    pub fn run(&self, command: Command, request: &IncomingRequest, now: DateTime<Utc>) -> CommandResult {
        self.execute(command, request, now).unwrap_or_else(|e| {
            // ACS failures are logged where they are detected.
            if command != Command::Acs {
                warn!(?command, error = %e, "command failed");
            }
            CommandResult::from_error(&e)
        })
    }

    /// Picks the command from the request shape and runs it.
    #[must_use]
    pub fn dispatch(&self, request: &IncomingRequest, now: DateTime<Utc>) -> CommandResult {
        let command = Command::for_request(request);
        debug!(?command, method = %request.method, "dispatching");
        self.run(command, request, now)
    }

    fn sign_in(&self, request: &IncomingRequest, now: DateTime<Utc>) -> SamlResult<CommandResult> {
        let issuer = request
            .query_param(ISSUER_PARAM)
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.issuer_from_param(raw));
        let return_url = resolve_return_url(request)?;
        self.request_builder()
            .begin(issuer.as_deref(), return_url, now)
    }

    /// Clients may percent-encode the issuer twice. The once-decoded value
    /// wins when it names a configured provider.
    fn issuer_from_param(&self, raw: String) -> String {
        if self.registry.get(&raw).is_ok() {
            return raw;
        }
        match urlencoding::decode(&raw) {
            Ok(decoded) if decoded != raw => decoded.into_owned(),
            _ => raw,
        }
    }

    fn acs(&self, request: &IncomingRequest, now: DateTime<Utc>) -> SamlResult<CommandResult> {
        let xml = SamlBinding::HttpPost
            .decode(request, SAML_RESPONSE_PARAM)
            .inspect_err(|e| warn!(error = %e, "SAML response could not be decoded"))?;
        let validated = self.response_validator().validate(&xml, now)?;
        Ok(CommandResult::redirect(validated.return_url)
            .no_cache()
            .with_principal(validated.claims))
    }
}

/// Resolves `ReturnUrl` against the request URL. Only same-origin targets
/// are followed; without a value the origin root is used.
fn resolve_return_url(request: &IncomingRequest) -> SamlResult<Url> {
    let raw = request
        .query_param(RETURN_URL_PARAM)
        .or_else(|| request.form_field(RETURN_URL_PARAM).map(str::to_string))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/".to_string());

    let resolved = request
        .url
        .join(&raw)
        .map_err(|_| SamlError::InvalidArgument("ReturnUrl"))?;
    if resolved.origin() != request.url.origin() {
        return Err(SamlError::InvalidArgument("ReturnUrl"));
    }
    Ok(resolved)
}
