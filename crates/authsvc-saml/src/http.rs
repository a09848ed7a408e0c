//! axum integration.
//!
//! [`CommandResult`] converts into an axum response, and [`saml_router`]
//! exposes the commands under `/saml2/{command}`:
//!
//! ```rust,ignore
//! let state = SamlState::new(CommandDispatcher::from_config(&config)?, base_url);
//! let app = Router::new().merge(saml_router()).with_state(state);
//! ```
//!
//! A successful ACS response carries the [`ClaimSet`](crate::types::ClaimSet) in the response
//! extensions so host middleware can establish the application session.

use axum::body::Body;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use url::Url;

use crate::bindings::IncomingRequest;
use crate::commands::{Command, CommandDispatcher, CommandResult};
use crate::error::SamlError;

impl IntoResponse for CommandResult {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.content.unwrap_or_default()));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if let Some(location) = self.location {
            if let Ok(value) = HeaderValue::from_str(location.as_str()) {
                headers.insert(header::LOCATION, value);
            }
        }
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        if let Some(cache_control) = self.cache_control {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
        }
        if let Some(principal) = self.principal {
            response.extensions_mut().insert(principal);
        }
        response
    }
}

/// Router state: the dispatcher and the public URL the router is mounted at.
#[derive(Clone)]
pub struct SamlState {
    dispatcher: CommandDispatcher,
    base_url: Url,
}

impl SamlState {
    /// Creates router state. `base_url` is the externally visible origin,
    /// used to resolve relative return URLs.
    #[must_use]
    pub const fn new(dispatcher: CommandDispatcher, base_url: Url) -> Self {
        Self {
            dispatcher,
            base_url,
        }
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }
}

/// Creates the SAML router.
///
/// | Method   | Path               | Command                   |
/// |----------|--------------------|---------------------------|
/// | GET/POST | `/saml2/{command}` | [`Command::from_name`]    |
pub fn saml_router() -> Router<SamlState> {
    Router::new().route("/saml2/{command}", get(handle_command).post(handle_command))
}

/// Runs the named command.
pub async fn handle_command(
    State(state): State<SamlState>,
    Path(command): Path<String>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    body: String,
) -> CommandResult {
    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let Ok(url) = state.base_url.join(path) else {
        return CommandResult::from_error(&SamlError::InvalidArgument("url"));
    };

    let request = if method == Method::POST {
        IncomingRequest::post_form_urlencoded(url, &body)
    } else {
        IncomingRequest {
            method,
            url,
            form: Vec::new(),
        }
    };
    state
        .dispatcher
        .run(Command::from_name(&command), &request, Utc::now())
}
