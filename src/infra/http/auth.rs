//! Resolves the requester from a session token and gates author-only routes.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::application::accounts::{AuthError, Identity};
use crate::application::error::repo_error_to_http;

use super::{found, public::HttpState};

/// The requester of the current request, anonymous when no valid token was sent.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Identity>);

impl CurrentUser {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|identity| identity.username.as_str())
    }
}

pub async fn resolve_identity(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let current = match session_token(request.headers(), &state.auth.session_cookie) {
        Some(token) => match state.accounts.authenticate(&token).await {
            Ok(identity) => CurrentUser(Some(identity)),
            // A failed lookup is not the same as no session.
            Err(AuthError::Unavailable(err)) => {
                warn!(
                    target = "yatube::http::auth",
                    error = %err,
                    "session lookup failed"
                );
                return repo_error_to_http("infra::http::auth::resolve_identity", &err)
                    .into_response();
            }
            Err(err) => {
                debug!(
                    target = "yatube::http::auth",
                    error = %err,
                    "ignoring unusable session token"
                );
                CurrentUser::default()
            }
        },
        None => CurrentUser::default(),
    };

    request.extensions_mut().insert(current.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(current);
    response
}

/// Anonymous requests are sent to the login page, carrying where they were headed.
/// Signed-in requests continue with their [`Identity`] as an extension.
pub async fn require_identity(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|user| user.identity().cloned());
    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
        return next.run(request).await;
    }

    let destination = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    found(login_redirect(&state.auth.login_url, &destination))
}

fn login_redirect(login_url: &str, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}{query}")
}

fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
