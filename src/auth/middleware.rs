//! Authentication middleware
//!
//! Protects routes that require a signed-in user.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session, verify_session_token};
use crate::AppState;

/// Where anonymous visitors of gated routes are sent
pub const LOGIN_PATH: &str = "/login";

/// Read the session cookie, if any, and verify it
fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<Session> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(SESSION_COOKIE)?;
    verify_session_token(cookie.value(), secret)
}

/// Middleware to require a session
///
/// Verifies the session cookie. Anonymous requests are redirected to the
/// login page and never reach the handler; otherwise the `Session` is
/// added to request extensions.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/dashboard", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_session));
/// ```
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session) =
        session_from_headers(request.headers(), &state.config.auth.session_secret)
    else {
        tracing::debug!(path = %request.uri().path(), "No session; redirecting to login");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Extractor for the signed-in user's session
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let state = AppState::from_ref(state);
        let session = session_from_headers(&parts.headers, &state.config.auth.session_secret)
            .ok_or_else(|| Redirect::to(LOGIN_PATH))?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}

/// Optional current user extractor
///
/// Returns None if not signed in, instead of rejecting.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let state = AppState::from_ref(state);
        let session = session_from_headers(&parts.headers, &state.config.auth.session_secret);

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}
