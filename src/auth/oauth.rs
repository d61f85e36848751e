//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;

use super::middleware::MaybeUser;
use super::session::{SESSION_COOKIE, Session, create_session_token, removal_cookie, session_cookie};
use crate::AppState;
use crate::config::{AppConfig, GitHubOAuthConfig};
use crate::error::AppError;
use crate::service::{AccountService, ProviderProfile};

/// Cookie holding the CSRF state between redirect and callback
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Scopes requested from GitHub
const GITHUB_SCOPE: &str = "read:user user:email";

/// Lifetime of the CSRF state cookie
const STATE_MAX_AGE_MINUTES: i64 = 10;

/// Create authentication router
///
/// Routes:
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/github/callback - OAuth callback
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/github", get(github_redirect))
        .route("/auth/github/callback", get(github_callback))
        .route("/logout", get(logout))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// GET /auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let github = &state.config.auth.github;

    let location = url::Url::parse_with_params(
        &github.authorize_url,
        &[
            ("client_id", github.client_id.as_str()),
            ("redirect_uri", state.config.oauth_redirect_uri().as_str()),
            ("scope", GITHUB_SCOPE),
            ("state", csrf_state.as_str()),
        ],
    )
    .map_err(|e| AppError::Config(format!("invalid GitHub authorize URL: {}", e)))?;

    let jar = jar.add(state_cookie(csrf_state, &state.config));
    Ok((jar, Redirect::to(location.as_str())))
}

/// Query parameters from GitHub callback
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user denied access
    error: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user profile from GitHub
/// 4. Find or create the local user
/// 5. Create session and set cookie
/// 6. Redirect to dashboard
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GitHubCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let sign_in = match complete_sign_in(&state, &query, &jar).await {
        Ok(sign_in) => sign_in,
        Err(error) => {
            crate::metrics::record_login("failed");
            return Err(error);
        }
    };

    let session = Session::for_user(&sign_in.user, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;

    crate::metrics::record_login(if sign_in.created {
        "new_user"
    } else {
        "returning_user"
    });
    tracing::info!(
        user_id = session.user_id,
        username = %session.username,
        "User logged in"
    );

    let jar = jar
        .add(session_cookie(token, &state.config))
        .remove(removal_cookie(OAUTH_STATE_COOKIE));
    Ok((jar, Redirect::to("/dashboard")))
}

async fn complete_sign_in(
    state: &AppState,
    query: &GitHubCallbackQuery,
    jar: &CookieJar,
) -> Result<crate::service::SignIn, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::OAuth(format!("GitHub authorization failed: {}", error)));
    }

    verify_csrf_state(query.state.as_deref(), jar)?;

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::OAuth("missing authorization code".to_string()))?;

    let access_token = exchange_code(
        &state.http_client,
        &state.config.auth.github,
        code,
        &state.config.oauth_redirect_uri(),
    )
    .await?;
    let profile = fetch_profile(
        &state.http_client,
        &state.config.auth.github.api_base_url,
        &access_token,
    )
    .await?;

    AccountService::new(state.db.clone()).sign_in(&profile).await
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Expires the session and OAuth state cookies and redirects home.
async fn logout(MaybeUser(session): MaybeUser, jar: CookieJar) -> impl IntoResponse {
    if let Some(session) = session {
        tracing::info!(user_id = session.user_id, username = %session.username, "User logged out");
    }

    let jar = jar
        .remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(OAUTH_STATE_COOKIE));
    (jar, Redirect::to("/"))
}

// =============================================================================
// GitHub API client
// =============================================================================

/// GitHub token response
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Entry of GET /user/emails
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

fn oauth_error(context: &str) -> impl FnOnce(reqwest::Error) -> AppError + '_ {
    move |e| AppError::OAuth(format!("{}: {}", context, e))
}

/// Exchange an authorization code for an access token
pub async fn exchange_code(
    http: &reqwest::Client,
    github: &GitHubOAuthConfig,
    code: &str,
    redirect_uri: &str,
) -> Result<String, AppError> {
    let response: GitHubTokenResponse = http
        .post(&github.token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", github.client_id.as_str()),
            ("client_secret", github.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(oauth_error("token exchange failed"))?
        .json()
        .await
        .map_err(oauth_error("invalid token response"))?;

    match response {
        GitHubTokenResponse {
            access_token: Some(token),
            ..
        } if !token.is_empty() => Ok(token),
        GitHubTokenResponse {
            error,
            error_description,
            ..
        } => Err(AppError::OAuth(format!(
            "token exchange rejected: {}",
            error_description
                .or(error)
                .unwrap_or_else(|| "no access token".to_string())
        ))),
    }
}

/// Fetch the signed-in GitHub user's profile
///
/// Private emails are resolved through `/user/emails`, falling back to
/// the user's noreply address.
pub async fn fetch_profile(
    http: &reqwest::Client,
    api_base_url: &str,
    access_token: &str,
) -> Result<ProviderProfile, AppError> {
    let api = api_base_url.trim_end_matches('/');

    let user: GitHubUser = http
        .get(format!("{}/user", api))
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(oauth_error("failed to fetch GitHub user"))?
        .json()
        .await
        .map_err(oauth_error("invalid GitHub user response"))?;

    let email = match user.email.filter(|email| !email.is_empty()) {
        Some(email) => email,
        None => primary_email(http, api, access_token)
            .await?
            .unwrap_or_else(|| format!("{}+{}@users.noreply.github.com", user.id, user.login)),
    };

    Ok(ProviderProfile {
        provider_id: user.id.to_string(),
        name: user
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user.login.clone()),
        nickname: user.login,
        email,
        avatar_url: user.avatar_url,
    })
}

async fn primary_email(
    http: &reqwest::Client,
    api: &str,
    access_token: &str,
) -> Result<Option<String>, AppError> {
    let emails: Vec<GitHubEmail> = http
        .get(format!("{}/user/emails", api))
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(oauth_error("failed to fetch GitHub emails"))?
        .json()
        .await
        .map_err(oauth_error("invalid GitHub emails response"))?;

    Ok(emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn state_cookie(value: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.should_use_secure_cookies())
        .max_age(time::Duration::minutes(STATE_MAX_AGE_MINUTES))
        .build()
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|cookie| cookie.value());

    match (state, expected) {
        (Some(state), Some(expected)) if !state.is_empty() && state == expected => Ok(()),
        _ => Err(AppError::OAuth("OAuth state mismatch".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_state_is_random_url_safe() {
        let a = generate_csrf_state();
        let b = generate_csrf_state();

        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(a, b);
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        let jar = CookieJar::new().add(Cookie::new(OAUTH_STATE_COOKIE, "expected"));

        assert!(verify_csrf_state(Some("expected"), &jar).is_ok());
        assert!(matches!(
            verify_csrf_state(Some("other"), &jar),
            Err(AppError::OAuth(_))
        ));
        assert!(verify_csrf_state(None, &jar).is_err());
        assert!(verify_csrf_state(Some("expected"), &CookieJar::new()).is_err());
    }

    fn unreachable_github(addr: &str) -> GitHubOAuthConfig {
        GitHubOAuthConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            authorize_url: format!("http://{addr}/login/oauth/authorize"),
            token_url: format!("http://{addr}/login/oauth/access_token"),
            api_base_url: format!("http://{addr}"),
        }
    }

    #[tokio::test]
    async fn transport_failures_are_oauth_errors() {
        // Bind then drop so nothing listens on the port
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .to_string();
        let github = unreachable_github(&addr);
        let http = reqwest::Client::new();

        let exchange = exchange_code(&http, &github, "code", "http://localhost/cb").await;
        assert!(matches!(
            exchange,
            Err(AppError::OAuth(message)) if message.starts_with("token exchange failed")
        ));

        let profile = fetch_profile(&http, &github.api_base_url, "token").await;
        assert!(matches!(
            profile,
            Err(AppError::OAuth(message)) if message.starts_with("failed to fetch GitHub user")
        ));
    }

    #[test]
    fn empty_state_never_matches() {
        let jar = CookieJar::new().add(Cookie::new(OAUTH_STATE_COOKIE, ""));
        assert!(verify_csrf_state(Some(""), &jar).is_err());
    }
}
