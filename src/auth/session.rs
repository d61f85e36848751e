//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::data::User;
use crate::error::AppError;

/// Name of the cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "user_session";

/// User session data
///
/// Stored in a signed cookie. Identifies the local user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Local user row id
    pub user_id: i64,
    /// Username at sign-in time
    pub username: String,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user` lasting `max_age_seconds`
    pub fn for_user(user: &User, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user.id,
            username: user.username.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

fn signer(secret: &str) -> Result<HmacSha256, AppError> {
    use hmac::Mac;

    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Encryption(e.to_string()))
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut mac = signer(secret)?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// Returns `None` for anything that is not a live session: bad shape,
/// bad signature, undecodable payload or an expired session. An anonymous
/// visitor is normal control flow, not an error.
pub fn verify_session_token(token: &str, secret: &str) -> Option<Session> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let (payload_b64, signature_b64) = token.split_once('.')?;
    if signature_b64.contains('.') {
        return None;
    }

    let signature = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    let mut mac = signer(secret).ok()?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature).ok()?;

    let payload = general_purpose::URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let session: Session = serde_json::from_slice(&payload).ok()?;

    if session.is_expired() {
        return None;
    }

    Some(session)
}

/// Build the session cookie for a signed token
pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.should_use_secure_cookies())
        .max_age(time::Duration::seconds(config.auth.session_max_age))
        .build()
}

/// Cookie that expires the session immediately
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn session(expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            user_id: 42,
            username: "octocat".to_string(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn token_round_trips_with_same_secret() {
        let original = session(Duration::hours(1));
        let token = create_session_token(&original, SECRET).unwrap();

        let decoded = verify_session_token(&token, SECRET).expect("valid token");
        assert_eq!(decoded, original);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_session_token(&session(Duration::hours(1)), SECRET).unwrap();
        assert!(verify_session_token(&token, "another-secret-another-secret-xx").is_none());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        use base64::{Engine as _, engine::general_purpose};

        let token = create_session_token(&session(Duration::hours(1)), SECRET).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = session(Duration::hours(1));
        forged.user_id = 1;
        let forged_payload = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_string(&forged).unwrap().as_bytes());

        let forged_token = format!("{}.{}", forged_payload, signature);
        assert!(verify_session_token(&forged_token, SECRET).is_none());
    }

    #[test]
    fn expired_session_is_rejected() {
        let token = create_session_token(&session(Duration::seconds(-5)), SECRET).unwrap();
        assert!(verify_session_token(&token, SECRET).is_none());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(verify_session_token("", SECRET).is_none());
        assert!(verify_session_token("no-dot", SECRET).is_none());
        assert!(verify_session_token("a.b.c", SECRET).is_none());
        assert!(verify_session_token("!!!.???", SECRET).is_none());
    }
}
