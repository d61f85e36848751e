//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth flow
//! - Session management
//! - Access-control gate

mod middleware;
mod oauth;
pub mod session;

pub use middleware::{CurrentUser, LOGIN_PATH, MaybeUser, require_session};
pub use oauth::{OAUTH_STATE_COOKIE, auth_router, exchange_code, fetch_profile};
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
