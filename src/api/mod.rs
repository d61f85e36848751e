//! API layer
//!
//! HTTP handlers for:
//! - Server-rendered pages (home, login, dashboard, explore)
//! - JSON endpoints under /api
//! - Routes that answer 501 until they are built
//! - Metrics (Prometheus)

pub mod metrics;
mod notifications;
mod pages;
mod stubs;
pub mod views;

use axum::{Router, routing::get};

use crate::AppState;

pub use metrics::metrics_router;
pub use pages::{DASHBOARD_REPOSITORY_LIMIT, EXPLORE_REPOSITORY_LIMIT};

/// Routes open to anonymous visitors
///
/// Routes:
/// - GET / - Home, or redirect to dashboard when signed in
/// - GET /login - Login page
/// - GET /explore - Public repositories
/// - GET|POST /invites/:token - Not implemented
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::login))
        .route("/explore", get(pages::explore))
        .merge(stubs::public_stub_router())
}

/// Routes that need a session
///
/// The caller wraps these in the session gate.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .merge(stubs::protected_stub_router())
}
