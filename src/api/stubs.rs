//! Routes that are registered but not built yet
//!
//! Each answers `501 Not Implemented` for the methods it accepts.

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::error::AppError;

async fn not_implemented() -> AppError {
    AppError::NotImplemented
}

/// Unimplemented routes behind the session gate
pub fn protected_stub_router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(not_implemented))
        .route("/notifications", get(not_implemented))
        // Users
        .route("/users/:username", get(not_implemented))
        .route("/users/:username/followers", get(not_implemented))
        .route("/users/:username/following", get(not_implemented))
        .route("/users/:username/follow", post(not_implemented))
        .route("/users/:username/unfollow", post(not_implemented))
        // Repositories
        .route("/repositories", get(not_implemented))
        .route(
            "/repositories/create",
            get(not_implemented).post(not_implemented),
        )
        .route("/:owner/:repo", get(not_implemented))
        .route(
            "/:owner/:repo/edit",
            get(not_implemented).post(not_implemented),
        )
        .route("/:owner/:repo/delete", post(not_implemented))
        .route(
            "/:owner/:repo/transfer",
            get(not_implemented).post(not_implemented),
        )
        // Organizations
        .route("/organizations", get(not_implemented))
        .route(
            "/organizations/create",
            get(not_implemented).post(not_implemented),
        )
        .route("/orgs/:org", get(not_implemented))
        .route("/orgs/:org/edit", get(not_implemented).post(not_implemented))
        .route("/orgs/:org/delete", post(not_implemented))
        .route("/orgs/:org/members", get(not_implemented))
        .route(
            "/orgs/:org/invite",
            get(not_implemented).post(not_implemented),
        )
        // Settings
        .route(
            "/settings/profile",
            get(not_implemented).post(not_implemented),
        )
        .route(
            "/settings/password",
            get(not_implemented).post(not_implemented),
        )
        .route(
            "/settings/appearance",
            get(not_implemented).post(not_implemented),
        )
        // API
        .route("/api/notifications/unread", get(not_implemented))
}

/// Unimplemented routes open to anonymous visitors
pub fn public_stub_router() -> Router<AppState> {
    Router::new().route(
        "/invites/:token",
        get(not_implemented).post(not_implemented),
    )
}
