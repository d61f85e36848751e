//! HTML page handlers

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};

use super::views::{self, ViewUser};
use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::AppError;
use crate::service::AccountService;

/// Repositories shown on the dashboard
pub const DASHBOARD_REPOSITORY_LIMIT: usize = 10;

/// Repositories shown on the explore page
pub const EXPLORE_REPOSITORY_LIMIT: usize = 50;

/// GET /
///
/// Signed-in visitors go straight to their dashboard.
pub async fn home(MaybeUser(session): MaybeUser) -> Response {
    if session.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Html(views::home()).into_response()
}

/// GET /login
pub async fn login() -> Html<String> {
    Html(views::login())
}

/// GET /dashboard
///
/// A session whose user row no longer exists is a server error.
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Html<String>, AppError> {
    let user = AccountService::new(state.db.clone())
        .current_user(&session)
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to get user {} for session",
                session.user_id
            ))
        })?;

    let repositories = state
        .db
        .get_recent_user_repositories(user.id, DASHBOARD_REPOSITORY_LIMIT)
        .await?;
    let unread = state.db.count_unread_notifications(user.id).await?;

    let view_user = ViewUser::new(&user, unread);
    let body = views::dashboard(&view_user, &repositories);
    Ok(Html(views::layout(&view_user, "Dashboard", &body)))
}

/// GET /explore
///
/// Rendered inside the layout for signed-in users and in the bare shell
/// for everyone else, including sessions whose user row is gone.
pub async fn explore(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
) -> Result<Html<String>, AppError> {
    let repositories = state
        .db
        .get_public_repositories(EXPLORE_REPOSITORY_LIMIT)
        .await?;
    let body = views::explore(&repositories);

    let user = match session {
        Some(session) => {
            AccountService::new(state.db.clone())
                .current_user(&session)
                .await?
        }
        None => None,
    };

    let page = match user {
        Some(user) => {
            let unread = state.db.count_unread_notifications(user.id).await?;
            views::layout(&ViewUser::new(&user, unread), "Explore", &body)
        }
        None => views::base("Explore - ConNix", &body),
    };

    Ok(Html(page))
}
