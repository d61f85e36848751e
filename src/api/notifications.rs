//! Notification JSON endpoints

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let count = state
        .db
        .count_unread_notifications(session.user_id)
        .await?;

    Ok(Json(UnreadCountResponse { count }))
}
