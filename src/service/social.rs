//! Social service
//!
//! Follow edges between users, per-user notifications and the activity
//! feed built from them.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::data::{Activity, Database, NewActivity, NewNotification, Notification, Subject, User};
use crate::error::AppError;

/// Notification type created when someone follows a user
pub const USER_FOLLOW: &str = "user_follow";

/// Default size of the activity feed
pub const ACTIVITY_FEED_LIMIT: usize = 50;

/// Social service
pub struct SocialService {
    db: Arc<Database>,
}

impl SocialService {
    /// Create new social service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Make `follower` follow `followee`
    ///
    /// Following oneself or an already-followed user is a no-op. A new
    /// edge notifies the followee.
    ///
    /// # Returns
    /// Whether a new edge was created
    pub async fn follow(&self, follower: &User, followee: &User) -> Result<bool, AppError> {
        if follower.id == followee.id {
            return Ok(false);
        }

        let now = Utc::now();
        if !self
            .db
            .insert_follow_if_absent(follower.id, followee.id, now)
            .await?
        {
            return Ok(false);
        }

        self.db
            .insert_notification(&NewNotification {
                user_id: followee.id,
                notification_type: USER_FOLLOW.to_string(),
                data: json!({
                    "title": format!("{} started following you", follower.name),
                    "follower": {
                        "id": follower.id,
                        "name": follower.name,
                        "username": follower.username,
                    },
                }),
                related_id: Some(follower.id),
                created_at: now,
            })
            .await?;

        tracing::debug!(
            follower_id = follower.id,
            followee_id = followee.id,
            "Follow created"
        );

        Ok(true)
    }

    /// Follow the user with `username`
    ///
    /// # Errors
    /// NotFound if no user has that username.
    pub async fn follow_username(&self, follower: &User, username: &str) -> Result<bool, AppError> {
        let followee = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)?;
        self.follow(follower, &followee).await
    }

    /// Remove the edge if present
    pub async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<(), AppError> {
        self.db.delete_follow(follower_id, followee_id).await?;
        Ok(())
    }

    pub async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError> {
        self.db.is_following(follower_id, followee_id).await
    }

    pub async fn follower_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.db.count_followers(user_id).await
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.db.count_following(user_id).await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Store a notification for `user_id`
    pub async fn notify(
        &self,
        user_id: i64,
        notification_type: &str,
        data: serde_json::Value,
        related_id: Option<i64>,
    ) -> Result<i64, AppError> {
        self.db
            .insert_notification(&NewNotification {
                user_id,
                notification_type: notification_type.to_string(),
                data,
                related_id,
                created_at: Utc::now(),
            })
            .await
    }

    /// Newest notifications of a user
    pub async fn notifications(
        &self,
        user_id: i64,
        limit: usize,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        self.db.get_notifications(user_id, limit, unread_only).await
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.db.count_unread_notifications(user_id).await
    }

    /// Mark one of the user's notifications read
    ///
    /// # Errors
    /// NotFound if the notification does not belong to the user.
    pub async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<(), AppError> {
        let now = Utc::now();
        if !self
            .db
            .set_notification_read_at(notification_id, user_id, Some(now), now)
            .await?
        {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Mark one of the user's notifications unread
    ///
    /// # Errors
    /// NotFound if the notification does not belong to the user.
    pub async fn mark_unread(&self, user_id: i64, notification_id: i64) -> Result<(), AppError> {
        if !self
            .db
            .set_notification_read_at(notification_id, user_id, None, Utc::now())
            .await?
        {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Delete one of the user's notifications
    ///
    /// # Errors
    /// NotFound if the notification does not exist; Forbidden if it
    /// belongs to another user.
    pub async fn delete_notification(
        &self,
        user_id: i64,
        notification_id: i64,
    ) -> Result<(), AppError> {
        let notification = self
            .db
            .get_notification(notification_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if notification.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        self.db.delete_notification(notification_id).await?;
        Ok(())
    }

    /// # Returns
    /// Number of notifications that changed
    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        self.db.mark_all_notifications_read(user_id, Utc::now()).await
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Record an activity performed by `user_id`
    pub async fn record_activity(
        &self,
        user_id: i64,
        activity_type: &str,
        description: &str,
        subject: Option<Subject>,
        properties: Option<serde_json::Value>,
    ) -> Result<i64, AppError> {
        self.db
            .insert_activity(&NewActivity {
                user_id,
                activity_type: activity_type.to_string(),
                description: description.to_string(),
                properties,
                subject,
                causer: Some(Subject::user(user_id)),
                created_at: Utc::now(),
            })
            .await
    }

    /// Activities by the user and everyone they follow, newest first
    pub async fn activity_feed(&self, user_id: i64) -> Result<Vec<Activity>, AppError> {
        self.db
            .get_activity_feed(user_id, ACTIVITY_FEED_LIMIT)
            .await
    }
}
