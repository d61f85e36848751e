//! SQLite database operations
//!
//! All database access goes through this module.
//! Missing rows are reported as `None` or an empty `Vec`, never as errors.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pub(super) pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::from(e)
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by row id
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by GitHub provider id
    pub async fn get_user_by_github_id(&self, github_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE github_id = ?")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? ORDER BY id LIMIT 1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    /// Insert a user row
    ///
    /// Both timestamps are set to `user.created_at`.
    ///
    /// # Returns
    /// The new row id
    pub async fn insert_user(&self, user: &NewUser) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                name, username, email, github_id, github_username, github_avatar,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.github_id)
        .bind(&user.github_username)
        .bind(&user.github_avatar)
        .bind(user.created_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Count all users
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Insert a repository owned by a user or an organization
    pub async fn insert_repository(&self, repository: &NewRepository) -> Result<i64, AppError> {
        let (user_id, organization_id) = repository.owner_columns();

        let result = sqlx::query(
            r#"
            INSERT INTO repositories (
                name, slug, description, user_id, organization_id, is_private,
                default_branch, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&repository.name)
        .bind(&repository.slug)
        .bind(&repository.description)
        .bind(user_id)
        .bind(organization_id)
        .bind(repository.is_private)
        .bind(&repository.default_branch)
        .bind(repository.created_at)
        .bind(repository.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a repository by row id
    pub async fn get_repository(&self, id: i64) -> Result<Option<Repository>, AppError> {
        let repository = sqlx::query_as::<_, Repository>("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(repository)
    }

    /// Apply edits to a repository and bump its update time
    ///
    /// # Returns
    /// true if the repository exists
    pub async fn update_repository(
        &self,
        id: i64,
        update: &RepositoryUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE repositories
            SET name = ?, slug = ?, description = ?, is_private = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.slug)
        .bind(&update.description)
        .bind(update.is_private)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recently updated repositories owned directly by a user
    pub async fn get_recent_user_repositories(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<RepositorySummary>, AppError> {
        let repositories = sqlx::query_as::<_, RepositorySummary>(
            r#"
            SELECT id, name, slug, description, is_private, updated_at
            FROM repositories
            WHERE user_id = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(repositories)
    }

    /// Most recently created public repositories, with the owner name taken
    /// from the owning user's username or the owning organization's slug
    pub async fn get_public_repositories(
        &self,
        limit: usize,
    ) -> Result<Vec<PublicRepository>, AppError> {
        let repositories = sqlx::query_as::<_, PublicRepository>(
            r#"
            SELECT r.id, r.name, r.slug, r.description, r.is_private,
                   COALESCE(u.username, o.slug) AS owner_name,
                   r.created_at
            FROM repositories r
            LEFT JOIN users u ON r.user_id = u.id
            LEFT JOIN organizations o ON r.organization_id = o.id
            WHERE r.is_private = 0
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(repositories)
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    /// Insert an organization
    pub async fn insert_organization(
        &self,
        organization: &NewOrganization,
    ) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organizations (name, slug, description, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(&organization.description)
        .bind(organization.owner_id)
        .bind(organization.created_at)
        .bind(organization.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get an organization by row id
    pub async fn get_organization(&self, id: i64) -> Result<Option<Organization>, AppError> {
        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(organization)
    }

    /// Get an organization by slug
    pub async fn get_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, AppError> {
        let organization =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        Ok(organization)
    }

    /// Add a member, doing nothing if the user already belongs to the organization
    ///
    /// # Returns
    /// true if a membership row was created
    pub async fn insert_organization_member_if_absent(
        &self,
        organization_id: i64,
        user_id: i64,
        role: MemberRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (organization_id, user_id) DO NOTHING
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a user's membership in an organization
    pub async fn get_organization_member(
        &self,
        organization_id: i64,
        user_id: i64,
    ) -> Result<Option<OrganizationMember>, AppError> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            "SELECT * FROM organization_members WHERE organization_id = ? AND user_id = ?",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// List members of an organization in join order
    pub async fn get_organization_members(
        &self,
        organization_id: i64,
    ) -> Result<Vec<OrganizationMember>, AppError> {
        let members = sqlx::query_as::<_, OrganizationMember>(
            "SELECT * FROM organization_members WHERE organization_id = ? ORDER BY id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Change a member's role
    ///
    /// # Returns
    /// true if the user is a member of the organization
    pub async fn update_organization_member_role(
        &self,
        organization_id: i64,
        user_id: i64,
        role: MemberRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE organization_members SET role = ?, updated_at = ?
            WHERE organization_id = ? AND user_id = ?
            "#,
        )
        .bind(role.as_str())
        .bind(at)
        .bind(organization_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a user from an organization
    ///
    /// # Returns
    /// true if a membership row was deleted
    pub async fn delete_organization_member(
        &self,
        organization_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM organization_members WHERE organization_id = ? AND user_id = ?",
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a user with this email belongs to the organization
    pub async fn is_organization_member_email(
        &self,
        organization_id: i64,
        email: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM organization_members m
                JOIN users u ON u.id = m.user_id
                WHERE m.organization_id = ? AND u.email = ?
            )
            "#,
        )
        .bind(organization_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    // =========================================================================
    // Organization invites
    // =========================================================================

    /// Insert an invite
    pub async fn insert_organization_invite(
        &self,
        invite: &NewOrganizationInvite,
    ) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO organization_invites (
                organization_id, email, token, role, invited_by_id, expires_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invite.organization_id)
        .bind(&invite.email)
        .bind(&invite.token)
        .bind(invite.role.as_str())
        .bind(invite.invited_by_id)
        .bind(invite.expires_at)
        .bind(invite.created_at)
        .bind(invite.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get an invite by token, whether or not it was redeemed
    pub async fn get_organization_invite_by_token(
        &self,
        token: &str,
    ) -> Result<Option<OrganizationInvite>, AppError> {
        let invite = sqlx::query_as::<_, OrganizationInvite>(
            "SELECT * FROM organization_invites WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invite)
    }

    /// Get an invite by row id
    pub async fn get_organization_invite(
        &self,
        id: i64,
    ) -> Result<Option<OrganizationInvite>, AppError> {
        let invite = sqlx::query_as::<_, OrganizationInvite>(
            "SELECT * FROM organization_invites WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invite)
    }

    /// Check for an unredeemed, unexpired invite to `email`
    pub async fn has_pending_organization_invite(
        &self,
        organization_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM organization_invites
                WHERE organization_id = ? AND email = ?
                  AND accepted_at IS NULL AND expires_at > ?
            )
            "#,
        )
        .bind(organization_id)
        .bind(email)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Delete an invite
    ///
    /// # Returns
    /// true if the invite existed
    pub async fn delete_organization_invite(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM organization_invites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an invite accepted if it is still pending and unexpired
    ///
    /// The check and the write are one statement, so a token can be
    /// redeemed at most once even under concurrent requests.
    ///
    /// # Returns
    /// true if this call redeemed the invite
    pub async fn redeem_organization_invite(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE organization_invites
            SET accepted_at = ?, updated_at = ?
            WHERE token = ? AND accepted_at IS NULL AND expires_at > ?
            "#,
        )
        .bind(at)
        .bind(at)
        .bind(token)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Follow relationships
    // =========================================================================

    /// Insert a follow edge unless the pair already exists
    ///
    /// # Returns
    /// true if a new edge was created
    pub async fn insert_follow_if_absent(
        &self,
        follower_id: i64,
        followee_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a follow edge
    ///
    /// # Returns
    /// true if an edge was removed
    pub async fn delete_follow(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether `follower_id` follows `followee_id`
    pub async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Number of users following `user_id`
    pub async fn count_followers(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE followee_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Number of users `user_id` follows
    pub async fn count_following(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE follower_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Insert notification
    pub async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, data, related_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.notification_type)
        .bind(notification.data.to_string())
        .bind(notification.related_id)
        .bind(notification.created_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a user's notifications, newest first
    pub async fn get_notifications(
        &self,
        user_id: i64,
        limit: usize,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let sql = if unread_only {
            "SELECT * FROM notifications WHERE user_id = ? AND read_at IS NULL ORDER BY created_at DESC, id DESC LIMIT ?"
        } else {
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        };

        let notifications = sqlx::query_as::<_, Notification>(sql)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    /// Get a notification by row id
    pub async fn get_notification(&self, id: i64) -> Result<Option<Notification>, AppError> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    pub async fn delete_notification(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count notifications the user has not read
    pub async fn count_unread_notifications(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one of the user's notifications read or unread
    ///
    /// # Returns
    /// true if the notification exists and belongs to the user
    pub async fn set_notification_read_at(
        &self,
        id: i64,
        user_id: i64,
        read_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(read_at)
        .bind(at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a user's unread notifications read
    ///
    /// # Returns
    /// Number of notifications changed
    pub async fn mark_all_notifications_read(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ?, updated_at = ? WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(at)
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Activities
    // =========================================================================

    /// Insert an activity record
    pub async fn insert_activity(&self, activity: &NewActivity) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO activities (
                user_id, type, description, properties, subject_type, subject_id,
                causer_type, causer_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(activity.user_id)
        .bind(&activity.activity_type)
        .bind(&activity.description)
        .bind(activity.properties.as_ref().map(|p| p.to_string()))
        .bind(activity.subject.as_ref().map(|s| s.kind.as_str()))
        .bind(activity.subject.as_ref().map(|s| s.id))
        .bind(activity.causer.as_ref().map(|c| c.kind.as_str()))
        .bind(activity.causer.as_ref().map(|c| c.id))
        .bind(activity.created_at)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Activities by the user and by everyone the user follows, newest first
    pub async fn get_activity_feed(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<Activity>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT * FROM activities
            WHERE user_id = ?
               OR user_id IN (SELECT followee_id FROM follows WHERE follower_id = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }
}
