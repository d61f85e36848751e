//! Account service
//!
//! Maps a verified GitHub profile onto a local user row.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::Session;
use crate::data::{Database, NewUser, User};
use crate::error::AppError;

/// Verified identity returned by the OAuth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Stable provider id, the join key to `users.github_id`
    pub provider_id: String,
    pub name: String,
    /// Provider handle (GitHub login)
    pub nickname: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Result of a sign-in
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: User,
    /// Whether this sign-in created the user row
    pub created: bool,
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find or create the local user for a provider profile
    ///
    /// An unknown provider id inserts a new row populated from the
    /// profile and reads it back. A known provider id reuses its row
    /// unchanged.
    ///
    /// # Errors
    /// Database errors, or an internal error if the inserted row cannot
    /// be read back.
    pub async fn sign_in(&self, profile: &ProviderProfile) -> Result<SignIn, AppError> {
        if let Some(user) = self.db.get_user_by_github_id(&profile.provider_id).await? {
            tracing::info!(user_id = user.id, username = %user.username, "Returning user signed in");
            return Ok(SignIn {
                user,
                created: false,
            });
        }

        let new_user = NewUser {
            name: profile.name.clone(),
            username: profile.nickname.clone(),
            email: profile.email.clone(),
            github_id: profile.provider_id.clone(),
            github_username: profile.nickname.clone(),
            github_avatar: profile.avatar_url.clone(),
            created_at: Utc::now(),
        };
        let id = self.db.insert_user(&new_user).await?;

        let user = self
            .db
            .get_user_by_github_id(&profile.provider_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "Failed to retrieve user {} after insert",
                    id
                ))
            })?;

        tracing::info!(user_id = user.id, username = %user.username, "New user created");

        Ok(SignIn {
            user,
            created: true,
        })
    }

    /// Resolve a session to its user row
    ///
    /// `None` when the row no longer exists.
    pub async fn current_user(&self, session: &Session) -> Result<Option<User>, AppError> {
        self.db.get_user(session.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-account.db");
        let db = Database::connect(&db_path).await.unwrap();
        (Arc::new(db), temp_dir)
    }

    fn profile(provider_id: &str, nickname: &str) -> ProviderProfile {
        ProviderProfile {
            provider_id: provider_id.to_string(),
            name: format!("{nickname} Example"),
            nickname: nickname.to_string(),
            email: format!("{nickname}@example.com"),
            avatar_url: Some(format!("https://avatars.example.com/u/{provider_id}")),
        }
    }

    #[tokio::test]
    async fn first_sign_in_creates_exactly_one_user() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db.clone());

        let sign_in = service.sign_in(&profile("583231", "octocat")).await.unwrap();

        assert!(sign_in.created);
        assert_eq!(sign_in.user.username, "octocat");
        assert_eq!(sign_in.user.name, "octocat Example");
        assert_eq!(sign_in.user.github_id.as_deref(), Some("583231"));
        assert_eq!(
            sign_in.user.github_avatar.as_deref(),
            Some("https://avatars.example.com/u/583231")
        );
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeat_sign_in_reuses_existing_row() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db.clone());

        let first = service.sign_in(&profile("583231", "octocat")).await.unwrap();
        let mut renamed = profile("583231", "octocat-renamed");
        renamed.email = "new@example.com".to_string();
        let second = service.sign_in(&renamed).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(second.user.username, "octocat");
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn distinct_provider_ids_get_distinct_rows() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db.clone());

        let a = service.sign_in(&profile("1", "same")).await.unwrap();
        let b = service.sign_in(&profile("2", "same")).await.unwrap();

        assert_ne!(a.user.id, b.user.id);
        assert_eq!(db.count_users().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn current_user_is_none_for_deleted_row() {
        let (db, _temp_dir) = create_test_db().await;
        let service = AccountService::new(db.clone());

        let signed_in = service.sign_in(&profile("7", "ghost")).await.unwrap();
        let session = Session::for_user(&signed_in.user, 3600);
        assert_eq!(
            service.current_user(&session).await.unwrap().map(|u| u.id),
            Some(signed_in.user.id)
        );

        let stale = Session {
            user_id: signed_in.user.id + 100,
            ..session
        };
        assert!(service.current_user(&stale).await.unwrap().is_none());
    }
}
