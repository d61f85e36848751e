//! Data models
//!
//! Rust structs representing database rows. Row IDs are SQLite
//! `INTEGER PRIMARY KEY` values and timestamps are chrono UTC datetimes.
//! `New*` structs carry the columns supplied on insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// =============================================================================
// Users
// =============================================================================

/// A local account, keyed to its GitHub identity by `github_id`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Provider id issued by GitHub
    pub github_id: Option<String>,
    pub github_username: Option<String>,
    /// Avatar URL from GitHub
    pub github_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub github_id: String,
    pub github_username: String,
    pub github_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Repositories
// =============================================================================

/// A repository row
///
/// Exactly one of `user_id` and `organization_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub user_id: Option<i64>,
    pub organization_id: Option<i64>,
    pub is_private: bool,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who owns a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOwner {
    User(i64),
    Organization(i64),
}

impl RepositoryOwner {
    fn columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::User(id) => (Some(id), None),
            Self::Organization(id) => (None, Some(id)),
        }
    }
}

impl Repository {
    /// Resolve the owner of this repository
    ///
    /// # Errors
    /// Returns an internal error if the row has neither or both owners.
    pub fn owner(&self) -> Result<RepositoryOwner, AppError> {
        match (self.user_id, self.organization_id) {
            (Some(user_id), None) => Ok(RepositoryOwner::User(user_id)),
            (None, Some(organization_id)) => Ok(RepositoryOwner::Organization(organization_id)),
            _ => Err(AppError::Internal(anyhow::anyhow!(
                "repository {} must have exactly one owner",
                self.id
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner: RepositoryOwner,
    pub is_private: bool,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
}

impl NewRepository {
    /// Owner as the pair of nullable foreign-key columns
    pub fn owner_columns(&self) -> (Option<i64>, Option<i64>) {
        self.owner.columns()
    }
}

/// Editable fields of a repository
#[derive(Debug, Clone)]
pub struct RepositoryUpdate {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_private: bool,
}

/// Repository card on the dashboard
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RepositorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub updated_at: DateTime<Utc>,
}

/// Repository card on the explore feed, with the owner name resolved
/// from either the owning user or the owning organization
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicRepository {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Organizations
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Role of a user inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationMember {
    pub id: i64,
    pub organization_id: i64,
    pub user_id: i64,
    /// Values: owner, admin, member
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationMember {
    pub fn role(&self) -> Option<MemberRole> {
        MemberRole::parse(&self.role)
    }
}

/// Pending membership offer, redeemable once through its token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizationInvite {
    pub id: i64,
    pub organization_id: i64,
    pub email: String,
    pub token: String,
    /// Values: admin, member
    pub role: String,
    pub invited_by_id: i64,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganizationInvite {
    pub organization_id: i64,
    pub email: String,
    pub token: String,
    pub role: MemberRole,
    pub invited_by_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Per-user event record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    /// Type tag, e.g. "user_follow"
    #[sqlx(rename = "type")]
    pub notification_type: String,
    /// Opaque JSON payload
    pub data: String,
    pub read_at: Option<DateTime<Utc>>,
    pub related_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub notification_type: String,
    pub data: serde_json::Value,
    pub related_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Activities
// =============================================================================

/// Polymorphic reference (type tag + id) used by activities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub kind: String,
    pub id: i64,
}

impl Subject {
    pub fn user(id: i64) -> Self {
        Self {
            kind: "user".to_string(),
            id,
        }
    }

    pub fn repository(id: i64) -> Self {
        Self {
            kind: "repository".to_string(),
            id,
        }
    }

    pub fn organization(id: i64) -> Self {
        Self {
            kind: "organization".to_string(),
            id,
        }
    }
}

/// Audit/event record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    pub activity_type: String,
    pub description: String,
    /// JSON properties
    pub properties: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<i64>,
    pub causer_type: Option<String>,
    pub causer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i64,
    pub activity_type: String,
    pub description: String,
    pub properties: Option<serde_json::Value>,
    pub subject: Option<Subject>,
    pub causer: Option<Subject>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(user_id: Option<i64>, organization_id: Option<i64>) -> Repository {
        Repository {
            id: 7,
            name: "demo".to_string(),
            slug: "demo".to_string(),
            description: None,
            user_id,
            organization_id,
            is_private: false,
            default_branch: "main".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn repository_owner_is_exactly_one() {
        assert_eq!(
            repository(Some(1), None).owner().unwrap(),
            RepositoryOwner::User(1)
        );
        assert_eq!(
            repository(None, Some(2)).owner().unwrap(),
            RepositoryOwner::Organization(2)
        );
        assert!(repository(None, None).owner().is_err());
        assert!(repository(Some(1), Some(2)).owner().is_err());
    }

    #[test]
    fn member_role_parses_known_values_only() {
        assert_eq!(MemberRole::parse("admin"), Some(MemberRole::Admin));
        assert_eq!(MemberRole::Owner.as_str(), "owner");
        assert_eq!(MemberRole::parse("viewer"), None);
    }
}
