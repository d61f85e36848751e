//! Repository service
//!
//! Creating and editing repositories. Changes to user-owned repositories
//! are recorded in the owner's activity stream.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::organization::slugify;
use crate::data::{
    Database, NewActivity, NewRepository, Repository, RepositoryOwner, RepositoryUpdate, Subject,
    User,
};
use crate::error::AppError;

/// Branch new repositories start on
pub const DEFAULT_BRANCH: &str = "main";

/// Repository service
pub struct RepositoryService {
    db: Arc<Database>,
}

impl RepositoryService {
    /// Create new repository service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a repository owned by `creator` or by one of their organizations
    ///
    /// # Errors
    /// Validation if the name has no usable slug; NotFound if the
    /// organization does not exist; Forbidden if `creator` does not own it.
    pub async fn create_repository(
        &self,
        creator: &User,
        name: &str,
        description: Option<&str>,
        is_private: bool,
        organization_id: Option<i64>,
    ) -> Result<Repository, AppError> {
        let name = name.trim();
        let slug = slug_for(name)?;

        let owner = match organization_id {
            Some(organization_id) => {
                let organization = self
                    .db
                    .get_organization(organization_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                if organization.owner_id != creator.id {
                    return Err(AppError::Forbidden);
                }
                RepositoryOwner::Organization(organization.id)
            }
            None => RepositoryOwner::User(creator.id),
        };

        let now = Utc::now();
        let id = self
            .db
            .insert_repository(&NewRepository {
                name: name.to_string(),
                slug,
                description: clean_description(description),
                owner,
                is_private,
                default_branch: DEFAULT_BRANCH.to_string(),
                created_at: now,
            })
            .await?;

        let repository = self.db.get_repository(id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to retrieve repository {} after insert",
                id
            ))
        })?;

        if let RepositoryOwner::User(user_id) = owner {
            self.record(
                user_id,
                "repository_created",
                format!("Created repository {}", repository.name),
                &repository,
                json!({
                    "repository_name": repository.name,
                    "is_public": !repository.is_private,
                }),
            )
            .await?;
        }

        tracing::info!(repository_id = id, creator_id = creator.id, "Repository created");
        Ok(repository)
    }

    /// Edit a repository's name, description and visibility
    ///
    /// # Errors
    /// NotFound if the repository does not exist; Forbidden unless `editor`
    /// owns it directly or owns its organization; Validation if the new name
    /// has no usable slug.
    pub async fn update_repository(
        &self,
        editor: &User,
        repository_id: i64,
        name: &str,
        description: Option<&str>,
        is_private: bool,
    ) -> Result<Repository, AppError> {
        let current = self
            .db
            .get_repository(repository_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let owner = current.owner()?;
        if !self.can_modify(owner, editor).await? {
            return Err(AppError::Forbidden);
        }

        let name = name.trim();
        let update = RepositoryUpdate {
            name: name.to_string(),
            slug: slug_for(name)?,
            description: clean_description(description),
            is_private,
        };
        let changed = update.name != current.name
            || update.description != current.description
            || update.is_private != current.is_private;

        self.db
            .update_repository(repository_id, &update, Utc::now())
            .await?;
        let repository = self
            .db
            .get_repository(repository_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let (RepositoryOwner::User(user_id), true) = (owner, changed) {
            self.record(
                user_id,
                "repository_updated",
                format!("Updated repository {}", repository.name),
                &repository,
                json!({
                    "repository_name": repository.name,
                    "previous_name": current.name,
                }),
            )
            .await?;
        }

        Ok(repository)
    }

    async fn can_modify(&self, owner: RepositoryOwner, user: &User) -> Result<bool, AppError> {
        match owner {
            RepositoryOwner::User(user_id) => Ok(user_id == user.id),
            RepositoryOwner::Organization(organization_id) => Ok(self
                .db
                .get_organization(organization_id)
                .await?
                .is_some_and(|organization| organization.owner_id == user.id)),
        }
    }

    async fn record(
        &self,
        user_id: i64,
        activity_type: &str,
        description: String,
        repository: &Repository,
        properties: serde_json::Value,
    ) -> Result<(), AppError> {
        self.db
            .insert_activity(&NewActivity {
                user_id,
                activity_type: activity_type.to_string(),
                description,
                properties: Some(properties),
                subject: Some(Subject::repository(repository.id)),
                causer: Some(Subject::user(user_id)),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

fn slug_for(name: &str) -> Result<String, AppError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "repository name must contain letters or digits".to_string(),
        ));
    }
    Ok(slug)
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToOwned::to_owned)
}
