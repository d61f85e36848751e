//! Organization service
//!
//! Organization creation, membership and single-use invites.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde_json::json;

use crate::data::{
    Database, MemberRole, NewActivity, NewOrganization, NewOrganizationInvite, Organization,
    OrganizationInvite, Subject, User,
};
use crate::error::AppError;

/// Length of an invite token
pub const INVITE_TOKEN_LEN: usize = 64;

/// How long an invite stays redeemable
pub const INVITE_TTL_DAYS: i64 = 7;

/// URL slug for an organization name
///
/// Lowercases ASCII letters and digits and joins every other run of
/// characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn generate_invite_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Outcome of a redeemed invite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedInvite {
    pub organization_id: i64,
    /// false when the user was already a member
    pub joined: bool,
}

/// Organization service
pub struct OrganizationService {
    db: Arc<Database>,
}

impl OrganizationService {
    /// Create new organization service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an organization owned by `owner`
    ///
    /// The owner becomes a member with role `owner` and an
    /// `organization_created` activity is recorded.
    ///
    /// # Errors
    /// Validation if the name has no usable slug or the slug is taken.
    pub async fn create_organization(
        &self,
        owner: &User,
        name: &str,
        description: Option<&str>,
    ) -> Result<Organization, AppError> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::Validation(
                "organization name must contain letters or digits".to_string(),
            ));
        }
        if self.db.get_organization_by_slug(&slug).await?.is_some() {
            return Err(AppError::Validation(format!(
                "organization slug '{}' is already taken",
                slug
            )));
        }

        let now = Utc::now();
        let id = self
            .db
            .insert_organization(&NewOrganization {
                name: name.to_string(),
                slug: slug.clone(),
                description: description
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(ToOwned::to_owned),
                owner_id: owner.id,
                created_at: now,
            })
            .await?;

        self.db
            .insert_organization_member_if_absent(id, owner.id, MemberRole::Owner, now)
            .await?;

        self.db
            .insert_activity(&NewActivity {
                user_id: owner.id,
                activity_type: "organization_created".to_string(),
                description: format!("Created organization {}", name),
                properties: Some(json!({
                    "organization_name": name,
                    "organization_slug": slug,
                })),
                subject: Some(Subject::organization(id)),
                causer: Some(Subject::user(owner.id)),
                created_at: now,
            })
            .await?;

        tracing::info!(organization_id = id, %slug, owner_id = owner.id, "Organization created");

        self.db.get_organization(id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to retrieve organization {} after insert",
                id
            ))
        })
    }

    /// Whether `user` may invite, cancel invites and manage members
    ///
    /// True for the organization owner and for members with role owner or
    /// admin.
    async fn can_manage_members(
        &self,
        organization: &Organization,
        user: &User,
    ) -> Result<bool, AppError> {
        if organization.owner_id == user.id {
            return Ok(true);
        }
        let role = self
            .db
            .get_organization_member(organization.id, user.id)
            .await?
            .and_then(|member| member.role());
        Ok(matches!(role, Some(MemberRole::Owner | MemberRole::Admin)))
    }

    async fn organization(&self, organization_id: i64) -> Result<Organization, AppError> {
        self.db
            .get_organization(organization_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Invite `email` into an organization
    ///
    /// # Errors
    /// NotFound if the organization does not exist; Forbidden unless
    /// `invited_by` is the owner or an admin; Validation if `role` is
    /// `owner`, the email already belongs to a member, or a pending invite
    /// to it exists.
    pub async fn create_invite(
        &self,
        organization_id: i64,
        invited_by: &User,
        email: &str,
        role: MemberRole,
    ) -> Result<OrganizationInvite, AppError> {
        let organization = self.organization(organization_id).await?;
        if !self.can_manage_members(&organization, invited_by).await? {
            return Err(AppError::Forbidden);
        }
        if role == MemberRole::Owner {
            return Err(AppError::Validation(
                "invites can only grant admin or member".to_string(),
            ));
        }

        let email = email.trim();
        let now = Utc::now();
        if self
            .db
            .is_organization_member_email(organization_id, email)
            .await?
        {
            return Err(AppError::Validation(
                "This user is already a member of the organization".to_string(),
            ));
        }
        if self
            .db
            .has_pending_organization_invite(organization_id, email, now)
            .await?
        {
            return Err(AppError::Validation(
                "An invitation has already been sent to this email".to_string(),
            ));
        }

        let token = generate_invite_token();
        self.db
            .insert_organization_invite(&NewOrganizationInvite {
                organization_id,
                email: email.to_string(),
                token: token.clone(),
                role,
                invited_by_id: invited_by.id,
                expires_at: now + Duration::days(INVITE_TTL_DAYS),
                created_at: now,
            })
            .await?;

        self.db
            .get_organization_invite_by_token(&token)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to retrieve invite")))
    }

    /// Withdraw an invite
    ///
    /// # Errors
    /// NotFound if the organization or invite does not exist or the invite
    /// belongs to another organization; Forbidden unless `user` is the
    /// owner or an admin.
    pub async fn cancel_invite(
        &self,
        organization_id: i64,
        invite_id: i64,
        user: &User,
    ) -> Result<(), AppError> {
        let organization = self.organization(organization_id).await?;
        if !self.can_manage_members(&organization, user).await? {
            return Err(AppError::Forbidden);
        }

        let invite = self
            .db
            .get_organization_invite(invite_id)
            .await?
            .filter(|invite| invite.organization_id == organization_id)
            .ok_or(AppError::NotFound)?;
        self.db.delete_organization_invite(invite.id).await?;

        tracing::info!(organization_id, invite_id, user_id = user.id, "Organization invite cancelled");
        Ok(())
    }

    /// Turn down a pending invite, deleting it
    ///
    /// # Errors
    /// NotFound if the token is unknown, expired or already used;
    /// Forbidden if the invite was sent to a different email.
    pub async fn decline_invite(&self, token: &str, user: &User) -> Result<(), AppError> {
        let invite = self.pending_invite(token).await?;
        if invite.email != user.email {
            return Err(AppError::Forbidden);
        }
        self.db.delete_organization_invite(invite.id).await?;

        tracing::info!(
            organization_id = invite.organization_id,
            user_id = user.id,
            "Organization invite declined"
        );
        Ok(())
    }

    async fn pending_invite(&self, token: &str) -> Result<OrganizationInvite, AppError> {
        let now = Utc::now();
        self.db
            .get_organization_invite_by_token(token)
            .await?
            .filter(|invite| invite.accepted_at.is_none() && invite.expires_at > now)
            .ok_or(AppError::NotFound)
    }

    /// Change the role of a member
    ///
    /// # Errors
    /// NotFound if the organization does not exist or `member_id` is not a
    /// member; Forbidden unless `user` is the owner or an admin; Validation
    /// if `role` is `owner` or the member is the organization owner.
    pub async fn update_member_role(
        &self,
        organization_id: i64,
        user: &User,
        member_id: i64,
        role: MemberRole,
    ) -> Result<(), AppError> {
        let organization = self.organization(organization_id).await?;
        if !self.can_manage_members(&organization, user).await? {
            return Err(AppError::Forbidden);
        }
        if role == MemberRole::Owner {
            return Err(AppError::Validation(
                "members can only be made admin or member".to_string(),
            ));
        }
        if member_id == organization.owner_id {
            return Err(AppError::Validation(
                "Cannot change the role of the organization owner".to_string(),
            ));
        }

        if !self
            .db
            .update_organization_member_role(organization_id, member_id, role, Utc::now())
            .await?
        {
            return Err(AppError::NotFound);
        }

        tracing::info!(
            organization_id,
            member_id,
            role = role.as_str(),
            "Organization member role changed"
        );
        Ok(())
    }

    /// Remove a member, or let a member leave
    ///
    /// # Errors
    /// NotFound if the organization does not exist or `member_id` is not a
    /// member; Forbidden unless `user` is the owner, an admin or the member
    /// themself; Validation if the member is the organization owner.
    pub async fn remove_member(
        &self,
        organization_id: i64,
        user: &User,
        member_id: i64,
    ) -> Result<(), AppError> {
        let organization = self.organization(organization_id).await?;
        if user.id != member_id && !self.can_manage_members(&organization, user).await? {
            return Err(AppError::Forbidden);
        }
        if member_id == organization.owner_id {
            return Err(AppError::Validation(
                "Cannot remove the organization owner from the organization".to_string(),
            ));
        }

        if !self
            .db
            .delete_organization_member(organization_id, member_id)
            .await?
        {
            return Err(AppError::NotFound);
        }

        tracing::info!(
            organization_id,
            member_id,
            removed_by = user.id,
            "Organization member removed"
        );
        Ok(())
    }

    /// Redeem an invite for `user`
    ///
    /// # Errors
    /// NotFound if the token is unknown, expired or already used;
    /// Forbidden if the invite was sent to a different email.
    pub async fn accept_invite(&self, token: &str, user: &User) -> Result<AcceptedInvite, AppError> {
        let invite = self.pending_invite(token).await?;

        if invite.email != user.email {
            return Err(AppError::Forbidden);
        }

        // Conditional update so a token can only be spent once
        let now = Utc::now();
        if !self.db.redeem_organization_invite(token, now).await? {
            return Err(AppError::NotFound);
        }

        let role = MemberRole::parse(&invite.role).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "invite {} has unknown role {}",
                invite.id,
                invite.role
            ))
        })?;
        let joined = self
            .db
            .insert_organization_member_if_absent(invite.organization_id, user.id, role, now)
            .await?;

        tracing::info!(
            organization_id = invite.organization_id,
            user_id = user.id,
            joined,
            "Organization invite accepted"
        );

        Ok(AcceptedInvite {
            organization_id: invite.organization_id,
            joined,
        })
    }
}
