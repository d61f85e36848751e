//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database operations.

mod account;
mod organization;
mod repository;
mod social;

pub use account::{AccountService, ProviderProfile, SignIn};
pub use organization::{AcceptedInvite, OrganizationService, slugify};
pub use repository::RepositoryService;
pub use social::SocialService;
