//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Row models for users, repositories, organizations and the social graph

mod database;
mod models;

pub use database::Database;
pub use models::*;
