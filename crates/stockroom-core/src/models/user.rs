//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

/// Username of the account created at bootstrap. It can never be deleted
/// and is left untouched by backup restore.
pub const RESERVED_ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    /// `None` only transiently, between creation and role assignment.
    pub role: Option<Role>,
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// An admin that can still log in.
    pub fn is_enabled_admin(&self) -> bool {
        self.is_admin() && !self.blocked
    }

    pub fn is_reserved_admin(&self) -> bool {
        self.username == RESERVED_ADMIN_USERNAME
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: Option<String>,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub email: Option<Option<String>>,
    /// Raw password; re-hashed by the repository.
    pub password: Option<String>,
    pub role: Option<Role>,
    pub blocked: Option<bool>,
}
