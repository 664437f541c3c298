//! User administration and the reserved admin bootstrap.
//!
//! Every operation here is admin-only. The store must always keep at least
//! one enabled admin, and the reserved `admin` account can never be
//! deleted, demoted or blocked.

use stockroom_core::access::Principal;
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::{CreateUser, RESERVED_ADMIN_USERNAME, UpdateUser, User};
use stockroom_core::repository::{PaginatedResult, Pagination, UserRepository};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::StoreGate;
use crate::guard::require_admin;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
}

/// Admin-only account management.
pub struct UserAdminService<U> {
    users: U,
    gate: StoreGate,
    /// Serializes changes that could remove the last enabled admin.
    admins: Mutex<()>,
}

impl<U: UserRepository> UserAdminService<U> {
    pub fn new(users: U, gate: StoreGate) -> Self {
        Self {
            users,
            gate,
            admins: Mutex::new(()),
        }
    }

    /// Create the reserved `admin` account if it does not exist yet.
    ///
    /// An existing account is returned untouched. Creating one needs a
    /// non-empty `password`.
    pub async fn ensure_admin(&self, password: Option<&str>) -> StockroomResult<User> {
        let _store = self.gate.shared().await;
        match self.users.get_by_username(RESERVED_ADMIN_USERNAME).await {
            Ok(existing) => {
                if !existing.is_enabled_admin() {
                    warn!(user_id = %existing.id, "Reserved admin account is not an enabled admin");
                }
                Ok(existing)
            }
            Err(StockroomError::NotFound { .. }) => {
                let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                    StockroomError::Validation {
                        message: "admin_password must be set to create the admin account".into(),
                    }
                })?;
                let admin = self
                    .users
                    .create(CreateUser {
                        username: RESERVED_ADMIN_USERNAME.into(),
                        email: None,
                        password: password.into(),
                        role: Some(Role::Admin),
                    })
                    .await?;
                info!(user_id = %admin.id, "Reserved admin account created");
                Ok(admin)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_user(&self, principal: &Principal, input: NewUser) -> StockroomResult<User> {
        require_admin(principal)?;
        let username = input.username.trim();
        if username.is_empty() {
            return Err(StockroomError::Validation {
                message: "username must not be empty".into(),
            });
        }
        if input.password.is_empty() {
            return Err(StockroomError::Validation {
                message: "password must not be empty".into(),
            });
        }

        let _store = self.gate.shared().await;
        let user = self
            .users
            .create(CreateUser {
                username: username.into(),
                email: input.email,
                password: input.password,
                role: Some(input.role),
            })
            .await?;
        info!(user_id = %user.id, role = %input.role, by = %principal.username, "User created");
        Ok(user)
    }

    pub async fn list_users(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> StockroomResult<PaginatedResult<User>> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.users.list(pagination).await
    }

    pub async fn get_user(&self, principal: &Principal, id: Uuid) -> StockroomResult<User> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.users.get_by_id(id).await
    }

    pub async fn set_role(
        &self,
        principal: &Principal,
        id: Uuid,
        role: Role,
    ) -> StockroomResult<User> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        let _admins = self.admins.lock().await;

        let user = self.users.get_by_id(id).await?;
        if role != Role::Admin {
            self.ensure_admin_remains(&user, "demote").await?;
        }

        let updated = self
            .users
            .update(
                id,
                UpdateUser {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id = %id, %role, by = %principal.username, "User role changed");
        Ok(updated)
    }

    pub async fn set_blocked(
        &self,
        principal: &Principal,
        id: Uuid,
        blocked: bool,
    ) -> StockroomResult<User> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        let _admins = self.admins.lock().await;

        let user = self.users.get_by_id(id).await?;
        if blocked {
            self.ensure_admin_remains(&user, "block").await?;
        }

        let updated = self
            .users
            .update(
                id,
                UpdateUser {
                    blocked: Some(blocked),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id = %id, blocked, by = %principal.username, "User blocked flag changed");
        Ok(updated)
    }

    pub async fn reset_password(
        &self,
        principal: &Principal,
        id: Uuid,
        password: &str,
    ) -> StockroomResult<()> {
        require_admin(principal)?;
        if password.is_empty() {
            return Err(StockroomError::Validation {
                message: "password must not be empty".into(),
            });
        }
        let _store = self.gate.shared().await;
        self.users
            .update(
                id,
                UpdateUser {
                    password: Some(password.into()),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id = %id, by = %principal.username, "Password reset");
        Ok(())
    }

    /// Delete a user together with its memberships and direct shares.
    /// Resources it owns stay behind without an owner account.
    pub async fn delete_user(&self, principal: &Principal, id: Uuid) -> StockroomResult<()> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        let _admins = self.admins.lock().await;

        let user = self.users.get_by_id(id).await?;
        self.ensure_admin_remains(&user, "delete").await?;

        self.users.delete(id).await?;
        info!(user_id = %id, username = %user.username, by = %principal.username, "User deleted");
        Ok(())
    }

    /// Refuse to touch the reserved admin, or to take away the last
    /// enabled admin.
    async fn ensure_admin_remains(&self, user: &User, verb: &str) -> StockroomResult<()> {
        if user.is_reserved_admin() {
            return Err(StockroomError::InvalidState {
                reason: format!("cannot {verb} the reserved admin account"),
            });
        }
        if !user.is_enabled_admin() {
            return Ok(());
        }

        let enabled = self
            .users
            .list_by_role(Role::Admin)
            .await?
            .into_iter()
            .filter(User::is_enabled_admin)
            .count();
        if enabled <= 1 {
            return Err(StockroomError::InvalidState {
                reason: format!("cannot {verb} the last enabled admin"),
            });
        }
        Ok(())
    }
}
