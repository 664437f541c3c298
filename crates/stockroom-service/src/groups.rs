//! Group administration. Admin-only.

use stockroom_core::access::Principal;
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::group::{CreateGroup, Group, UpdateGroup};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::User;
use stockroom_core::repository::{GroupRepository, PaginatedResult, Pagination};
use tracing::info;
use uuid::Uuid;

use crate::gate::StoreGate;
use crate::guard::require_admin;

/// Role given to groups created without one.
pub const DEFAULT_GROUP_ROLE: Role = Role::Viewer;

fn group_name(name: &str) -> StockroomResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StockroomError::Validation {
            message: "group name must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

/// Admin-only group management and membership.
pub struct GroupAdminService<G> {
    groups: G,
    gate: StoreGate,
}

impl<G: GroupRepository> GroupAdminService<G> {
    pub fn new(groups: G, gate: StoreGate) -> Self {
        Self { groups, gate }
    }

    pub async fn create_group(
        &self,
        principal: &Principal,
        name: &str,
        role: Option<Role>,
    ) -> StockroomResult<Group> {
        require_admin(principal)?;
        let name = group_name(name)?;
        let _store = self.gate.shared().await;

        let group = self
            .groups
            .create(CreateGroup {
                name,
                role: role.unwrap_or(DEFAULT_GROUP_ROLE),
            })
            .await?;
        info!(group_id = %group.id, name = %group.name, by = %principal.username, "Group created");
        Ok(group)
    }

    pub async fn update_group(
        &self,
        principal: &Principal,
        id: Uuid,
        name: Option<&str>,
        role: Option<Role>,
    ) -> StockroomResult<Group> {
        require_admin(principal)?;
        let name = name.map(group_name).transpose()?;
        let _store = self.gate.shared().await;

        let group = self.groups.update(id, UpdateGroup { name, role }).await?;
        info!(group_id = %id, by = %principal.username, "Group updated");
        Ok(group)
    }

    /// Memberships and group shares are removed with the group.
    pub async fn delete_group(&self, principal: &Principal, id: Uuid) -> StockroomResult<()> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.groups.delete(id).await?;
        info!(group_id = %id, by = %principal.username, "Group deleted");
        Ok(())
    }

    pub async fn list_groups(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> StockroomResult<PaginatedResult<Group>> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.groups.list(pagination).await
    }

    pub async fn add_member(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> StockroomResult<()> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.groups.add_member(user_id, group_id).await?;
        info!(group_id = %group_id, user_id = %user_id, by = %principal.username, "Member added");
        Ok(())
    }

    pub async fn remove_member(
        &self,
        principal: &Principal,
        group_id: Uuid,
        user_id: Uuid,
    ) -> StockroomResult<()> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.groups.remove_member(user_id, group_id).await?;
        info!(group_id = %group_id, user_id = %user_id, by = %principal.username, "Member removed");
        Ok(())
    }

    pub async fn members(&self, principal: &Principal, group_id: Uuid) -> StockroomResult<Vec<User>> {
        require_admin(principal)?;
        let _store = self.gate.shared().await;
        self.groups.get_by_id(group_id).await?;
        self.groups.get_members(group_id).await
    }
}
