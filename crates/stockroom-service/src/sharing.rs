//! Sharing Service: grant and revoke access to a resource for single users
//! and for whole groups.
//!
//! Every mutation needs `edit` on the target resource. Sharing something
//! that is already shared is not an error: the caller gets an informational
//! outcome and nothing is written.

use stockroom_core::access::{Action, Principal};
use stockroom_core::error::StockroomResult;
use stockroom_core::models::group::Group;
use stockroom_core::models::resource::{ResourceKind, ResourceWithGrants};
use stockroom_core::models::share::{GroupShareOutcome, ShareOutcome};
use stockroom_core::models::user::User;
use stockroom_core::repository::{
    GroupRepository, ResourceRepository, ShareRepository, UserRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::gate::StoreGate;
use crate::guard::{authorize, require_active, subject_for};

/// Direct and group shares of a resource, checked against `edit`.
pub struct SharingService<R, S, U, G> {
    resources: R,
    shares: S,
    users: U,
    groups: G,
    gate: StoreGate,
}

impl<R, S, U, G> SharingService<R, S, U, G>
where
    R: ResourceRepository,
    S: ShareRepository,
    U: UserRepository,
    G: GroupRepository,
{
    pub fn new(resources: R, shares: S, users: U, groups: G, gate: StoreGate) -> Self {
        Self {
            resources,
            shares,
            users,
            groups,
            gate,
        }
    }

    async fn load_authorized(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        id: Uuid,
        action: Action,
    ) -> StockroomResult<ResourceWithGrants> {
        require_active(principal)?;
        let target = self.resources.get_by_id(kind, id).await?;
        let subject = subject_for(&self.groups, principal).await?;
        authorize(&subject, &target, action)?;
        Ok(target)
    }

    /// Share a resource with one user, looked up by username.
    ///
    /// A user who already reaches the resource through one of the groups it
    /// is shared with gets no direct share on top.
    pub async fn share_directly(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        username: &str,
    ) -> StockroomResult<ShareOutcome> {
        let _guard = self.gate.resource(resource_id).await;
        let target = self
            .load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        let user = self.users.get_by_username(username).await?;

        if target.shared_user_ids.contains(&user.id) {
            return Ok(ShareOutcome::AlreadyShared);
        }

        let via_group = self
            .groups
            .get_user_groups(user.id)
            .await?
            .iter()
            .any(|g| target.shared_group_ids.contains(&g.id));
        if via_group {
            return Ok(ShareOutcome::AlreadyViaGroup);
        }

        self.shares.create_user_share(resource_id, user.id).await?;
        info!(
            resource_id = %resource_id,
            %kind,
            target = %user.username,
            by = %principal.username,
            "Resource shared with user"
        );
        Ok(ShareOutcome::Created)
    }

    pub async fn unshare_directly(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        username: &str,
    ) -> StockroomResult<()> {
        let _guard = self.gate.resource(resource_id).await;
        self.load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        let user = self.users.get_by_username(username).await?;

        self.shares.delete_user_share(resource_id, user.id).await?;
        info!(
            resource_id = %resource_id,
            %kind,
            target = %user.username,
            by = %principal.username,
            "Direct share revoked"
        );
        Ok(())
    }

    /// Share a resource with every member of a group. Members that already
    /// hold a direct share keep it.
    pub async fn share_with_group(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> StockroomResult<GroupShareOutcome> {
        let _guard = self.gate.resource(resource_id).await;
        let target = self
            .load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        let group = self.groups.get_by_id(group_id).await?;

        if target.shared_group_ids.contains(&group.id) {
            return Ok(GroupShareOutcome::AlreadyShared);
        }

        self.shares.create_group_share(resource_id, group.id).await?;
        info!(
            resource_id = %resource_id,
            %kind,
            group = %group.name,
            by = %principal.username,
            "Resource shared with group"
        );
        Ok(GroupShareOutcome::Created)
    }

    pub async fn unshare_from_group(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> StockroomResult<()> {
        let _guard = self.gate.resource(resource_id).await;
        self.load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        let group = self.groups.get_by_id(group_id).await?;

        self.shares.delete_group_share(resource_id, group.id).await?;
        info!(
            resource_id = %resource_id,
            %kind,
            group = %group.name,
            by = %principal.username,
            "Group share revoked"
        );
        Ok(())
    }

    pub async fn list_shared_users(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<Vec<User>> {
        let _store = self.gate.shared().await;
        self.load_authorized(principal, kind, resource_id, Action::View)
            .await?;
        self.shares.list_shared_users(resource_id).await
    }

    pub async fn list_shared_groups(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<Vec<Group>> {
        let _store = self.gate.shared().await;
        self.load_authorized(principal, kind, resource_id, Action::View)
            .await?;
        self.shares.list_shared_groups(resource_id).await
    }
}
