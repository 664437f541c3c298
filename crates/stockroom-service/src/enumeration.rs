//! Access Enumeration Service: who can reach a resource, and how.
//!
//! All three views are projections of one [`ResourceAudience`] loaded per
//! request, so the detail listing and the per-level count can never
//! disagree on the set of users involved.

use stockroom_core::access::audience::{GroupAudience, ResourceAudience};
use stockroom_core::access::{Action, Principal};
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::resource::{ResourceKind, ResourceWithGrants};
use stockroom_core::models::role::Role;
use stockroom_core::models::share::{AccessCounts, AccessEntry};
use stockroom_core::models::user::User;
use stockroom_core::repository::{
    GroupRepository, ResourceRepository, ShareRepository, UserRepository,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::gate::StoreGate;
use crate::guard::{authorize, require_active, require_role, subject_for};

/// Read-only views of who can reach a resource and at which level.
pub struct AccessEnumerationService<R, S, U, G> {
    resources: R,
    shares: S,
    users: U,
    groups: G,
    gate: StoreGate,
}

impl<R, S, U, G> AccessEnumerationService<R, S, U, G>
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

    async fn load_viewable(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        id: Uuid,
    ) -> StockroomResult<ResourceWithGrants> {
        require_active(principal)?;
        let target = self.resources.get_by_id(kind, id).await?;
        let subject = subject_for(&self.groups, principal).await?;
        authorize(&subject, &target, Action::View)?;
        Ok(target)
    }

    async fn load_audience(&self, target: &ResourceWithGrants) -> StockroomResult<ResourceAudience> {
        let owner = match self.users.get_by_id(target.owner_id()).await {
            Ok(owner) => Some(owner),
            Err(StockroomError::NotFound { .. }) => {
                warn!(resource_id = %target.id(), owner_id = %target.owner_id(), "Resource owner no longer exists");
                None
            }
            Err(e) => return Err(e),
        };

        let admins = self.users.list_by_role(Role::Admin).await?;
        let direct_shares = self.shares.list_shared_users(target.id()).await?;

        let mut group_shares = Vec::new();
        for group in self.shares.list_shared_groups(target.id()).await? {
            let members = self.groups.get_members(group.id).await?;
            group_shares.push(GroupAudience { group, members });
        }

        debug!(
            resource_id = %target.id(),
            admins = admins.len(),
            direct = direct_shares.len(),
            groups = group_shares.len(),
            "Loaded resource audience"
        );

        Ok(ResourceAudience {
            owner,
            admins,
            direct_shares,
            group_shares,
        })
    }

    /// Every grant path to the resource, one entry per user per path.
    pub async fn list_access_details(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<Vec<AccessEntry>> {
        let _store = self.gate.shared().await;
        let target = self.load_viewable(principal, kind, resource_id).await?;
        Ok(self.load_audience(&target).await?.access_details())
    }

    /// Distinct users per best access level.
    pub async fn count_access_by_type(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<AccessCounts> {
        let _store = self.gate.shared().await;
        let target = self.load_viewable(principal, kind, resource_id).await?;
        Ok(self.load_audience(&target).await?.access_counts())
    }

    /// Non-admin users no direct or group share reaches yet.
    ///
    /// Reserved for admins and moderators, who must also be able to view
    /// the resource.
    pub async fn find_shareable_users(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<Vec<User>> {
        require_role(principal, &[Role::Admin, Role::Moderator])?;
        let _store = self.gate.shared().await;
        let target = self.load_viewable(principal, kind, resource_id).await?;
        let audience = self.load_audience(&target).await?;
        Ok(audience.shareable_among(self.users.list_all().await?))
    }
}
