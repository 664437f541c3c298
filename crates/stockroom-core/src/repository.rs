//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Services are generic over these
//! traits so they carry no dependency on the storage engine.

use uuid::Uuid;

use crate::error::StockroomResult;
use crate::models::{
    backup::BackupSnapshot,
    group::{CreateGroup, Group, UpdateGroup},
    item::{CreateItem, Item, UpdateItem},
    resource::{CreateResource, Resource, ResourceKind, ResourceWithGrants},
    role::Role,
    share::{DirectShare, GroupShare},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = StockroomResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = StockroomResult<User>> + Send;
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = StockroomResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = StockroomResult<User>> + Send;
    /// Hard delete. Group memberships and direct shares held by the user
    /// are removed in the same transaction.
    fn delete(&self, id: Uuid) -> impl Future<Output = StockroomResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = StockroomResult<PaginatedResult<User>>> + Send;
    /// Every user, oldest first.
    fn list_all(&self) -> impl Future<Output = StockroomResult<Vec<User>>> + Send;
    fn list_by_role(&self, role: Role) -> impl Future<Output = StockroomResult<Vec<User>>> + Send;
}

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = StockroomResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = StockroomResult<Group>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = StockroomResult<Group>> + Send;
    /// Memberships and group shares go with the group.
    fn delete(&self, id: Uuid) -> impl Future<Output = StockroomResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = StockroomResult<PaginatedResult<Group>>> + Send;

    /// Add a user to a group (creates a `member_of` edge).
    fn add_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StockroomResult<()>> + Send;

    /// Remove a user from a group.
    fn remove_member(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StockroomResult<()>> + Send;

    /// All members of a group, oldest account first.
    fn get_members(&self, group_id: Uuid)
    -> impl Future<Output = StockroomResult<Vec<User>>> + Send;

    /// All groups a user belongs to.
    fn get_user_groups(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = StockroomResult<Vec<Group>>> + Send;
}

// ---------------------------------------------------------------------------
// Resources & items
// ---------------------------------------------------------------------------

pub trait ResourceRepository: Send + Sync {
    fn create(
        &self,
        input: CreateResource,
    ) -> impl Future<Output = StockroomResult<Resource>> + Send;

    /// Load a resource of the given kind with its share associations.
    /// A resource of another kind is reported as not found.
    fn get_by_id(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> impl Future<Output = StockroomResult<ResourceWithGrants>> + Send;

    fn list_by_kind(
        &self,
        kind: ResourceKind,
    ) -> impl Future<Output = StockroomResult<Vec<ResourceWithGrants>>> + Send;

    fn rename(
        &self,
        kind: ResourceKind,
        id: Uuid,
        name: String,
        updated_by: Uuid,
    ) -> impl Future<Output = StockroomResult<Resource>> + Send;

    /// Delete the resource with its items, direct shares and group shares
    /// in one transaction.
    fn delete(
        &self,
        kind: ResourceKind,
        id: Uuid,
    ) -> impl Future<Output = StockroomResult<()>> + Send;
}

pub trait ItemRepository: Send + Sync {
    fn create(&self, input: CreateItem) -> impl Future<Output = StockroomResult<Item>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = StockroomResult<Item>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateItem,
    ) -> impl Future<Output = StockroomResult<Item>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = StockroomResult<()>> + Send;
    fn list_by_resource(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = StockroomResult<Vec<Item>>> + Send;
    fn count_by_resource(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = StockroomResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Sharing ledger
// ---------------------------------------------------------------------------

pub trait ShareRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the pair is already shared.
    fn create_user_share(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = StockroomResult<DirectShare>> + Send;

    /// Fails with `NotFound` if no such share exists.
    fn delete_user_share(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = StockroomResult<()>> + Send;

    /// Fails with `AlreadyExists` if the pair is already shared.
    fn create_group_share(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StockroomResult<GroupShare>> + Send;

    /// Fails with `NotFound` if no such share exists.
    fn delete_group_share(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = StockroomResult<()>> + Send;

    /// Users the resource is directly shared with, in share order.
    /// Shares pointing at deleted users are skipped.
    fn list_shared_users(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = StockroomResult<Vec<User>>> + Send;

    /// Groups the resource is shared with, in share order.
    /// Shares pointing at deleted groups are skipped.
    fn list_shared_groups(
        &self,
        resource_id: Uuid,
    ) -> impl Future<Output = StockroomResult<Vec<Group>>> + Send;
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

pub trait BackupRepository: Send + Sync {
    /// Read every row of every table.
    fn export_snapshot(&self) -> impl Future<Output = StockroomResult<BackupSnapshot>> + Send;

    /// Truncate shares, items, resources, memberships, groups and every
    /// user except the reserved admin, then load `snapshot`, all in one
    /// transaction. The live reserved admin takes the place of the
    /// snapshot's copy.
    fn restore_snapshot(
        &self,
        snapshot: BackupSnapshot,
    ) -> impl Future<Output = StockroomResult<()>> + Send;
}
