//! Resource Container Service: inventory/checklist CRUD behind the access
//! decision engine.
//!
//! One code path serves both resource kinds; the kind is an explicit
//! argument to every operation and a resource of the other kind is
//! reported as not found.

use serde::Serialize;
use stockroom_core::access::{Action, Principal, can_access};
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::item::{CreateItem, Item, UpdateItem};
use stockroom_core::models::resource::{
    CreateResource, Resource, ResourceKind, ResourceWithGrants,
};
use stockroom_core::repository::{
    GroupRepository, ItemRepository, ResourceRepository, UserRepository,
};
use stockroom_core::search::{self, ItemMatch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::StoreGate;
use crate::guard::{authorize, require_active, subject_for};

/// One row of a container listing.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSummary {
    pub resource: Resource,
    /// `None` when the owning account no longer exists.
    pub owner_username: Option<String>,
    pub item_count: u64,
    /// Highlighted matches; empty when the listing is unfiltered.
    pub matches: Vec<ItemMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDetail {
    pub resource: ResourceWithGrants,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub quantity: Option<i64>,
}

fn validate_name(name: &str, what: &str) -> StockroomResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StockroomError::Validation {
            message: format!("{what} name must not be empty"),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_quantity(quantity: i64) -> StockroomResult<()> {
    if quantity < 0 {
        return Err(StockroomError::Validation {
            message: format!("quantity must not be negative, got {quantity}"),
        });
    }
    Ok(())
}

/// Inventories and checklists and the items inside them. Both kinds go
/// through the same operations; the kind only picks the namespace.
pub struct ContainerService<R, I, U, G> {
    resources: R,
    items: I,
    users: U,
    groups: G,
    gate: StoreGate,
}

impl<R, I, U, G> ContainerService<R, I, U, G>
where
    R: ResourceRepository,
    I: ItemRepository,
    U: UserRepository,
    G: GroupRepository,
{
    pub fn new(resources: R, items: I, users: U, groups: G, gate: StoreGate) -> Self {
        Self {
            resources,
            items,
            users,
            groups,
            gate,
        }
    }

    /// Load a resource and check `action` on it for `principal`.
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

    async fn owner_username(&self, resource: &Resource) -> StockroomResult<Option<String>> {
        match self.users.get_by_id(resource.owner_id).await {
            Ok(owner) => Ok(Some(owner.username)),
            Err(StockroomError::NotFound { .. }) => {
                warn!(resource_id = %resource.id, owner_id = %resource.owner_id, "Resource owner no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Any active principal may create a resource and becomes its owner.
    pub async fn create(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        name: &str,
    ) -> StockroomResult<Resource> {
        require_active(principal)?;
        let name = validate_name(name, kind.as_str())?;
        let _store = self.gate.shared().await;

        let resource = self
            .resources
            .create(CreateResource {
                kind,
                name,
                owner_id: principal.id,
            })
            .await?;

        info!(resource_id = %resource.id, %kind, owner = %principal.username, "Resource created");
        Ok(resource)
    }

    /// Every resource of `kind` the principal may view.
    ///
    /// With a filter, only resources holding at least one item whose name
    /// or description contains it (case-insensitively) are returned, each
    /// with its highlighted matches.
    pub async fn list(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        filter: Option<&str>,
    ) -> StockroomResult<Vec<ResourceSummary>> {
        require_active(principal)?;
        let _store = self.gate.shared().await;

        let subject = subject_for(&self.groups, principal).await?;
        let filter = filter.filter(|f| !f.is_empty());

        let mut summaries = Vec::new();
        for target in self.resources.list_by_kind(kind).await? {
            if !can_access(&subject, &target, Action::View) {
                continue;
            }

            let (item_count, matches) = match filter {
                Some(needle) => {
                    let items = self.items.list_by_resource(target.id()).await?;
                    let matches: Vec<ItemMatch> = items
                        .iter()
                        .filter_map(|item| search::match_item(item, needle))
                        .collect();
                    if matches.is_empty() {
                        continue;
                    }
                    (items.len() as u64, matches)
                }
                None => (self.items.count_by_resource(target.id()).await?, Vec::new()),
            };

            summaries.push(ResourceSummary {
                owner_username: self.owner_username(&target.resource).await?,
                resource: target.resource,
                item_count,
                matches,
            });
        }

        Ok(summaries)
    }

    pub async fn get(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        id: Uuid,
    ) -> StockroomResult<ResourceDetail> {
        let _store = self.gate.shared().await;
        let resource = self
            .load_authorized(principal, kind, id, Action::View)
            .await?;
        let items = self.items.list_by_resource(id).await?;
        Ok(ResourceDetail { resource, items })
    }

    pub async fn rename(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        id: Uuid,
        name: &str,
    ) -> StockroomResult<Resource> {
        let name = validate_name(name, kind.as_str())?;
        let _guard = self.gate.resource(id).await;
        self.load_authorized(principal, kind, id, Action::Edit)
            .await?;

        let renamed = self
            .resources
            .rename(kind, id, name, principal.id)
            .await?;
        info!(resource_id = %id, %kind, by = %principal.username, "Resource renamed");
        Ok(renamed)
    }

    /// Delete the resource together with its items and shares.
    pub async fn delete(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        id: Uuid,
    ) -> StockroomResult<()> {
        let _guard = self.gate.resource(id).await;
        self.load_authorized(principal, kind, id, Action::Delete)
            .await?;

        self.resources.delete(kind, id).await?;
        info!(resource_id = %id, %kind, by = %principal.username, "Resource deleted");
        Ok(())
    }

    pub async fn list_items(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
    ) -> StockroomResult<Vec<Item>> {
        let _store = self.gate.shared().await;
        self.load_authorized(principal, kind, resource_id, Action::View)
            .await?;
        self.items.list_by_resource(resource_id).await
    }

    pub async fn add_item(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        input: NewItem,
    ) -> StockroomResult<Item> {
        let name = validate_name(&input.name, "item")?;
        validate_quantity(input.quantity)?;
        let _guard = self.gate.resource(resource_id).await;
        self.load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;

        let item = self
            .items
            .create(CreateItem {
                resource_id,
                name,
                description: input.description,
                quantity: input.quantity,
                created_by: principal.id,
            })
            .await?;
        info!(item_id = %item.id, resource_id = %resource_id, by = %principal.username, "Item added");
        Ok(item)
    }

    /// Load an item and make sure it lives in `resource_id`.
    async fn item_in(&self, resource_id: Uuid, item_id: Uuid) -> StockroomResult<Item> {
        let item = self.items.get_by_id(item_id).await?;
        if item.resource_id != resource_id {
            return Err(StockroomError::not_found("item", item_id));
        }
        Ok(item)
    }

    pub async fn update_item(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        item_id: Uuid,
        changes: ItemChanges,
    ) -> StockroomResult<Item> {
        let name = changes
            .name
            .as_deref()
            .map(|n| validate_name(n, "item"))
            .transpose()?;
        if let Some(quantity) = changes.quantity {
            validate_quantity(quantity)?;
        }
        let _guard = self.gate.resource(resource_id).await;
        self.load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        self.item_in(resource_id, item_id).await?;

        self.items
            .update(
                item_id,
                UpdateItem {
                    name,
                    description: changes.description,
                    quantity: changes.quantity,
                    updated_by: principal.id,
                },
            )
            .await
    }

    pub async fn delete_item(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        resource_id: Uuid,
        item_id: Uuid,
    ) -> StockroomResult<()> {
        let _guard = self.gate.resource(resource_id).await;
        self.load_authorized(principal, kind, resource_id, Action::Edit)
            .await?;
        self.item_in(resource_id, item_id).await?;

        self.items.delete(item_id).await?;
        info!(item_id = %item_id, resource_id = %resource_id, by = %principal.username, "Item deleted");
        Ok(())
    }
}
