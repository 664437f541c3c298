//! Integration tests for Resource and Item repositories.

use stockroom_core::error::StockroomError;
use stockroom_core::models::item::{CreateItem, UpdateItem};
use stockroom_core::models::resource::{CreateResource, ResourceKind};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::CreateUser;
use stockroom_core::repository::{
    ItemRepository, ResourceRepository, ShareRepository, UserRepository,
};
use stockroom_db::repository::{
    SurrealItemRepository, SurrealResourceRepository, SurrealShareRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    stockroom_db::run_migrations(&db).await.unwrap();

    let owner = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            username: "owner".into(),
            email: None,
            password: "correct horse battery".into(),
            role: Some(Role::Moderator),
        })
        .await
        .unwrap();
    (db, owner.id)
}

fn inventory(name: &str, owner_id: Uuid) -> CreateResource {
    CreateResource {
        kind: ResourceKind::Inventory,
        name: name.into(),
        owner_id,
    }
}

fn item(resource_id: Uuid, name: &str, created_by: Uuid) -> CreateItem {
    CreateItem {
        resource_id,
        name: name.into(),
        description: None,
        quantity: 1,
        created_by,
    }
}

#[tokio::test]
async fn create_and_get_resource() {
    let (db, owner) = setup().await;
    let repo = SurrealResourceRepository::new(db);

    let created = repo.create(inventory("Pantry", owner)).await.unwrap();
    assert_eq!(created.kind, ResourceKind::Inventory);
    assert_eq!(created.owner_id, owner);
    assert_eq!(created.updated_by, None);

    let loaded = repo
        .get_by_id(ResourceKind::Inventory, created.id)
        .await
        .unwrap();
    assert_eq!(loaded.id(), created.id);
    assert_eq!(loaded.owner_id(), owner);
    assert!(loaded.shared_user_ids.is_empty());
    assert!(loaded.shared_group_ids.is_empty());
}

#[tokio::test]
async fn wrong_kind_is_not_found() {
    let (db, owner) = setup().await;
    let repo = SurrealResourceRepository::new(db);

    let created = repo.create(inventory("Pantry", owner)).await.unwrap();
    let err = repo
        .get_by_id(ResourceKind::Checklist, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));

    let err = repo
        .rename(ResourceKind::Checklist, created.id, "x".into(), owner)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));
}

#[tokio::test]
async fn list_by_kind_includes_grants() {
    let (db, owner) = setup().await;
    let repo = SurrealResourceRepository::new(db.clone());
    let shares = SurrealShareRepository::new(db);

    let pantry = repo.create(inventory("Pantry", owner)).await.unwrap();
    repo.create(CreateResource {
        kind: ResourceKind::Checklist,
        name: "Chores".into(),
        owner_id: owner,
    })
    .await
    .unwrap();
    shares.create_user_share(pantry.id, owner).await.unwrap();

    let inventories = repo.list_by_kind(ResourceKind::Inventory).await.unwrap();
    assert_eq!(inventories.len(), 1);
    assert!(inventories[0].shared_user_ids.contains(&owner));

    let checklists = repo.list_by_kind(ResourceKind::Checklist).await.unwrap();
    assert_eq!(checklists.len(), 1);
    assert_eq!(checklists[0].resource.name, "Chores");
}

#[tokio::test]
async fn rename_records_editor() {
    let (db, owner) = setup().await;
    let repo = SurrealResourceRepository::new(db);

    let created = repo.create(inventory("Pantry", owner)).await.unwrap();
    let renamed = repo
        .rename(ResourceKind::Inventory, created.id, "Larder".into(), owner)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Larder");
    assert_eq!(renamed.updated_by, Some(owner));
}

#[tokio::test]
async fn item_lifecycle() {
    let (db, owner) = setup().await;
    let resources = SurrealResourceRepository::new(db.clone());
    let items = SurrealItemRepository::new(db);

    let pantry = resources.create(inventory("Pantry", owner)).await.unwrap();
    let flour = items
        .create(CreateItem {
            description: Some("Whole wheat".into()),
            quantity: 3,
            ..item(pantry.id, "Flour", owner)
        })
        .await
        .unwrap();
    items.create(item(pantry.id, "Sugar", owner)).await.unwrap();

    assert_eq!(items.count_by_resource(pantry.id).await.unwrap(), 2);

    let updated = items
        .update(
            flour.id,
            UpdateItem {
                name: None,
                description: Some(None),
                quantity: Some(5),
                updated_by: owner,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.quantity, 5);
    assert_eq!(updated.description, None);
    assert_eq!(updated.updated_by, Some(owner));
    assert_eq!(updated.name, "Flour");

    items.delete(flour.id).await.unwrap();
    let remaining = items.list_by_resource(pantry.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Sugar");

    let err = items.delete(flour.id).await.unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));
}

#[tokio::test]
async fn delete_cascades_items_and_shares() {
    let (db, owner) = setup().await;
    let resources = SurrealResourceRepository::new(db.clone());
    let items = SurrealItemRepository::new(db.clone());
    let shares = SurrealShareRepository::new(db);

    let pantry = resources.create(inventory("Pantry", owner)).await.unwrap();
    let keep = resources.create(inventory("Garage", owner)).await.unwrap();
    items.create(item(pantry.id, "Flour", owner)).await.unwrap();
    items.create(item(keep.id, "Hammer", owner)).await.unwrap();
    shares.create_user_share(pantry.id, owner).await.unwrap();

    resources
        .delete(ResourceKind::Inventory, pantry.id)
        .await
        .unwrap();

    assert_eq!(items.count_by_resource(pantry.id).await.unwrap(), 0);
    assert_eq!(items.count_by_resource(keep.id).await.unwrap(), 1);

    assert!(shares.list_shared_users(pantry.id).await.unwrap().is_empty());

    let err = resources
        .get_by_id(ResourceKind::Inventory, pantry.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));

    let err = resources
        .delete(ResourceKind::Inventory, pantry.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));
}
