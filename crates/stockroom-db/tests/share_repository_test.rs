//! Integration tests for the sharing ledger.

use stockroom_core::error::StockroomError;
use stockroom_core::models::group::CreateGroup;
use stockroom_core::models::resource::{CreateResource, ResourceKind};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::CreateUser;
use stockroom_core::repository::{
    GroupRepository, ResourceRepository, ShareRepository, UserRepository,
};
use stockroom_db::repository::{
    SurrealGroupRepository, SurrealResourceRepository, SurrealShareRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    users: SurrealUserRepository<Db>,
    groups: SurrealGroupRepository<Db>,
    resources: SurrealResourceRepository<Db>,
    shares: SurrealShareRepository<Db>,
    owner: Uuid,
    resource: Uuid,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    stockroom_db::run_migrations(&db).await.unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let resources = SurrealResourceRepository::new(db.clone());
    let owner = create_user(&users, "owner").await;
    let resource = resources
        .create(CreateResource {
            kind: ResourceKind::Inventory,
            name: "Pantry".into(),
            owner_id: owner,
        })
        .await
        .unwrap()
        .id;

    Fixture {
        users,
        groups: SurrealGroupRepository::new(db.clone()),
        resources,
        shares: SurrealShareRepository::new(db),
        owner,
        resource,
    }
}

async fn create_user(users: &SurrealUserRepository<Db>, username: &str) -> Uuid {
    users
        .create(CreateUser {
            username: username.into(),
            email: None,
            password: "correct horse battery".into(),
            role: Some(Role::Viewer),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn user_share_create_list_delete() {
    let f = setup().await;
    let bob = create_user(&f.users, "bob").await;
    let carol = create_user(&f.users, "carol").await;

    let share = f.shares.create_user_share(f.resource, carol).await.unwrap();
    assert_eq!(share.user_id, carol);
    assert_eq!(share.resource_id, f.resource);
    f.shares.create_user_share(f.resource, bob).await.unwrap();

    // Listed in share order, not account order.
    let shared = f.shares.list_shared_users(f.resource).await.unwrap();
    let names: Vec<_> = shared.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["carol", "bob"]);

    let loaded = f
        .resources
        .get_by_id(ResourceKind::Inventory, f.resource)
        .await
        .unwrap();
    assert!(loaded.shared_user_ids.contains(&bob));
    assert!(loaded.shared_user_ids.contains(&carol));
    assert!(!loaded.shared_user_ids.contains(&f.owner));

    f.shares.delete_user_share(f.resource, bob).await.unwrap();
    let shared = f.shares.list_shared_users(f.resource).await.unwrap();
    assert_eq!(shared.len(), 1);
}

#[tokio::test]
async fn duplicate_user_share_is_rejected() {
    let f = setup().await;
    let bob = create_user(&f.users, "bob").await;

    f.shares.create_user_share(f.resource, bob).await.unwrap();
    let err = f
        .shares
        .create_user_share(f.resource, bob)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::AlreadyExists { .. }));
    assert_eq!(f.shares.list_shared_users(f.resource).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_missing_share_is_not_found() {
    let f = setup().await;
    let bob = create_user(&f.users, "bob").await;

    let err = f
        .shares
        .delete_user_share(f.resource, bob)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));
}

#[tokio::test]
async fn share_with_unknown_target_is_not_found() {
    let f = setup().await;

    let err = f
        .shares
        .create_user_share(f.resource, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { .. }));

    let bob = create_user(&f.users, "bob").await;
    let err = f
        .shares
        .create_user_share(Uuid::new_v4(), bob)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { ref entity, .. } if entity == "resource"));
}

#[tokio::test]
async fn group_share_lifecycle() {
    let f = setup().await;
    let group = f
        .groups
        .create(CreateGroup {
            name: "kitchen".into(),
            role: Role::Viewer,
        })
        .await
        .unwrap();

    let share = f
        .shares
        .create_group_share(f.resource, group.id)
        .await
        .unwrap();
    assert_eq!(share.group_id, group.id);

    let err = f
        .shares
        .create_group_share(f.resource, group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockroomError::AlreadyExists { .. }));

    let listed = f.shares.list_shared_groups(f.resource).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "kitchen");

    let loaded = f
        .resources
        .get_by_id(ResourceKind::Inventory, f.resource)
        .await
        .unwrap();
    assert!(loaded.shared_group_ids.contains(&group.id));

    f.shares
        .delete_group_share(f.resource, group.id)
        .await
        .unwrap();
    assert!(f.shares.list_shared_groups(f.resource).await.unwrap().is_empty());
}
