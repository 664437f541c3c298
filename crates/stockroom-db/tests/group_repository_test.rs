//! Integration tests for Group repository and membership edges.

use stockroom_core::error::StockroomError;
use stockroom_core::models::group::{CreateGroup, UpdateGroup};
use stockroom_core::models::resource::{CreateResource, ResourceKind};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::CreateUser;
use stockroom_core::repository::{
    GroupRepository, Pagination, ResourceRepository, ShareRepository, UserRepository,
};
use stockroom_db::repository::{
    SurrealGroupRepository, SurrealResourceRepository, SurrealShareRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    stockroom_db::run_migrations(&db).await.unwrap();
    db
}

async fn create_user(db: &Surreal<Db>, username: &str) -> Uuid {
    SurrealUserRepository::new(db.clone())
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

fn new_group(name: &str) -> CreateGroup {
    CreateGroup {
        name: name.into(),
        role: Role::Viewer,
    }
}

#[tokio::test]
async fn create_get_update_group() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let group = repo.create(new_group("kitchen")).await.unwrap();
    assert_eq!(group.name, "kitchen");
    assert_eq!(group.role, Role::Viewer);

    let fetched = repo.get_by_id(group.id).await.unwrap();
    assert_eq!(fetched.name, "kitchen");

    let renamed = repo
        .update(
            group.id,
            UpdateGroup {
                name: Some("galley".into()),
                role: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "galley");
    assert_eq!(renamed.role, Role::Viewer);
}

#[tokio::test]
async fn duplicate_group_name_is_rejected() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db);

    repo.create(new_group("kitchen")).await.unwrap();
    let err = repo.create(new_group("kitchen")).await.unwrap_err();
    assert!(matches!(err, StockroomError::AlreadyExists { .. }));
}

#[tokio::test]
async fn membership_edges() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let group = repo.create(new_group("kitchen")).await.unwrap();
    let other = repo.create(new_group("garage")).await.unwrap();

    repo.add_member(alice, group.id).await.unwrap();
    repo.add_member(bob, group.id).await.unwrap();
    repo.add_member(alice, other.id).await.unwrap();
    // Adding twice keeps a single edge.
    repo.add_member(alice, group.id).await.unwrap();

    let members = repo.get_members(group.id).await.unwrap();
    let names: Vec<_> = members.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);

    let alice_groups = repo.get_user_groups(alice).await.unwrap();
    assert_eq!(alice_groups.len(), 2);

    repo.remove_member(alice, group.id).await.unwrap();
    let members = repo.get_members(group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username, "bob");
}

#[tokio::test]
async fn add_member_requires_both_endpoints() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());
    let alice = create_user(&db, "alice").await;
    let group = repo.create(new_group("kitchen")).await.unwrap();

    let err = repo.add_member(Uuid::new_v4(), group.id).await.unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { ref entity, .. } if entity == "user"));

    let err = repo.add_member(alice, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StockroomError::NotFound { ref entity, .. } if entity == "group"));
}

#[tokio::test]
async fn delete_prunes_memberships_and_group_shares() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());
    let resources = SurrealResourceRepository::new(db.clone());
    let shares = SurrealShareRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let group = repo.create(new_group("kitchen")).await.unwrap();
    repo.add_member(alice, group.id).await.unwrap();

    let resource = resources
        .create(CreateResource {
            kind: ResourceKind::Checklist,
            name: "Groceries".into(),
            owner_id: alice,
        })
        .await
        .unwrap();
    shares.create_group_share(resource.id, group.id).await.unwrap();

    repo.delete(group.id).await.unwrap();

    assert!(repo.get_user_groups(alice).await.unwrap().is_empty());
    let loaded = resources
        .get_by_id(ResourceKind::Checklist, resource.id)
        .await
        .unwrap();
    assert!(loaded.shared_group_ids.is_empty());

    let listed = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 0);
}
