//! Integration tests for snapshot export and restore.

use stockroom_core::models::group::CreateGroup;
use stockroom_core::models::item::CreateItem;
use stockroom_core::models::resource::{CreateResource, ResourceKind};
use stockroom_core::models::role::Role;
use stockroom_core::models::user::{CreateUser, RESERVED_ADMIN_USERNAME};
use stockroom_core::repository::{
    BackupRepository, GroupRepository, ItemRepository, ResourceRepository, ShareRepository,
    UserRepository,
};
use stockroom_db::repository::{
    SurrealBackupRepository, SurrealGroupRepository, SurrealItemRepository,
    SurrealResourceRepository, SurrealShareRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn fresh_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    stockroom_db::run_migrations(&db).await.unwrap();
    db
}

fn new_user(username: &str, role: Role) -> CreateUser {
    CreateUser {
        username: username.into(),
        email: None,
        password: "correct horse battery".into(),
        role: Some(role),
    }
}

#[tokio::test]
async fn restore_replaces_everything_but_the_reserved_admin() {
    let db = fresh_db().await;
    let users = SurrealUserRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db.clone());
    let resources = SurrealResourceRepository::new(db.clone());
    let items = SurrealItemRepository::new(db.clone());
    let shares = SurrealShareRepository::new(db.clone());
    let backup = SurrealBackupRepository::new(db.clone());

    let admin = users
        .create(new_user(RESERVED_ADMIN_USERNAME, Role::Admin))
        .await
        .unwrap();
    let alice = users.create(new_user("alice", Role::Moderator)).await.unwrap();
    let bob = users.create(new_user("bob", Role::Viewer)).await.unwrap();
    let group = groups
        .create(CreateGroup {
            name: "kitchen".into(),
            role: Role::Viewer,
        })
        .await
        .unwrap();
    groups.add_member(bob.id, group.id).await.unwrap();

    let pantry = resources
        .create(CreateResource {
            kind: ResourceKind::Inventory,
            name: "Pantry".into(),
            owner_id: alice.id,
        })
        .await
        .unwrap();
    let admin_list = resources
        .create(CreateResource {
            kind: ResourceKind::Checklist,
            name: "Admin chores".into(),
            owner_id: admin.id,
        })
        .await
        .unwrap();
    items
        .create(CreateItem {
            resource_id: pantry.id,
            name: "Flour".into(),
            description: Some("Whole wheat".into()),
            quantity: 2,
            created_by: alice.id,
        })
        .await
        .unwrap();
    shares.create_user_share(pantry.id, bob.id).await.unwrap();
    shares.create_group_share(pantry.id, group.id).await.unwrap();

    let snapshot = backup.export_snapshot().await.unwrap();
    assert_eq!(snapshot.users.len(), 3);
    assert_eq!(snapshot.resources.len(), 2);
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.memberships.len(), 1);
    assert_eq!(snapshot.direct_shares.len(), 1);
    assert_eq!(snapshot.group_shares.len(), 1);

    // Diverge from the snapshot, then restore it.
    users.create(new_user("mallory", Role::Viewer)).await.unwrap();
    resources
        .delete(ResourceKind::Inventory, pantry.id)
        .await
        .unwrap();

    backup.restore_snapshot(snapshot).await.unwrap();

    assert!(users.get_by_username("mallory").await.is_err());
    assert_eq!(users.get_by_username("alice").await.unwrap().id, alice.id);
    assert_eq!(
        users
            .get_by_username(RESERVED_ADMIN_USERNAME)
            .await
            .unwrap()
            .id,
        admin.id
    );

    let restored = resources
        .get_by_id(ResourceKind::Inventory, pantry.id)
        .await
        .unwrap();
    assert_eq!(restored.owner_id(), alice.id);
    assert!(restored.shared_user_ids.contains(&bob.id));
    assert!(restored.shared_group_ids.contains(&group.id));

    let restored_items = items.list_by_resource(pantry.id).await.unwrap();
    assert_eq!(restored_items.len(), 1);
    assert_eq!(restored_items[0].description.as_deref(), Some("Whole wheat"));

    let members = groups.get_members(group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, bob.id);

    let admin_owned = resources
        .get_by_id(ResourceKind::Checklist, admin_list.id)
        .await
        .unwrap();
    assert_eq!(admin_owned.owner_id(), admin.id);
}

#[tokio::test]
async fn restore_points_admin_references_at_the_live_admin() {
    let source = fresh_db().await;
    let src_users = SurrealUserRepository::new(source.clone());
    let src_resources = SurrealResourceRepository::new(source.clone());
    let src_admin = src_users
        .create(new_user(RESERVED_ADMIN_USERNAME, Role::Admin))
        .await
        .unwrap();
    let list = src_resources
        .create(CreateResource {
            kind: ResourceKind::Checklist,
            name: "Ops".into(),
            owner_id: src_admin.id,
        })
        .await
        .unwrap();
    let snapshot = SurrealBackupRepository::new(source)
        .export_snapshot()
        .await
        .unwrap();

    let target = fresh_db().await;
    let users = SurrealUserRepository::new(target.clone());
    let live_admin = users
        .create(new_user(RESERVED_ADMIN_USERNAME, Role::Admin))
        .await
        .unwrap();
    SurrealBackupRepository::new(target.clone())
        .restore_snapshot(snapshot)
        .await
        .unwrap();

    let all = users.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, live_admin.id);

    let restored = SurrealResourceRepository::new(target)
        .get_by_id(ResourceKind::Checklist, list.id)
        .await
        .unwrap();
    assert_eq!(restored.owner_id(), live_admin.id);
}

#[tokio::test]
async fn restore_skips_rows_whose_resource_is_missing() {
    let source = fresh_db().await;
    let users = SurrealUserRepository::new(source.clone());
    let groups = SurrealGroupRepository::new(source.clone());
    let resources = SurrealResourceRepository::new(source.clone());
    let items = SurrealItemRepository::new(source.clone());
    let shares = SurrealShareRepository::new(source.clone());

    let alice = users.create(new_user("alice", Role::Moderator)).await.unwrap();
    let bob = users.create(new_user("bob", Role::Viewer)).await.unwrap();
    let group = groups
        .create(CreateGroup {
            name: "kitchen".into(),
            role: Role::Viewer,
        })
        .await
        .unwrap();
    let pantry = resources
        .create(CreateResource {
            kind: ResourceKind::Inventory,
            name: "Pantry".into(),
            owner_id: alice.id,
        })
        .await
        .unwrap();
    items
        .create(CreateItem {
            resource_id: pantry.id,
            name: "Flour".into(),
            description: None,
            quantity: 1,
            created_by: alice.id,
        })
        .await
        .unwrap();
    shares.create_user_share(pantry.id, bob.id).await.unwrap();
    shares.create_group_share(pantry.id, group.id).await.unwrap();

    let mut snapshot = SurrealBackupRepository::new(source)
        .export_snapshot()
        .await
        .unwrap();
    // The pantry's rows are present but the pantry itself is not.
    snapshot.resources.clear();

    let target = fresh_db().await;
    let backup = SurrealBackupRepository::new(target.clone());
    backup.restore_snapshot(snapshot).await.unwrap();

    let restored = backup.export_snapshot().await.unwrap();
    assert_eq!(restored.users.len(), 2);
    assert_eq!(restored.groups.len(), 1);
    assert!(restored.resources.is_empty());
    assert!(restored.items.is_empty());
    assert!(restored.direct_shares.is_empty());
    assert!(restored.group_shares.is_empty());
    assert!(
        SurrealItemRepository::new(target)
            .list_by_resource(pantry.id)
            .await
            .unwrap()
            .is_empty()
    );
}
