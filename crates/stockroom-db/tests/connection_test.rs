//! Connecting through [`DbManager`] to an embedded store.

use stockroom_core::models::role::Role;
use stockroom_core::models::user::CreateUser;
use stockroom_core::repository::UserRepository;
use stockroom_db::repository::SurrealUserRepository;
use stockroom_db::{DbConfig, DbManager};

#[tokio::test]
async fn embedded_store_needs_no_credentials() {
    let config = DbConfig {
        url: "mem://".into(),
        username: String::new(),
        password: String::new(),
        ..Default::default()
    };
    let manager = DbManager::connect(&config).await.unwrap();
    stockroom_db::run_migrations(manager.client()).await.unwrap();

    let users = SurrealUserRepository::new(manager.client().clone());
    let created = users
        .create(CreateUser {
            username: "alice".into(),
            email: None,
            password: "correct-horse".into(),
            role: Some(Role::Viewer),
        })
        .await
        .unwrap();
    assert_eq!(users.get_by_username("alice").await.unwrap().id, created.id);
}
