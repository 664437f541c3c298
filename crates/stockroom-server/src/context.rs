//! The application context: every service wired to one database client,
//! constructed once at start-up and handed to whatever serves requests.

use std::sync::Arc;

use stockroom_auth::AuthService;
use stockroom_db::repository::{
    SurrealBackupRepository, SurrealGroupRepository, SurrealItemRepository,
    SurrealResourceRepository, SurrealShareRepository, SurrealUserRepository,
};
use stockroom_service::{
    AccessEnumerationService, BackupScheduler, BackupService, ContainerService,
    GroupAdminService, SharingService, StoreGate, UserAdminService,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use crate::settings::AppConfig;

type Users = SurrealUserRepository<Any>;
type Groups = SurrealGroupRepository<Any>;
type Resources = SurrealResourceRepository<Any>;
type Items = SurrealItemRepository<Any>;
type Shares = SurrealShareRepository<Any>;
type Backups = SurrealBackupRepository<Any>;

pub struct AppContext {
    pub auth: AuthService<Users>,
    pub containers: ContainerService<Resources, Items, Users, Groups>,
    pub sharing: SharingService<Resources, Shares, Users, Groups>,
    pub access: AccessEnumerationService<Resources, Shares, Users, Groups>,
    pub users: UserAdminService<Users>,
    pub groups: GroupAdminService<Groups>,
    pub backups: Arc<BackupService<Backups>>,
    pub scheduler: BackupScheduler<Backups>,
}

impl AppContext {
    pub fn new(db: &Surreal<Any>, config: &AppConfig) -> Self {
        let gate = StoreGate::new();
        let users = match &config.auth.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };
        let groups = SurrealGroupRepository::new(db.clone());
        let resources = SurrealResourceRepository::new(db.clone());
        let shares = SurrealShareRepository::new(db.clone());

        let backups = Arc::new(BackupService::new(
            SurrealBackupRepository::new(db.clone()),
            config.backup.clone(),
            gate.clone(),
        ));

        Self {
            auth: AuthService::new(users.clone(), config.auth.clone()),
            containers: ContainerService::new(
                resources.clone(),
                SurrealItemRepository::new(db.clone()),
                users.clone(),
                groups.clone(),
                gate.clone(),
            ),
            sharing: SharingService::new(
                resources.clone(),
                shares.clone(),
                users.clone(),
                groups.clone(),
                gate.clone(),
            ),
            access: AccessEnumerationService::new(
                resources,
                shares,
                users.clone(),
                groups.clone(),
                gate.clone(),
            ),
            users: UserAdminService::new(users, gate.clone()),
            groups: GroupAdminService::new(groups, gate),
            scheduler: BackupScheduler::new(Arc::clone(&backups)),
            backups,
        }
    }
}
