//! Backup snapshot model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::item::Item;
use super::resource::Resource;
use super::share::{DirectShare, GroupShare};
use super::user::User;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    pub user_id: Uuid,
    pub group_id: Uuid,
}

/// Everything a restore puts back. A restore keeps the live reserved
/// admin in place of the snapshot's copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    pub memberships: Vec<Membership>,
    pub resources: Vec<Resource>,
    pub items: Vec<Item>,
    pub direct_shares: Vec<DirectShare>,
    pub group_shares: Vec<GroupShare>,
}

/// A backup file as seen on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}
