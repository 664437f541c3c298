//! Sharing ledger records and the read models derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A grant of one resource to one user. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectShare {
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A grant of one resource to every member of a group. At most one per
/// pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupShare {
    pub group_id: Uuid,
    pub resource_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Result of sharing a resource with a user. The two `Already*` variants
/// are informational: nothing was written and nothing went wrong.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareOutcome {
    Created,
    AlreadyShared,
    AlreadyViaGroup,
}

/// Result of sharing a resource with a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupShareOutcome {
    Created,
    AlreadyShared,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    View,
    Edit,
    Admin,
}

/// The grant path through which a principal reaches a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessVia {
    Owner,
    Admin,
    Share,
    Group,
}

/// One line of the access audit listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessEntry {
    pub username: String,
    pub access_level: AccessLevel,
    pub via: AccessVia,
    pub group_name: Option<String>,
}

/// Number of distinct users at each access level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessCounts {
    pub view: u64,
    pub edit: u64,
    pub admin: u64,
}

impl AccessCounts {
    pub fn total(&self) -> u64 {
        self.view + self.edit + self.admin
    }
}
