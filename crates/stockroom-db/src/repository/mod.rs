//! SurrealDB repository implementations.

mod backup;
mod group;
mod item;
mod resource;
mod share;
mod user;

pub use backup::SurrealBackupRepository;
pub use group::SurrealGroupRepository;
pub use item::SurrealItemRepository;
pub use resource::SurrealResourceRepository;
pub use share::SurrealShareRepository;
pub use user::SurrealUserRepository;

use std::str::FromStr;

use stockroom_core::models::role::Role;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

impl CountRow {
    pub(crate) fn total_of(rows: &[CountRow]) -> u64 {
        rows.first().map(|r| r.total).unwrap_or(0)
    }
}

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_optional_uuid(s: Option<&str>, what: &str) -> Result<Option<Uuid>, DbError> {
    s.map(|s| parse_uuid(s, what)).transpose()
}

pub(crate) fn parse_role(s: &str) -> Result<Role, DbError> {
    Role::from_str(s).map_err(|_| DbError::Decode(format!("unknown role: {s}")))
}
