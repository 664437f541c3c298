//! SurrealDB implementation of [`BackupRepository`].
//!
//! A snapshot carries every row of every table. On restore the live
//! reserved `admin` account is kept: the snapshot's copy of it is not
//! loaded, and every reference to its id is pointed at the live account.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stockroom_core::error::StockroomResult;
use stockroom_core::models::backup::{BackupSnapshot, Membership, SNAPSHOT_FORMAT_VERSION};
use stockroom_core::models::share::{DirectShare, GroupShare};
use stockroom_core::models::user::RESERVED_ADMIN_USERNAME;
use stockroom_core::repository::BackupRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::group::{GroupRowWithId, rows_into_groups};
use super::item::ItemRowWithId;
use super::resource::{ResourceRowWithGrants, SELECT_WITH_GRANTS};
use super::user::{UserRowWithId, rows_into_users};
use super::parse_uuid;
use crate::error::DbError;

// Read in one transaction so every table reflects the same state.
const EXPORT_QUERY: &str = "\
BEGIN TRANSACTION;
SELECT meta::id(id) AS record_id, * FROM user ORDER BY created_at ASC;
SELECT meta::id(id) AS record_id, * FROM group ORDER BY created_at ASC;
SELECT meta::id(in) AS source_id, meta::id(out) AS target_id, created_at \
    FROM member_of ORDER BY created_at ASC;
SELECT meta::id(id) AS record_id, * FROM item ORDER BY created_at ASC;
SELECT meta::id(in) AS source_id, meta::id(out) AS target_id, created_at \
    FROM shared_with ORDER BY created_at ASC;
SELECT meta::id(in) AS source_id, meta::id(out) AS target_id, created_at \
    FROM group_shared_with ORDER BY created_at ASC;
";

const RESTORE_QUERY: &str = "\
BEGIN TRANSACTION;
DELETE shared_with;
DELETE group_shared_with;
DELETE item;
DELETE resource;
DELETE member_of;
DELETE group;
DELETE user WHERE username != $reserved;
FOR $u IN $users {
    CREATE type::record('user', $u.id) SET
        username = $u.username, email = $u.email,
        password_hash = $u.password_hash, role = $u.role,
        blocked = $u.blocked,
        created_at = <datetime> $u.created_at,
        updated_at = <datetime> $u.updated_at;
};
FOR $g IN $groups {
    CREATE type::record('group', $g.id) SET
        name = $g.name, role = $g.role,
        created_at = <datetime> $g.created_at,
        updated_at = <datetime> $g.updated_at;
};
FOR $m IN $memberships {
    LET $from = type::record('user', $m.user_id);
    LET $to = type::record('group', $m.group_id);
    RELATE $from->member_of->$to;
};
FOR $r IN $resources {
    CREATE type::record('resource', $r.id) SET
        kind = $r.kind, name = $r.name, owner_id = $r.owner_id,
        updated_by = $r.updated_by,
        created_at = <datetime> $r.created_at,
        updated_at = <datetime> $r.updated_at;
};
FOR $i IN $items {
    CREATE type::record('item', $i.id) SET
        resource_id = $i.resource_id, name = $i.name,
        description = $i.description, quantity = $i.quantity,
        created_by = $i.created_by, updated_by = $i.updated_by,
        created_at = <datetime> $i.created_at,
        updated_at = <datetime> $i.updated_at;
};
FOR $s IN $direct_shares {
    LET $from = type::record('user', $s.user_id);
    LET $to = type::record('resource', $s.resource_id);
    RELATE $from->shared_with->$to
        SET created_at = <datetime> $s.created_at;
};
FOR $s IN $group_shares {
    LET $from = type::record('group', $s.group_id);
    LET $to = type::record('resource', $s.resource_id);
    RELATE $from->group_shared_with->$to
        SET created_at = <datetime> $s.created_at;
};
COMMIT TRANSACTION;
";

/// An edge between two records, as exported.
#[derive(Debug, SurrealValue)]
struct EdgeRefRow {
    source_id: String,
    target_id: String,
    created_at: DateTime<Utc>,
}

impl EdgeRefRow {
    fn ids(&self, source: &str, target: &str) -> Result<(Uuid, Uuid), DbError> {
        Ok((
            parse_uuid(&self.source_id, source)?,
            parse_uuid(&self.target_id, target)?,
        ))
    }
}

/// Serialize rows for binding, dropping `null` fields so that optional
/// columns arrive as NONE.
fn to_bind_value<T: Serialize>(rows: &[T]) -> Result<serde_json::Value, DbError> {
    let mut value =
        serde_json::to_value(rows).map_err(|e| DbError::Decode(format!("snapshot encode: {e}")))?;
    strip_nulls(&mut value);
    Ok(value)
}

fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Point every reference to `from` at `to`.
fn remap_user(snapshot: &mut BackupSnapshot, from: Uuid, to: Uuid) {
    let swap = |id: &mut Uuid| {
        if *id == from {
            *id = to;
        }
    };
    for resource in &mut snapshot.resources {
        swap(&mut resource.owner_id);
        if let Some(id) = resource.updated_by.as_mut() {
            swap(id);
        }
    }
    for item in &mut snapshot.items {
        swap(&mut item.created_by);
        if let Some(id) = item.updated_by.as_mut() {
            swap(id);
        }
    }
    for membership in &mut snapshot.memberships {
        swap(&mut membership.user_id);
    }
    for share in &mut snapshot.direct_shares {
        swap(&mut share.user_id);
    }
}

/// Drop rows that point at users, groups or resources absent from the
/// snapshot. Returns how many rows were removed.
fn drop_dangling(snapshot: &mut BackupSnapshot, live_admin: Option<Uuid>) -> usize {
    let users: HashSet<Uuid> = snapshot
        .users
        .iter()
        .map(|u| u.id)
        .chain(live_admin)
        .collect();
    let groups: HashSet<Uuid> = snapshot.groups.iter().map(|g| g.id).collect();
    let resources: HashSet<Uuid> = snapshot.resources.iter().map(|r| r.id).collect();

    let before = snapshot.memberships.len()
        + snapshot.items.len()
        + snapshot.direct_shares.len()
        + snapshot.group_shares.len();

    snapshot
        .memberships
        .retain(|m| users.contains(&m.user_id) && groups.contains(&m.group_id));
    snapshot
        .items
        .retain(|i| resources.contains(&i.resource_id));
    snapshot
        .direct_shares
        .retain(|s| users.contains(&s.user_id) && resources.contains(&s.resource_id));
    snapshot
        .group_shares
        .retain(|s| groups.contains(&s.group_id) && resources.contains(&s.resource_id));

    before
        - (snapshot.memberships.len()
            + snapshot.items.len()
            + snapshot.direct_shares.len()
            + snapshot.group_shares.len())
}

/// SurrealDB implementation of the Backup repository.
#[derive(Clone)]
pub struct SurrealBackupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBackupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn live_reserved_admin(&self) -> Result<Option<Uuid>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE username = $reserved",
            )
            .bind(("reserved", RESERVED_ADMIN_USERNAME.to_string()))
            .await?;
        let rows: Vec<UserRowWithId> = result.take(0)?;
        let users = rows_into_users(rows)?;
        Ok(users.first().map(|u| u.id))
    }
}

impl<C: Connection> BackupRepository for SurrealBackupRepository<C> {
    async fn export_snapshot(&self) -> StockroomResult<BackupSnapshot> {
        let mut result = self
            .db
            .query(format!(
                "{EXPORT_QUERY}{SELECT_WITH_GRANTS} FROM resource ORDER BY created_at ASC;
COMMIT TRANSACTION;"
            ))
            .await
            .map_err(DbError::from)?;

        let users: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let groups: Vec<GroupRowWithId> = result.take(1).map_err(DbError::from)?;
        let memberships: Vec<EdgeRefRow> = result.take(2).map_err(DbError::from)?;
        let items: Vec<ItemRowWithId> = result.take(3).map_err(DbError::from)?;
        let direct_shares: Vec<EdgeRefRow> = result.take(4).map_err(DbError::from)?;
        let group_shares: Vec<EdgeRefRow> = result.take(5).map_err(DbError::from)?;
        let resources: Vec<ResourceRowWithGrants> = result.take(6).map_err(DbError::from)?;

        let memberships = memberships
            .iter()
            .map(|row| {
                let (user_id, group_id) = row.ids("member", "group")?;
                Ok(Membership { user_id, group_id })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let direct_shares = direct_shares
            .iter()
            .map(|row| {
                let (user_id, resource_id) = row.ids("shared user", "resource")?;
                Ok(DirectShare {
                    user_id,
                    resource_id,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let group_shares = group_shares
            .iter()
            .map(|row| {
                let (group_id, resource_id) = row.ids("shared group", "resource")?;
                Ok(GroupShare {
                    group_id,
                    resource_id,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let resources = resources
            .into_iter()
            .map(|row| row.try_into_resource().map(|r| r.resource))
            .collect::<Result<Vec<_>, DbError>>()?;

        let items = items
            .into_iter()
            .map(ItemRowWithId::try_into_item)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(BackupSnapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            taken_at: Utc::now(),
            users: rows_into_users(users)?,
            groups: rows_into_groups(groups)?,
            memberships,
            resources,
            items,
            direct_shares,
            group_shares,
        })
    }

    async fn restore_snapshot(&self, mut snapshot: BackupSnapshot) -> StockroomResult<()> {
        let live_admin = self.live_reserved_admin().await?;
        if let Some(live_admin) = live_admin {
            let archived = snapshot
                .users
                .iter()
                .find(|u| u.is_reserved_admin())
                .map(|u| u.id);
            if let Some(archived) = archived {
                remap_user(&mut snapshot, archived, live_admin);
            }
            snapshot.users.retain(|u| !u.is_reserved_admin());
        }

        let dropped = drop_dangling(&mut snapshot, live_admin);
        if dropped > 0 {
            warn!(dropped, "Snapshot rows with missing references skipped");
        }

        info!(
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            resources = snapshot.resources.len(),
            items = snapshot.items.len(),
            "Restoring snapshot"
        );

        self.db
            .query(RESTORE_QUERY)
            .bind(("reserved", RESERVED_ADMIN_USERNAME.to_string()))
            .bind(("users", to_bind_value(&snapshot.users)?))
            .bind(("groups", to_bind_value(&snapshot.groups)?))
            .bind(("memberships", to_bind_value(&snapshot.memberships)?))
            .bind(("resources", to_bind_value(&snapshot.resources)?))
            .bind(("items", to_bind_value(&snapshot.items)?))
            .bind(("direct_shares", to_bind_value(&snapshot.direct_shares)?))
            .bind(("group_shares", to_bind_value(&snapshot.group_shares)?))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(format!("restore failed: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_fields_are_dropped_recursively() {
        let mut value = json!([{ "a": null, "b": 1, "c": { "d": null } }]);
        strip_nulls(&mut value);
        assert_eq!(value, json!([{ "b": 1, "c": {} }]));
    }

    #[test]
    fn remap_rewrites_every_reference() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let mut snapshot = BackupSnapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            taken_at: Utc::now(),
            users: vec![],
            groups: vec![],
            memberships: vec![Membership {
                user_id: old,
                group_id,
            }],
            resources: vec![],
            items: vec![],
            direct_shares: vec![DirectShare {
                user_id: old,
                resource_id: Uuid::new_v4(),
                created_at: Utc::now(),
            }],
            group_shares: vec![],
        };
        remap_user(&mut snapshot, old, new);
        assert_eq!(snapshot.memberships[0].user_id, new);
        assert_eq!(snapshot.memberships[0].group_id, group_id);
        assert_eq!(snapshot.direct_shares[0].user_id, new);
    }

    #[test]
    fn dangling_memberships_and_shares_are_dropped() {
        let admin = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let mut snapshot = BackupSnapshot {
            version: SNAPSHOT_FORMAT_VERSION,
            taken_at: Utc::now(),
            users: vec![],
            groups: vec![],
            memberships: vec![Membership {
                user_id: admin,
                group_id: ghost,
            }],
            resources: vec![],
            items: vec![],
            direct_shares: vec![DirectShare {
                user_id: admin,
                resource_id: ghost,
                created_at: Utc::now(),
            }],
            group_shares: vec![],
        };
        assert_eq!(drop_dangling(&mut snapshot, Some(admin)), 2);
        assert!(snapshot.memberships.is_empty());
        assert!(snapshot.direct_shares.is_empty());
        assert_eq!(drop_dangling(&mut snapshot, Some(admin)), 0);
    }
}
