//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['admin', 'moderator', 'viewer'];
DEFINE FIELD blocked ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user \
    COLUMNS username UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD role ON TABLE group TYPE string \
    ASSERT $value IN ['admin', 'moderator', 'viewer'];
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Resources (inventories and checklists)
-- =======================================================================
DEFINE TABLE resource SCHEMAFULL;
DEFINE FIELD kind ON TABLE resource TYPE string \
    ASSERT $value IN ['inventory', 'checklist'];
DEFINE FIELD name ON TABLE resource TYPE string;
DEFINE FIELD owner_id ON TABLE resource TYPE string;
DEFINE FIELD updated_by ON TABLE resource TYPE option<string>;
DEFINE FIELD created_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_kind ON TABLE resource COLUMNS kind;

-- =======================================================================
-- Items (owned by exactly one resource)
-- =======================================================================
DEFINE TABLE item SCHEMAFULL;
DEFINE FIELD resource_id ON TABLE item TYPE string;
DEFINE FIELD name ON TABLE item TYPE string;
DEFINE FIELD description ON TABLE item TYPE option<string>;
DEFINE FIELD quantity ON TABLE item TYPE int DEFAULT 0;
DEFINE FIELD created_by ON TABLE item TYPE string;
DEFINE FIELD updated_by ON TABLE item TYPE option<string>;
DEFINE FIELD created_at ON TABLE item TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE item TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_item_resource ON TABLE item COLUMNS resource_id;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Group membership
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
DEFINE FIELD created_at ON TABLE member_of TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_member_of_pair ON TABLE member_of \
    COLUMNS in, out UNIQUE;

-- User -> Resource direct share
DEFINE TABLE shared_with TYPE RELATION SCHEMAFULL;
DEFINE FIELD created_at ON TABLE shared_with TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_shared_with_pair ON TABLE shared_with \
    COLUMNS in, out UNIQUE;

-- Group -> Resource share
DEFINE TABLE group_shared_with TYPE RELATION SCHEMAFULL;
DEFINE FIELD created_at ON TABLE group_shared_with TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_shared_with_pair ON TABLE group_shared_with \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_every_table() {
        for table in [
            "user",
            "group",
            "resource",
            "item",
            "member_of",
            "shared_with",
            "group_shared_with",
        ] {
            let ddl = format!("DEFINE TABLE {table} ");
            assert!(SCHEMA_V1.contains(&ddl), "missing table {table}");
        }
    }

    #[test]
    fn share_edges_are_unique_per_pair() {
        assert!(SCHEMA_V1.contains("idx_shared_with_pair"));
        assert!(SCHEMA_V1.contains("idx_group_shared_with_pair"));
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
