//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use stockroom_core::error::StockroomResult;
use stockroom_core::models::group::{CreateGroup, Group, UpdateGroup};
use stockroom_core::models::user::User;
use stockroom_core::repository::{GroupRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::user::{UserRowWithId, rows_into_users};
use super::{CountRow, parse_role, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct GroupRowWithId {
    record_id: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> Result<Group, DbError> {
        Ok(Group {
            id,
            name: self.name,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl GroupRowWithId {
    pub(crate) fn try_into_group(self) -> Result<Group, DbError> {
        let id = parse_uuid(&self.record_id, "group")?;
        Ok(Group {
            id,
            name: self.name,
            role: parse_role(&self.role)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn rows_into_groups(rows: Vec<GroupRowWithId>) -> Result<Vec<Group>, DbError> {
    rows.into_iter().map(GroupRowWithId::try_into_group).collect()
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn exists(&self, table: &str, id: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM type::table($table) \
                 WHERE id = type::record($table, $id) GROUP ALL",
            )
            .bind(("table", table.to_string()))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(CountRow::total_of(&rows) > 0)
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group \
                 WHERE name = $name AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("name", name.to_string()))
            .bind(("except", except.map(|id| id.to_string()).unwrap_or_default()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(CountRow::total_of(&rows) > 0)
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> StockroomResult<Group> {
        if self.name_taken(&input.name, None).await? {
            return Err(DbError::AlreadyExists {
                entity: format!("group {}", input.name),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('group', $id) SET \
                 name = $name, role = $role",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("role", input.role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> StockroomResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> StockroomResult<Group> {
        let id_str = id.to_string();

        if let Some(name) = &input.name {
            if self.name_taken(name, Some(id)).await? {
                return Err(DbError::AlreadyExists {
                    entity: format!("group {name}"),
                }
                .into());
            }
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn delete(&self, id: Uuid) -> StockroomResult<()> {
        let id_str = id.to_string();

        if !self.exists("group", &id_str).await? {
            return Err(DbError::not_found("group", id_str).into());
        }

        // Membership and share edges go first, then the group record.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE member_of WHERE out = type::record('group', $id); \
                 DELETE group_shared_with WHERE in = type::record('group', $id); \
                 DELETE type::record('group', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> StockroomResult<PaginatedResult<Group>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM group GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total_of(&count_rows);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_groups(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_member(&self, user_id: Uuid, group_id: Uuid) -> StockroomResult<()> {
        let user_id_str = user_id.to_string();
        let group_id_str = group_id.to_string();

        if !self.exists("user", &user_id_str).await? {
            return Err(DbError::not_found("user", user_id_str).into());
        }
        if !self.exists("group", &group_id_str).await? {
            return Err(DbError::not_found("group", group_id_str).into());
        }

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id) GROUP ALL",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("group_id", group_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if CountRow::total_of(&existing) > 0 {
            return Ok(());
        }

        let query = format!("RELATE user:`{user_id_str}` -> member_of -> group:`{group_id_str}`;");

        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove_member(&self, user_id: Uuid, group_id: Uuid) -> StockroomResult<()> {
        let user_id_str = user_id.to_string();
        let group_id_str = group_id.to_string();

        self.db
            .query(
                "DELETE member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id)",
            )
            .bind(("user_id", user_id_str))
            .bind(("group_id", group_id_str))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_members(&self, group_id: Uuid) -> StockroomResult<Vec<User>> {
        let group_id_str = group_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM member_of \
                     WHERE out = type::record('group', $group_id)\
                 ) \
                 ORDER BY created_at ASC",
            )
            .bind(("group_id", group_id_str))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_users(rows)?)
    }

    async fn get_user_groups(&self, user_id: Uuid) -> StockroomResult<Vec<Group>> {
        let user_id_str = user_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE out FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id_str))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_groups(rows)?)
    }
}
