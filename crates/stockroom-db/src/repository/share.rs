//! SurrealDB implementation of [`ShareRepository`].
//!
//! A direct share is a `shared_with` edge from a user to a resource; a
//! group share is a `group_shared_with` edge from a group to a resource.
//! Both edge tables carry a unique index on `(in, out)`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use stockroom_core::error::StockroomResult;
use stockroom_core::models::group::Group;
use stockroom_core::models::share::{DirectShare, GroupShare};
use stockroom_core::models::user::User;
use stockroom_core::repository::ShareRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::group::{GroupRowWithId, rows_into_groups};
use super::user::{UserRowWithId, rows_into_users};
use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// Edge timestamp as returned by `RELATE` and `DELETE ... RETURN BEFORE`.
#[derive(Debug, SurrealValue)]
struct EdgeRow {
    created_at: DateTime<Utc>,
}

/// Id of a share target; rows arrive oldest share first.
#[derive(Debug, SurrealValue)]
struct ShareRefRow {
    target_id: String,
}

/// Which side of the sharing ledger a query touches.
#[derive(Clone, Copy)]
enum Edge {
    User,
    Group,
}

impl Edge {
    fn table(self) -> &'static str {
        match self {
            Edge::User => "shared_with",
            Edge::Group => "group_shared_with",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Edge::User => "user",
            Edge::Group => "group",
        }
    }
}

/// SurrealDB implementation of the Share repository.
#[derive(Clone)]
pub struct SurrealShareRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealShareRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count(&self, query: &str, binds: &[(&'static str, String)]) -> Result<u64, DbError> {
        let mut builder = self.db.query(query);
        for (key, value) in binds {
            builder = builder.bind((*key, value.clone()));
        }
        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(CountRow::total_of(&rows))
    }

    /// Create a share edge, checking both endpoints and the pair first.
    async fn relate(
        &self,
        edge: Edge,
        source_id: Uuid,
        resource_id: Uuid,
    ) -> Result<DateTime<Utc>, DbError> {
        let source = source_id.to_string();
        let resource = resource_id.to_string();

        let source_found = self
            .count(
                "SELECT count() AS total FROM type::table($table) \
                 WHERE id = type::record($table, $id) GROUP ALL",
                &[("table", edge.source().into()), ("id", source.clone())],
            )
            .await?;
        if source_found == 0 {
            return Err(DbError::not_found(edge.source(), source));
        }

        let resource_found = self
            .count(
                "SELECT count() AS total FROM resource \
                 WHERE id = type::record('resource', $id) GROUP ALL",
                &[("id", resource.clone())],
            )
            .await?;
        if resource_found == 0 {
            return Err(DbError::not_found("resource", resource));
        }

        let existing = self
            .count(
                &format!(
                    "SELECT count() AS total FROM {} WHERE \
                     in = type::record($source, $source_id) AND \
                     out = type::record('resource', $resource_id) GROUP ALL",
                    edge.table()
                ),
                &[
                    ("source", edge.source().into()),
                    ("source_id", source.clone()),
                    ("resource_id", resource.clone()),
                ],
            )
            .await?;
        if existing > 0 {
            return Err(DbError::AlreadyExists {
                entity: format!("{} {source} on resource {resource}", edge.table()),
            });
        }

        let query = format!(
            "RELATE {}:`{source}` -> {} -> resource:`{resource}`;",
            edge.source(),
            edge.table(),
        );
        let result = self.db.query(query).await?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<EdgeRow> = result.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::Query(format!("{} edge was not created", edge.table())))?;

        Ok(row.created_at)
    }

    async fn unrelate(&self, edge: Edge, source_id: Uuid, resource_id: Uuid) -> Result<(), DbError> {
        let source = source_id.to_string();
        let resource = resource_id.to_string();

        let query = format!(
            "DELETE {} WHERE \
             in = type::record($source, $source_id) AND \
             out = type::record('resource', $resource_id) \
             RETURN BEFORE",
            edge.table()
        );
        let mut result = self
            .db
            .query(query)
            .bind(("source", edge.source().to_string()))
            .bind(("source_id", source.clone()))
            .bind(("resource_id", resource.clone()))
            .await?;

        let rows: Vec<EdgeRow> = result.take(0)?;
        if rows.is_empty() {
            return Err(DbError::not_found(
                edge.table(),
                format!("{source} -> {resource}"),
            ));
        }
        Ok(())
    }

    /// Ids of share targets for a resource, oldest share first.
    async fn share_order(&self, edge: Edge, resource_id: &str) -> Result<Vec<String>, DbError> {
        let query = format!(
            "SELECT meta::id(in) AS target_id, created_at FROM {} \
             WHERE out = type::record('resource', $resource_id) \
             ORDER BY created_at ASC",
            edge.table()
        );
        let mut result = self
            .db
            .query(query)
            .bind(("resource_id", resource_id.to_string()))
            .await?;
        let rows: Vec<ShareRefRow> = result.take(0)?;
        Ok(rows.into_iter().map(|r| r.target_id).collect())
    }
}

/// Arrange `records` in the order of `order`, dropping ids with no record.
fn in_share_order<T>(order: Vec<String>, records: Vec<T>, id_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut by_id: HashMap<String, T> = records
        .into_iter()
        .map(|r| (id_of(&r).to_string(), r))
        .collect();
    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

impl<C: Connection> ShareRepository for SurrealShareRepository<C> {
    async fn create_user_share(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> StockroomResult<DirectShare> {
        let created_at = self.relate(Edge::User, user_id, resource_id).await?;
        Ok(DirectShare {
            user_id,
            resource_id,
            created_at,
        })
    }

    async fn delete_user_share(&self, resource_id: Uuid, user_id: Uuid) -> StockroomResult<()> {
        Ok(self.unrelate(Edge::User, user_id, resource_id).await?)
    }

    async fn create_group_share(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
    ) -> StockroomResult<GroupShare> {
        let created_at = self.relate(Edge::Group, group_id, resource_id).await?;
        Ok(GroupShare {
            group_id,
            resource_id,
            created_at,
        })
    }

    async fn delete_group_share(&self, resource_id: Uuid, group_id: Uuid) -> StockroomResult<()> {
        Ok(self.unrelate(Edge::Group, group_id, resource_id).await?)
    }

    async fn list_shared_users(&self, resource_id: Uuid) -> StockroomResult<Vec<User>> {
        let resource = resource_id.to_string();
        let order = self.share_order(Edge::User, &resource).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM shared_with \
                     WHERE out = type::record('resource', $resource_id)\
                 )",
            )
            .bind(("resource_id", resource))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let users = rows_into_users(rows)?;

        Ok(in_share_order(order, users, |u| u.id))
    }

    async fn list_shared_groups(&self, resource_id: Uuid) -> StockroomResult<Vec<Group>> {
        let resource = resource_id.to_string();
        let order = self.share_order(Edge::Group, &resource).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE in FROM group_shared_with \
                     WHERE out = type::record('resource', $resource_id)\
                 )",
            )
            .bind(("resource_id", resource))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let groups = rows_into_groups(rows)?;

        Ok(in_share_order(order, groups, |g| g.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_order_drops_missing_records() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let order = vec![b.to_string(), gone.to_string(), a.to_string()];
        let arranged = in_share_order(order, vec![a, b], |id| *id);
        assert_eq!(arranged, vec![b, a]);
    }
}
