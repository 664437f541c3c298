//! SurrealDB implementation of [`ResourceRepository`].
//!
//! Share associations are stored as `shared_with` (user -> resource) and
//! `group_shared_with` (group -> resource) edges. Reads fold them into the
//! id sets of [`ResourceWithGrants`] with correlated subqueries.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use stockroom_core::error::StockroomResult;
use stockroom_core::models::resource::{
    CreateResource, Resource, ResourceKind, ResourceWithGrants,
};
use stockroom_core::repository::ResourceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

pub(crate) const SELECT_WITH_GRANTS: &str = "\
SELECT meta::id(id) AS record_id, kind, name, owner_id, updated_by, \
    created_at, updated_at, \
    (SELECT VALUE meta::id(in) FROM shared_with \
        WHERE out = $parent.id) AS shared_user_ids, \
    (SELECT VALUE meta::id(in) FROM group_shared_with \
        WHERE out = $parent.id) AS shared_group_ids";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ResourceRow {
    kind: String,
    name: String,
    owner_id: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Resource row joined with the ids of every share target.
#[derive(Debug, SurrealValue)]
pub(crate) struct ResourceRowWithGrants {
    record_id: String,
    kind: String,
    name: String,
    owner_id: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    shared_user_ids: Vec<String>,
    shared_group_ids: Vec<String>,
}

fn parse_kind(s: &str) -> Result<ResourceKind, DbError> {
    ResourceKind::from_str(s).map_err(|_| DbError::Decode(format!("unknown resource kind: {s}")))
}

impl ResourceRow {
    fn into_resource(self, id: Uuid) -> Result<Resource, DbError> {
        Ok(Resource {
            id,
            kind: parse_kind(&self.kind)?,
            name: self.name,
            owner_id: parse_uuid(&self.owner_id, "owner")?,
            updated_by: parse_optional_uuid(self.updated_by.as_deref(), "updated_by")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ResourceRowWithGrants {
    pub(crate) fn try_into_resource(self) -> Result<ResourceWithGrants, DbError> {
        let id = parse_uuid(&self.record_id, "resource")?;
        let shared_user_ids = self
            .shared_user_ids
            .iter()
            .map(|s| parse_uuid(s, "shared user"))
            .collect::<Result<BTreeSet<_>, _>>()?;
        let shared_group_ids = self
            .shared_group_ids
            .iter()
            .map(|s| parse_uuid(s, "shared group"))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let resource = ResourceRow {
            kind: self.kind,
            name: self.name,
            owner_id: self.owner_id,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_resource(id)?;

        Ok(ResourceWithGrants {
            resource,
            shared_user_ids,
            shared_group_ids,
        })
    }
}

/// SurrealDB implementation of the Resource repository.
#[derive(Clone)]
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn create(&self, input: CreateResource) -> StockroomResult<Resource> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('resource', $id) SET \
                 kind = $kind, name = $name, owner_id = $owner_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", input.kind.as_str().to_string()))
            .bind(("name", input.name))
            .bind(("owner_id", input.owner_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("resource", &id_str))?;

        Ok(row.into_resource(id)?)
    }

    async fn get_by_id(&self, kind: ResourceKind, id: Uuid) -> StockroomResult<ResourceWithGrants> {
        let id_str = id.to_string();

        let query = format!(
            "{SELECT_WITH_GRANTS} FROM type::record('resource', $id) \
             WHERE kind = $kind"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("kind", kind.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithGrants> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(kind.as_str(), &id_str))?;

        Ok(row.try_into_resource()?)
    }

    async fn list_by_kind(&self, kind: ResourceKind) -> StockroomResult<Vec<ResourceWithGrants>> {
        let query = format!(
            "{SELECT_WITH_GRANTS} FROM resource WHERE kind = $kind \
             ORDER BY created_at ASC"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("kind", kind.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithGrants> = result.take(0).map_err(DbError::from)?;
        let resources = rows
            .into_iter()
            .map(ResourceRowWithGrants::try_into_resource)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(resources)
    }

    async fn rename(
        &self,
        kind: ResourceKind,
        id: Uuid,
        name: String,
        updated_by: Uuid,
    ) -> StockroomResult<Resource> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('resource', $id) SET \
                 name = $name, updated_by = $updated_by, \
                 updated_at = time::now() \
                 WHERE kind = $kind",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", kind.as_str().to_string()))
            .bind(("name", name))
            .bind(("updated_by", updated_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(kind.as_str(), &id_str))?;

        Ok(row.into_resource(id)?)
    }

    async fn delete(&self, kind: ResourceKind, id: Uuid) -> StockroomResult<()> {
        let id_str = id.to_string();

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM resource \
                 WHERE id = type::record('resource', $id) \
                 AND kind = $kind GROUP ALL",
            )
            .bind(("id", id_str.clone()))
            .bind(("kind", kind.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        let found: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        if CountRow::total_of(&found) == 0 {
            return Err(DbError::not_found(kind.as_str(), id_str).into());
        }

        // Items and both share edge tables go with the resource.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE item WHERE resource_id = $id; \
                 DELETE shared_with WHERE out = type::record('resource', $id); \
                 DELETE group_shared_with WHERE out = type::record('resource', $id); \
                 DELETE type::record('resource', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }
}
