//! SurrealDB implementation of [`ItemRepository`].

use chrono::{DateTime, Utc};
use stockroom_core::error::StockroomResult;
use stockroom_core::models::item::{CreateItem, Item, UpdateItem};
use stockroom_core::repository::ItemRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ItemRow {
    resource_id: String,
    name: String,
    description: Option<String>,
    quantity: i64,
    created_by: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct ItemRowWithId {
    record_id: String,
    resource_id: String,
    name: String,
    description: Option<String>,
    quantity: i64,
    created_by: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self, id: Uuid) -> Result<Item, DbError> {
        Ok(Item {
            id,
            resource_id: parse_uuid(&self.resource_id, "resource")?,
            name: self.name,
            description: self.description,
            quantity: self.quantity,
            created_by: parse_uuid(&self.created_by, "created_by")?,
            updated_by: parse_optional_uuid(self.updated_by.as_deref(), "updated_by")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ItemRowWithId {
    pub(crate) fn try_into_item(self) -> Result<Item, DbError> {
        let id = parse_uuid(&self.record_id, "item")?;
        ItemRow {
            resource_id: self.resource_id,
            name: self.name,
            description: self.description,
            quantity: self.quantity,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_item(id)
    }
}

/// SurrealDB implementation of the Item repository.
#[derive(Clone)]
pub struct SurrealItemRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealItemRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ItemRepository for SurrealItemRepository<C> {
    async fn create(&self, input: CreateItem) -> StockroomResult<Item> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('item', $id) SET \
                 resource_id = $resource_id, name = $name, \
                 description = $description, quantity = $quantity, \
                 created_by = $created_by",
            )
            .bind(("id", id_str.clone()))
            .bind(("resource_id", input.resource_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("quantity", input.quantity))
            .bind(("created_by", input.created_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ItemRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("item", &id_str))?;

        Ok(row.into_item(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> StockroomResult<Item> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('item', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ItemRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("item", &id_str))?;

        Ok(row.into_item(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateItem) -> StockroomResult<Item> {
        let id_str = id.to_string();

        let mut sets = vec!["updated_by = $updated_by"];
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.quantity.is_some() {
            sets.push("quantity = $quantity");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('item', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("updated_by", input.updated_by.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(quantity) = input.quantity {
            builder = builder.bind(("quantity", quantity));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ItemRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("item", &id_str))?;

        Ok(row.into_item(id)?)
    }

    async fn delete(&self, id: Uuid) -> StockroomResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('item', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ItemRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("item", id_str).into());
        }

        Ok(())
    }

    async fn list_by_resource(&self, resource_id: Uuid) -> StockroomResult<Vec<Item>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM item \
                 WHERE resource_id = $resource_id \
                 ORDER BY created_at ASC",
            )
            .bind(("resource_id", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ItemRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(ItemRowWithId::try_into_item)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn count_by_resource(&self, resource_id: Uuid) -> StockroomResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM item \
                 WHERE resource_id = $resource_id GROUP ALL",
            )
            .bind(("resource_id", resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(CountRow::total_of(&rows))
    }
}
