//! Resource domain model.
//!
//! Inventories and checklists share one shape and one code path; the
//! [`ResourceKind`] tag is passed explicitly to every operation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockroomError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Inventory,
    Checklist,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Inventory => "inventory",
            ResourceKind::Checklist => "checklist",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inventory" => Ok(ResourceKind::Inventory),
            "checklist" => Ok(ResourceKind::Checklist),
            other => Err(StockroomError::Validation {
                message: format!("unknown resource kind: {other}"),
            }),
        }
    }
}

/// An inventory or checklist. Ownership never transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub name: String,
    pub owner_id: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub kind: ResourceKind,
    pub name: String,
    pub owner_id: Uuid,
}

/// A resource together with the ids of every user and group it is
/// directly shared with. This is everything the decision engine needs to
/// know about the target of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceWithGrants {
    pub resource: Resource,
    pub shared_user_ids: BTreeSet<Uuid>,
    pub shared_group_ids: BTreeSet<Uuid>,
}

impl ResourceWithGrants {
    pub fn id(&self) -> Uuid {
        self.resource.id
    }

    pub fn owner_id(&self) -> Uuid {
        self.resource.owner_id
    }
}
