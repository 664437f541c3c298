//! Stockroom services: the request-facing operations on top of the access
//! decision engine.
//!
//! Every service is generic over the repository traits from
//! `stockroom-core` and receives the authenticated [`Principal`] of the
//! caller explicitly. Services that mutate a resource share one
//! [`StoreGate`] so restores and per-resource writes are serialized.
//!
//! [`Principal`]: stockroom_core::access::Principal

pub mod backup;
pub mod container;
pub mod enumeration;
pub mod gate;
pub mod groups;
mod guard;
pub mod sharing;
pub mod users;

pub use backup::{BackupConfig, BackupSchedule, BackupScheduler, BackupService};
pub use container::{ContainerService, ItemChanges, NewItem, ResourceDetail, ResourceSummary};
pub use enumeration::AccessEnumerationService;
pub use gate::StoreGate;
pub use groups::GroupAdminService;
pub use sharing::SharingService;
pub use users::{NewUser, UserAdminService};
