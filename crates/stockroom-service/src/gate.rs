//! Store-wide and per-resource serialization of writers.
//!
//! Every authorization-gated mutation holds the shared side of the store
//! gate plus the target resource's mutex from the moment the resource is
//! loaded until the mutation is written, so no share of that resource can
//! change between the decision and the write. Membership, role and block
//! changes are not ordered against it: a request already past its
//! decision completes even if its principal loses access meanwhile. A
//! restore holds the exclusive side and therefore waits for, and then
//! excludes, every other request.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// Held for the whole load → decide → mutate span of one resource.
pub struct ResourceGuard {
    _resource: OwnedMutexGuard<()>,
    _store: OwnedRwLockReadGuard<()>,
}

#[derive(Clone, Default)]
pub struct StoreGate {
    store: Arc<RwLock<()>>,
    resources: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl StoreGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access for reads and for writes that touch no single
    /// resource (user and group administration, resource creation).
    pub async fn shared(&self) -> OwnedRwLockReadGuard<()> {
        self.store.clone().read_owned().await
    }

    /// Shared store access plus exclusive access to one resource.
    pub async fn resource(&self, id: Uuid) -> ResourceGuard {
        let store = self.shared().await;
        let slot = {
            let mut table = self.resources.lock().await;
            // Slots nobody holds or waits on are dropped.
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            table.entry(id).or_default().clone()
        };
        ResourceGuard {
            _resource: slot.lock_owned().await,
            _store: store,
        }
    }

    /// Exclusive access to the whole store.
    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        self.store.clone().write_owned().await
    }
}
