//! Per-address operation locks
//!
//! Store writes take `&mut self`, but hosts often share store handles across
//! tasks. Holding the guard for an address while running an operation on it
//! keeps load-modify-store sequences for that address from interleaving.
//! Unrelated addresses never contend.

use std::{collections::HashMap, sync::Arc};

use sealframe_proto::ProtocolAddress;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by [`ProtocolAddress`].
#[derive(Clone, Default)]
pub struct AddressLocks {
    locks: Arc<Mutex<HashMap<ProtocolAddress, Arc<Mutex<()>>>>>,
}

impl AddressLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `address`.
    pub async fn lock(&self, address: &ProtocolAddress) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(address.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody is holding or waiting on.
    pub async fn prune(&self) {
        self.locks.lock().await.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of addresses with a lock entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
