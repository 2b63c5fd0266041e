//! Per-listing-item serialization of check-and-commit
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Async mutexes keyed by listing item hash.
///
/// Bid and escrow processors hold the guard for an item from the state check
/// until their row is committed, so two messages about the same item can never
/// both observe the same prior state. Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct LineageLocks {
    table: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl LineageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, item_hash: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self
                .table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // drop entries nobody is waiting on
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(item_hash.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of items with a live guard or waiter.
    pub fn held(&self) -> usize {
        let table = self
            .table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
