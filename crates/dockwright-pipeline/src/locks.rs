//! Per-workspace lock table
//!
//! A checkout directory is shared by every request for the same
//! `(repository, branch)`. The lock is held from fetch through push so two
//! requests never move the same checkout under each other. Locks are keyed by
//! the checkout's slot, so keys that map to one directory share a lock.

use dockwright_core::WorkspaceKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone, Default)]
pub struct WorkspaceLocks {
    table: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the workspace behind `key`
    pub async fn acquire(&self, key: &WorkspaceKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self
                .table
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Only the table holds an idle lock; holders and waiters own clones.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(key.slot()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked slots
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
