//! Per-tile mutual exclusion for concurrent scene ingestion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of one mutex per tile identifier.
///
/// Scenes touching different tiles proceed in parallel; scenes touching the
/// same tile take turns for the whole load, merge and persist cycle.
#[derive(Debug, Default)]
pub struct TileLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `tile_id`.
    pub fn with_lock<T>(&self, tile_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(tile_id);
        // A panic in another holder does not invalidate the tile: writes are atomic.
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    /// Number of tiles that have been locked at least once.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    fn lock_for(&self, tile_id: &str) -> Arc<Mutex<()>> {
        self.registry()
            .entry(tile_id.to_string())
            .or_default()
            .clone()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
