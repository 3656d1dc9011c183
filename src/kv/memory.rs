//! In-memory ordered store for development and testing

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use super::{commit_batch, BatchOp, IterOptions, KvCursor, MapCursor, OrderedStore, Snapshot};
use crate::error::StorageError;

/// Ordered map snapshot behind a reader-writer lock
#[derive(Default)]
pub struct MemoryStore {
    /// Current snapshot, entries sorted by key
    map: RwLock<Snapshot>,
    /// Number of committed batches
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Number of batches committed so far
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Copy of every stored pair in key order
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        if ops.is_empty() {
            return Ok(());
        }
        let count = ops.len();
        commit_batch(&mut self.map.write(), ops);
        let commit = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(commit, ops = count, "memory batch applied");
        Ok(())
    }

    fn iter(&self, options: IterOptions) -> Box<dyn KvCursor + '_> {
        Box::new(MapCursor::new(Snapshot::clone(&self.map.read()), options))
    }
}
