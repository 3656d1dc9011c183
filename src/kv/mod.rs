//! Ordered key-value primitive
//!
//! The range layer only needs a byte-ordered store with point reads, atomic
//! batches and a forward cursor that can be bounded and re-seeked. This module
//! defines that contract as [`OrderedStore`] and provides an in-memory and a
//! file-backed implementation sharing one cursor over an ordered map.

pub mod file;
pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::StorageError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Ordered map shared by the store implementations
pub(crate) type OrderedMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Immutable published state of a store. Cursors hold one; writers replace it.
pub(crate) type Snapshot = Arc<OrderedMap>;

/// One operation of an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Put {
        /// Key to write
        key: Vec<u8>,
        /// Value to write
        value: Vec<u8>,
    },
    /// Remove a key if present
    Del {
        /// Key to remove
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Create a put operation
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a delete operation
    pub fn del(key: impl Into<Vec<u8>>) -> Self {
        BatchOp::Del { key: key.into() }
    }

    /// Key touched by this operation
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Del { key } => key,
        }
    }
}

/// Bounds of a forward cursor.
///
/// All bounds are combined: the cursor yields keys above every lower bound,
/// below every upper bound and starting with `prefix`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterOptions {
    /// Exclusive lower bound
    pub gt: Option<Vec<u8>>,
    /// Inclusive lower bound
    pub gte: Option<Vec<u8>>,
    /// Exclusive upper bound
    pub lt: Option<Vec<u8>>,
    /// Inclusive upper bound
    pub lte: Option<Vec<u8>>,
    /// Required key prefix
    pub prefix: Option<Vec<u8>>,
}

impl IterOptions {
    /// Unbounded options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the exclusive lower bound
    pub fn gt(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.gt = Some(key.into());
        self
    }

    /// Set the inclusive lower bound
    pub fn gte(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.gte = Some(key.into());
        self
    }

    /// Set the exclusive upper bound
    pub fn lt(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.lt = Some(key.into());
        self
    }

    /// Set the inclusive upper bound
    pub fn lte(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.lte = Some(key.into());
        self
    }

    /// Restrict to keys starting with `prefix`
    pub fn prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Tightest lower bound implied by `gt`, `gte` and `prefix`
    pub fn lower_bound(&self) -> Bound<Vec<u8>> {
        let candidates = [
            self.gt.clone().map(Bound::Excluded),
            self.gte.clone().map(Bound::Included),
            self.prefix.clone().map(Bound::Included),
        ];
        candidates
            .into_iter()
            .flatten()
            .fold(Bound::Unbounded, tighter_lower)
    }

    /// Whether `key` satisfies the upper bounds and the prefix.
    ///
    /// Lower bounds are enforced by where the cursor starts.
    pub fn admits(&self, key: &[u8]) -> bool {
        if let Some(prefix) = &self.prefix {
            if !key.starts_with(prefix) {
                return false;
            }
        }
        if let Some(lt) = &self.lt {
            if key >= lt.as_slice() {
                return false;
            }
        }
        if let Some(lte) = &self.lte {
            if key > lte.as_slice() {
                return false;
            }
        }
        true
    }
}

fn tighter_lower(a: Bound<Vec<u8>>, b: Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    fn key(bound: &Bound<Vec<u8>>) -> Option<&[u8]> {
        match bound {
            Bound::Included(k) | Bound::Excluded(k) => Some(k),
            Bound::Unbounded => None,
        }
    }
    let order = match (key(&a), key(&b)) {
        (Some(ka), Some(kb)) => Some(ka.cmp(kb)),
        _ => None,
    };
    match order {
        None if matches!(a, Bound::Unbounded) => b,
        None => a,
        Some(Ordering::Greater) => a,
        Some(Ordering::Less) => b,
        // Same key: exclusive is tighter
        Some(Ordering::Equal) if matches!(a, Bound::Excluded(_)) => a,
        Some(Ordering::Equal) => b,
    }
}

/// Forward cursor over a store's key space
pub trait KvCursor {
    /// Advance to the next entry, or `None` once the cursor is exhausted
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Reposition to the first key `>= target`.
    ///
    /// The cursor never moves below its lower bound, and a seek revives an
    /// exhausted cursor.
    fn seek(&mut self, target: &[u8]);
}

/// Byte-ordered key-value store
pub trait OrderedStore: Send + Sync {
    /// Read a single key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Apply every operation or none of them, in order
    fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;

    /// Open a forward cursor
    fn iter(&self, options: IterOptions) -> Box<dyn KvCursor + '_>;

    /// Write a single key
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.batch(vec![BatchOp::put(key, value)])
    }

    /// Remove a single key
    fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        self.batch(vec![BatchOp::del(key)])
    }
}

/// Apply a batch to the published snapshot.
///
/// The map is copied first if a cursor still holds the current snapshot, so
/// open cursors never observe the batch and never block it.
pub(crate) fn commit_batch(snapshot: &mut Snapshot, ops: Vec<BatchOp>) {
    apply_batch(Arc::make_mut(snapshot), ops);
}

/// Apply a batch to an ordered map
pub(crate) fn apply_batch(map: &mut OrderedMap, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Del { key } => {
                map.remove(&key);
            }
        }
    }
}

/// Cursor over a store snapshot.
///
/// Holds the snapshot that was current when it was opened, so a batch is
/// either entirely visible or not at all. Writers never wait for cursors, and
/// the cursor's owner may write to the store while iterating.
pub(crate) struct MapCursor {
    map: Snapshot,
    options: IterOptions,
    lower: Bound<Vec<u8>>,
    position: Bound<Vec<u8>>,
    exhausted: bool,
}

impl MapCursor {
    pub(crate) fn new(map: Snapshot, options: IterOptions) -> Self {
        let lower = options.lower_bound();
        Self {
            map,
            position: lower.clone(),
            lower,
            options,
            exhausted: false,
        }
    }
}

impl KvCursor for MapCursor {
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>, StorageError> {
        if self.exhausted {
            return Ok(None);
        }

        let from: Bound<&[u8]> = match &self.position {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let entry = self
            .map
            .range::<[u8], _>((from, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));

        match entry {
            Some((key, value)) if self.options.admits(&key) => {
                self.position = Bound::Excluded(key.clone());
                Ok(Some((key, value)))
            }
            _ => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    fn seek(&mut self, target: &[u8]) {
        self.position = tighter_lower(self.lower.clone(), Bound::Included(target.to_vec()));
        self.exhausted = false;
    }
}
