//! Per-namespace write serialization
//!
//! A range write reads the overlapping intervals and then commits a batch
//! derived from them. Two writers interleaving those steps on one namespace
//! can leave overlapping intervals behind. Wrapping buckets in
//! [`SerializedRangeBucket`] makes writes on a namespace mutually exclusive
//! while reads stay lock-free.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use num_bigint::BigInt;
use parking_lot::Mutex;

use super::index::RangeBucket;
use super::iter::{RangeIterOptions, RangeIterator};
use super::{Interval, RangeStore};
use crate::bucket::Bucket;
use crate::error::Result;
use crate::kv::OrderedStore;

/// Write locks keyed by namespace prefix.
///
/// Share one table between every bucket that may write the same namespace.
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>, RandomState>>,
}

impl LockTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The write lock guarding `prefix`, created on first use.
    ///
    /// Locks no bucket holds anymore are dropped here, so the table only grows
    /// with the number of live namespaces.
    pub fn lock_for(&self, prefix: &[u8]) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        // The table's own reference is the only one left
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(prefix.to_vec()).or_default())
    }

    /// Number of namespaces that have a lock
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Check if no lock has been handed out yet
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Range bucket whose writes are serialized per namespace
pub struct SerializedRangeBucket<S: ?Sized> {
    inner: RangeBucket<S>,
    locks: Arc<LockTable>,
    lock: Arc<Mutex<()>>,
}

impl<S: OrderedStore + ?Sized> SerializedRangeBucket<S> {
    /// Wrap `inner`, taking its namespace lock from `locks`
    pub fn new(inner: RangeBucket<S>, locks: Arc<LockTable>) -> Self {
        let lock = locks.lock_for(inner.prefix());
        Self { inner, locks, lock }
    }

    /// The wrapped bucket
    pub fn inner(&self) -> &RangeBucket<S> {
        &self.inner
    }

    /// Store `value` over `[start, end)` while holding the namespace lock
    pub fn put<A, B, V>(&self, start: A, end: B, value: V) -> Result<()>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
        V: AsRef<[u8]>,
    {
        let _guard = self.lock.lock();
        self.inner.put(start, end, value)
    }

    /// Stored intervals intersecting `[start, end)`
    pub fn get<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        self.inner.get(start, end)
    }

    /// Remove every interval intersecting `[start, end)` while holding the namespace lock
    pub fn del<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let _guard = self.lock.lock();
        self.inner.del(start, end)
    }

    /// Cut exactly `[start, end)` out while holding the namespace lock
    pub fn trim<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let _guard = self.lock.lock();
        self.inner.trim(start, end)
    }

    /// A plain bucket nested under this bucket's prefix.
    ///
    /// Plain writes are single-key and need no namespace lock.
    pub fn bucket(&self, child: &[u8]) -> Bucket<S> {
        self.inner.bucket(child)
    }

    /// A nested serialized bucket sharing this bucket's lock table
    pub fn range_bucket(&self, child: &[u8]) -> Self {
        Self::new(self.inner.range_bucket(child), Arc::clone(&self.locks))
    }
}

impl<S: OrderedStore + ?Sized> RangeStore for SerializedRangeBucket<S> {
    type Store = S;

    fn put<A, B, V>(&self, start: A, end: B, value: V) -> Result<()>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
        V: AsRef<[u8]>,
    {
        SerializedRangeBucket::put(self, start, end, value)
    }

    fn get<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        SerializedRangeBucket::get(self, start, end)
    }

    fn del<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        SerializedRangeBucket::del(self, start, end)
    }

    fn has_data_in_range<A, B>(&self, start: A, end: B) -> Result<bool>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        self.inner.has_data_in_range(start, end)
    }

    fn iterator(&self, options: RangeIterOptions) -> Result<RangeIterator<'_>> {
        self.inner.iterator(options)
    }

    fn bucket(&self, child: &[u8]) -> Bucket<S> {
        SerializedRangeBucket::bucket(self, child)
    }

    fn range_bucket(&self, child: &[u8]) -> Self {
        SerializedRangeBucket::range_bucket(self, child)
    }
}
