//! Range bucket: disjoint intervals over an ordered store
//!
//! Each interval `[start, end)` is one pair `prefix ++ enc(end) -> enc(start) ++ value`.
//! Keys sort by end, so the intervals intersecting `[start, end)` are exactly
//! the entries after `prefix ++ enc(start)` up to the first one whose start is
//! at or past `end`: stored intervals are disjoint, so ascending end is also
//! ascending start.
//!
//! Writes are not isolated on their own. Two overlapping writers on one
//! namespace can both read the same state and the later batch wins; wrap the
//! bucket in a [`SerializedRangeBucket`](super::SerializedRangeBucket) when
//! writers run concurrently.

use std::sync::Arc;

use num_bigint::BigInt;
use smallvec::SmallVec;
use tracing::debug;

use super::iter::{RangeIterOptions, RangeIterator};
use super::{Interval, RangeStore};
use crate::bucket::Bucket;
use crate::config::RangeConfig;
use crate::encoding::KeyCodec;
use crate::error::Result;
use crate::kv::{BatchOp, OrderedStore};
use crate::validate::validate_range;

/// Operations of a typical write: a few deletes, up to two remainders and the new interval
type WriteBatch = SmallVec<[BatchOp; 6]>;

/// Range index stored under a byte prefix of a shared ordered store
pub struct RangeBucket<S: ?Sized> {
    store: Arc<S>,
    prefix: Vec<u8>,
    config: RangeConfig,
    codec: KeyCodec,
}

impl<S: ?Sized> Clone for RangeBucket<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            config: self.config,
            codec: self.codec,
        }
    }
}

impl<S: OrderedStore + ?Sized> RangeBucket<S> {
    /// Create a range bucket with the default 16-byte big-endian encoding
    pub fn new(store: Arc<S>, prefix: impl Into<Vec<u8>>) -> Self {
        let config = RangeConfig::default();
        Self {
            store,
            prefix: prefix.into(),
            config,
            codec: KeyCodec::new(config),
        }
    }

    /// Create a range bucket with an explicit encoding
    pub fn with_config(store: Arc<S>, prefix: impl Into<Vec<u8>>, config: RangeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            prefix: prefix.into(),
            config,
            codec: KeyCodec::new(config),
        })
    }

    /// Namespace prefix of this bucket
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Encoding configuration
    pub fn config(&self) -> RangeConfig {
        self.config
    }

    /// Key codec of this bucket
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Underlying store handle
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A plain bucket nested under this bucket's prefix
    pub fn bucket(&self, child: &[u8]) -> Bucket<S> {
        Bucket::new(Arc::clone(&self.store), self.child_prefix(child))
    }

    /// A range bucket nested under this bucket's prefix, with the same encoding
    pub fn range_bucket(&self, child: &[u8]) -> RangeBucket<S> {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.child_prefix(child),
            config: self.config,
            codec: self.codec,
        }
    }

    fn child_prefix(&self, child: &[u8]) -> Vec<u8> {
        [self.prefix.as_slice(), child].concat()
    }

    /// Store `value` over `[start, end)`.
    ///
    /// Every stored interval intersecting the range is removed. If the first of
    /// them began before `start`, its left part `[old_start, start)` is kept with
    /// its old value; likewise the right part `[end, old_end)` of the last one.
    pub fn put<A, B, V>(&self, start: A, end: B, value: V) -> Result<()>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
        V: AsRef<[u8]>,
    {
        let (start, end) = validate_range(start, end)?;
        // Encode before any I/O so width overflows fail without touching the store
        let record = self.record(&start, &end, value.as_ref())?;

        let overlapping = self.intersecting(&start, &end, usize::MAX)?;
        let mut ops = self.removals(&overlapping)?;
        self.push_remainders(&mut ops, &overlapping, &start, &end)?;
        ops.push(record);

        debug!(
            %start, %end,
            replaced = overlapping.len(),
            ops = ops.len(),
            "range put"
        );
        self.store.batch(ops.into_vec())?;
        Ok(())
    }

    /// Stored intervals intersecting `[start, end)`, ascending by start.
    ///
    /// Intervals are returned whole, not clipped to the query.
    pub fn get<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let (start, end) = validate_range(start, end)?;
        self.intersecting(&start, &end, usize::MAX)
    }

    /// Remove every stored interval intersecting `[start, end)`.
    ///
    /// Intervals only partly inside the range are removed entirely, not
    /// trimmed; see [`trim`](Self::trim) for that. Returns the removed
    /// intervals as they were.
    pub fn del<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let (start, end) = validate_range(start, end)?;
        let overlapping = self.intersecting(&start, &end, usize::MAX)?;
        if overlapping.is_empty() {
            return Ok(overlapping);
        }

        let ops = self.removals(&overlapping)?;
        debug!(%start, %end, removed = overlapping.len(), "range del");
        self.store.batch(ops.into_vec())?;
        Ok(overlapping)
    }

    /// Cut exactly `[start, end)` out of the stored set.
    ///
    /// Parts of intersecting intervals outside the range stay stored with
    /// their values. Returns the intersecting intervals as they were.
    pub fn trim<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let (start, end) = validate_range(start, end)?;
        let overlapping = self.intersecting(&start, &end, usize::MAX)?;
        if overlapping.is_empty() {
            return Ok(overlapping);
        }

        let mut ops = self.removals(&overlapping)?;
        self.push_remainders(&mut ops, &overlapping, &start, &end)?;
        debug!(%start, %end, trimmed = overlapping.len(), "range trim");
        self.store.batch(ops.into_vec())?;
        Ok(overlapping)
    }

    /// Whether any stored interval intersects `[start, end)`
    pub fn has_data_in_range<A, B>(&self, start: A, end: B) -> Result<bool>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        let (start, end) = validate_range(start, end)?;
        Ok(!self.intersecting(&start, &end, 1)?.is_empty())
    }

    /// Iterate stored intervals in ascending end order
    pub fn iterator(&self, options: RangeIterOptions) -> Result<RangeIterator<'_>> {
        let kv_options = options.to_kv_options(&self.prefix, &self.codec)?;
        Ok(RangeIterator::new(
            self.store.iter(kv_options),
            self.prefix.clone(),
            self.codec,
        ))
    }

    /// Collect up to `limit` stored intervals intersecting `[start, end)`
    fn intersecting(&self, start: &BigInt, end: &BigInt, limit: usize) -> Result<Vec<Interval>> {
        let mut found = Vec::new();
        let options = RangeIterOptions {
            gt: Some(start.clone()),
            ..RangeIterOptions::default()
        };
        for interval in self.iterator(options)? {
            let interval = interval?;
            // Every later entry starts at or after this one's end
            if !interval.intersects(start, end) {
                break;
            }
            found.push(interval);
            if found.len() >= limit {
                break;
            }
        }
        Ok(found)
    }

    fn record(&self, start: &BigInt, end: &BigInt, value: &[u8]) -> Result<BatchOp> {
        Ok(BatchOp::Put {
            key: self.codec.key(&self.prefix, end)?,
            value: self.codec.compose_value(start, value)?,
        })
    }

    fn removals(&self, intervals: &[Interval]) -> Result<WriteBatch> {
        intervals
            .iter()
            .map(|interval| Ok(BatchOp::del(self.codec.key(&self.prefix, &interval.end)?)))
            .collect()
    }

    fn push_remainders(
        &self,
        ops: &mut WriteBatch,
        overlapping: &[Interval],
        start: &BigInt,
        end: &BigInt,
    ) -> Result<()> {
        if let Some(first) = overlapping.first() {
            if &first.start < start {
                ops.push(self.record(&first.start, start, &first.value)?);
            }
        }
        if let Some(last) = overlapping.last() {
            if &last.end > end {
                ops.push(self.record(end, &last.end, &last.value)?);
            }
        }
        Ok(())
    }
}

impl<S: OrderedStore + ?Sized> RangeStore for RangeBucket<S> {
    type Store = S;

    fn put<A, B, V>(&self, start: A, end: B, value: V) -> Result<()>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
        V: AsRef<[u8]>,
    {
        RangeBucket::put(self, start, end, value)
    }

    fn get<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        RangeBucket::get(self, start, end)
    }

    fn del<A, B>(&self, start: A, end: B) -> Result<Vec<Interval>>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        RangeBucket::del(self, start, end)
    }

    fn has_data_in_range<A, B>(&self, start: A, end: B) -> Result<bool>
    where
        A: Into<BigInt>,
        B: Into<BigInt>,
    {
        RangeBucket::has_data_in_range(self, start, end)
    }

    fn iterator(&self, options: RangeIterOptions) -> Result<RangeIterator<'_>> {
        RangeBucket::iterator(self, options)
    }

    fn bucket(&self, child: &[u8]) -> Bucket<S> {
        RangeBucket::bucket(self, child)
    }

    fn range_bucket(&self, child: &[u8]) -> Self {
        RangeBucket::range_bucket(self, child)
    }
}
