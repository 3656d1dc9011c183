//! Range index module
//!
//! A range bucket maps pairwise disjoint half-open intervals to values. Writes
//! re-partition whatever they overlap and go to the store as one batch.

pub mod index;
pub mod iter;
pub mod serialized;

use std::fmt;

use num_bigint::BigInt;

use crate::bucket::Bucket;
use crate::error::Result;
use crate::kv::OrderedStore;
use crate::validate;

// Re-export key types
pub use index::RangeBucket;
pub use iter::{RangeIterOptions, RangeIterator};
pub use serialized::{LockTable, SerializedRangeBucket};

/// A stored interval `[start, end)` and its value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    /// Inclusive start
    pub start: BigInt,
    /// Exclusive end
    pub end: BigInt,
    /// Opaque payload
    pub value: Vec<u8>,
}

impl Interval {
    /// Create an interval
    pub fn new(start: impl Into<BigInt>, end: impl Into<BigInt>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            value: value.into(),
        }
    }

    /// Whether this interval intersects `[start, end)`
    pub fn intersects(&self, start: &BigInt, end: &BigInt) -> bool {
        validate::intersects(&self.start, &self.end, start, end)
    }

    /// Whether `point` lies inside this interval
    pub fn contains(&self, point: &BigInt) -> bool {
        &self.start <= point && point < &self.end
    }

    /// Number of points covered
    pub fn len(&self) -> BigInt {
        &self.end - &self.start
    }

    /// Check if the interval covers no points
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The part of this interval inside `[start, end)`, if any.
    ///
    /// Queries return whole stored intervals; callers that need exact
    /// boundaries clip the results with this.
    pub fn clip(&self, start: &BigInt, end: &BigInt) -> Option<Interval> {
        self.intersects(start, end).then(|| Interval {
            start: (&self.start).max(start).clone(),
            end: (&self.end).min(end).clone(),
            value: self.value.clone(),
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) {}", self.start, self.end, String::from_utf8_lossy(&self.value))
    }
}

/// Range index contract.
///
/// Implemented by [`RangeBucket`] and by wrappers around it, so nesting and
/// locking compose through delegation.
pub trait RangeStore {
    /// Ordered store the index lives in
    type Store: OrderedStore + ?Sized;

    /// Replace everything stored in `[start, end)` with `value`, keeping the
    /// parts of overlapped intervals that fall outside the range.
    fn put<S, E, V>(&self, start: S, end: E, value: V) -> Result<()>
    where
        S: Into<BigInt>,
        E: Into<BigInt>,
        V: AsRef<[u8]>;

    /// Every stored interval intersecting `[start, end)`, ascending by start
    fn get<S, E>(&self, start: S, end: E) -> Result<Vec<Interval>>
    where
        S: Into<BigInt>,
        E: Into<BigInt>;

    /// Remove every stored interval intersecting `[start, end)` entirely and
    /// return them as they were
    fn del<S, E>(&self, start: S, end: E) -> Result<Vec<Interval>>
    where
        S: Into<BigInt>,
        E: Into<BigInt>;

    /// Whether any stored interval intersects `[start, end)`
    fn has_data_in_range<S, E>(&self, start: S, end: E) -> Result<bool>
    where
        S: Into<BigInt>,
        E: Into<BigInt>;

    /// Iterate stored intervals in ascending end order
    fn iterator(&self, options: RangeIterOptions) -> Result<RangeIterator<'_>>;

    /// A plain key-value bucket nested under this one's prefix
    fn bucket(&self, child: &[u8]) -> Bucket<Self::Store>;

    /// A child range index nested under this one's prefix
    fn range_bucket(&self, child: &[u8]) -> Self
    where
        Self: Sized;
}
