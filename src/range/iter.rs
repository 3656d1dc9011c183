//! Cursor reconstructing intervals from a range bucket's key space

use num_bigint::BigInt;

use super::Interval;
use crate::encoding::KeyCodec;
use crate::error::Result;
use crate::kv::{IterOptions, KvCursor};

/// Bounds on the **end** boundary of the intervals an iterator yields.
///
/// Intervals are keyed by their end, so these map directly onto key bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeIterOptions {
    /// End strictly greater than
    pub gt: Option<BigInt>,
    /// End greater than or equal to
    pub gte: Option<BigInt>,
    /// End strictly less than
    pub lt: Option<BigInt>,
    /// End less than or equal to
    pub lte: Option<BigInt>,
}

impl RangeIterOptions {
    /// Unbounded options
    pub fn new() -> Self {
        Self::default()
    }

    /// Only intervals ending after `n`
    pub fn gt(mut self, n: impl Into<BigInt>) -> Self {
        self.gt = Some(n.into());
        self
    }

    /// Only intervals ending at or after `n`
    pub fn gte(mut self, n: impl Into<BigInt>) -> Self {
        self.gte = Some(n.into());
        self
    }

    /// Only intervals ending before `n`
    pub fn lt(mut self, n: impl Into<BigInt>) -> Self {
        self.lt = Some(n.into());
        self
    }

    /// Only intervals ending at or before `n`
    pub fn lte(mut self, n: impl Into<BigInt>) -> Self {
        self.lte = Some(n.into());
        self
    }

    /// Translate into key-space options under `prefix`
    pub(crate) fn to_kv_options(&self, prefix: &[u8], codec: &KeyCodec) -> Result<IterOptions> {
        let key = |n: &Option<BigInt>| -> Result<Option<Vec<u8>>> {
            Ok(match n {
                Some(n) => Some(codec.key(prefix, n)?),
                None => None,
            })
        };
        Ok(IterOptions {
            gt: key(&self.gt)?,
            gte: key(&self.gte)?,
            lt: key(&self.lt)?,
            lte: key(&self.lte)?,
            prefix: Some(prefix.to_vec()),
        })
    }
}

/// Lazy, forward-only sequence of stored intervals in ascending end order.
///
/// Entries under the bucket prefix that are not exactly one boundary long
/// belong to nested namespaces and are skipped. The sequence is finite; build a
/// fresh iterator to restart it, or [`seek`](RangeIterator::seek).
pub struct RangeIterator<'a> {
    cursor: Box<dyn KvCursor + 'a>,
    prefix: Vec<u8>,
    codec: KeyCodec,
    done: bool,
}

impl<'a> RangeIterator<'a> {
    pub(crate) fn new(cursor: Box<dyn KvCursor + 'a>, prefix: Vec<u8>, codec: KeyCodec) -> Self {
        Self {
            cursor,
            prefix,
            codec,
            done: false,
        }
    }

    /// Reposition to the first interval whose end is `>= target`
    pub fn seek(&mut self, target: impl Into<BigInt>) -> Result<()> {
        let key = self.codec.key(&self.prefix, &target.into())?;
        self.cursor.seek(&key);
        self.done = false;
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Interval>> {
        while let Some((key, value)) = self.cursor.next()? {
            let Some(end) = self.codec.decode_key(&self.prefix, &key) else {
                continue;
            };
            let (start, value) = self.codec.decompose_value(&value)?;
            return Ok(Some(Interval { start, end, value }));
        }
        Ok(None)
    }
}

impl Iterator for RangeIterator<'_> {
    type Item = Result<Interval>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(interval)) => Some(Ok(interval)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
