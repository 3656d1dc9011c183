//! Plain key-value buckets
//!
//! A bucket is a view of a shared [`OrderedStore`] restricted to keys under a
//! byte prefix. Keys passed in and returned out are relative to the bucket, and
//! buckets nest by concatenating prefixes. Range buckets are created from here
//! so that plain and range data can share one store under distinct namespaces.

use std::sync::Arc;

use crate::config::RangeConfig;
use crate::error::{Result, StorageError};
use crate::kv::{BatchOp, IterOptions, KvCursor, OrderedStore};
use crate::range::RangeBucket;

/// Prefixed view of an ordered store
pub struct Bucket<S: ?Sized> {
    store: Arc<S>,
    prefix: Vec<u8>,
}

impl<S: ?Sized> Clone for Bucket<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
        }
    }
}

impl<S: OrderedStore + ?Sized> Bucket<S> {
    /// Create a bucket over `store` under `prefix`
    pub fn new(store: Arc<S>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Namespace prefix
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        [self.prefix.as_slice(), key].concat()
    }

    /// Read a key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(&self.full_key(key))?)
    }

    /// Write a key
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.store.put(&self.full_key(key), value)?)
    }

    /// Remove a key
    pub fn del(&self, key: &[u8]) -> Result<()> {
        Ok(self.store.del(&self.full_key(key))?)
    }

    /// Apply operations on bucket-relative keys atomically
    pub fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let ops = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => BatchOp::Put {
                    key: self.full_key(&key),
                    value,
                },
                BatchOp::Del { key } => BatchOp::Del {
                    key: self.full_key(&key),
                },
            })
            .collect();
        Ok(self.store.batch(ops)?)
    }

    /// Iterate bucket entries with bucket-relative bounds and keys
    pub fn iterator(&self, options: IterOptions) -> Box<dyn KvCursor + '_> {
        let scoped = |key: Option<Vec<u8>>| key.map(|k| self.full_key(&k));
        let prefix = self.full_key(options.prefix.as_deref().unwrap_or_default());
        let options = IterOptions {
            gt: scoped(options.gt),
            gte: scoped(options.gte),
            lt: scoped(options.lt),
            lte: scoped(options.lte),
            prefix: Some(prefix),
        };
        Box::new(BucketCursor {
            inner: self.store.iter(options),
            prefix: &self.prefix,
        })
    }

    /// A plain bucket nested under this one
    pub fn bucket(&self, child: &[u8]) -> Bucket<S> {
        Bucket::new(Arc::clone(&self.store), self.full_key(child))
    }

    /// A range bucket nested under this one, with the default encoding
    pub fn range_bucket(&self, child: &[u8]) -> RangeBucket<S> {
        RangeBucket::new(Arc::clone(&self.store), self.full_key(child))
    }

    /// A range bucket nested under this one, with an explicit encoding
    pub fn range_bucket_with_config(&self, child: &[u8], config: RangeConfig) -> Result<RangeBucket<S>> {
        RangeBucket::with_config(Arc::clone(&self.store), self.full_key(child), config)
    }
}

/// Cursor translating between store keys and bucket-relative keys
struct BucketCursor<'a> {
    inner: Box<dyn KvCursor + 'a>,
    prefix: &'a [u8],
}

impl KvCursor for BucketCursor<'_> {
    fn next(&mut self) -> std::result::Result<Option<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self.inner.next()?.map(|(mut key, value)| {
            key.drain(..self.prefix.len());
            (key, value)
        }))
    }

    fn seek(&mut self, target: &[u8]) {
        let key = [self.prefix, target].concat();
        self.inner.seek(&key);
    }
}
