//! RangeDB: range-indexed key-value storage
//!
//! This crate maps non-overlapping half-open numeric intervals `[start, end)` to
//! opaque byte values on top of an ordered key-value store. Writing an interval
//! that overlaps stored ones re-partitions them so the stored set never
//! overlaps, and every mutation is submitted to the store as one atomic batch.
//!
//! Each interval is stored as a single pair:
//!
//! ```text
//! key   = namespace_prefix ++ fixed_width(end)
//! value = fixed_width(start) ++ payload
//! ```
//!
//! so ascending key order is ascending interval end, which is what the range
//! query walks.

#![warn(missing_docs)]

/// Namespaced plain key-value buckets
pub mod bucket;

/// Boundary and value encoding
pub mod encoding;

/// Ordered key-value primitive and its implementations
pub mod kv;

/// Range index, iterator and serialized writers
pub mod range;

/// Range validation and intersection predicates
pub mod validate;

/// Property tests for the range index
#[cfg(test)]
mod range_property_tests;

// Re-exports
pub use bucket::Bucket;
pub use config::{FileStoreConfig, RangeConfig};
pub use encoding::{Endianness, KeyCodec};
pub use error::{EncodingError, Error, Result, StorageError};
pub use kv::{BatchOp, FileStore, IterOptions, KvCursor, MemoryStore, OrderedStore};
pub use num_bigint::BigInt;
pub use range::{
    Interval, LockTable, RangeBucket, RangeIterOptions, RangeIterator, RangeStore,
    SerializedRangeBucket,
};

/// Error types for RangeDB operations
pub mod error {
    use num_bigint::BigInt;
    use std::io;
    use std::path::PathBuf;
    use thiserror::Error;

    /// Result alias used throughout the crate
    pub type Result<T> = std::result::Result<T, Error>;

    /// Error types that can occur in range operations
    #[derive(Debug, Error)]
    pub enum Error {
        /// The range is empty, inverted or starts below zero. No I/O was performed.
        #[error("invalid range [{start}, {end}): start must be non-negative and less than end")]
        InvalidRange {
            /// Requested start boundary
            start: BigInt,
            /// Requested end boundary
            end: BigInt,
        },
        /// A boundary or stored record could not be encoded or decoded
        #[error("encoding error: {0}")]
        Encoding(#[from] EncodingError),
        /// The underlying ordered store failed
        #[error("storage error: {0}")]
        Storage(#[from] StorageError),
        /// Configuration error
        #[error("configuration error: {0}")]
        Config(String),
    }

    /// Boundary codec failures
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum EncodingError {
        /// The boundary needs more bytes than the configured width
        #[error("boundary {value} does not fit in {width} bytes")]
        Overflow {
            /// Offending boundary
            value: BigInt,
            /// Configured width in bytes
            width: usize,
        },
        /// Boundaries are unsigned on disk
        #[error("boundary {0} is negative")]
        Negative(BigInt),
        /// A stored value is shorter than the start boundary it must carry
        #[error("stored value is {len} bytes, shorter than the {width}-byte start boundary")]
        Truncated {
            /// Length of the stored value
            len: usize,
            /// Configured width in bytes
            width: usize,
        },
    }

    /// Failures of the ordered key-value primitive
    #[derive(Debug, Error)]
    pub enum StorageError {
        /// An I/O error occurred
        #[error("I/O error: {0}")]
        Io(#[from] io::Error),
        /// The log file does not start with a valid header
        #[error("invalid log header: {0}")]
        BadHeader(&'static str),
        /// A checksummed record could not be decoded
        #[error("corrupt record at offset {0}")]
        CorruptRecord(u64),
        /// The store file does not exist and creation was disabled
        #[error("store file {} does not exist", .0.display())]
        Missing(PathBuf),
    }
}

/// Configuration options for RangeDB
pub mod config {
    use crate::encoding::Endianness;
    use crate::error::{Error, Result};
    use std::path::PathBuf;

    /// Default boundary width in bytes, enough for values up to 2^128 - 1
    pub const DEFAULT_BOUNDARY_WIDTH: usize = 16;

    /// Encoding configuration of a range bucket, fixed when the bucket is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
    pub struct RangeConfig {
        /// Width of every encoded boundary in bytes
        pub width: usize,
        /// Byte order of encoded boundaries
        pub endianness: Endianness,
    }

    impl Default for RangeConfig {
        fn default() -> Self {
            Self {
                width: DEFAULT_BOUNDARY_WIDTH,
                endianness: Endianness::Big,
            }
        }
    }

    impl RangeConfig {
        /// Set the boundary width
        pub fn with_width(mut self, width: usize) -> Self {
            self.width = width;
            self
        }

        /// Set the boundary byte order.
        ///
        /// Little-endian boundaries do not sort numerically, so range queries
        /// are only meaningful with [`Endianness::Big`].
        pub fn with_endianness(mut self, endianness: Endianness) -> Self {
            self.endianness = endianness;
            self
        }

        /// Check the configuration is usable
        pub fn validate(&self) -> Result<()> {
            if self.width == 0 {
                return Err(Error::Config("boundary width must be at least 1 byte".to_string()));
            }
            Ok(())
        }
    }

    /// Configuration for the file-backed store
    #[derive(Debug, Clone)]
    pub struct FileStoreConfig {
        /// Path to the log file
        pub path: PathBuf,
        /// Whether to fsync after every committed batch
        pub sync_writes: bool,
        /// Create the file when it does not exist
        pub create_if_missing: bool,
    }

    impl Default for FileStoreConfig {
        fn default() -> Self {
            Self {
                path: PathBuf::from("rangedb.log"),
                sync_writes: true,
                create_if_missing: true,
            }
        }
    }

    impl FileStoreConfig {
        /// Create config with custom file path
        pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
            Self {
                path: path.into(),
                ..Self::default()
            }
        }

        /// Set whether writes are synced immediately
        pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
            self.sync_writes = sync_writes;
            self
        }

        /// Set whether a missing file is created
        pub fn with_create_if_missing(mut self, create: bool) -> Self {
            self.create_if_missing = create;
            self
        }
    }
}
