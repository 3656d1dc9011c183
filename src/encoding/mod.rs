//! Encoding module for RangeDB
//!
//! This module provides the order-preserving fixed-width boundary encoding and
//! the composite `start ++ payload` value layout used by range buckets.

pub mod boundary;
pub mod codec;

// Re-export key types and functions for convenience
pub use boundary::{Endianness, decode_boundary, encode_boundary, max_boundary};
pub use codec::{KeyCodec, compose_value, decompose_value};
