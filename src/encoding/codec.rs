//! Key and value layout of stored intervals

use num_bigint::BigInt;

use super::boundary::{decode_boundary, write_boundary, Endianness};
use crate::config::RangeConfig;
use crate::error::EncodingError;

/// Translates boundaries and payloads to the stored key/value layout of one
/// range bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    width: usize,
    endianness: Endianness,
}

impl KeyCodec {
    /// Create a codec for the given configuration
    pub fn new(config: RangeConfig) -> Self {
        Self {
            width: config.width,
            endianness: config.endianness,
        }
    }

    /// Boundary width in bytes
    pub fn width(&self) -> usize {
        self.width
    }

    /// Boundary byte order
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Encode a boundary into `width` bytes
    pub fn encode(&self, n: &BigInt) -> Result<Vec<u8>, EncodingError> {
        let mut out = vec![0u8; self.width];
        write_boundary(n, self.endianness, &mut out)?;
        Ok(out)
    }

    /// Decode a boundary
    pub fn decode(&self, bytes: &[u8]) -> BigInt {
        decode_boundary(bytes, self.endianness)
    }

    /// `prefix ++ encode(n)`
    pub fn key(&self, prefix: &[u8], n: &BigInt) -> Result<Vec<u8>, EncodingError> {
        let mut key = vec![0u8; prefix.len() + self.width];
        key[..prefix.len()].copy_from_slice(prefix);
        write_boundary(n, self.endianness, &mut key[prefix.len()..])?;
        Ok(key)
    }

    /// Decode the boundary of a key stored under `prefix`.
    ///
    /// Returns `None` when the key is not exactly one boundary long past the
    /// prefix, which is the case for entries of nested namespaces.
    pub fn decode_key(&self, prefix: &[u8], key: &[u8]) -> Option<BigInt> {
        let suffix = key.strip_prefix(prefix)?;
        (suffix.len() == self.width).then(|| self.decode(suffix))
    }

    /// `encode(start) ++ payload`
    pub fn compose_value(&self, start: &BigInt, payload: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let mut value = vec![0u8; self.width + payload.len()];
        write_boundary(start, self.endianness, &mut value[..self.width])?;
        value[self.width..].copy_from_slice(payload);
        Ok(value)
    }

    /// Split a stored value into `(start, payload)`
    pub fn decompose_value(&self, bytes: &[u8]) -> Result<(BigInt, Vec<u8>), EncodingError> {
        if bytes.len() < self.width {
            return Err(EncodingError::Truncated {
                len: bytes.len(),
                width: self.width,
            });
        }
        let (start, payload) = bytes.split_at(self.width);
        Ok((self.decode(start), payload.to_vec()))
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(RangeConfig::default())
    }
}

/// Compose a stored value with an explicit width and byte order
pub fn compose_value(
    start: &BigInt,
    payload: &[u8],
    width: usize,
    endianness: Endianness,
) -> Result<Vec<u8>, EncodingError> {
    KeyCodec::new(RangeConfig { width, endianness }).compose_value(start, payload)
}

/// Decompose a stored value with an explicit width and byte order
pub fn decompose_value(
    bytes: &[u8],
    width: usize,
    endianness: Endianness,
) -> Result<(BigInt, Vec<u8>), EncodingError> {
    KeyCodec::new(RangeConfig { width, endianness }).decompose_value(bytes)
}
