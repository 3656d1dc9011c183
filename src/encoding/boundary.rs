//! Fixed-width boundary encoding
//!
//! Boundaries are non-negative integers of arbitrary precision. On disk every
//! boundary takes exactly `width` bytes. With big-endian order the byte-wise
//! lexicographic order of two encodings equals their numeric order, which is
//! what makes forward scans over the key space walk intervals by ascending end.

use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed};

use crate::error::EncodingError;

/// Byte order of encoded boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    /// Most significant byte first. Sorts numerically.
    #[default]
    Big,
    /// Least significant byte first. Only for compatibility with external layouts.
    Little,
}

/// Encode `n` into exactly `width` bytes.
///
/// Fails when `n` is negative or needs more than `width` bytes.
pub fn encode_boundary(
    n: &BigInt,
    width: usize,
    endianness: Endianness,
) -> Result<Vec<u8>, EncodingError> {
    let mut out = vec![0u8; width];
    write_boundary(n, endianness, &mut out)?;
    Ok(out)
}

/// Encode `n` into `out`, using all of it as the boundary width.
pub fn write_boundary(
    n: &BigInt,
    endianness: Endianness,
    out: &mut [u8],
) -> Result<(), EncodingError> {
    if n.is_negative() {
        return Err(EncodingError::Negative(n.clone()));
    }
    let width = out.len();
    let (_, magnitude) = match endianness {
        Endianness::Big => n.to_bytes_be(),
        Endianness::Little => n.to_bytes_le(),
    };

    // Zero encodes to a single 0x00 byte
    let significant: &[u8] = match endianness {
        Endianness::Big => {
            let skip = magnitude.iter().take_while(|&&b| b == 0).count();
            &magnitude[skip..]
        }
        Endianness::Little => {
            let keep = magnitude.len() - magnitude.iter().rev().take_while(|&&b| b == 0).count();
            &magnitude[..keep]
        }
    };
    if significant.len() > width {
        return Err(EncodingError::Overflow {
            value: n.clone(),
            width,
        });
    }

    out.fill(0);
    match endianness {
        Endianness::Big => out[width - significant.len()..].copy_from_slice(significant),
        Endianness::Little => out[..significant.len()].copy_from_slice(significant),
    }
    Ok(())
}

/// Decode a boundary. Pure inverse of [`encode_boundary`].
pub fn decode_boundary(bytes: &[u8], endianness: Endianness) -> BigInt {
    match endianness {
        Endianness::Big => BigInt::from_bytes_be(Sign::Plus, bytes),
        Endianness::Little => BigInt::from_bytes_le(Sign::Plus, bytes),
    }
}

/// Largest boundary representable in `width` bytes
pub fn max_boundary(width: usize) -> BigInt {
    (BigInt::one() << (8 * width)) - 1u8
}
