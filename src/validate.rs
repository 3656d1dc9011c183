//! Range preconditions and the intersection predicate, shared by the range
//! index and its iterator.

use num_bigint::BigInt;
use num_traits::Signed;

use crate::error::{Error, Result};

/// Check `0 <= start < end`
pub fn check_range(start: &BigInt, end: &BigInt) -> Result<()> {
    if start.is_negative() || start >= end {
        return Err(Error::InvalidRange {
            start: start.clone(),
            end: end.clone(),
        });
    }
    Ok(())
}

/// Convert and check a range, returning the owned boundaries
pub fn validate_range<S, E>(start: S, end: E) -> Result<(BigInt, BigInt)>
where
    S: Into<BigInt>,
    E: Into<BigInt>,
{
    let (start, end) = (start.into(), end.into());
    check_range(&start, &end)?;
    Ok((start, end))
}

/// Half-open intersection: `max(s1, s2) < min(e1, e2)`.
///
/// Touching endpoints do not intersect.
pub fn intersects(s1: &BigInt, e1: &BigInt, s2: &BigInt, e2: &BigInt) -> bool {
    s1.max(s2) < e1.min(e2)
}
