//! Difficulty targets: compact-bits encoding, expanded 256-bit targets,
//! work accounting, and the retarget schedule.
//!
//! `difficulty_bits` is the compact form: the high byte is a base-256
//! exponent, the low three bytes a mantissa, so
//! `target = mantissa << (8 * (exponent - 3))`. A header hash, interpreted
//! as a little-endian unsigned 256-bit integer, must be at or below the
//! expanded target.

use primitive_types::U256;

use crate::constants::{BLOCK_TIME_SECS, RETARGET_INTERVAL};
use crate::hash::Hash256;

/// Easiest permitted target and its compact form, used at chain start.
/// Expands to `0xFFFF << 240`, which nearly every hash satisfies, so the
/// first retarget windows measure real hashrate instead of stalling.
pub const MAX_TARGET_BITS: u32 = 0x2100_FFFF;

/// Retargets cannot stretch or shrink the measured span by more than 4x.
pub const MAX_RETARGET_FACTOR: u64 = 4;

/// Expand compact bits into a 256-bit target.
///
/// Negative-mantissa encodings (sign bit 0x0080_0000) and zero mantissas
/// expand to zero, which no hash can satisfy.
pub fn bits_to_target(bits: u32) -> U256 {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007F_FFFF;
    if bits & 0x0080_0000 != 0 || mantissa == 0 {
        return U256::zero();
    }
    if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        let shift = 8 * (exponent - 3);
        if shift >= 256 {
            return max_target();
        }
        let expanded = U256::from(mantissa) << shift;
        expanded.min(max_target())
    }
}

/// Compress a 256-bit target into compact bits.
///
/// The mantissa keeps the three most significant bytes; if its top bit is
/// set the mantissa is shifted right one byte and the exponent bumped, so
/// the sign bit is never set.
pub fn target_to_bits(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut size = (target.bits() + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        let shifted = target >> (8 * (size - 3));
        shifted.low_u32()
    };
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | ((size as u32) << 24)
}

/// The easiest target the chain permits.
pub fn max_target() -> U256 {
    bits_to_target_unclamped(MAX_TARGET_BITS)
}

fn bits_to_target_unclamped(bits: u32) -> U256 {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007F_FFFF;
    U256::from(mantissa) << (8 * (exponent - 3))
}

/// The hardest target the chain permits.
pub fn min_target() -> U256 {
    U256::one()
}

/// Work contributed by one block at the given target:
/// `2^256 / (target + 1)`, computed as `(~target / (target + 1)) + 1`
/// to stay inside 256 bits.
pub fn work_from_target(target: U256) -> U256 {
    if target.is_zero() {
        return U256::zero();
    }
    (!target / (target + U256::one())) + U256::one()
}

/// Work contributed by one block with the given compact bits.
pub fn work_from_bits(bits: u32) -> U256 {
    work_from_target(bits_to_target(bits))
}

/// Interpret a header hash as a little-endian unsigned 256-bit integer.
pub fn hash_to_u256(hash: &Hash256) -> U256 {
    U256::from_little_endian(hash.as_bytes())
}

/// Whether a header hash satisfies the given compact target.
pub fn hash_meets_bits(hash: &Hash256, bits: u32) -> bool {
    hash_to_u256(hash) <= bits_to_target(bits)
}

/// Whether `height` is a retarget boundary.
pub fn is_retarget_height(height: u64) -> bool {
    height > 0 && height % RETARGET_INTERVAL == 0
}

/// Compute the compact bits for the block at a retarget boundary.
///
/// `actual_span` is the seconds elapsed across the previous
/// `RETARGET_INTERVAL - 1` intervals; it is clamped to within a factor of
/// [`MAX_RETARGET_FACTOR`] of the expected span before scaling the old
/// target proportionally. The result is bounded to
/// `[min_target, max_target]`.
pub fn retarget_bits(old_bits: u32, actual_span: u64) -> u32 {
    let expected = RETARGET_INTERVAL * BLOCK_TIME_SECS;
    let clamped = actual_span
        .max(expected / MAX_RETARGET_FACTOR)
        .min(expected * MAX_RETARGET_FACTOR);

    let old_target = bits_to_target(old_bits);
    // old_target * clamped can exceed 256 bits near max_target; widen the
    // multiply by splitting: (t / expected) * clamped + (t % expected) * clamped / expected.
    let expected_u256 = U256::from(expected);
    let clamped_u256 = U256::from(clamped);
    let quotient = old_target / expected_u256;
    let remainder = old_target % expected_u256;
    let new_target = quotient
        .saturating_mul(clamped_u256)
        .saturating_add(remainder * clamped_u256 / expected_u256);

    let bounded = new_target.max(min_target()).min(max_target());
    target_to_bits(bounded)
}

/// Expected seconds across one full retarget window.
pub const fn expected_retarget_span() -> u64 {
    RETARGET_INTERVAL * BLOCK_TIME_SECS
}
