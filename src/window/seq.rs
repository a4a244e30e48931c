//! Modulo-8 sequence arithmetic.

use crate::core::constants::SEQ_MODULUS;

const SEQ_MASK: u8 = SEQ_MODULUS - 1;

/// `seq + n` in sequence space.
#[inline]
pub fn seq_add(seq: u8, n: u8) -> u8 {
    seq.wrapping_add(n) & SEQ_MASK
}

/// Number of steps from `from` forward to `to`.
#[inline]
pub fn seq_distance(from: u8, to: u8) -> u8 {
    to.wrapping_sub(from) & SEQ_MASK
}
