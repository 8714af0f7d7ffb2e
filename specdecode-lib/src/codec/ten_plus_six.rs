use super::{checked_len, words_le};
use crate::prelude::*;

const MANTISSA_MASK: u16 = 0xffc0;
const SIGN_BIT: u16 = 0x20;
const LZ_MASK: u16 = 0x1f;

/// Encode a value into a 10-bit mantissa, a sign bit and a 5-bit leading-zero count.
///
/// ```text
/// | 15 .. 6  | 5    | 4 .. 0 |
/// | mantissa | sign | lz     |
/// ```
///
/// The magnitude is shifted so its leading bit lands at bit 15 before the low 6 bits
/// are dropped, so values with at most 10 significant bits are exact. Zero encodes as
/// zero.
#[must_use]
pub fn encode_10plus6(value: i32) -> u16 {
    if value == 0 {
        return 0;
    }
    let a = value.unsigned_abs();
    let lz = a.leading_zeros();
    let aligned = if lz < 16 {
        a >> (16 - lz)
    } else {
        a << (lz - 16)
    };
    (aligned as u16 & MANTISSA_MASK) | (u16::from(value < 0) * SIGN_BIT) | lz as u16
}

/// Inverse of [encode_10plus6].
#[must_use]
pub fn decode_10plus6(code: u16) -> i32 {
    let lz = u32::from(code & LZ_MASK);
    let mantissa = u32::from(code & MANTISSA_MASK);
    let a = if lz < 16 {
        mantissa << (16 - lz)
    } else {
        mantissa >> (lz - 16)
    };
    let v = a as i32;
    if code & SIGN_BIT != 0 {
        v.wrapping_neg()
    } else {
        v
    }
}

/// Encode values into a little-endian word stream.
#[must_use]
pub fn encode_10plus6_slice(values: &[i32]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| encode_10plus6(*v).to_le_bytes())
        .collect()
}

/// Decode `count` values from a little-endian word stream.
///
/// # Errors
/// [Error::Truncated] if `dat` holds fewer than `count` words.
pub fn decode_10plus6_bytes(dat: &[u8], count: usize) -> Result<Vec<i32>> {
    let len = checked_len(dat, count, 2)?;
    Ok(words_le(&dat[..len]).map(decode_10plus6).collect())
}
