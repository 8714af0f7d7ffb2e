use super::{checked_len, words_le};
use crate::prelude::*;

const MANTISSA_MASK: u16 = 0x3fff;
const HIGH_SHIFT_FLAG: u16 = 0x4000;
const SIGN_BIT: u16 = 0x8000;

/// Encode four values into five 16-bit words.
///
/// Word 0 holds a 4-bit shift for each value at nibble offsets 0, 4, 8 and 12. Word
/// `i + 1` holds the shifted magnitude of value `i` in bits 0..14, bit 14 flags that
/// 16 must be added to the nibble and bit 15 is the sign.
#[must_use]
pub fn encode_4into5(values: [i32; 4]) -> [u16; 5] {
    let mut out = [0u16; 5];
    for (i, v) in values.iter().enumerate() {
        let a = v.unsigned_abs();
        let shift = 18u32.saturating_sub(a.leading_zeros());
        let mut word = (a >> shift) as u16 & MANTISSA_MASK;
        let nibble = if shift >= 16 {
            word |= HIGH_SHIFT_FLAG;
            shift - 16
        } else {
            shift
        };
        if *v < 0 {
            word |= SIGN_BIT;
        }
        out[0] |= (nibble as u16) << (4 * i);
        out[i + 1] = word;
    }
    out
}

/// Inverse of [encode_4into5].
#[must_use]
pub fn decode_4into5(words: [u16; 5]) -> [i32; 4] {
    let mut out = [0i32; 4];
    for (i, v) in out.iter_mut().enumerate() {
        let word = words[i + 1];
        let mut shift = u32::from(words[0] >> (4 * i) & 0xf);
        if word & HIGH_SHIFT_FLAG != 0 {
            shift += 16;
        }
        let a = u32::from(word & MANTISSA_MASK).wrapping_shl(shift) as i32;
        *v = if word & SIGN_BIT != 0 {
            a.wrapping_neg()
        } else {
            a
        };
    }
    out
}

/// Encode values into a little-endian word stream, zero-padding the last group of
/// four.
#[must_use]
pub fn encode_4into5_slice(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len().div_ceil(4) * 10);
    for chunk in values.chunks(4) {
        let mut group = [0i32; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        for word in encode_4into5(group) {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// Decode `count` values from a little-endian word stream.
///
/// # Errors
/// [Error::Truncated] if `dat` is shorter than the `ceil(count / 4)` groups required.
pub fn decode_4into5_bytes(dat: &[u8], count: usize) -> Result<Vec<i32>> {
    let groups = count.div_ceil(4);
    let len = checked_len(dat, groups, 10)?;

    let mut out = Vec::with_capacity(groups * 4);
    for group in dat[..len].chunks_exact(10) {
        let mut words = [0u16; 5];
        for (w, v) in words.iter_mut().zip(words_le(group)) {
            *w = v;
        }
        out.extend(decode_4into5(words));
    }
    out.truncate(count);
    Ok(out)
}
