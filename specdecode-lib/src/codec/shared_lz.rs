use super::check_len;
use crate::prelude::*;

/// Longest run a single header can describe.
pub const MAX_RUN: usize = 255;
const MAX_SHIFT: u32 = 16;
const SIGN_FLAG: u8 = 0x80;

/// Shift needed to fit `a` into 15 bits, between 0 and 17.
fn lz_class(a: u32) -> u32 {
    17u32.saturating_sub(a.leading_zeros())
}

/// Greedy run builder shared by both variants.
///
/// A run takes its shift from its first element, with a class of 17 collapsed to 16.
/// Following elements join while their class is within one of that shift, their sign
/// matches (signed variant) and the run is shorter than [MAX_RUN]. A class 0 value
/// in a shift 1 run loses its low bit, so a magnitude of 1 decodes as 0.
fn encode_runs(items: &[(u32, bool)], signed: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() * 2 + 2 * items.len().div_ceil(MAX_RUN));
    let mut start = 0;
    while start < items.len() {
        let (first, negative) = items[start];
        let shift = lz_class(first).min(MAX_SHIFT);
        let mut end = start + 1;
        while end < items.len() && end - start < MAX_RUN {
            let (a, neg) = items[end];
            if lz_class(a).abs_diff(shift) > 1 || (signed && neg != negative) {
                break;
            }
            end += 1;
        }

        let mut header = shift as u8;
        if signed && negative {
            header |= SIGN_FLAG;
        }
        out.push(header);
        out.push((end - start) as u8);
        for (a, _) in &items[start..end] {
            out.extend_from_slice(&((a >> shift) as u16).to_le_bytes());
        }
        start = end;
    }
    out
}

/// Walk run headers until `count` elements are produced, yielding
/// `(magnitude, negative)` pairs.
fn decode_runs(dat: &[u8], count: usize, signed: bool) -> Result<Vec<(u32, bool)>> {
    // every element takes at least two bytes
    let mut out = Vec::with_capacity(count.min(dat.len() / 2));
    let mut pos = 0;
    while out.len() < count {
        check_len(dat, pos + 2)?;
        let (header, run) = (dat[pos], dat[pos + 1] as usize);
        pos += 2;

        let negative = header & SIGN_FLAG != 0;
        let shift = u32::from(header & !SIGN_FLAG);
        if negative && !signed {
            return Err(Error::InvalidCodeword(format!(
                "sign flag in unsigned run header at byte {}",
                pos - 2
            )));
        }
        if shift > MAX_SHIFT {
            return Err(Error::InvalidCodeword(format!(
                "run shift {shift} exceeds {MAX_SHIFT}"
            )));
        }
        if run == 0 || out.len() + run > count {
            return Err(Error::InvalidCodeword(format!(
                "run of {run} elements at byte {} does not fit {count} declared",
                pos - 2
            )));
        }

        check_len(dat, pos + run * 2)?;
        for w in dat[pos..pos + run * 2].chunks_exact(2) {
            let a = u32::from(u16::from_le_bytes([w[0], w[1]])) << shift;
            out.push((a, negative));
        }
        pos += run * 2;
    }
    Ok(out)
}

/// Encode unsigned values as runs sharing a leading-zero shift.
///
/// Each run is one shift byte, one length byte and `length` little-endian u16
/// magnitudes.
#[must_use]
pub fn encode_shared_lz_positive(values: &[u32]) -> Vec<u8> {
    let items: Vec<(u32, bool)> = values.iter().map(|v| (*v, false)).collect();
    encode_runs(&items, false)
}

/// Encode signed values as runs sharing a leading-zero shift and a sign. The sign is
/// stored in the top bit of the run's shift byte.
#[must_use]
pub fn encode_shared_lz_signed(values: &[i32]) -> Vec<u8> {
    let items: Vec<(u32, bool)> = values.iter().map(|v| (v.unsigned_abs(), *v < 0)).collect();
    encode_runs(&items, true)
}

/// Decode `count` values produced by [encode_shared_lz_positive].
///
/// # Errors
/// [Error::Truncated] if `dat` ends before `count` values are decoded,
/// [Error::InvalidCodeword] for a malformed run header.
pub fn decode_shared_lz_positive(dat: &[u8], count: usize) -> Result<Vec<u32>> {
    Ok(decode_runs(dat, count, false)?
        .into_iter()
        .map(|(a, _)| a)
        .collect())
}

/// Decode `count` values produced by [encode_shared_lz_signed].
///
/// # Errors
/// [Error::Truncated] if `dat` ends before `count` values are decoded,
/// [Error::InvalidCodeword] for a malformed run header.
pub fn decode_shared_lz_signed(dat: &[u8], count: usize) -> Result<Vec<i32>> {
    Ok(decode_runs(dat, count, true)?
        .into_iter()
        .map(|(a, negative)| {
            let v = a as i32;
            if negative {
                v.wrapping_neg()
            } else {
                v
            }
        })
        .collect())
}
