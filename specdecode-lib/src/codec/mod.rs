//! Bit-packed numeric encodings used by the flight software to compress spectra and
//! calibrator output.
//!
//! All three codecs are lossy for large magnitudes but always preserve sign:
//!
//! | codec | layout | retained magnitude bits |
//! |---|---|---|
//! | [10-plus-6](encode_10plus6) | 1 x u16 per value | 10 |
//! | [4-into-5](encode_4into5) | 5 x u16 per 4 values | 14 |
//! | [shared leading zeros](encode_shared_lz_signed) | 2 byte run header + 2 bytes per value | 14 |
//!
//! Word streams are little-endian on the wire.
mod four_into_five;
mod shared_lz;
mod ten_plus_six;

pub use four_into_five::*;
pub use shared_lz::*;
pub use ten_plus_six::*;

use crate::prelude::*;

/// True when `a` and `b` have the same sign and agree in their `k` most significant
/// magnitude bits, where the bit count is taken from `a`.
#[must_use]
pub fn top_bits_match(a: i64, b: i64, k: u32) -> bool {
    if (a < 0) != (b < 0) {
        return false;
    }
    let (a, b) = (a.unsigned_abs(), b.unsigned_abs());
    let bits = 64 - (a + 1).leading_zeros();
    let shift = bits.saturating_sub(k);
    a >> shift == b >> shift
}

pub(crate) fn check_len(dat: &[u8], needed: usize) -> Result<()> {
    if dat.len() < needed {
        return Err(Error::Truncated {
            needed,
            available: dat.len(),
        });
    }
    Ok(())
}

/// Byte length of `count` items of `width` bytes, checked against `dat`.
pub(crate) fn checked_len(dat: &[u8], count: usize, width: usize) -> Result<usize> {
    let needed = count.checked_mul(width).ok_or(Error::Truncated {
        needed: usize::MAX,
        available: dat.len(),
    })?;
    check_len(dat, needed)?;
    Ok(needed)
}

pub(crate) fn words_le(dat: &[u8]) -> impl Iterator<Item = u16> + '_ {
    dat.chunks_exact(2).map(|w| u16::from_le_bytes([w[0], w[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_bits_match() {
        assert!(top_bits_match(0, 0, 10));
        assert!(top_bits_match(1023, 1023, 10));
        assert!(top_bits_match(0x12345, 0x12344, 14));
        assert!(!top_bits_match(0x12345, 0x12245, 14));
        assert!(!top_bits_match(-5, 5, 10));
        assert!(top_bits_match(-0x7fff_ffff, -0x7ff0_0000, 10));
    }

    #[test]
    fn check_len_reports_sizes() {
        match check_len(&[0u8; 3], 4) {
            Err(Error::Truncated { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_len(&[0u8; 4], 4).is_ok());
    }

    #[test]
    fn checked_len_overflow_is_truncation() {
        assert_eq!(checked_len(&[0u8; 10], 5, 2).unwrap(), 10);
        assert!(matches!(
            checked_len(&[0u8; 10], usize::MAX / 2 + 1, 2),
            Err(Error::Truncated { needed: usize::MAX, available: 10 })
        ));
    }
}
