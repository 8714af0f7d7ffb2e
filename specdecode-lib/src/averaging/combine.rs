//! Combining accepted samples of one window into an averaged spectrum.
//!
//! Each arithmetic mode reproduces the firmware's order of operations exactly, so
//! they are kept as separate functions even where the shapes look alike.
use ndarray::{Array2, ArrayView3, Axis};

use super::AveragingMode;

/// Channel grouping for a frequency averaging factor: `(stride, taps)`.
///
/// Factors 1 and 2 sum 1 or 2 adjacent bins. Factors 3 and 4 both work in groups of
/// four; 3 uses only the first three bins of each group but still divides by 4.
pub(crate) fn bins(navgf: usize) -> (usize, usize) {
    match navgf {
        1 => (1, 1),
        2 => (2, 2),
        3 => (4, 3),
        _ => (4, 4),
    }
}

/// 32-bit firmware path: each bin is floor-divided by `stride * navg2` before summing,
/// and the sum wraps on overflow.
fn average_int32(
    window: &ArrayView3<i32>,
    accepted: &[usize],
    navg2: usize,
    navgf: usize,
) -> Array2<i32> {
    let (stride, taps) = bins(navgf);
    let (_, products, channels) = window.dim();
    let div = (stride * navg2) as i32;

    let mut out = Array2::<i32>::zeros((products, channels / stride));
    for &idx in accepted {
        let sample = window.index_axis(Axis(0), idx);
        for ((p, c), acc) in out.indexed_iter_mut() {
            let mut x = 0i32;
            for t in 0..taps {
                x = x.wrapping_add(sample[[p, c * stride + t]].div_euclid(div));
            }
            *acc = acc.wrapping_add(x);
        }
    }
    out
}

/// Wide-accumulator path. For strides of 4 the per-sample bin sum is floored by 4
/// first and the window sum by `navg2` after; otherwise the window sum is floored by
/// `stride * navg2` once.
fn average_int64(
    window: &ArrayView3<i32>,
    accepted: &[usize],
    navg2: usize,
    navgf: usize,
) -> Array2<i32> {
    let (stride, taps) = bins(navgf);
    let (_, products, channels) = window.dim();

    let mut acc = Array2::<i64>::zeros((products, channels / stride));
    for &idx in accepted {
        let sample = window.index_axis(Axis(0), idx);
        for ((p, c), a) in acc.indexed_iter_mut() {
            let mut x: i64 = (0..taps).map(|t| i64::from(sample[[p, c * stride + t]])).sum();
            if stride == 4 {
                x = x.div_euclid(4);
            }
            *a += x;
        }
    }
    let div = (if stride == 4 { navg2 } else { stride * navg2 }) as i64;
    acc.mapv(|a| a.div_euclid(div) as i32)
}

/// Single-precision path: accumulate in f32, divide once by `stride * navg2` and
/// truncate toward zero only at the end.
fn average_float(
    window: &ArrayView3<i32>,
    accepted: &[usize],
    navg2: usize,
    navgf: usize,
) -> Array2<i32> {
    let (stride, taps) = bins(navgf);
    let (_, products, channels) = window.dim();

    let mut acc = Array2::<f32>::zeros((products, channels / stride));
    for &idx in accepted {
        let sample = window.index_axis(Axis(0), idx);
        for ((p, c), a) in acc.indexed_iter_mut() {
            let mut x = 0f32;
            for t in 0..taps {
                x += sample[[p, c * stride + t]] as f32;
            }
            *a += x;
        }
    }
    let div = (stride * navg2) as f32;
    acc.mapv(|a| (a / div) as i32)
}

/// Average the `accepted` samples of `window`.
///
/// The sum is always normalized by `navg2`; when fewer samples were accepted the
/// result is rescaled by `navg2 / accepted` the way the ground decoder reports a
/// weighted average. An empty `accepted` set averages every sample instead.
#[must_use]
pub fn average_window(
    window: &ArrayView3<i32>,
    accepted: &[usize],
    navg2: usize,
    navgf: usize,
    mode: AveragingMode,
) -> Array2<f64> {
    let all: Vec<usize>;
    let used = if accepted.is_empty() {
        all = (0..window.len_of(Axis(0))).collect();
        &all[..]
    } else {
        accepted
    };

    let result = match mode {
        AveragingMode::Int32 => average_int32(window, used, navg2, navgf),
        AveragingMode::Int64 => average_int64(window, used, navg2, navgf),
        AveragingMode::Float32 => average_float(window, used, navg2, navgf),
    };

    let mut out = result.mapv(f64::from);
    if used.len() != navg2 {
        let (n, k) = (navg2 as f64, used.len() as f64);
        out.mapv_inplace(|v| v / k * n);
    }
    out
}
