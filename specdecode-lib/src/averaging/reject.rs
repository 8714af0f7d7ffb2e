//! Outlier rejection against the previous window's accepted auto-correlations.
use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};
use tracing::trace;

use super::{AveragingMode, N_AUTO_PRODUCTS};

/// Per-cell mean of the previous window's accepted auto-correlation products.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Baseline {
    Int(Array2<i64>),
    Float(Array2<f32>),
}

pub(crate) fn baseline(
    previous: &ArrayView3<i32>,
    accepted: &[usize],
    mode: AveragingMode,
) -> Baseline {
    let autos = previous.slice(s![.., ..N_AUTO_PRODUCTS, ..]);
    let (_, products, channels) = autos.dim();
    let n = accepted.len().max(1);

    match mode {
        AveragingMode::Int32 => {
            let mut acc = Array2::<i32>::zeros((products, channels));
            for &idx in accepted {
                let sample = autos.index_axis(Axis(0), idx);
                acc.zip_mut_with(&sample, |a, x| *a = a.wrapping_add(*x));
            }
            Baseline::Int(acc.mapv(|a| i64::from(a.div_euclid(n as i32))))
        }
        AveragingMode::Int64 => {
            let mut acc = Array2::<i64>::zeros((products, channels));
            for &idx in accepted {
                let sample = autos.index_axis(Axis(0), idx);
                acc.zip_mut_with(&sample, |a, x| *a += i64::from(*x));
            }
            Baseline::Int(acc.mapv(|a| a.div_euclid(n as i64)))
        }
        AveragingMode::Float32 => {
            let mut acc = Array2::<f32>::zeros((products, channels));
            for &idx in accepted {
                let sample = autos.index_axis(Axis(0), idx);
                acc.zip_mut_with(&sample, |a, x| *a += *x as f32);
            }
            let n = n as f32;
            Baseline::Float(acc.mapv(|a| a / n))
        }
    }
}

/// Number of auto-correlation cells of `sample` deviating from `baseline` by more than
/// `baseline / reject_ratio`. A ratio of zero disables rejection.
pub(crate) fn count_bad(sample: &ArrayView2<i32>, baseline: &Baseline, reject_ratio: u32) -> usize {
    if reject_ratio == 0 {
        return 0;
    }
    let autos = sample.slice(s![..N_AUTO_PRODUCTS, ..]);
    match baseline {
        Baseline::Int(avg) => {
            let ratio = i64::from(reject_ratio);
            autos
                .iter()
                .zip(avg.iter())
                .filter(|(x, b)| (i64::from(**x) - **b).abs() > b.div_euclid(ratio))
                .count()
        }
        Baseline::Float(avg) => {
            let ratio = reject_ratio as f32;
            autos
                .iter()
                .zip(avg.iter())
                .filter(|(x, b)| (**x as f32 - **b).abs() > **b / ratio)
                .count()
        }
    }
}

/// Indices of the samples in `current` to accept.
///
/// Everything is accepted when there is no previous window or when the previous window
/// accepted no more than half its samples.
pub(crate) fn select(
    current: &ArrayView3<i32>,
    previous: Option<(&ArrayView3<i32>, &[usize])>,
    reject_ratio: u32,
    max_bad: usize,
    mode: AveragingMode,
) -> Vec<usize> {
    let navg2 = current.len_of(Axis(0));
    let Some((previous, prev_accepted)) = previous else {
        return (0..navg2).collect();
    };
    if prev_accepted.len() <= navg2 / 2 {
        return (0..navg2).collect();
    }

    let base = baseline(previous, prev_accepted, mode);
    (0..navg2)
        .filter(|&idx| {
            let sample = current.index_axis(Axis(0), idx);
            let n_bad = count_bad(&sample, &base, reject_ratio);
            trace!(sample = idx, n_bad, "rejection check");
            n_bad <= max_bad
        })
        .collect()
}
