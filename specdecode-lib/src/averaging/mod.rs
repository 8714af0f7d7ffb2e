//! Ground-side reproduction of the on-board spectral averaging and outlier rejection.
//!
//! The firmware accumulates `navg2` raw spectra per window. Samples whose
//! auto-correlations stray too far from the previous window's accepted mean are
//! rejected, and the rest are combined using one of three fixed-point or floating
//! point strategies ([AveragingMode]). [simulate] reproduces the exact result the
//! instrument would report for a given input so telemetry can be validated against
//! synthetic data.
//!
//! Input spectra are shaped `[sample, product, channel]`, with the auto-correlation
//! products first.
//!
//! ```
//! use ndarray::Array3;
//! use specdecode::averaging::{simulate, SimulationConfig};
//!
//! let spectra = Array3::<i32>::from_elem((8, 16, 64), 1000);
//! let cfg = SimulationConfig::builder().navg2(4).windows(3).build();
//! let results = simulate(&spectra.view(), &cfg).unwrap();
//!
//! assert_eq!(results.len(), 3);
//! assert_eq!(results[2].weight, 4);
//! assert_eq!(results[2].spectrum[[0, 0]], 1000.0);
//! ```
mod combine;
mod reject;

pub use combine::average_window;

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::prelude::*;

/// Cross and auto correlation products per spectrum.
pub const N_PRODUCTS: usize = 16;
/// Leading products that are auto-correlations.
pub const N_AUTO_PRODUCTS: usize = 4;
/// Channels in a full-resolution spectrum.
pub const N_CHANNELS: usize = 2048;

/// Arithmetic used to combine accepted samples.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AveragingMode {
    /// 32-bit accumulation; every sample is floor-divided before summing.
    Int32,
    /// Wide accumulation with a single floor division at the end.
    #[default]
    Int64,
    /// Single-precision accumulation truncated to an integer at the end.
    Float32,
}

/// Parameters of a simulation run.
#[derive(TypedBuilder, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Samples per window. Must be a power of two.
    pub navg2: usize,
    /// Frequency averaging factor, 1 through 4.
    #[builder(default = 1)]
    pub navgf: usize,
    /// A cell is bad when it deviates from the baseline by more than
    /// `baseline / reject_ratio`. Zero disables rejection.
    #[builder(default)]
    pub reject_ratio: u32,
    /// Largest number of bad cells a sample may have and still be accepted.
    #[builder(default)]
    pub max_bad: usize,
    #[builder(default)]
    pub mode: AveragingMode,
    /// Windows to produce. Input windows are reused cyclically when there are fewer.
    #[builder(default = 1)]
    pub windows: usize,
    /// Worker threads for [simulate_runs]. Zero lets the pool decide.
    #[builder(default)]
    pub num_threads: usize,
}

impl SimulationConfig {
    /// Check the parameters against input spectra of the given `[sample, product,
    /// channel]` shape.
    ///
    /// # Errors
    /// [Error::InvalidConfig] describing the first problem found.
    pub fn validate(&self, shape: (usize, usize, usize)) -> Result<()> {
        let (samples, products, channels) = shape;
        if !self.navg2.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "navg2 must be a power of two, got {}",
                self.navg2
            )));
        }
        if !(1..=4).contains(&self.navgf) {
            return Err(Error::InvalidConfig(format!(
                "navgf must be between 1 and 4, got {}",
                self.navgf
            )));
        }
        if samples < self.navg2 {
            return Err(Error::InvalidConfig(format!(
                "{samples} samples do not fill a window of {}",
                self.navg2
            )));
        }
        if products < N_AUTO_PRODUCTS {
            return Err(Error::InvalidConfig(format!(
                "need at least {N_AUTO_PRODUCTS} products, got {products}"
            )));
        }
        let (stride, _) = combine::bins(self.navgf);
        if channels == 0 || channels % stride != 0 {
            return Err(Error::InvalidConfig(format!(
                "{channels} channels cannot be averaged in groups of {stride}"
            )));
        }
        Ok(())
    }
}

/// The outcome of one averaging window.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub index: usize,
    /// Averaged spectrum shaped `[product, channel / stride]`.
    pub spectrum: Array2<f64>,
    /// Indices within the window of the accepted samples.
    pub accepted: Vec<usize>,
    /// Accepted sample count, as reported in telemetry.
    pub weight: usize,
}

/// Run the averaging and rejection over `spectra` for [SimulationConfig::windows]
/// windows.
///
/// Window `k` reads input window `k mod n`, where `n` is the number of complete
/// windows in `spectra`, and is judged against the samples window `k - 1` accepted.
///
/// # Errors
/// [Error::InvalidConfig] if `cfg` does not fit the input.
pub fn simulate(spectra: &ArrayView3<i32>, cfg: &SimulationConfig) -> Result<Vec<WindowResult>> {
    cfg.validate(spectra.dim())?;
    let available = spectra.len_of(Axis(0)) / cfg.navg2;
    let window = |k: usize| {
        let start = (k % available) * cfg.navg2;
        spectra.slice(s![start..start + cfg.navg2, .., ..])
    };

    let mut results: Vec<WindowResult> = Vec::with_capacity(cfg.windows);
    for k in 0..cfg.windows {
        let current = window(k);
        let accepted = match results.last() {
            None => reject::select(&current, None, cfg.reject_ratio, cfg.max_bad, cfg.mode),
            Some(prev) => {
                let previous = window(k - 1);
                reject::select(
                    &current,
                    Some((&previous, prev.accepted.as_slice())),
                    cfg.reject_ratio,
                    cfg.max_bad,
                    cfg.mode,
                )
            }
        };

        if accepted.is_empty() {
            warn!(window = k, "every sample rejected; averaging all of them with zero weight");
        }
        let spectrum = average_window(&current, &accepted, cfg.navg2, cfg.navgf, cfg.mode);
        debug!(window = k, accepted = accepted.len(), "window averaged");

        results.push(WindowResult {
            index: k,
            spectrum,
            weight: accepted.len(),
            accepted,
        });
    }
    Ok(results)
}

/// Run independent simulations, one per input, in parallel.
///
/// Each run is sequential internally; runs share nothing. Results are in input order.
///
/// # Errors
/// [Error::InvalidConfig] if the thread pool cannot be built or `cfg` does not fit
/// an input.
pub fn simulate_runs(
    inputs: &[Array3<i32>],
    cfg: &SimulationConfig,
) -> Result<Vec<Vec<WindowResult>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("averaging::run{i}"))
        .num_threads(cfg.num_threads)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build thread pool: {e}")))?;

    pool.install(|| {
        inputs
            .par_iter()
            .map(|spectra| simulate(&spectra.view(), cfg))
            .collect()
    })
}

/// Sum of absolute differences relative to the sum of absolute truth values.
///
/// Returns 0 when both are all zero and infinity when only `truth` is.
#[must_use]
pub fn relative_l1_error(result: &ArrayView2<f64>, truth: &ArrayView2<f64>) -> f64 {
    let diff: f64 = result
        .iter()
        .zip(truth.iter())
        .map(|(r, t)| (r - t).abs())
        .sum();
    let norm: f64 = truth.iter().map(|t| t.abs()).sum();
    if norm == 0.0 {
        if diff == 0.0 {
            return 0.0;
        }
        return f64::INFINITY;
    }
    diff / norm
}
