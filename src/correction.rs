//! Repair of invalid samples and statistical outlier reporting.
//!
//! Non-finite values are rebuilt from the nearest valid samples found along
//! the 8 compass directions, up to four strides out, weighted by inverse
//! distance. Outliers beyond three standard deviations are only counted:
//! steep real terrain produces them naturally and they are kept as-is.

use tracing::{info, warn};

use crate::cache::Sample;
use crate::grid::{PointGrid, COMPASS_OFFSETS};
use crate::interpolate::{DEFAULT_ELEVATION, DEFAULT_NDVI};
use crate::sampler::SampleSet;

/// How many stride multiples to search along each direction
pub const SEARCH_RINGS: usize = 4;

/// Standard deviations beyond which a value counts as an outlier
pub const OUTLIER_SIGMA: f64 = 3.0;

/// Counters from one correction pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrectionReport {
    pub elevation_repaired: usize,
    pub ndvi_repaired: usize,
    /// Repairs that found no valid neighbor and used the safe default
    pub elevation_defaulted: usize,
    pub ndvi_defaulted: usize,
}

impl CorrectionReport {
    pub fn total_repaired(&self) -> usize {
        self.elevation_repaired + self.ndvi_repaired
    }
}

/// Inverse-distance-weighted value from the nearest valid sample in each
/// of the 8 directions, or `None` if the search finds nothing.
pub fn neighbor_estimate(
    grid: &PointGrid,
    set: &SampleSet,
    index: usize,
    read: impl Fn(&Sample) -> f64,
) -> Option<f64> {
    let stride = set.sampling_rate.max(1) as i64;
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for &(dx, dy) in COMPASS_OFFSETS.iter() {
        for ring in 1..=SEARCH_RINGS as i64 {
            let step_x = dx * ring * stride;
            let step_y = dy * ring * stride;
            let Some(neighbor) = grid.offset(index, step_x, step_y) else {
                break;
            };
            let value = set.get(neighbor).map(&read).filter(|v| v.is_finite());
            if let Some(v) = value {
                let distance = ((step_x * step_x + step_y * step_y) as f64).sqrt();
                let w = 1.0 / distance;
                weighted += v * w;
                weight_sum += w;
                break;
            }
        }
    }

    if weight_sum > 0.0 {
        Some(weighted / weight_sum)
    } else {
        None
    }
}

/// Replace every non-finite elevation or NDVI in `values` in place
pub fn correct_invalid(grid: &PointGrid, set: &SampleSet, values: &mut [Sample]) -> CorrectionReport {
    let mut report = CorrectionReport::default();

    for (index, sample) in values.iter_mut().enumerate() {
        if !sample.elevation.is_finite() {
            report.elevation_repaired += 1;
            sample.elevation = match neighbor_estimate(grid, set, index, |s| s.elevation) {
                Some(v) => v,
                None => {
                    report.elevation_defaulted += 1;
                    DEFAULT_ELEVATION
                }
            };
        }
        if !sample.ndvi.is_finite() {
            report.ndvi_repaired += 1;
            sample.ndvi = match neighbor_estimate(grid, set, index, |s| s.ndvi) {
                Some(v) => v,
                None => {
                    report.ndvi_defaulted += 1;
                    DEFAULT_NDVI
                }
            };
        }
    }

    if report.total_repaired() > 0 {
        info!(
            elevation = report.elevation_repaired,
            ndvi = report.ndvi_repaired,
            defaulted = report.elevation_defaulted + report.ndvi_defaulted,
            "repaired invalid samples"
        );
    }

    report
}

/// Distribution summary with a count of values beyond `mean ± 3σ`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutlierReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub below: usize,
    pub above: usize,
}

impl OutlierReport {
    pub fn outliers(&self) -> usize {
        self.below + self.above
    }
}

/// Count values outside `mean ± 3σ`. Non-finite values are ignored and
/// nothing is modified.
pub fn detect_outliers(values: impl Iterator<Item = f64> + Clone) -> OutlierReport {
    let finite = values.filter(|v| v.is_finite());
    let (count, sum) = finite.clone().fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return OutlierReport::default();
    }

    let mean = sum / count as f64;
    let variance = finite.clone().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std_dev = variance.sqrt();

    let low = mean - OUTLIER_SIGMA * std_dev;
    let high = mean + OUTLIER_SIGMA * std_dev;
    let below = finite.clone().filter(|&v| v < low).count();
    let above = finite.filter(|&v| v > high).count();

    OutlierReport {
        count,
        mean,
        std_dev,
        below,
        above,
    }
}

/// Outlier summary of the sampled elevations, logged when any exist
pub fn report_elevation_outliers(set: &SampleSet) -> OutlierReport {
    let report = detect_outliers(set.samples.values().map(|s| s.elevation));
    if report.outliers() > 0 {
        warn!(
            outliers = report.outliers(),
            mean = report.mean,
            std_dev = report.std_dev,
            "elevation samples beyond {} sigma kept as-is",
            OUTLIER_SIGMA
        );
    }
    report
}
