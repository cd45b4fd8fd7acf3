//! Reconstruction of the dense lattice from the sparse sample set.
//!
//! Sampled points are copied through verbatim. Every other point is rebuilt
//! from the stride-aligned samples around it, either with clamped bilinear
//! weighting or with a Catmull-Rom 4x4 patch.

use tracing::debug;

use crate::cache::Sample;
use crate::config::InterpolationMethod;
use crate::grid::PointGrid;
use crate::sampler::SampleSet;

/// Elevation used when no reference sample exists at all
pub const DEFAULT_ELEVATION: f64 = 0.0;
/// NDVI used when no reference sample exists at all
pub const DEFAULT_NDVI: f64 = 0.3;

/// Counters from one interpolation pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterpolationReport {
    /// Points copied from the sample set
    pub sampled: usize,
    /// Points reconstructed from neighbors
    pub interpolated: usize,
    /// Reconstructions that had to use a partial neighbor set
    pub partial: usize,
    /// Reconstructions with no reference at all (neutral default)
    pub defaulted: usize,
}

/// Which channel of a sample to reconstruct
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Elevation,
    Ndvi,
}

impl Channel {
    fn read(self, sample: &Sample) -> f64 {
        match self {
            Channel::Elevation => sample.elevation,
            Channel::Ndvi => sample.ndvi,
        }
    }

    fn default_value(self) -> f64 {
        match self {
            Channel::Elevation => DEFAULT_ELEVATION,
            Channel::Ndvi => DEFAULT_NDVI,
        }
    }
}

/// Outcome of reconstructing one channel at one point
#[derive(Clone, Copy, Debug, PartialEq)]
enum Reconstructed {
    Full(f64),
    Partial(f64),
    Default(f64),
}

impl Reconstructed {
    fn value(self) -> f64 {
        match self {
            Reconstructed::Full(v) | Reconstructed::Partial(v) | Reconstructed::Default(v) => v,
        }
    }
}

/// Stride-aligned bracket around one lattice coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bracket {
    lo: usize,
    hi: usize,
    t: f64,
}

fn bracket(coord: usize, stride: usize, resolution: usize) -> Bracket {
    let lo = (coord / stride) * stride;
    let hi = (lo + stride).min(resolution);
    let t = if hi > lo {
        (coord - lo) as f64 / (hi - lo) as f64
    } else {
        0.0
    };
    Bracket { lo, hi, t }
}

/// Rebuild all `(R+1)²` samples of `grid` from `set`
pub fn interpolate_grid(
    grid: &PointGrid,
    set: &SampleSet,
    method: InterpolationMethod,
) -> (Vec<Sample>, InterpolationReport) {
    let mut report = InterpolationReport::default();
    let mut out = Vec::with_capacity(grid.len());

    for (index, p) in grid.points().iter().enumerate() {
        if let Some(sample) = set.get(index) {
            report.sampled += 1;
            out.push(*sample);
            continue;
        }

        report.interpolated += 1;
        let (elevation, ndvi) = match method {
            InterpolationMethod::Bilinear => (
                bilinear_at(grid, set, p.grid_x, p.grid_y, Channel::Elevation),
                bilinear_at(grid, set, p.grid_x, p.grid_y, Channel::Ndvi),
            ),
            InterpolationMethod::Bicubic => (
                bicubic_at(grid, set, p.grid_x, p.grid_y, Channel::Elevation),
                bicubic_at(grid, set, p.grid_x, p.grid_y, Channel::Ndvi),
            ),
        };

        match (elevation, ndvi) {
            (Reconstructed::Default(_), _) | (_, Reconstructed::Default(_)) => report.defaulted += 1,
            (Reconstructed::Partial(_), _) | (_, Reconstructed::Partial(_)) => report.partial += 1,
            _ => {}
        }

        out.push(Sample::new(elevation.value(), ndvi.value()));
    }

    debug!(
        sampled = report.sampled,
        interpolated = report.interpolated,
        partial = report.partial,
        defaulted = report.defaulted,
        method = %method,
        "interpolated lattice"
    );

    (out, report)
}

/// Finite value of a channel at a lattice coordinate, if sampled
fn sampled_value(grid: &PointGrid, set: &SampleSet, x: usize, y: usize, channel: Channel) -> Option<f64> {
    set.get(grid.index(x, y))
        .map(|s| channel.read(s))
        .filter(|v| v.is_finite())
}

/// Clamped bilinear reconstruction from the four bracketing samples.
///
/// Missing corners are dropped and the remaining weights renormalized. The
/// result always lies within `[min, max]` of the corners that were used.
fn bilinear_at(grid: &PointGrid, set: &SampleSet, x: usize, y: usize, channel: Channel) -> Reconstructed {
    let stride = set.sampling_rate.max(1);
    let bx = bracket(x, stride, grid.resolution);
    let by = bracket(y, stride, grid.resolution);

    let corners = [
        (bx.lo, by.lo, (1.0 - bx.t) * (1.0 - by.t)),
        (bx.hi, by.lo, bx.t * (1.0 - by.t)),
        (bx.lo, by.hi, (1.0 - bx.t) * by.t),
        (bx.hi, by.hi, bx.t * by.t),
    ];

    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut found = 0;

    for &(cx, cy, w) in &corners {
        if let Some(v) = sampled_value(grid, set, cx, cy, channel) {
            weighted += v * w;
            weight_sum += w;
            min = min.min(v);
            max = max.max(v);
            found += 1;
        }
    }

    if found == 0 {
        return Reconstructed::Default(channel.default_value());
    }

    let value = if weight_sum > 1e-12 {
        weighted / weight_sum
    } else {
        // Only zero-weight corners survived; their midpoint is the best guess
        (min + max) / 2.0
    };
    let value = value.clamp(min, max);

    if found == corners.len() {
        Reconstructed::Full(value)
    } else {
        Reconstructed::Partial(value)
    }
}

/// Catmull-Rom reconstruction over the 4x4 stride-aligned neighborhood.
/// Falls back to bilinear when any of the 16 references is missing, and to
/// the rest of the patch when the bilinear corners are missing too.
fn bicubic_at(grid: &PointGrid, set: &SampleSet, x: usize, y: usize, channel: Channel) -> Reconstructed {
    let stride = set.sampling_rate.max(1);
    let resolution = grid.resolution;
    let bx = bracket(x, stride, resolution);
    let by = bracket(y, stride, resolution);

    let xs = [
        bx.lo.saturating_sub(stride),
        bx.lo,
        bx.hi,
        (bx.hi + stride).min(resolution),
    ];
    let ys = [
        by.lo.saturating_sub(stride),
        by.lo,
        by.hi,
        (by.hi + stride).min(resolution),
    ];

    let mut values = [[0.0f64; 4]; 4];
    for (j, &sy) in ys.iter().enumerate() {
        for (i, &sx) in xs.iter().enumerate() {
            match sampled_value(grid, set, sx, sy, channel) {
                Some(v) => values[j][i] = v,
                None => {
                    return match bilinear_at(grid, set, x, y, channel) {
                        Reconstructed::Default(_) => patch_average(grid, set, x, y, &xs, &ys, channel),
                        other => other,
                    }
                }
            }
        }
    }

    Reconstructed::Full(bicubic_interpolate(&values, bx.t, by.t))
}

/// Inverse-distance average of whichever patch references are finite
fn patch_average(
    grid: &PointGrid,
    set: &SampleSet,
    x: usize,
    y: usize,
    xs: &[usize; 4],
    ys: &[usize; 4],
    channel: Channel,
) -> Reconstructed {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for &sy in ys {
        for &sx in xs {
            if let Some(v) = sampled_value(grid, set, sx, sy, channel) {
                let dx = sx as f64 - x as f64;
                let dy = sy as f64 - y as f64;
                let w = 1.0 / (dx * dx + dy * dy).sqrt().max(1e-9);
                weighted += v * w;
                weight_sum += w;
            }
        }
    }

    if weight_sum > 0.0 {
        Reconstructed::Partial(weighted / weight_sum)
    } else {
        Reconstructed::Default(channel.default_value())
    }
}

/// Bicubic interpolation using Catmull-Rom spline
pub fn bicubic_interpolate(values: &[[f64; 4]; 4], fx: f64, fy: f64) -> f64 {
    // Interpolate 4 rows
    let mut row_values = [0.0f64; 4];
    for j in 0..4 {
        row_values[j] = catmull_rom(values[j][0], values[j][1], values[j][2], values[j][3], fx);
    }

    // Interpolate the column
    catmull_rom(row_values[0], row_values[1], row_values[2], row_values[3], fy)
}

/// Catmull-Rom spline interpolation
pub fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoBounds;
    use crate::sampler::is_sampled;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn grid(resolution: usize) -> PointGrid {
        let bounds = GeoBounds::new(0.0, 0.0, 0.01, 0.01).unwrap();
        PointGrid::generate(bounds, resolution).unwrap()
    }

    /// Sample set following the stride rule, with values from `f`
    fn sample_set(grid: &PointGrid, stride: usize, f: impl Fn(usize, usize) -> Sample) -> SampleSet {
        let mut set = SampleSet::new(stride);
        for p in grid.points() {
            if is_sampled(p.grid_x, p.grid_y, grid.resolution, stride) {
                set.insert(grid.index(p.grid_x, p.grid_y), f(p.grid_x, p.grid_y));
            }
        }
        set
    }

    #[test]
    fn test_bilinear_stays_within_corners() {
        let grid = grid(17);
        let stride = 4;
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut values = vec![Sample::new(0.0, 0.0); grid.len()];
        for v in values.iter_mut() {
            *v = Sample::new(rng.gen_range(-50.0..3000.0), rng.gen_range(-0.2..0.9));
        }
        let set = sample_set(&grid, stride, |x, y| values[grid.index(x, y)]);

        let (dense, report) = interpolate_grid(&grid, &set, InterpolationMethod::Bilinear);
        assert!(report.interpolated > 0);

        for p in grid.points() {
            if set.contains(grid.index(p.grid_x, p.grid_y)) {
                continue;
            }
            let bx = bracket(p.grid_x, stride, grid.resolution);
            let by = bracket(p.grid_y, stride, grid.resolution);
            let corners: Vec<Sample> = [(bx.lo, by.lo), (bx.hi, by.lo), (bx.lo, by.hi), (bx.hi, by.hi)]
                .iter()
                .map(|&(x, y)| *set.get(grid.index(x, y)).unwrap())
                .collect();
            let v = dense[grid.index(p.grid_x, p.grid_y)];

            let e_min = corners.iter().map(|c| c.elevation).fold(f64::INFINITY, f64::min);
            let e_max = corners.iter().map(|c| c.elevation).fold(f64::NEG_INFINITY, f64::max);
            let n_min = corners.iter().map(|c| c.ndvi).fold(f64::INFINITY, f64::min);
            let n_max = corners.iter().map(|c| c.ndvi).fold(f64::NEG_INFINITY, f64::max);
            assert!(v.elevation >= e_min && v.elevation <= e_max);
            assert!(v.ndvi >= n_min && v.ndvi <= n_max);
        }
    }

    #[test]
    fn test_full_density_is_noop() {
        let grid = grid(6);
        let set = sample_set(&grid, 1, |x, y| Sample::new((x * 7 + y * 3) as f64, 0.1 * x as f64));
        for method in [InterpolationMethod::Bilinear, InterpolationMethod::Bicubic] {
            let (dense, report) = interpolate_grid(&grid, &set, method);
            assert_eq!(report.interpolated, 0);
            for (i, s) in dense.iter().enumerate() {
                assert_eq!(s, set.get(i).unwrap());
            }
        }
    }

    #[test]
    fn test_bilinear_linear_field_is_exact() {
        let grid = grid(8);
        let set = sample_set(&grid, 4, |x, y| Sample::new(2.0 * x as f64 + y as f64, 0.5));
        let (dense, _) = interpolate_grid(&grid, &set, InterpolationMethod::Bilinear);
        let v = dense[grid.index(1, 3)];
        assert!((v.elevation - 5.0).abs() < 1e-9);
        assert!((v.ndvi - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bicubic_reproduces_linear_field() {
        let grid = grid(8);
        let set = sample_set(&grid, 2, |x, y| Sample::new(3.0 * x as f64 + 2.0 * y as f64, 0.4));
        let (dense, _) = interpolate_grid(&grid, &set, InterpolationMethod::Bicubic);
        let v = dense[grid.index(3, 3)];
        assert!((v.elevation - 15.0).abs() < 1e-9, "got {}", v.elevation);
    }

    #[test]
    fn test_missing_corner_uses_remaining() {
        let grid = grid(4);
        let mut set = sample_set(&grid, 2, |_, _| Sample::new(10.0, 0.5));
        // Point (1,1) is bracketed by (0,0), (2,0), (0,2), (2,2)
        set.samples.remove(&grid.index(2, 2));
        set.insert(grid.index(0, 0), Sample::new(20.0, 0.5));

        let (dense, report) = interpolate_grid(&grid, &set, InterpolationMethod::Bilinear);
        let v = dense[grid.index(1, 1)];
        assert!(v.elevation > 10.0 && v.elevation < 20.0);
        assert!(report.partial >= 1);
    }

    #[test]
    fn test_bicubic_uses_outer_patch_when_corners_missing() {
        let grid = grid(8);
        let mut set = sample_set(&grid, 4, |_, _| Sample::new(40.0, 0.6));
        // Point (2,2) is bracketed by (0,0), (4,0), (0,4), (4,4)
        for (x, y) in [(0, 0), (4, 0), (0, 4), (4, 4)] {
            set.samples.remove(&grid.index(x, y));
        }
        set.insert(grid.index(8, 8), Sample::new(f64::NAN, 0.6));

        let (dense, report) = interpolate_grid(&grid, &set, InterpolationMethod::Bicubic);
        let v = dense[grid.index(2, 2)];
        assert!((v.elevation - 40.0).abs() < 1e-9);
        assert!((v.ndvi - 0.6).abs() < 1e-9);
        assert_eq!(report.defaulted, 0);
    }

    #[test]
    fn test_no_references_gives_neutral_default() {
        let grid = grid(4);
        let set = SampleSet::new(2);
        let (dense, report) = interpolate_grid(&grid, &set, InterpolationMethod::Bicubic);
        assert_eq!(report.defaulted, grid.len());
        for s in dense {
            assert_eq!(s.elevation, DEFAULT_ELEVATION);
            assert_eq!(s.ndvi, DEFAULT_NDVI);
        }
    }

    #[test]
    fn test_catmull_rom_hits_control_points() {
        assert_eq!(catmull_rom(1.0, 2.0, 3.0, 4.0, 0.0), 2.0);
        assert_eq!(catmull_rom(1.0, 2.0, 3.0, 4.0, 1.0), 3.0);
    }
}
