//! Elevation/vegetation sampling over a stride-selected subset of the lattice.
//!
//! Only rows and columns that are multiples of the sampling rate (plus the
//! last row and column) are queried. Elevation goes out as one batched call
//! per generation on a blocking worker, bounded by a timeout. Anything the
//! provider cannot answer falls back to the procedural height function, so
//! sampling itself never fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{Sample, SampleCache};
use crate::geo::GeoPoint;
use crate::grid::PointGrid;
use crate::providers::{procedural_elevation, procedural_ndvi, ElevationProvider, VegetationProvider};

/// Sparse samples keyed by lattice index
#[derive(Clone, Debug, Default)]
pub struct SampleSet {
    pub sampling_rate: usize,
    pub samples: HashMap<usize, Sample>,
}

impl SampleSet {
    pub fn new(sampling_rate: usize) -> Self {
        Self {
            sampling_rate,
            samples: HashMap::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(&index)
    }

    pub fn insert(&mut self, index: usize, sample: Sample) {
        self.samples.insert(index, sample);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.samples.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What happened while sampling one generation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplingReport {
    /// Lattice points selected by the stride rule
    pub selected: usize,
    /// Elevations answered by the provider (including nulls)
    pub provider_samples: usize,
    /// Elevations produced by the procedural fallback
    pub fallback_samples: usize,
    pub cache_hits: usize,
    /// Provider answered null or a non-finite value
    pub invalid_samples: usize,
    pub batch_timed_out: bool,
    pub provider_available: bool,
}

/// Outcome of one elevation query
#[derive(Clone, Copy, Debug, PartialEq)]
enum Resolution {
    /// Provider answered; NaN when it had no data for the point
    Value(f64),
    /// Provider absent, failed or too slow
    Fallback,
}

/// Whether a lattice point is part of the sparse sample set
pub fn is_sampled(grid_x: usize, grid_y: usize, resolution: usize, sampling_rate: usize) -> bool {
    let rate = sampling_rate.max(1);
    grid_x % rate == 0 || grid_y % rate == 0 || grid_x == resolution || grid_y == resolution
}

/// Lattice indices selected for sampling, in row-major order
pub fn select_sample_indices(grid: &PointGrid, sampling_rate: usize) -> Vec<usize> {
    grid.points()
        .iter()
        .enumerate()
        .filter(|(_, p)| is_sampled(p.grid_x, p.grid_y, grid.resolution, sampling_rate))
        .map(|(i, _)| i)
        .collect()
}

/// Queries providers for the sparse sample set
#[derive(Clone)]
pub struct Sampler {
    elevation: Option<Arc<dyn ElevationProvider>>,
    vegetation: Option<Arc<dyn VegetationProvider>>,
    timeout: Duration,
}

impl Sampler {
    pub fn new(
        elevation: Option<Arc<dyn ElevationProvider>>,
        vegetation: Option<Arc<dyn VegetationProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            elevation,
            vegetation,
            timeout,
        }
    }

    /// Sample the stride-selected subset of `grid`, reading and filling `cache`
    pub async fn sample(
        &self,
        grid: &PointGrid,
        sampling_rate: usize,
        cache: &mut SampleCache,
    ) -> (SampleSet, SamplingReport) {
        let indices = select_sample_indices(grid, sampling_rate);
        let mut set = SampleSet::new(sampling_rate.max(1));
        let mut report = SamplingReport {
            selected: indices.len(),
            provider_available: self.elevation.is_some(),
            ..Default::default()
        };

        let mut pending: Vec<usize> = Vec::new();
        for &index in &indices {
            let p = &grid.points()[index];
            match cache.get(p.lat, p.lon) {
                Some(sample) => {
                    report.cache_hits += 1;
                    set.insert(index, sample);
                }
                None => pending.push(index),
            }
        }

        let points: Vec<GeoPoint> = pending.iter().map(|&i| grid.points()[i]).collect();
        let resolutions = self.resolve_elevations(points, &mut report).await;

        for (&index, resolution) in pending.iter().zip(resolutions) {
            let p = &grid.points()[index];
            let elevation = match resolution {
                Resolution::Value(v) => {
                    report.provider_samples += 1;
                    if !v.is_finite() {
                        report.invalid_samples += 1;
                    }
                    v
                }
                Resolution::Fallback => {
                    report.fallback_samples += 1;
                    procedural_elevation(p.lat, p.lon)
                }
            };
            let ndvi = self.resolve_ndvi(elevation, p.lat, p.lon);
            let sample = Sample::new(elevation, ndvi);
            cache.insert(p.lat, p.lon, sample);
            set.insert(index, sample);
        }

        info!(
            selected = report.selected,
            provider = report.provider_samples,
            fallback = report.fallback_samples,
            cache_hits = report.cache_hits,
            invalid = report.invalid_samples,
            "sampled terrain lattice"
        );

        (set, report)
    }

    /// One logical elevation call for all pending points
    async fn resolve_elevations(
        &self,
        points: Vec<GeoPoint>,
        report: &mut SamplingReport,
    ) -> Vec<Resolution> {
        let count = points.len();
        if count == 0 {
            return Vec::new();
        }
        let Some(provider) = self.elevation.clone() else {
            debug!("no elevation provider, using procedural heights for {} points", count);
            return vec![Resolution::Fallback; count];
        };

        let task = tokio::task::spawn_blocking(move || query_provider(provider.as_ref(), &points));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(resolutions)) => resolutions,
            Ok(Err(e)) => {
                warn!("elevation query task failed: {}", e);
                vec![Resolution::Fallback; count]
            }
            Err(_) => {
                warn!(
                    "elevation query exceeded {:?}, using procedural heights for {} points",
                    self.timeout, count
                );
                report.batch_timed_out = true;
                vec![Resolution::Fallback; count]
            }
        }
    }

    fn resolve_ndvi(&self, elevation: f64, lat: f64, lon: f64) -> f64 {
        self.vegetation
            .as_ref()
            .and_then(|v| v.ndvi(lat, lon))
            .unwrap_or_else(|| procedural_ndvi(elevation, lat, lon))
    }
}

/// Blocking provider access: batch when supported, otherwise per point
fn query_provider(provider: &dyn ElevationProvider, points: &[GeoPoint]) -> Vec<Resolution> {
    match provider.elevation_batch(points) {
        Some(Ok(values)) if values.len() == points.len() => values
            .into_iter()
            .map(|v| Resolution::Value(v.unwrap_or(f64::NAN)))
            .collect(),
        Some(Ok(values)) => {
            warn!(
                "elevation batch returned {} values for {} points, using procedural heights",
                values.len(),
                points.len()
            );
            vec![Resolution::Fallback; points.len()]
        }
        Some(Err(e)) => {
            warn!("elevation batch failed: {}, using procedural heights", e);
            vec![Resolution::Fallback; points.len()]
        }
        None => points
            .iter()
            .map(|p| match provider.elevation(p.lat, p.lon) {
                Ok(v) => Resolution::Value(v.unwrap_or(f64::NAN)),
                Err(e) => {
                    debug!("elevation query at ({}, {}) failed: {}", p.lat, p.lon, e);
                    Resolution::Fallback
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::geo::GeoBounds;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstantElevation {
        value: f64,
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
        supports_batch: bool,
    }

    impl ConstantElevation {
        fn new(value: f64, supports_batch: bool) -> Self {
            Self {
                value,
                batch_calls: AtomicUsize::new(0),
                single_calls: AtomicUsize::new(0),
                supports_batch,
            }
        }
    }

    impl ElevationProvider for ConstantElevation {
        fn elevation(&self, _lat: f64, _lon: f64) -> Result<Option<f64>, ProviderError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.value))
        }

        fn elevation_batch(
            &self,
            points: &[GeoPoint],
        ) -> Option<Result<Vec<Option<f64>>, ProviderError>> {
            if !self.supports_batch {
                return None;
            }
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Some(Ok(vec![Some(self.value); points.len()]))
        }
    }

    struct SlowElevation;

    impl ElevationProvider for SlowElevation {
        fn elevation(&self, _lat: f64, _lon: f64) -> Result<Option<f64>, ProviderError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Some(1.0))
        }
    }

    struct FailingElevation;

    impl ElevationProvider for FailingElevation {
        fn elevation(&self, _lat: f64, _lon: f64) -> Result<Option<f64>, ProviderError> {
            Err(ProviderError::Network("connection refused".to_string()))
        }
    }

    fn grid(resolution: usize) -> PointGrid {
        let bounds = GeoBounds::new(46.0, 7.0, 46.01, 7.01).unwrap();
        PointGrid::generate(bounds, resolution).unwrap()
    }

    #[test]
    fn test_selection_includes_stride_lines_and_last_edges() {
        let grid = grid(10);
        let indices = select_sample_indices(&grid, 4);
        for &i in &indices {
            let p = grid.points()[i];
            assert!(p.grid_x % 4 == 0 || p.grid_y % 4 == 0 || p.grid_x == 10 || p.grid_y == 10);
        }
        // Every point on the last row and last column is selected
        for k in 0..=10 {
            assert!(indices.contains(&grid.index(10, k)));
            assert!(indices.contains(&grid.index(k, 10)));
        }
        // Interior off-stride point is not
        assert!(!indices.contains(&grid.index(1, 1)));
    }

    #[test]
    fn test_full_density_selects_everything() {
        let grid = grid(6);
        assert_eq!(select_sample_indices(&grid, 1).len(), grid.len());
    }

    #[tokio::test]
    async fn test_single_batched_call_per_generation() {
        let provider = Arc::new(ConstantElevation::new(10.0, true));
        let sampler = Sampler::new(Some(provider.clone()), None, Duration::from_secs(5));
        let grid = grid(8);
        let mut cache = SampleCache::new();

        let (set, report) = sampler.sample(&grid, 2, &mut cache).await;

        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
        assert_eq!(set.len(), report.selected);
        assert_eq!(report.provider_samples, report.selected);
        assert!(set.samples.values().all(|s| s.elevation == 10.0));
        assert_eq!(cache.len(), report.selected);
    }

    #[tokio::test]
    async fn test_per_point_queries_without_batch_support() {
        let provider = Arc::new(ConstantElevation::new(3.0, false));
        let sampler = Sampler::new(Some(provider.clone()), None, Duration::from_secs(5));
        let grid = grid(4);
        let mut cache = SampleCache::new();

        let (_, report) = sampler.sample(&grid, 2, &mut cache).await;
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), report.selected);
    }

    #[tokio::test]
    async fn test_missing_provider_uses_procedural_heights() {
        let sampler = Sampler::new(None, None, Duration::from_secs(5));
        let grid = grid(4);
        let mut cache = SampleCache::new();

        let (set, report) = sampler.sample(&grid, 2, &mut cache).await;
        assert_eq!(report.fallback_samples, report.selected);
        assert!(!report.provider_available);
        for (&index, sample) in &set.samples {
            let p = grid.points()[index];
            assert_eq!(sample.elevation, procedural_elevation(p.lat, p.lon));
            assert!(sample.ndvi.is_finite());
        }
    }

    #[tokio::test]
    async fn test_failing_provider_falls_back() {
        let sampler = Sampler::new(Some(Arc::new(FailingElevation)), None, Duration::from_secs(5));
        let grid = grid(4);
        let mut cache = SampleCache::new();

        let (set, report) = sampler.sample(&grid, 1, &mut cache).await;
        assert_eq!(report.fallback_samples, grid.len());
        assert!(set.samples.values().all(|s| s.is_valid()));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_procedural() {
        let sampler = Sampler::new(Some(Arc::new(SlowElevation)), None, Duration::from_millis(20));
        let grid = grid(2);
        let mut cache = SampleCache::new();

        let (set, report) = sampler.sample(&grid, 1, &mut cache).await;
        assert!(report.batch_timed_out);
        assert_eq!(report.fallback_samples, grid.len());
        assert_eq!(set.len(), grid.len());
    }

    #[tokio::test]
    async fn test_cache_short_circuits_provider() {
        let provider = Arc::new(ConstantElevation::new(10.0, true));
        let sampler = Sampler::new(Some(provider.clone()), None, Duration::from_secs(5));
        let grid = grid(4);
        let mut cache = SampleCache::new();

        let _ = sampler.sample(&grid, 1, &mut cache).await;
        let (_, report) = sampler.sample(&grid, 1, &mut cache).await;

        assert_eq!(report.cache_hits, grid.len());
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    }
}
