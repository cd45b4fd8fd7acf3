//! Terrain generation orchestrator.
//!
//! A [`Terrain`] owns at most one [`Generation`] at a time. Generating
//! always starts from a clean slate: the previous grid, cache, mesh and
//! vegetation are dropped before any new sampling happens, and nothing is
//! stored until every stage has finished.

use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::cache::SampleCache;
use crate::cancel::CancelToken;
use crate::config::TerrainConfig;
use crate::correction::{correct_invalid, report_elevation_outliers, CorrectionReport};
use crate::error::{Result, TerrainError};
use crate::geo::{EnrichedPoint, GeoBounds};
use crate::grid::PointGrid;
use crate::interpolate::{interpolate_grid, InterpolationReport};
use crate::mesh::{build_mesh, Material, MeshParams, TerrainMesh};
use crate::providers::{ElevationProvider, FeatureClassifier, NoiseElevation, VegetationProvider};
use crate::sampler::{Sampler, SamplingReport};
use crate::stats::{DiagnosticExport, TerrainStats};
use crate::vegetation::{
    deliver_in_batches, place_vegetation, resolve_height, HeightSource, InstanceSink,
    NearestGridPoint, PlacementReport, VegetationInstance,
};

/// Everything produced by one generation
pub struct Generation {
    pub grid: PointGrid,
    pub cache: SampleCache,
    pub points: Vec<EnrichedPoint>,
    pub mesh: TerrainMesh,
    pub sampling: SamplingReport,
    pub interpolation: InterpolationReport,
    pub correction: CorrectionReport,
    pub stats: TerrainStats,
    pub vegetation: Vec<VegetationInstance>,
}

impl Generation {
    fn nearest_point(&self) -> NearestGridPoint<'_> {
        NearestGridPoint {
            points: &self.points,
            resolution: self.grid.resolution,
            width: self.mesh.width,
            height: self.mesh.height,
        }
    }

    /// Mesh surface first, then the nearest enriched lattice point, then 0
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nearest = self.nearest_point();
        let chain: [&dyn HeightSource; 2] = [&self.mesh, &nearest];
        resolve_height(&chain, x, z)
    }
}

/// Terrain synthesis pipeline with its injected collaborators
pub struct Terrain {
    config: TerrainConfig,
    elevation: Option<Arc<dyn ElevationProvider>>,
    vegetation: Option<Arc<dyn VegetationProvider>>,
    classifier: Option<Arc<dyn FeatureClassifier>>,
    current: Option<Generation>,
}

impl Terrain {
    pub fn new(
        config: TerrainConfig,
        elevation: Option<Arc<dyn ElevationProvider>>,
        vegetation: Option<Arc<dyn VegetationProvider>>,
        classifier: Option<Arc<dyn FeatureClassifier>>,
    ) -> Self {
        Self {
            config,
            elevation,
            vegetation,
            classifier,
            current: None,
        }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Configuration changes apply from the next generation on
    pub fn config_mut(&mut self) -> &mut TerrainConfig {
        &mut self.config
    }

    pub fn generation(&self) -> Option<&Generation> {
        self.current.as_ref()
    }

    pub fn mesh(&self) -> Option<&TerrainMesh> {
        self.current.as_ref().map(|g| &g.mesh)
    }

    pub fn stats(&self) -> Option<&TerrainStats> {
        self.current.as_ref().map(|g| &g.stats)
    }

    pub fn diagnostics(&self) -> Option<DiagnosticExport> {
        self.current
            .as_ref()
            .map(|g| DiagnosticExport::new(&g.points, &g.stats))
    }

    /// Surface height at a world XZ position, `None` without a terrain
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        self.current.as_ref().map(|g| g.height_at(x, z))
    }

    /// Generate terrain for a geographic region
    pub async fn generate_terrain(
        &mut self,
        bounds: GeoBounds,
        resolution: i64,
        cancel: &CancelToken,
    ) -> Result<&Generation> {
        let elevation = self.elevation.clone();
        let texture = self.classifier.as_ref().and_then(|c| c.texture());
        let material = match texture {
            Some(texture) => Material::Textured(texture),
            None => Material::Flat {
                color: self.config.procedural_color,
            },
        };
        self.run(bounds, resolution, elevation, material, cancel).await
    }

    /// Generate a square noise terrain of `size_m` meters around a center,
    /// with no external elevation data
    pub async fn generate_virtual_terrain(
        &mut self,
        center_lat: f64,
        center_lon: f64,
        size_m: f64,
        resolution: i64,
        seed: u32,
        cancel: &CancelToken,
    ) -> Result<&Generation> {
        let bounds = GeoBounds::virtual_region(center_lat, center_lon, size_m)?;
        let elevation: Arc<dyn ElevationProvider> = Arc::new(NoiseElevation::new(seed));
        let material = Material::Flat {
            color: self.config.procedural_color,
        };
        self.run(bounds, resolution, Some(elevation), material, cancel)
            .await
    }

    async fn run(
        &mut self,
        bounds: GeoBounds,
        resolution: i64,
        elevation: Option<Arc<dyn ElevationProvider>>,
        material: Material,
        cancel: &CancelToken,
    ) -> Result<&Generation> {
        self.clear_terrain();
        let started = Instant::now();

        self.config.validate()?;
        let resolution = self.config.validate_resolution(resolution)?;
        let sampling_rate = self.config.sampling_rate;

        let grid = PointGrid::generate(bounds, resolution)?;
        cancel.check()?;

        let mut cache = SampleCache::new();
        let sampler = Sampler::new(
            elevation,
            self.vegetation.clone(),
            self.config.sample_timeout(),
        );
        let (samples, sampling) = sampler.sample(&grid, sampling_rate, &mut cache).await;
        cancel.check()?;

        let (mut values, interpolation) =
            interpolate_grid(&grid, &samples, self.config.interpolation);
        let correction = correct_invalid(&grid, &samples, &mut values);
        let outliers = report_elevation_outliers(&samples);
        debug!(
            interpolated = interpolation.interpolated,
            repaired = correction.total_repaired(),
            "reconstructed full grid"
        );

        let mut points: Vec<EnrichedPoint> = grid
            .points()
            .iter()
            .zip(&values)
            .map(|(p, s)| EnrichedPoint::new(*p, s.elevation, s.ndvi))
            .collect();
        cancel.check()?;

        let params = MeshParams {
            vertical_scale: self.config.vertical_scale,
            zoom_scale: self.config.zoom_scale,
        };
        let mesh = build_mesh(&mut points, resolution, &bounds, &params, material)?;
        cancel.check()?;

        let mut stats = TerrainStats::from_points(&points, bounds, resolution);
        stats.sampled_points = interpolation.sampled;
        stats.interpolated_points = interpolation.interpolated;
        stats.corrected_points = correction.total_repaired();
        stats.outliers = outliers;
        stats.generation_time = started.elapsed();

        info!(
            resolution,
            points = points.len(),
            sampled = stats.sampled_points,
            fallback = sampling.fallback_samples,
            elapsed_ms = stats.generation_time.as_millis() as u64,
            "terrain generated"
        );

        Ok(&*self.current.insert(Generation {
            grid,
            cache,
            points,
            mesh,
            sampling,
            interpolation,
            correction,
            stats,
            vegetation: Vec::new(),
        }))
    }

    /// Place vegetation from the classifier's features on the current
    /// terrain and hand the instances to `sink`
    pub async fn place_vegetation(
        &mut self,
        sink: &mut dyn InstanceSink,
        cancel: &CancelToken,
    ) -> Result<PlacementReport> {
        self.clear_vegetation();

        let generation = self.current.as_mut().ok_or_else(|| {
            TerrainError::EmptyInput("no terrain to place vegetation on".to_string())
        })?;
        let Some(classifier) = self.classifier.as_ref() else {
            debug!("no feature classifier, skipping vegetation");
            return Ok(PlacementReport::default());
        };

        let features = classifier.features();
        let raster_size = classifier.raster_size();
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let (instances, mut report) = {
            let nearest = generation.nearest_point();
            let chain: [&dyn HeightSource; 2] = [&generation.mesh, &nearest];
            place_vegetation(
                &features,
                raster_size,
                (generation.mesh.width, generation.mesh.height),
                &self.config.vegetation,
                &chain,
                &mut rng,
            )
        };
        cancel.check()?;

        let delivery =
            deliver_in_batches(&instances, sink, self.config.vegetation.batch_size, cancel).await?;
        report.errors += delivery.failed;

        generation.stats.count_vegetation(&instances);
        generation.vegetation = instances;
        info!(
            placed = report.placed,
            delivered = delivery.delivered,
            errors = report.errors,
            "vegetation placed"
        );
        Ok(report)
    }

    /// Drop the current generation, its cache included
    pub fn clear_terrain(&mut self) {
        if self.current.take().is_some() {
            debug!("cleared terrain");
        }
    }

    pub fn clear_vegetation(&mut self) {
        if let Some(generation) = self.current.as_mut() {
            generation.vegetation.clear();
            generation.stats.vegetation_by_type.clear();
        }
    }
}
