//! Vegetation placement engine.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::geo::EnrichedPoint;
use crate::mesh::TerrainMesh;
use crate::providers::Feature;

use super::config::VegetationConfig;
use super::{Vec3, VegetationInstance};

/// A way of finding the terrain surface height at a world XZ position
pub trait HeightSource {
    fn surface_height(&self, x: f32, z: f32) -> Option<f32>;
}

impl HeightSource for TerrainMesh {
    fn surface_height(&self, x: f32, z: f32) -> Option<f32> {
        self.height_at(x, z)
    }
}

/// Height of the nearest enriched lattice point
pub struct NearestGridPoint<'a> {
    pub points: &'a [EnrichedPoint],
    pub resolution: usize,
    pub width: f32,
    pub height: f32,
}

impl HeightSource for NearestGridPoint<'_> {
    fn surface_height(&self, x: f32, z: f32) -> Option<f32> {
        let r = self.resolution as f32;
        let gx = ((x / self.width + 0.5) * r).round();
        let gy = ((0.5 - z / self.height) * r).round();
        if !(gx >= 0.0 && gx <= r && gy >= 0.0 && gy <= r) {
            return None;
        }
        let index = gy as usize * (self.resolution + 1) + gx as usize;
        self.points.get(index).map(|p| p.y)
    }
}

/// First height any source in `chain` can answer, else ground level
pub fn resolve_height(chain: &[&dyn HeightSource], x: f32, z: f32) -> f32 {
    chain
        .iter()
        .find_map(|source| source.surface_height(x, z))
        .unwrap_or(0.0)
}

/// Outcome of one placement pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlacementReport {
    /// Feature points examined
    pub considered: usize,
    pub placed: usize,
    /// Features outside the analyzed raster
    pub errors: usize,
    /// Features whose class has no vegetation configuration
    pub unconfigured: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Place vegetation instances for `features` on a terrain of the given
/// footprint. Raster coordinates map linearly onto the footprint with no
/// jitter, so instances line up with the source classification.
pub fn place_vegetation<R: Rng>(
    features: &[Feature],
    raster_size: (u32, u32),
    footprint: (f32, f32),
    config: &VegetationConfig,
    heights: &[&dyn HeightSource],
    rng: &mut R,
) -> (Vec<VegetationInstance>, PlacementReport) {
    let mut report = PlacementReport::default();
    let mut instances = Vec::new();
    let (raster_w, raster_h) = (raster_size.0 as f32, raster_size.1 as f32);
    let (width, height) = footprint;

    // Ordered grouping keeps seeded runs reproducible
    let mut groups: BTreeMap<&str, Vec<&Feature>> = BTreeMap::new();
    for feature in features {
        groups.entry(feature.kind.as_str()).or_default().push(feature);
    }

    for (kind, group) in groups {
        report.considered += group.len();

        let Some(type_config) = config.type_config(kind) else {
            debug!("no vegetation configured for '{}', skipping {} features", kind, group.len());
            report.unconfigured += group.len();
            continue;
        };
        let density = config.density_for(kind);

        for feature in group {
            let inside = feature.x.is_finite()
                && feature.y.is_finite()
                && feature.x >= 0.0
                && feature.y >= 0.0
                && feature.x < raster_w
                && feature.y < raster_h;
            if !inside {
                report.errors += 1;
                continue;
            }

            if rng.gen::<f32>() >= density {
                continue;
            }
            let Some(model) = type_config.choose_model(rng) else {
                continue;
            };

            let [min_scale, max_scale] = model.scale_range;
            let scale = if max_scale > min_scale {
                rng.gen_range(min_scale..max_scale)
            } else {
                min_scale
            };
            let rotation = rng.gen_range(0.0..TAU);

            // Pixel centers, so the first and last pixels sit symmetrically
            let x = ((feature.x + 0.5) / raster_w - 0.5) * width;
            let z = ((feature.y + 0.5) / raster_h - 0.5) * height;
            let y = resolve_height(heights, x, z) + config.ground_offset;

            instances.push(VegetationInstance {
                kind: kind.to_string(),
                model: model.model.clone(),
                position: Vec3::new(x, y, z),
                scale,
                rotation,
            });
            report.placed += 1;
            *report.by_type.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    if report.errors > 0 {
        warn!("{} features fell outside the {}x{} raster", report.errors, raster_size.0, raster_size.1);
    }
    info!(
        considered = report.considered,
        placed = report.placed,
        errors = report.errors,
        "placed vegetation"
    );

    (instances, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vegetation::config::VegetationTypeConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Flat(f32);

    impl HeightSource for Flat {
        fn surface_height(&self, _x: f32, _z: f32) -> Option<f32> {
            Some(self.0)
        }
    }

    struct Nowhere;

    impl HeightSource for Nowhere {
        fn surface_height(&self, _x: f32, _z: f32) -> Option<f32> {
            None
        }
    }

    fn forest_features(count: usize) -> Vec<Feature> {
        (0..count)
            .map(|i| Feature::new((i % 100) as f32, (i / 100) as f32, "forest"))
            .collect()
    }

    #[test]
    fn test_density_yields_expected_count() {
        let config = VegetationConfig::default();
        let features = forest_features(1000);
        let mut total = 0;
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (instances, report) =
                place_vegetation(&features, (100, 100), (1000.0, 1000.0), &config, &[], &mut rng);
            assert_eq!(instances.len(), report.placed);
            // Binomial(1000, 0.03): sd ≈ 5.4, allow about 4 sd
            assert!(instances.len() >= 9 && instances.len() <= 52, "got {}", instances.len());
            total += instances.len();
        }
        let mean = total as f64 / 20.0;
        assert!((mean - 30.0).abs() < 5.0, "mean {}", mean);
    }

    #[test]
    fn test_positions_map_raster_to_footprint() {
        let mut config = VegetationConfig::default();
        config.density_overrides.insert("forest".to_string(), 1.0);
        config.ground_offset = 0.5;
        let features = vec![
            Feature::new(0.0, 0.0, "forest"),
            Feature::new(50.0, 25.0, "forest"),
            Feature::new(99.0, 49.0, "forest"),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let flat = Flat(12.0);

        let (instances, _) =
            place_vegetation(&features, (100, 50), (2000.0, 1000.0), &config, &[&flat], &mut rng);

        assert_eq!(instances.len(), 3);
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        // A 20m x 20m pixel is placed at its center
        let nw = instances[0].position;
        assert!(close(nw.x, -990.0) && close(nw.z, -490.0));
        let center = instances[1].position;
        assert!(close(center.x, 10.0) && close(center.z, 10.0));
        assert_eq!(center.y, 12.5);
        let se = instances[2].position;
        assert!(close(se.x, -nw.x) && close(se.z, -nw.z));
        for inst in &instances {
            assert!((0.0..TAU).contains(&inst.rotation));
            assert!(inst.scale >= 0.8 && inst.scale <= 1.5);
        }
    }

    #[test]
    fn test_out_of_raster_features_are_errors() {
        let mut config = VegetationConfig::default();
        config.density_overrides.insert("forest".to_string(), 1.0);
        let features = vec![
            Feature::new(-1.0, 5.0, "forest"),
            Feature::new(10.0, 5.0, "forest"),
            Feature::new(5.0, f32::NAN, "forest"),
            Feature::new(5.0, 5.0, "forest"),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (instances, report) =
            place_vegetation(&features, (10, 10), (100.0, 100.0), &config, &[], &mut rng);
        assert_eq!(report.errors, 3);
        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn test_unconfigured_types_are_skipped() {
        let config = VegetationConfig {
            types: vec![VegetationTypeConfig::new("forest", 1.0).with_model("pine", 1.0, 1.0, 1.0)],
            ..Default::default()
        };
        let features = vec![Feature::new(1.0, 1.0, "water"), Feature::new(1.0, 1.0, "forest")];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (instances, report) =
            place_vegetation(&features, (10, 10), (100.0, 100.0), &config, &[], &mut rng);
        assert_eq!(report.unconfigured, 1);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].model, "pine");
        assert_eq!(report.by_type.get("forest"), Some(&1));
    }

    #[test]
    fn test_height_chain_order() {
        let first = Flat(3.0);
        let second = Flat(9.0);
        assert_eq!(resolve_height(&[&Nowhere, &first, &second], 0.0, 0.0), 3.0);
        assert_eq!(resolve_height(&[&Nowhere], 0.0, 0.0), 0.0);
        assert_eq!(resolve_height(&[], 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_seeded_placement_is_reproducible() {
        let config = VegetationConfig::default();
        let features = forest_features(500);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            place_vegetation(&features, (100, 100), (500.0, 500.0), &config, &[], &mut rng).0
        };
        assert_eq!(run(11), run(11));
    }
}
