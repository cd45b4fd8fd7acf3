//! Deterministic procedural stand-ins for missing providers.

use noise::{NoiseFn, Perlin, Seedable};

use crate::error::ProviderError;
use crate::geo::GeoPoint;

use super::ElevationProvider;

/// Height used when no provider answers, seeded only by the coordinate.
///
/// A small sum of sine terms: broad hills, a ridge pattern and fine detail.
/// Stays within roughly [25, 175] meters.
pub fn procedural_elevation(lat: f64, lon: f64) -> f64 {
    let hills = 50.0 * (lat * 100.0).sin() * (lon * 100.0).cos();
    let ridges = 20.0 * (lat * 500.0 + lon * 300.0).sin();
    let detail = 5.0 * (lat * 2000.0).sin() * (lon * 1500.0).sin();
    100.0 + hills + ridges + detail
}

/// NDVI used when no vegetation provider answers.
///
/// Vegetation thins with altitude; a low-amplitude coordinate pattern breaks
/// up uniform patches.
pub fn procedural_ndvi(elevation: f64, lat: f64, lon: f64) -> f64 {
    let altitude_factor = (1.0 - elevation.max(0.0) / 3000.0).clamp(0.0, 1.0);
    let pattern = 0.1 * (lat * 800.0 + lon * 600.0).sin();
    (0.2 + 0.5 * altitude_factor + pattern).clamp(-0.1, 0.9)
}

/// Fractal Brownian motion over Perlin noise, normalized to roughly [-1, 1]
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

/// Seeded noise terrain used for virtual (non-georeferenced) regions
pub struct NoiseElevation {
    noise: Perlin,
    /// Mean height in meters
    pub base: f64,
    /// Peak deviation from `base` in meters
    pub amplitude: f64,
    /// Noise cycles per degree
    pub frequency: f64,
    pub octaves: u32,
}

impl NoiseElevation {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: Perlin::new(1).set_seed(seed),
            base: 200.0,
            amplitude: 150.0,
            frequency: 80.0,
            octaves: 5,
        }
    }

    pub fn sample(&self, lat: f64, lon: f64) -> f64 {
        let n = fbm(
            &self.noise,
            lon * self.frequency,
            lat * self.frequency,
            self.octaves,
            0.5,
            2.0,
        );
        self.base + n * self.amplitude
    }
}

impl ElevationProvider for NoiseElevation {
    fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ProviderError> {
        Ok(Some(self.sample(lat, lon)))
    }

    fn elevation_batch(
        &self,
        points: &[GeoPoint],
    ) -> Option<Result<Vec<Option<f64>>, ProviderError>> {
        Some(Ok(points.iter().map(|p| Some(self.sample(p.lat, p.lon))).collect()))
    }
}
