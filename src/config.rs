//! Terrain generation configuration
//!
//! Everything a caller can tune between generations lives here. Configuration
//! is the only state that survives `clear_terrain`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::vegetation::VegetationConfig;

/// Reconstruction method for non-sampled lattice points
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Clamped bilinear - never overshoots its corner samples
    #[default]
    Bilinear,
    /// Catmull-Rom over a 4x4 neighborhood - smoother, unclamped
    Bicubic,
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
        }
    }
}

/// Global terrain synthesis parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Smallest accepted grid resolution (cells per side)
    pub min_resolution: usize,
    /// Largest accepted grid resolution (cells per side)
    pub max_resolution: usize,
    /// Stride between sampled rows/columns (1 = sample every point)
    pub sampling_rate: usize,
    pub interpolation: InterpolationMethod,
    /// Vertical exaggeration applied after the min-elevation offset
    pub vertical_scale: f32,
    /// Multiplier on the real-world footprint (map zoom compensation)
    pub zoom_scale: f32,
    /// Upper bound on the batched elevation query before falling back
    pub sample_timeout_ms: u64,
    /// Flat material color used when no texture is supplied (linear RGB)
    pub procedural_color: [f32; 3],
    /// RNG seed for vegetation placement (random if not set)
    pub seed: Option<u64>,
    pub vegetation: VegetationConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            min_resolution: 4,
            max_resolution: 256,
            sampling_rate: 4,
            interpolation: InterpolationMethod::Bilinear,
            vertical_scale: 1.0,
            zoom_scale: 1.0,
            sample_timeout_ms: 10_000,
            procedural_color: [0.36, 0.5, 0.28],
            seed: None,
            vegetation: VegetationConfig::default(),
        }
    }
}

impl TerrainConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: TerrainConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.min_resolution == 0 || self.min_resolution > self.max_resolution {
            return Err(TerrainError::InvalidResolution {
                requested: self.min_resolution as i64,
                min: 1,
                max: self.max_resolution,
            });
        }
        if self.sampling_rate == 0 {
            return Err(TerrainError::InvalidConfig(
                "sampling_rate must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    /// Check a requested resolution against the configured range
    pub fn validate_resolution(&self, resolution: i64) -> Result<usize> {
        if resolution <= 0
            || (resolution as usize) < self.min_resolution
            || (resolution as usize) > self.max_resolution
        {
            return Err(TerrainError::InvalidResolution {
                requested: resolution,
                min: self.min_resolution,
                max: self.max_resolution,
            });
        }
        Ok(resolution as usize)
    }

    /// Pick a grid resolution for a web-map zoom level, clamped into range.
    /// Higher zoom means a smaller area on screen, so more cells per side.
    pub fn resolution_for_zoom(&self, zoom: f32) -> usize {
        let base = if zoom >= 15.0 {
            256
        } else if zoom >= 13.0 {
            128
        } else if zoom >= 11.0 {
            64
        } else if zoom >= 9.0 {
            32
        } else {
            16
        };
        base.clamp(self.min_resolution, self.max_resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_resolution_range() {
        let config = TerrainConfig::default();
        assert!(config.validate_resolution(0).is_err());
        assert!(config.validate_resolution(-3).is_err());
        assert!(config.validate_resolution(2).is_err());
        assert!(config.validate_resolution(1024).is_err());
        assert_eq!(config.validate_resolution(64).unwrap(), 64);
    }

    #[test]
    fn test_resolution_for_zoom_is_clamped() {
        let config = TerrainConfig {
            max_resolution: 100,
            ..Default::default()
        };
        assert_eq!(config.resolution_for_zoom(18.0), 100);
        assert_eq!(config.resolution_for_zoom(12.0), 64);
        assert_eq!(config.resolution_for_zoom(3.0), 16);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: TerrainConfig =
            serde_json::from_str(r#"{"vertical_scale": 2.5, "interpolation": "bicubic"}"#).unwrap();
        assert_eq!(config.vertical_scale, 2.5);
        assert_eq!(config.interpolation, InterpolationMethod::Bicubic);
        assert_eq!(config.sampling_rate, 4);
        assert_eq!(config.vegetation.batch_size, 50);
    }
}
