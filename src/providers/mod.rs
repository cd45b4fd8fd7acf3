//! External data collaborators.
//!
//! Each provider is injected as an optional trait object when the terrain is
//! constructed. When one is absent the pipeline uses the procedural fallback
//! from [`procedural`]; absence is never an error.

pub mod classifier;
pub mod http;
pub mod procedural;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geo::GeoPoint;

pub use classifier::ImageClassifier;
pub use http::{HttpElevationConfig, HttpElevationProvider};
pub use procedural::{procedural_elevation, procedural_ndvi, NoiseElevation};

/// Source of ground elevation samples (meters)
pub trait ElevationProvider: Send + Sync {
    /// Elevation at a single coordinate. `Ok(None)` means no data there.
    fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ProviderError>;

    /// Elevations for many points in one call, in the same order.
    ///
    /// Returns `None` when the provider has no batch endpoint, in which case
    /// callers fall back to per-point queries.
    fn elevation_batch(
        &self,
        _points: &[GeoPoint],
    ) -> Option<Result<Vec<Option<f64>>, ProviderError>> {
        None
    }
}

/// Source of NDVI values in [-1, 1]
pub trait VegetationProvider: Send + Sync {
    fn ndvi(&self, lat: f64, lon: f64) -> Option<f64>;
}

/// Classified raster point from satellite-image analysis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Pixel column in the analyzed raster
    pub x: f32,
    /// Pixel row in the analyzed raster (row 0 = north edge)
    pub y: f32,
    /// Land-cover class, e.g. "forest", "grass"
    #[serde(rename = "type")]
    pub kind: String,
}

impl Feature {
    pub fn new(x: f32, y: f32, kind: impl Into<String>) -> Self {
        Self {
            x,
            y,
            kind: kind.into(),
        }
    }
}

/// Surface coloring for the terrain material
#[derive(Clone, Debug)]
pub struct SurfaceTexture {
    pub image: RgbaImage,
}

impl SurfaceTexture {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Land-cover classification of the region's imagery
pub trait FeatureClassifier: Send + Sync {
    fn features(&self) -> Vec<Feature>;

    /// Width and height of the analyzed raster in pixels
    fn raster_size(&self) -> (u32, u32);

    fn texture(&self) -> Option<SurfaceTexture> {
        None
    }
}
