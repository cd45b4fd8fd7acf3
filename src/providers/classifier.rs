//! Land-cover classification of satellite imagery by color heuristics.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::error::Result;

use super::{Feature, FeatureClassifier, SurfaceTexture};

/// Land-cover class names produced by the classifier
pub const FOREST: &str = "forest";
pub const VEGETATION: &str = "vegetation";
pub const GRASS: &str = "grass";
pub const CROPS: &str = "crops";

/// Classify a single pixel, `None` for bare ground, water, roads and roofs
pub fn classify_pixel(pixel: &Rgb<u8>) -> Option<&'static str> {
    let r = pixel[0] as f32 / 255.0;
    let g = pixel[1] as f32 / 255.0;
    let b = pixel[2] as f32 / 255.0;

    let sum = r + g + b;
    if sum < 0.05 {
        return None;
    }
    let brightness = sum / 3.0;
    // Excess-green index, normalized by total intensity
    let greenness = (2.0 * g - r - b) / sum;

    if greenness > 0.1 && brightness < 0.3 {
        Some(FOREST)
    } else if greenness > 0.15 {
        Some(VEGETATION)
    } else if r > b * 1.3 && g > b * 1.3 && (r - g).abs() < 0.12 && brightness > 0.4 {
        // Ripening fields read as yellow rather than green
        Some(CROPS)
    } else if greenness > 0.05 && brightness >= 0.3 {
        Some(GRASS)
    } else {
        None
    }
}

/// Feature classifier over an RGB satellite image of the terrain region.
/// Row 0 of the image is the northern edge.
pub struct ImageClassifier {
    image: RgbImage,
    /// Classify every `stride`-th pixel in each direction
    pub stride: u32,
}

impl ImageClassifier {
    pub fn new(image: RgbImage, stride: u32) -> Self {
        Self {
            image,
            stride: stride.max(1),
        }
    }

    pub fn open(path: &Path, stride: u32) -> Result<Self> {
        let image = image::open(path)?.to_rgb8();
        Ok(Self::new(image, stride))
    }
}

impl FeatureClassifier for ImageClassifier {
    fn features(&self) -> Vec<Feature> {
        let mut features = Vec::new();
        for y in (0..self.image.height()).step_by(self.stride as usize) {
            for x in (0..self.image.width()).step_by(self.stride as usize) {
                if let Some(kind) = classify_pixel(self.image.get_pixel(x, y)) {
                    features.push(Feature::new(x as f32, y as f32, kind));
                }
            }
        }
        features
    }

    fn raster_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn texture(&self) -> Option<SurfaceTexture> {
        Some(SurfaceTexture {
            image: DynamicImage::ImageRgb8(self.image.clone()).to_rgba8(),
        })
    }
}
