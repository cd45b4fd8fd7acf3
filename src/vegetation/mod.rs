//! Feature-driven vegetation placement.
//!
//! Classified feature points are grouped by land-cover class, thinned by
//! the class density, given a weighted-random model, scale and rotation,
//! mapped onto the terrain footprint and snapped to its surface. Delivery
//! to the renderer happens in small batches with a cooperative yield
//! between them.

pub mod config;
pub mod instancing;
pub mod placement;

use serde::{Deserialize, Serialize};

pub use config::{ModelOption, VegetationConfig, VegetationTypeConfig};
pub use instancing::{deliver_in_batches, DeliveryReport, InstanceSink};
pub use placement::{
    place_vegetation, resolve_height, HeightSource, NearestGridPoint, PlacementReport,
};

/// World-space position, Y up
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One placed vegetation model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VegetationInstance {
    /// Land-cover class that spawned it
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub position: Vec3,
    pub scale: f32,
    /// Rotation about +Y in radians, in [0, 2π)
    pub rotation: f32,
}
