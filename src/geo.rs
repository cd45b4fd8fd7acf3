//! Geographic primitives: bounds, lattice points and great-circle distance.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

/// Mean Earth radius in meters (spherical model)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (spherical approximation)
const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Rectangular geographic region in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Create bounds, rejecting empty or non-finite regions
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let corners = [south, west, north, east];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(TerrainError::InvalidBounds(format!(
                "non-finite corner in {:?}",
                corners
            )));
        }
        if north <= south || east <= west {
            return Err(TerrainError::InvalidBounds(format!(
                "south={} west={} north={} east={} has no area",
                south, west, north, east
            )));
        }
        if south < -90.0 || north > 90.0 {
            return Err(TerrainError::InvalidBounds(format!(
                "latitude range {}..{} outside [-90, 90]",
                south, north
            )));
        }
        Ok(Self { south, west, north, east })
    }

    /// Synthetic bounds for a non-georeferenced ("virtual") terrain:
    /// a square of `size_m` meters centered on the given coordinate.
    pub fn virtual_region(center_lat: f64, center_lon: f64, size_m: f64) -> Result<Self> {
        if !(size_m > 0.0) {
            return Err(TerrainError::InvalidBounds(format!(
                "virtual terrain size {} must be positive",
                size_m
            )));
        }
        let half_lat = size_m / METERS_PER_DEGREE / 2.0;
        let cos_lat = center_lat.to_radians().cos().max(1e-6);
        let half_lon = size_m / (METERS_PER_DEGREE * cos_lat) / 2.0;
        Self::new(
            center_lat - half_lat,
            center_lon - half_lon,
            center_lat + half_lat,
            center_lon + half_lon,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// East-west extent in meters, measured along the middle latitude
    pub fn width_m(&self) -> f64 {
        let (mid_lat, _) = self.center();
        haversine_distance(mid_lat, self.west, mid_lat, self.east)
    }

    /// North-south extent in meters, measured along the west meridian
    pub fn height_m(&self) -> f64 {
        haversine_distance(self.south, self.west, self.north, self.west)
    }
}

/// Great-circle distance in meters between two lat/lon pairs (degrees)
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// A lattice coordinate. Immutable once the grid is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    /// Column index in [0, resolution]
    pub grid_x: usize,
    /// Row index in [0, resolution]
    pub grid_y: usize,
    pub norm_x: f64,
    pub norm_y: f64,
}

/// Lattice point with resolved elevation, NDVI and world-space position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnrichedPoint {
    pub point: GeoPoint,
    /// Meters above sea level
    pub elevation: f64,
    pub ndvi: f64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EnrichedPoint {
    pub fn new(point: GeoPoint, elevation: f64, ndvi: f64) -> Self {
        Self {
            point,
            elevation,
            ndvi,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}
