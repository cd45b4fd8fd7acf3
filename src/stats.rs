//! Terrain statistics and the point-level diagnostic dump.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correction::OutlierReport;
use crate::error::Result;
use crate::geo::{EnrichedPoint, GeoBounds};
use crate::vegetation::VegetationInstance;

/// min / max / mean of one channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Range {
    /// Aggregate the finite values, all zero when there are none
    pub fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in values.filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            min,
            max,
            mean: sum / count as f64,
        }
    }
}

/// Aggregate description of one generation
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainStats {
    pub bounds: GeoBounds,
    pub resolution: usize,
    pub total_points: usize,
    pub elevation: Range,
    pub ndvi: Range,
    pub sampled_points: usize,
    pub interpolated_points: usize,
    pub corrected_points: usize,
    pub outliers: OutlierReport,
    pub vegetation_by_type: BTreeMap<String, usize>,
    pub generation_time: Duration,
}

impl TerrainStats {
    /// Channel aggregates for `points`; counters start at zero
    pub fn from_points(points: &[EnrichedPoint], bounds: GeoBounds, resolution: usize) -> Self {
        Self {
            bounds,
            resolution,
            total_points: points.len(),
            elevation: Range::of(points.iter().map(|p| p.elevation)),
            ndvi: Range::of(points.iter().map(|p| p.ndvi)),
            sampled_points: 0,
            interpolated_points: 0,
            corrected_points: 0,
            outliers: OutlierReport::default(),
            vegetation_by_type: BTreeMap::new(),
            generation_time: Duration::ZERO,
        }
    }

    /// Replace the vegetation counts with those of `instances`
    pub fn count_vegetation(&mut self, instances: &[VegetationInstance]) {
        self.vegetation_by_type.clear();
        for instance in instances {
            *self.vegetation_by_type.entry(instance.kind.clone()).or_insert(0) += 1;
        }
    }

    pub fn vegetation_total(&self) -> usize {
        self.vegetation_by_type.values().sum()
    }
}

impl fmt::Display for TerrainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Bounds: {:.5},{:.5} .. {:.5},{:.5}",
            self.bounds.south, self.bounds.west, self.bounds.north, self.bounds.east
        )?;
        writeln!(
            f,
            "Grid: {}x{} ({} points, {} sampled, {} interpolated, {} corrected)",
            self.resolution + 1,
            self.resolution + 1,
            self.total_points,
            self.sampled_points,
            self.interpolated_points,
            self.corrected_points
        )?;
        writeln!(
            f,
            "Elevation: {:.1}m .. {:.1}m (mean {:.1}m), {} outliers",
            self.elevation.min,
            self.elevation.max,
            self.elevation.mean,
            self.outliers.outliers()
        )?;
        writeln!(
            f,
            "NDVI: {:.3} .. {:.3} (mean {:.3})",
            self.ndvi.min, self.ndvi.max, self.ndvi.mean
        )?;
        write!(f, "Vegetation: {}", self.vegetation_total())?;
        for (kind, count) in &self.vegetation_by_type {
            write!(f, " {}={}", kind, count)?;
        }
        writeln!(f)?;
        write!(f, "Generated in {} ms", self.generation_time.as_millis())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMetadata {
    pub total_points: usize,
    pub sampled_points: usize,
    pub interpolated_points: usize,
    /// Milliseconds
    pub generation_time: u64,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticPoint {
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
    pub ndvi: f64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(rename = "normX")]
    pub norm_x: f64,
    #[serde(rename = "normY")]
    pub norm_y: f64,
}

/// Full point-level dump for offline inspection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticExport {
    pub metadata: DiagnosticMetadata,
    pub bounds: DiagnosticBounds,
    pub points: Vec<DiagnosticPoint>,
}

impl DiagnosticExport {
    pub fn new(points: &[EnrichedPoint], stats: &TerrainStats) -> Self {
        let points = points
            .iter()
            .enumerate()
            .map(|(index, p)| DiagnosticPoint {
                index,
                lat: p.point.lat,
                lon: p.point.lon,
                elevation: p.elevation,
                ndvi: p.ndvi,
                x: p.x,
                y: p.y,
                z: p.z,
                norm_x: p.point.norm_x,
                norm_y: p.point.norm_y,
            })
            .collect();

        Self {
            metadata: DiagnosticMetadata {
                total_points: stats.total_points,
                sampled_points: stats.sampled_points,
                interpolated_points: stats.interpolated_points,
                generation_time: stats.generation_time.as_millis() as u64,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            bounds: DiagnosticBounds {
                lat_min: stats.bounds.south,
                lat_max: stats.bounds.north,
                lon_min: stats.bounds.west,
                lon_max: stats.bounds.east,
            },
            points,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
