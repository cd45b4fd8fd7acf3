//! Per-generation sample cache
//!
//! Keys are coordinates rounded to 5 decimal places (about 1 m), so repeated
//! queries for the same spot within one generation hit the same entry. A
//! cache belongs to exactly one generation and is dropped with it.

use std::collections::HashMap;

/// Decimal places kept in cache keys
const KEY_PRECISION: f64 = 1e5;

/// Elevation and NDVI resolved for one coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub elevation: f64,
    pub ndvi: f64,
}

impl Sample {
    pub fn new(elevation: f64, ndvi: f64) -> Self {
        Self { elevation, ndvi }
    }

    pub fn is_valid(&self) -> bool {
        self.elevation.is_finite() && self.ndvi.is_finite()
    }
}

/// Quantized `(lat, lon)` cache key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat: i64,
    lon: i64,
}

impl CacheKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * KEY_PRECISION).round() as i64,
            lon: (lon * KEY_PRECISION).round() as i64,
        }
    }
}

/// Cache of resolved samples for one generation
#[derive(Debug, Default)]
pub struct SampleCache {
    entries: HashMap<CacheKey, Sample>,
    hits: usize,
    misses: usize,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a coordinate, counting hits and misses
    pub fn get(&mut self, lat: f64, lon: f64) -> Option<Sample> {
        match self.entries.get(&CacheKey::new(lat, lon)) {
            Some(sample) => {
                self.hits += 1;
                Some(*sample)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, lat: f64, lon: f64, sample: Sample) {
        self.entries.insert(CacheKey::new(lat, lon), sample);
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.entries.contains_key(&CacheKey::new(lat, lon))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
