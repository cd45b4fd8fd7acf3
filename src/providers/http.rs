//! HTTP elevation provider
//!
//! Talks to an Open-Elevation compatible server
//! (`POST /api/v1/lookup`). Requests are blocking; the sampler runs them on
//! a blocking worker and bounds the wait itself. The HTTP client is built on
//! first use, so the provider itself can be created and dropped from async
//! code.

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geo::GeoPoint;

use super::ElevationProvider;

/// Configuration for the elevation server
#[derive(Clone, Debug)]
pub struct HttpElevationConfig {
    /// Base URL of the server (e.g., "https://api.open-elevation.com")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum locations per request; larger batches are split
    pub max_batch: usize,
}

impl Default for HttpElevationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-elevation.com".to_string(),
            timeout_secs: 30,
            max_batch: 512,
        }
    }
}

#[derive(Serialize, Debug)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Debug)]
struct LookupRequest {
    locations: Vec<Location>,
}

#[derive(Deserialize, Debug)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Deserialize, Debug)]
struct LookupResult {
    #[serde(default)]
    elevation: Option<f64>,
}

/// Elevation client for an Open-Elevation style API
pub struct HttpElevationProvider {
    config: HttpElevationConfig,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpElevationProvider {
    pub fn new(config: HttpElevationConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    /// Blocking client, created on the calling (blocking) thread
    fn client(&self) -> Result<&reqwest::blocking::Client, ProviderError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        // A concurrent caller may have won the race; either client works
        Ok(self.client.get_or_init(|| client))
    }

    fn lookup(&self, locations: Vec<Location>) -> Result<Vec<Option<f64>>, ProviderError> {
        let expected = locations.len();
        let url = format!("{}/api/v1/lookup", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client()?
            .post(&url)
            .json(&LookupRequest { locations })
            .send()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Api(format!("Status {}: {}", status, body)));
        }

        let lookup: LookupResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if lookup.results.len() != expected {
            return Err(ProviderError::Parse(format!(
                "expected {} results, got {}",
                expected,
                lookup.results.len()
            )));
        }

        Ok(lookup.results.into_iter().map(|r| r.elevation).collect())
    }
}

impl ElevationProvider for HttpElevationProvider {
    fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ProviderError> {
        let mut values = self.lookup(vec![Location {
            latitude: lat,
            longitude: lon,
        }])?;
        Ok(values.pop().flatten())
    }

    fn elevation_batch(
        &self,
        points: &[GeoPoint],
    ) -> Option<Result<Vec<Option<f64>>, ProviderError>> {
        let chunk_size = self.config.max_batch.max(1);
        let mut out = Vec::with_capacity(points.len());

        for chunk in points.chunks(chunk_size) {
            let locations = chunk
                .iter()
                .map(|p| Location {
                    latitude: p.lat,
                    longitude: p.lon,
                })
                .collect();
            match self.lookup(locations) {
                Ok(values) => out.extend(values),
                Err(e) => return Some(Err(e)),
            }
        }

        Some(Ok(out))
    }
}
