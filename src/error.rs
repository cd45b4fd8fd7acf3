//! Error types for terrain synthesis.
//!
//! Only a handful of conditions ever reach the caller: an empty mesh input,
//! a rejected grid, cancellation and export I/O. Provider trouble is always
//! recovered inside the sampler and never surfaces here.

use std::fmt;

/// Errors surfaced by the terrain pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum TerrainError {
    /// Mesh construction requested with zero points
    EmptyInput(String),
    /// Grid resolution outside the configured range
    InvalidResolution { requested: i64, min: usize, max: usize },
    /// Bounds with zero or negative extent, or non-finite corners
    InvalidBounds(String),
    /// Configuration values the pipeline cannot run with
    InvalidConfig(String),
    /// Generation was cancelled through its token
    Cancelled,
    Io(String),
    Serialization(String),
    Image(String),
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainError::EmptyInput(what) => write!(f, "Empty input: {}", what),
            TerrainError::InvalidResolution { requested, min, max } => write!(
                f,
                "Invalid resolution {} (must be between {} and {})",
                requested, min, max
            ),
            TerrainError::InvalidBounds(e) => write!(f, "Invalid bounds: {}", e),
            TerrainError::InvalidConfig(e) => write!(f, "Invalid configuration: {}", e),
            TerrainError::Cancelled => write!(f, "Terrain generation cancelled"),
            TerrainError::Io(e) => write!(f, "I/O error: {}", e),
            TerrainError::Serialization(e) => write!(f, "Serialization error: {}", e),
            TerrainError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for TerrainError {}

impl From<std::io::Error> for TerrainError {
    fn from(e: std::io::Error) -> Self {
        TerrainError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for TerrainError {
    fn from(e: serde_json::Error) -> Self {
        TerrainError::Serialization(e.to_string())
    }
}

impl From<image::ImageError> for TerrainError {
    fn from(e: image::ImageError) -> Self {
        TerrainError::Image(e.to_string())
    }
}

/// Errors reported by external providers.
///
/// The sampler recovers from every variant by switching to procedural data.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    Network(String),
    Api(String),
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(e) => write!(f, "Network error: {}", e),
            ProviderError::Api(e) => write!(f, "API error: {}", e),
            ProviderError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

pub type Result<T> = std::result::Result<T, TerrainError>;
