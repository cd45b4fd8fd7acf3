//! Terrain synthesis library
//!
//! Turns sparse elevation / vegetation samples for a map region into a
//! displaced terrain mesh and a set of placed vegetation instances.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod correction;
pub mod error;
pub mod export;
pub mod geo;
pub mod grid;
pub mod interpolate;
pub mod mesh;
pub mod providers;
pub mod sampler;
pub mod stats;
pub mod terrain;
pub mod vegetation;

pub use cancel::CancelToken;
pub use config::{InterpolationMethod, TerrainConfig};
pub use error::{ProviderError, Result, TerrainError};
pub use geo::{EnrichedPoint, GeoBounds, GeoPoint};
pub use mesh::{Material, TerrainMesh, TerrainVertex};
pub use stats::{DiagnosticExport, TerrainStats};
pub use terrain::{Generation, Terrain};
pub use vegetation::{InstanceSink, VegetationConfig, VegetationInstance};
