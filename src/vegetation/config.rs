//! Vegetation type configurations.
//!
//! Maps each land-cover class to a spawn density and a weighted list of
//! models to choose from.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One selectable model with its draw weight and scale range
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    /// Model identifier understood by the renderer (e.g. "pine")
    pub model: String,
    /// Relative draw weight (non-positive weights are never drawn)
    pub weight: f32,
    /// Uniform scale range `[min, max]`
    pub scale_range: [f32; 2],
}

/// Configuration for one land-cover class
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VegetationTypeConfig {
    /// Land-cover class this applies to (matches `Feature::kind`)
    pub kind: String,
    /// Probability (0.0 - 1.0) that a feature point spawns an instance
    pub density: f32,
    pub models: Vec<ModelOption>,
}

impl VegetationTypeConfig {
    /// Create a new config with a density and no models
    pub fn new(kind: impl Into<String>, density: f32) -> Self {
        Self {
            kind: kind.into(),
            density,
            models: Vec::new(),
        }
    }

    /// Add a model with weight and scale range
    pub fn with_model(mut self, model: impl Into<String>, weight: f32, min_scale: f32, max_scale: f32) -> Self {
        self.models.push(ModelOption {
            model: model.into(),
            weight,
            scale_range: [min_scale, max_scale],
        });
        self
    }

    /// Sum of all drawable weights
    pub fn total_weight(&self) -> f32 {
        self.models.iter().map(|m| m.weight.max(0.0)).sum()
    }

    /// Pick a model by cumulative-weight sampling
    pub fn choose_model<R: Rng>(&self, rng: &mut R) -> Option<&ModelOption> {
        let total = self.total_weight();
        if total <= 0.0 {
            return None;
        }

        let roll = rng.gen::<f32>() * total;
        let mut cumulative = 0.0;
        for model in self.models.iter().filter(|m| m.weight > 0.0) {
            cumulative += model.weight;
            if roll < cumulative {
                return Some(model);
            }
        }
        // Rounding can leave roll == total
        self.models.iter().rev().find(|m| m.weight > 0.0)
    }
}

/// Vegetation placement settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    /// Instances handed to the renderer between cooperative yields
    pub batch_size: usize,
    /// Lift applied to every instance so bases do not sink into the surface
    pub ground_offset: f32,
    /// Per-class density replacing the configured one (from the UI)
    pub density_overrides: HashMap<String, f32>,
    pub types: Vec<VegetationTypeConfig>,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            ground_offset: 0.1,
            density_overrides: HashMap::new(),
            types: default_types(),
        }
    }
}

impl VegetationConfig {
    pub fn type_config(&self, kind: &str) -> Option<&VegetationTypeConfig> {
        self.types.iter().find(|t| t.kind == kind)
    }

    /// Effective spawn probability for a class, override first
    pub fn density_for(&self, kind: &str) -> f32 {
        let density = match self.density_overrides.get(kind) {
            Some(&d) => d,
            None => self.type_config(kind).map(|t| t.density).unwrap_or(0.0),
        };
        if density.is_finite() {
            density.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Built-in classes matching the image classifier's output
fn default_types() -> Vec<VegetationTypeConfig> {
    vec![
        VegetationTypeConfig::new("forest", 0.03)
            .with_model("pine", 0.5, 0.8, 1.4)
            .with_model("oak", 0.3, 0.9, 1.5)
            .with_model("birch", 0.2, 0.8, 1.2),
        VegetationTypeConfig::new("vegetation", 0.02)
            .with_model("bush", 0.6, 0.6, 1.1)
            .with_model("oak", 0.4, 0.7, 1.2),
        VegetationTypeConfig::new("grass", 0.01)
            .with_model("grass_tuft", 0.8, 0.5, 1.0)
            .with_model("bush", 0.2, 0.4, 0.8),
        VegetationTypeConfig::new("crops", 0.005)
            .with_model("wheat", 0.7, 0.6, 0.9)
            .with_model("corn", 0.3, 0.8, 1.2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_weighted_choice_follows_weights() {
        let config = VegetationTypeConfig::new("forest", 1.0)
            .with_model("pine", 3.0, 1.0, 1.0)
            .with_model("oak", 1.0, 1.0, 1.0)
            .with_model("never", 0.0, 1.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut pine = 0;
        let mut oak = 0;
        for _ in 0..10_000 {
            match config.choose_model(&mut rng).unwrap().model.as_str() {
                "pine" => pine += 1,
                "oak" => oak += 1,
                other => panic!("drew zero-weight model {}", other),
            }
        }
        let ratio = pine as f64 / (pine + oak) as f64;
        assert!((ratio - 0.75).abs() < 0.03, "pine ratio {}", ratio);
    }

    #[test]
    fn test_no_drawable_models() {
        let config = VegetationTypeConfig::new("bare", 1.0).with_model("x", 0.0, 1.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(config.choose_model(&mut rng).is_none());
    }

    #[test]
    fn test_density_override_wins_and_clamps() {
        let mut config = VegetationConfig::default();
        assert_eq!(config.density_for("forest"), 0.03);
        assert_eq!(config.density_for("unknown"), 0.0);

        config.density_overrides.insert("forest".to_string(), 0.5);
        config.density_overrides.insert("grass".to_string(), 4.0);
        assert_eq!(config.density_for("forest"), 0.5);
        assert_eq!(config.density_for("grass"), 1.0);
    }
}
