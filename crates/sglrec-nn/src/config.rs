//! Model hyperparameters.
//!
//! # Example
//!
//! ```rust,ignore
//! use sglrec_nn::{Augmentation, SglConfig};
//!
//! let config = SglConfig::default()
//!     .with_embedding_dim(64)
//!     .with_layer_num(2)
//!     .with_augmentation(Augmentation::RandomWalk)
//!     .with_keep_rate(0.9);
//! config.validate()?;
//!
//! // or from JSON
//! let config = SglConfig::from_json_str(r#"{"augmentation": "node_drop", "kd_weight": 0.02}"#)?;
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Graph augmentation policy used to build the stochastic views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Augmentation {
    /// No perturbation: every view is the clean view.
    None,
    /// Drop whole node embedding rows before propagation.
    NodeDrop,
    /// Drop adjacency entries once; every layer shares the perturbed graph.
    EdgeDrop,
    /// Drop adjacency entries independently for every layer.
    RandomWalk,
}

impl Augmentation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Augmentation::None => "none",
            Augmentation::NodeDrop => "node_drop",
            Augmentation::EdgeDrop => "edge_drop",
            Augmentation::RandomWalk => "random_walk",
        }
    }
}

impl fmt::Display for Augmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Augmentation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Augmentation::None),
            "node_drop" => Ok(Augmentation::NodeDrop),
            "edge_drop" => Ok(Augmentation::EdgeDrop),
            "random_walk" => Ok(Augmentation::RandomWalk),
            other => Err(Error::InvalidConfig(format!(
                "unknown augmentation '{other}' (expected none, node_drop, edge_drop or random_walk)"
            ))),
        }
    }
}

/// Hyperparameter bundle, fixed at model construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SglConfig {
    /// Embedding dimension D (default: 32).
    pub embedding_dim: usize,
    /// Number of propagation layers L (default: 3).
    pub layer_num: usize,
    /// Keep probability for the two augmented views (default: 0.8).
    pub keep_rate: f64,
    /// Augmentation policy (default: edge_drop).
    pub augmentation: Augmentation,
    /// Contrastive loss weight (default: 0.1).
    pub cl_weight: f64,
    /// Contrastive InfoNCE temperature (default: 0.2).
    pub cl_temperature: f64,
    /// Distillation loss weight (default: 0.01).
    pub kd_weight: f64,
    /// Distillation InfoNCE temperature (default: 0.2).
    pub kd_temperature: f64,
    /// L2 regularization weight (default: 1e-7).
    pub reg_weight: f64,
    /// Seed for the dropout RNG (default: 42).
    pub seed: u64,
}

impl Default for SglConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 32,
            layer_num: 3,
            keep_rate: 0.8,
            augmentation: Augmentation::EdgeDrop,
            cl_weight: 0.1,
            cl_temperature: 0.2,
            kd_weight: 0.01,
            kd_temperature: 0.2,
            reg_weight: 1e-7,
            seed: 42,
        }
    }
}

impl SglConfig {
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_layer_num(mut self, layers: usize) -> Self {
        self.layer_num = layers;
        self
    }

    pub fn with_keep_rate(mut self, keep_rate: f64) -> Self {
        self.keep_rate = keep_rate;
        self
    }

    pub fn with_augmentation(mut self, augmentation: Augmentation) -> Self {
        self.augmentation = augmentation;
        self
    }

    pub fn with_contrastive(mut self, weight: f64, temperature: f64) -> Self {
        self.cl_weight = weight;
        self.cl_temperature = temperature;
        self
    }

    pub fn with_distillation(mut self, weight: f64, temperature: f64) -> Self {
        self.kd_weight = weight;
        self.kd_temperature = temperature;
        self
    }

    pub fn with_reg_weight(mut self, weight: f64) -> Self {
        self.reg_weight = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject configurations the model cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::InvalidConfig("embedding_dim must be positive".into()));
        }
        if !(self.keep_rate > 0.0 && self.keep_rate <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "keep_rate must be in (0, 1], got {}",
                self.keep_rate
            )));
        }
        for (name, t) in [("cl_temperature", self.cl_temperature), ("kd_temperature", self.kd_temperature)] {
            if !(t > 0.0 && t.is_finite()) {
                return Err(Error::InvalidConfig(format!("{name} must be positive, got {t}")));
            }
        }
        for (name, w) in [
            ("cl_weight", self.cl_weight),
            ("kd_weight", self.kd_weight),
            ("reg_weight", self.reg_weight),
        ] {
            if !(w >= 0.0 && w.is_finite()) {
                return Err(Error::InvalidConfig(format!("{name} must be non-negative, got {w}")));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SglConfig::default()
            .with_embedding_dim(64)
            .with_layer_num(2)
            .with_augmentation(Augmentation::NodeDrop)
            .with_contrastive(0.5, 0.1);

        assert_eq!(config.embedding_dim, 64);
        assert_eq!(config.layer_num, 2);
        assert_eq!(config.augmentation, Augmentation::NodeDrop);
        assert!((config.cl_weight - 0.5).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_augmentation_names() {
        for policy in [
            Augmentation::None,
            Augmentation::NodeDrop,
            Augmentation::EdgeDrop,
            Augmentation::RandomWalk,
        ] {
            assert_eq!(policy.as_str().parse::<Augmentation>().unwrap(), policy);
        }
        assert!(matches!("dropout".parse::<Augmentation>(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SglConfig::default().with_keep_rate(0.0).validate().is_err());
        assert!(SglConfig::default().with_keep_rate(1.2).validate().is_err());
        assert!(SglConfig::default().with_contrastive(0.1, 0.0).validate().is_err());
        assert!(SglConfig::default().with_distillation(0.1, -1.0).validate().is_err());
        assert!(SglConfig::default().with_reg_weight(-1e-3).validate().is_err());
        assert!(SglConfig::default().with_embedding_dim(0).validate().is_err());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = SglConfig::from_json_str(r#"{"augmentation": "random_walk", "layer_num": 1}"#).unwrap();
        assert_eq!(config.augmentation, Augmentation::RandomWalk);
        assert_eq!(config.layer_num, 1);
        assert_eq!(config.embedding_dim, SglConfig::default().embedding_dim);
    }

    #[test]
    fn test_json_rejects_unknown_policy() {
        let err = SglConfig::from_json_str(r#"{"augmentation": "mixup"}"#).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let err = SglConfig::from_json_str(r#"{"keep_rate": 0.0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sgl.json");
        let config = SglConfig::default().with_seed(7);
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();
        assert_eq!(SglConfig::from_json_file(&path).unwrap(), config);
    }
}
