//! Stochastic graph augmentation.
//!
//! One [`Augmentation`] policy is fixed at model construction. The forward
//! pass asks the [`Augmentor`] for a perturbation at three points, and each
//! policy answers at exactly one of them:
//!
//! | Stage | `node_drop` | `edge_drop` | `random_walk` | `none` |
//! |-------|-------------|-------------|---------------|--------|
//! | layer-0 embeddings | node dropout | - | - | - |
//! | shared adjacency | - | edge dropout | - | - |
//! | per-layer adjacency | - | - | edge dropout of the base graph | - |
//!
//! A dash means the input passes through untouched. With `keep_rate = 1.0`
//! every stage is the identity.

use candle_core::Tensor;
use rand::Rng;
use sglrec_graph::{edge_dropout, node_dropout, Adjacency};

use crate::config::Augmentation;
use crate::error::Result;

/// Applies the configured augmentation policy.
#[derive(Debug, Clone, Copy)]
pub struct Augmentor {
    policy: Augmentation,
}

impl Augmentor {
    pub fn new(policy: Augmentation) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> Augmentation {
        self.policy
    }

    /// Perturb the concatenated layer-0 embeddings.
    pub fn perturb_nodes<R: Rng + ?Sized>(
        &self,
        embeds: &Tensor,
        keep_rate: f64,
        rng: &mut R,
    ) -> Result<Tensor> {
        match self.policy {
            Augmentation::NodeDrop => Ok(node_dropout(embeds, keep_rate, rng)?),
            _ => Ok(embeds.clone()),
        }
    }

    /// Perturb the adjacency shared by all layers.
    pub fn perturb_graph<R: Rng + ?Sized>(
        &self,
        adjacency: &Adjacency,
        keep_rate: f64,
        rng: &mut R,
    ) -> Result<Adjacency> {
        match self.policy {
            Augmentation::EdgeDrop => Ok(edge_dropout(adjacency, keep_rate, rng)?),
            _ => Ok(adjacency.clone()),
        }
    }

    /// Adjacency for a single propagation layer.
    ///
    /// Under `random_walk` every call draws a fresh dropout of `shared`
    /// (which, for that policy, is the unperturbed base graph), so layers
    /// never see the same mask and drops do not compound across layers.
    pub fn layer_graph<R: Rng + ?Sized>(
        &self,
        shared: &Adjacency,
        keep_rate: f64,
        rng: &mut R,
    ) -> Result<Adjacency> {
        match self.policy {
            Augmentation::RandomWalk => Ok(edge_dropout(shared, keep_rate, rng)?),
            _ => Ok(shared.clone()),
        }
    }
}
