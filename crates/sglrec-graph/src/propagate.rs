//! Graph propagation (message passing) over a fixed adjacency.
//!
//! # LightGCN
//!
//! LightGCN (He et al., 2020) strips GCN down to its neighborhood
//! aggregation: no weight matrix, no nonlinearity, just
//!
//! ```text
//! E^{(k+1)} = A_hat @ E^{(k)}
//! ```
//!
//! and the final representation combines every layer, including the input:
//!
//! ```text
//! E_final = Σ_{k=0}^{K} E^{(k)}
//! ```
//!
//! Each layer consumes only the previous layer's output; the accumulation
//! happens once, at the end.
//!
//! In recommendation the input features are learned ID embeddings, so a
//! per-layer transform adds parameters without adding signal. The
//! bipartite interaction structure *is* the collaborative signal.
//!
//! # Reference
//!
//! He et al., "LightGCN: Simplifying and Powering Graph Convolution Network
//! for Recommendation", SIGIR 2020.

use candle_core::Tensor;

use crate::adjacency::Adjacency;
use crate::error::Result;

/// One step of message passing over an adjacency.
///
/// The model composes a `Propagator` rather than inheriting one, so the
/// aggregation rule can be swapped without touching augmentation or loss
/// code.
pub trait Propagator {
    /// Propagate `embeds` (N x d) one hop over `adjacency`.
    fn propagate(&self, adjacency: &Adjacency, embeds: &Tensor) -> Result<Tensor>;

    /// Run `num_layers` hops over a fixed adjacency and return the layer sum
    /// `E^{(0)} + E^{(1)} + ... + E^{(K)}`.
    fn propagate_layers(
        &self,
        adjacency: &Adjacency,
        embeds: &Tensor,
        num_layers: usize,
    ) -> Result<Tensor> {
        let mut current = embeds.clone();
        let mut combined = embeds.clone();
        for _ in 0..num_layers {
            current = self.propagate(adjacency, &current)?;
            combined = (combined + &current)?;
        }
        Ok(combined)
    }
}

/// Parameter-free LightGCN aggregation: `A_hat @ E`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightGcn;

impl Propagator for LightGcn {
    fn propagate(&self, adjacency: &Adjacency, embeds: &Tensor) -> Result<Tensor> {
        adjacency.spmm(embeds)
    }
}
