//! Stochastic node and edge dropout.
//!
//! Both primitives take a *keep rate* `k` in (0, 1] and draw one Bernoulli
//! trial per unit as `floor(u + k)` with `u ~ U[0, 1)`, so a unit survives
//! with probability `k`.
//!
//! | Primitive | Unit | Survivors |
//! |-----------|------|-----------|
//! | [`node_dropout`] | embedding row | unchanged (dropped rows become zero) |
//! | [`edge_dropout`] | adjacency entry | value rescaled by `1/k` |
//!
//! At `k = 1.0` both are the identity and consume no randomness.

use candle_core::Tensor;
use rand::Rng;

use crate::adjacency::Adjacency;
use crate::error::{Error, Result};

/// Check that a keep rate lies in (0, 1].
pub fn validate_keep_rate(keep_rate: f64) -> Result<()> {
    if keep_rate > 0.0 && keep_rate <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidKeepRate(keep_rate))
    }
}

#[inline]
fn survives<R: Rng + ?Sized>(rng: &mut R, keep_rate: f64) -> bool {
    (rng.random::<f64>() + keep_rate).floor() >= 1.0
}

/// Zero out whole rows of `embeds`, keeping each with probability `keep_rate`.
pub fn node_dropout<R: Rng + ?Sized>(
    embeds: &Tensor,
    keep_rate: f64,
    rng: &mut R,
) -> Result<Tensor> {
    validate_keep_rate(keep_rate)?;
    if keep_rate >= 1.0 {
        return Ok(embeds.clone());
    }
    let n = embeds.dim(0)?;
    let mask: Vec<f32> = (0..n)
        .map(|_| if survives(rng, keep_rate) { 1.0 } else { 0.0 })
        .collect();
    let mask = Tensor::from_vec(mask, (n, 1), embeds.device())?.to_dtype(embeds.dtype())?;
    Ok(embeds.broadcast_mul(&mask)?)
}

/// Drop adjacency entries independently, rescaling survivors by `1/keep_rate`.
///
/// Each directed entry is sampled on its own, so the result is generally
/// no longer symmetric.
pub fn edge_dropout<R: Rng + ?Sized>(
    adj: &Adjacency,
    keep_rate: f64,
    rng: &mut R,
) -> Result<Adjacency> {
    validate_keep_rate(keep_rate)?;
    if keep_rate >= 1.0 {
        return Ok(adj.clone());
    }
    let scale = (1.0 / keep_rate) as f32;
    let mut rows = Vec::with_capacity(adj.nnz());
    let mut cols = Vec::with_capacity(adj.nnz());
    let mut values = Vec::with_capacity(adj.nnz());
    for ((&r, &c), &v) in adj.rows().iter().zip(adj.cols()).zip(adj.values()) {
        if survives(rng, keep_rate) {
            rows.push(r);
            cols.push(c);
            values.push(v * scale);
        }
    }
    Adjacency::from_parts(adj.num_nodes(), rows, cols, values, adj.device())
}
