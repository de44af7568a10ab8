//! Semantic projector: maps external semantic embeddings into the model's
//! embedding space so they can act as distillation targets.
//!
//! ```text
//! S ──Linear──> H ──LeakyReLU(0.01)──> H ──Linear──> D      H = (S + D) / 2
//! ```
//!
//! Weights use Xavier/Glorot uniform initialization,
//! `U(-sqrt(6 / (fan_in + fan_out)), +sqrt(6 / (fan_in + fan_out)))`, which
//! keeps activation variance roughly constant across the two layers. Biases
//! use the usual `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
//!
//! # Reference
//!
//! Glorot & Bengio, "Understanding the difficulty of training deep
//! feedforward neural networks", AISTATS 2010.

use candle_core::{Result, Tensor};
use candle_nn::{Init, Linear, Module, VarBuilder};

const NEGATIVE_SLOPE: f64 = 0.01;

/// Xavier-uniform bound for a `(fan_out, fan_in)` weight.
pub fn xavier_bound(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out) as f64).sqrt()
}

/// Xavier-uniform initializer hint for [`VarBuilder::get_with_hints`].
pub fn xavier_uniform(fan_in: usize, fan_out: usize) -> Init {
    let bound = xavier_bound(fan_in, fan_out);
    Init::Uniform { lo: -bound, up: bound }
}

fn xavier_linear(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get_with_hints(
        (out_features, in_features),
        "weight",
        xavier_uniform(in_features, out_features),
    )?;
    let bound = 1.0 / (in_features as f64).sqrt();
    let bias = vb.get_with_hints(out_features, "bias", Init::Uniform { lo: -bound, up: bound })?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Two-layer feed-forward projection from semantic space to embedding space.
///
/// One instance is shared by the user and the item semantic tables.
pub struct SemanticProjector {
    hidden: Linear,
    output: Linear,
    in_features: usize,
    hidden_features: usize,
    out_features: usize,
}

impl SemanticProjector {
    /// Create a projector.
    ///
    /// # Arguments
    /// - `in_features`: Semantic embedding dimension S
    /// - `out_features`: Model embedding dimension D
    /// - `vb`: Variable builder; parameters land under `hidden.*` and `output.*`
    pub fn new(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Self> {
        let hidden_features = (in_features + out_features) / 2;
        let hidden = xavier_linear(in_features, hidden_features, vb.pp("hidden"))?;
        let output = xavier_linear(hidden_features, out_features, vb.pp("output"))?;
        Ok(Self {
            hidden,
            output,
            in_features,
            hidden_features,
            out_features,
        })
    }

    /// Project a `(N, S)` semantic table to `(N, D)`.
    pub fn project(&self, raw: &Tensor) -> Result<Tensor> {
        self.forward(raw)
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn hidden_features(&self) -> usize {
        self.hidden_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for SemanticProjector {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let h = self.hidden.forward(xs)?;
        let h = candle_nn::ops::leaky_relu(&h, NEGATIVE_SLOPE)?;
        self.output.forward(&h)
    }
}
