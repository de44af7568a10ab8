//! `sglrec`: self-supervised graph collaborative filtering with semantic
//! knowledge distillation.
//!
//! This crate re-exports the workspace members under one name:
//!
//! - [`graph`]: normalized adjacency, LightGCN propagation, dropout
//! - the model, loss composer, sampler and trainer from `sglrec-nn`

pub use sglrec_graph as graph;
pub use sglrec_graph::{Adjacency, LightGcn, Propagator};
pub use sglrec_nn::*;
