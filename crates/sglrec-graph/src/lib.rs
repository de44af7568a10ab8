//! Graph substrate for sglrec.
//!
//! Holds everything that touches the user-item interaction graph itself:
//!
//! - [`adjacency`]: sparse COO normalized bipartite adjacency and `spmm`
//! - [`propagate`]: the [`Propagator`] capability and [`LightGcn`]
//! - [`dropout`]: node and edge dropout with a single keep rate
//!
//! # Example
//!
//! ```rust,ignore
//! use sglrec_graph::{Adjacency, LightGcn, Propagator};
//! use candle_core::{Device, Tensor};
//!
//! let adj = Adjacency::from_interactions(3, 2, &[(0, 0), (1, 1), (2, 0)], &Device::Cpu)?;
//! let e0 = Tensor::randn(0f32, 1f32, (5, 16), &Device::Cpu)?;
//! let out = LightGcn.propagate_layers(&adj, &e0, 2)?;  // (5, 16)
//! ```

pub mod adjacency;
pub mod dropout;
pub mod error;
pub mod propagate;

pub use adjacency::Adjacency;
pub use dropout::{edge_dropout, node_dropout, validate_keep_rate};
pub use error::{Error, Result};
pub use propagate::{LightGcn, Propagator};
