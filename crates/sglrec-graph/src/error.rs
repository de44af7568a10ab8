//! Error types for sglrec-graph.

use thiserror::Error;

/// Graph substrate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Node or item index outside the graph.
    #[error("index {index} out of bounds (bound {bound})")]
    IndexOutOfBounds { index: usize, bound: usize },

    /// Keep probability outside (0, 1].
    #[error("invalid keep rate {0}: must be in (0, 1]")]
    InvalidKeepRate(f64),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
