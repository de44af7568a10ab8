use thiserror::Error;

/// Errors that can occur in sglrec-nn.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Graph substrate error (adjacency, propagation, dropout).
    #[error("graph error: {0}")]
    Graph(#[from] sglrec_graph::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid hyperparameter or policy name.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Inputs whose lengths or dimensions do not line up.
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A user or item id beyond the table size.
    #[error("{what} id {index} out of bounds (bound {bound})")]
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        bound: usize,
    },
}

/// Result type alias for sglrec-nn.
pub type Result<T> = std::result::Result<T, Error>;
