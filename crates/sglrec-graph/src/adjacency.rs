//! Sparse normalized bipartite adjacency.
//!
//! Users and items share one node index space: users occupy `0..U` and
//! items occupy `U..U+I`. An interaction `(u, i)` becomes the symmetric pair
//! of edges `u -> U+i` and `U+i -> u`, i.e. the block matrix
//!
//! ```text
//!     A = | 0   R |
//!         | Rᵀ  0 |
//! ```
//!
//! which is then symmetrically normalized:
//!
//! ```text
//! A_hat[r, c] = A[r, c] / sqrt(deg(r) * deg(c))
//! ```
//!
//! No self-loops are added. In LightGCN the layer-0 embedding is carried
//! into the final sum explicitly, so the self term is not needed here.
//!
//! # Storage
//!
//! The matrix is kept in COO form twice: as `u32`/`f32` tensors on the
//! target device (used by [`Adjacency::spmm`]) and as host-side slices
//! (used by edge dropout, which filters edges without a device round trip).
//! Both are behind `Arc`s, so cloning an `Adjacency` is cheap.

use std::collections::BTreeSet;
use std::sync::Arc;

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};

/// Sparse COO adjacency over `num_nodes` nodes.
#[derive(Debug, Clone)]
pub struct Adjacency {
    num_nodes: usize,
    rows: Arc<[u32]>,
    cols: Arc<[u32]>,
    values: Arc<[f32]>,
    row_index: Tensor,
    col_index: Tensor,
    // (nnz, 1) so it broadcasts over the feature dimension
    value_column: Tensor,
}

impl Adjacency {
    /// Build the normalized bipartite graph from user/item interactions.
    ///
    /// Duplicate interactions are collapsed. Nodes with no interactions keep
    /// an all-zero row.
    pub fn from_interactions(
        user_count: usize,
        item_count: usize,
        interactions: &[(usize, usize)],
        device: &Device,
    ) -> Result<Self> {
        let num_nodes = user_count + item_count;
        let mut pairs = BTreeSet::new();
        for &(user, item) in interactions {
            if user >= user_count {
                return Err(Error::IndexOutOfBounds { index: user, bound: user_count });
            }
            if item >= item_count {
                return Err(Error::IndexOutOfBounds { index: item, bound: item_count });
            }
            pairs.insert((user, user_count + item));
        }

        let mut degree = vec![0usize; num_nodes];
        for &(u, i) in &pairs {
            degree[u] += 1;
            degree[i] += 1;
        }
        let inv_sqrt: Vec<f32> = degree
            .iter()
            .map(|&d| if d == 0 { 0.0 } else { 1.0 / (d as f32).sqrt() })
            .collect();

        let nnz = pairs.len() * 2;
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        for &(u, i) in &pairs {
            let w = inv_sqrt[u] * inv_sqrt[i];
            rows.push(u as u32);
            cols.push(i as u32);
            values.push(w);
            rows.push(i as u32);
            cols.push(u as u32);
            values.push(w);
        }

        Self::from_parts(num_nodes, rows, cols, values, device)
    }

    /// Build from raw COO triplets. Values are used as given (no normalization).
    pub fn from_coo(
        num_nodes: usize,
        rows: Vec<u32>,
        cols: Vec<u32>,
        values: Vec<f32>,
        device: &Device,
    ) -> Result<Self> {
        if cols.len() != rows.len() {
            return Err(Error::DimensionMismatch { expected: rows.len(), got: cols.len() });
        }
        if values.len() != rows.len() {
            return Err(Error::DimensionMismatch { expected: rows.len(), got: values.len() });
        }
        if let Some(&bad) = rows.iter().chain(cols.iter()).find(|&&n| n as usize >= num_nodes) {
            return Err(Error::IndexOutOfBounds { index: bad as usize, bound: num_nodes });
        }
        Self::from_parts(num_nodes, rows, cols, values, device)
    }

    /// Trusted constructor: indices are already known to be in range.
    pub(crate) fn from_parts(
        num_nodes: usize,
        rows: Vec<u32>,
        cols: Vec<u32>,
        values: Vec<f32>,
        device: &Device,
    ) -> Result<Self> {
        let nnz = rows.len();
        let row_index = Tensor::from_slice(&rows, nnz, device)?;
        let col_index = Tensor::from_slice(&cols, nnz, device)?;
        let value_column = Tensor::from_slice(&values, (nnz, 1), device)?;
        Ok(Self {
            num_nodes,
            rows: rows.into(),
            cols: cols.into(),
            values: values.into(),
            row_index,
            col_index,
            value_column,
        })
    }

    /// Number of nodes (users + items).
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of stored (directed) entries.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    pub fn cols(&self) -> &[u32] {
        &self.cols
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn device(&self) -> &Device {
        self.row_index.device()
    }

    /// Sparse-dense product `A_hat @ x`.
    ///
    /// Implemented as gather (`index_select` on source nodes), scale, and
    /// scatter (`index_add` on destination nodes), all of which candle can
    /// backpropagate through.
    ///
    /// # Arguments
    /// - `x`: Node features (num_nodes x d)
    ///
    /// # Returns
    /// - Aggregated features (num_nodes x d)
    pub fn spmm(&self, x: &Tensor) -> Result<Tensor> {
        let (n, d) = x.dims2()?;
        if n != self.num_nodes {
            return Err(Error::DimensionMismatch { expected: self.num_nodes, got: n });
        }
        let out = Tensor::zeros((n, d), x.dtype(), x.device())?;
        if self.nnz() == 0 {
            return Ok(out);
        }
        let weights = self.value_column.to_dtype(x.dtype())?;
        let messages = x.index_select(&self.col_index, 0)?.broadcast_mul(&weights)?;
        Ok(out.index_add(&self.row_index, &messages, 0)?)
    }

    /// Materialize as a dense (num_nodes x num_nodes) matrix.
    pub fn to_dense(&self) -> Result<Tensor> {
        let n = self.num_nodes;
        let mut dense = vec![0f32; n * n];
        for ((&r, &c), &v) in self.rows.iter().zip(self.cols.iter()).zip(self.values.iter()) {
            dense[r as usize * n + c as usize] += v;
        }
        Ok(Tensor::from_vec(dense, (n, n), self.device())?)
    }
}
