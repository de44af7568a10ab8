//! Precomputed semantic (profile) embeddings for users and items.
//!
//! These come from outside the model, e.g. a text encoder run over user
//! and item profiles. They are loaded once, stored as constants, and never
//! receive gradients. The two tables may have any row width `S`, but it
//! must be the same for both, because a single projector serves both.

use candle_core::{DType, Device, Tensor};

use crate::error::{Error, Result};

/// Immutable user and item semantic tables.
#[derive(Debug, Clone)]
pub struct SemanticEmbeddings {
    users: Tensor,
    items: Tensor,
}

impl SemanticEmbeddings {
    /// Wrap two `(rows, S)` tensors. Both are detached and cast to `f32`.
    pub fn new(users: Tensor, items: Tensor) -> Result<Self> {
        let (_, user_dim) = users.dims2()?;
        let (_, item_dim) = items.dims2()?;
        if user_dim != item_dim {
            return Err(Error::ShapeMismatch {
                what: "semantic embedding dimension",
                expected: user_dim,
                got: item_dim,
            });
        }
        if user_dim == 0 {
            return Err(Error::ShapeMismatch { what: "semantic embedding dimension", expected: 1, got: 0 });
        }
        Ok(Self {
            users: users.detach().to_dtype(DType::F32)?,
            items: items.detach().to_dtype(DType::F32)?,
        })
    }

    /// Build from row vectors. All rows in both tables must have equal length.
    pub fn from_rows(users: &[Vec<f32>], items: &[Vec<f32>], device: &Device) -> Result<Self> {
        let dim = users
            .first()
            .or_else(|| items.first())
            .map(Vec::len)
            .unwrap_or(0);
        let users = rows_to_tensor(users, dim, device)?;
        let items = rows_to_tensor(items, dim, device)?;
        Self::new(users, items)
    }

    pub fn users(&self) -> &Tensor {
        &self.users
    }

    pub fn items(&self) -> &Tensor {
        &self.items
    }

    pub fn user_count(&self) -> usize {
        self.users.dims()[0]
    }

    pub fn item_count(&self) -> usize {
        self.items.dims()[0]
    }

    /// Row width `S`.
    pub fn dim(&self) -> usize {
        self.users.dims()[1]
    }
}

fn rows_to_tensor(rows: &[Vec<f32>], dim: usize, device: &Device) -> Result<Tensor> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for row in rows {
        if row.len() != dim {
            return Err(Error::ShapeMismatch {
                what: "semantic embedding row",
                expected: dim,
                got: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Ok(Tensor::from_vec(flat, (rows.len(), dim), device)?)
}
