//! Training triples.

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};

/// Aligned `(user, positive item, negative item)` index triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub anchors: Vec<u32>,
    pub positives: Vec<u32>,
    pub negatives: Vec<u32>,
}

impl Batch {
    /// Build a batch. The three lists must be non-empty and of equal length.
    pub fn new(anchors: Vec<u32>, positives: Vec<u32>, negatives: Vec<u32>) -> Result<Self> {
        if anchors.is_empty() {
            return Err(Error::ShapeMismatch { what: "batch size", expected: 1, got: 0 });
        }
        for (what, len) in [("positive count", positives.len()), ("negative count", negatives.len())] {
            if len != anchors.len() {
                return Err(Error::ShapeMismatch { what, expected: anchors.len(), got: len });
            }
        }
        Ok(Self { anchors, positives, negatives })
    }

    /// Number of triples B.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Check every id against the table sizes.
    pub fn validate_bounds(&self, user_count: usize, item_count: usize) -> Result<()> {
        let checks = [
            ("user", &self.anchors, user_count),
            ("positive item", &self.positives, item_count),
            ("negative item", &self.negatives, item_count),
        ];
        for (what, ids, bound) in checks {
            if let Some(&bad) = ids.iter().find(|&&id| id as usize >= bound) {
                return Err(Error::IndexOutOfBounds { what, index: bad as usize, bound });
            }
        }
        Ok(())
    }

    /// Index tensors for `index_select`, in anchor/positive/negative order.
    pub(crate) fn index_tensors(&self, device: &Device) -> Result<(Tensor, Tensor, Tensor)> {
        let n = self.len();
        Ok((
            Tensor::from_slice(&self.anchors, n, device)?,
            Tensor::from_slice(&self.positives, n, device)?,
            Tensor::from_slice(&self.negatives, n, device)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_ragged_and_empty() {
        assert!(Batch::new(vec![0, 1], vec![0, 1], vec![1, 0]).is_ok());
        let err = Batch::new(vec![0, 1], vec![0], vec![1, 0]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "positive count", expected: 2, got: 1 }));
        let err = Batch::new(vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "batch size", .. }));
    }

    #[test]
    fn test_bounds() {
        let batch = Batch::new(vec![0, 2], vec![1, 1], vec![0, 3]).unwrap();
        assert!(batch.validate_bounds(3, 4).is_ok());
        let err = batch.validate_bounds(3, 3).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { what: "negative item", index: 3, bound: 3 }));
        let err = batch.validate_bounds(2, 4).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { what: "user", index: 2, .. }));
    }
}
