//! Loss primitives.
//!
//! All functions return *sums* over the batch; callers divide by the batch
//! size so every term is normalized the same way.
//!
//! ## BPR
//!
//! Bayesian Personalized Ranking pushes an observed item above an
//! unobserved one for the same user:
//!
//! ```text
//! L_bpr = Σ_i softplus(a_i·n_i − a_i·p_i) = −Σ_i log σ(a_i·p_i − a_i·n_i)
//! ```
//!
//! ## InfoNCE
//!
//! With rows L2-normalized (`x̂ = x / sqrt(ε + ||x||²)`, ε = 1e-8):
//!
//! ```text
//! L = Σ_i [ −(x̂_i·ŷ_i)/τ + log Σ_j exp(x̂_i·ẑ_j / τ) ]
//! ```
//!
//! where `y_i` is the positive for `x_i` and `z` is the candidate pool.
//! When `y_i` is itself a row of the pool the term is a cross-entropy and
//! therefore non-negative.
//!
//! The temperature τ sets how sharply the softmax separates candidates;
//! low τ (≈0.1–0.2) concentrates gradient on the hardest negatives.
//!
//! # References
//!
//! - Rendle et al. (2009). "BPR: Bayesian Personalized Ranking from Implicit Feedback."
//! - van den Oord et al. (2018). "Representation Learning with Contrastive Predictive Coding."
//! - Wu et al. (2021). "Self-supervised Graph Learning for Recommendation."

use std::collections::BTreeMap;

use candle_core::{DType, Device, Tensor, Var};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const NORM_EPS: f64 = 1e-8;

/// `softplus(x) = log(1 + exp(x))`, computed as `relu(x) + log(1 + exp(−|x|))`.
pub fn softplus(x: &Tensor) -> Result<Tensor> {
    let tail = x.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    Ok((x.relu()? + tail)?)
}

/// Row-wise `x / sqrt(ε + ||x||²)`.
pub fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(1)?.affine(1.0, NORM_EPS)?.sqrt()?;
    Ok(x.broadcast_div(&norm)?)
}

/// Summed BPR loss over aligned `(B, D)` anchor/positive/negative rows.
pub fn bpr_loss(anchors: &Tensor, positives: &Tensor, negatives: &Tensor) -> Result<Tensor> {
    let pos_scores = (anchors * positives)?.sum(1)?;
    let neg_scores = (anchors * negatives)?.sum(1)?;
    Ok(softplus(&(neg_scores - pos_scores)?)?.sum_all()?)
}

/// Summed InfoNCE loss of `embeds1[i]` against positive `embeds2[i]` and
/// the candidate pool `pool`.
///
/// # Arguments
/// - `embeds1`: Queries (B x D)
/// - `embeds2`: Positives (B x D)
/// - `pool`: Candidates (M x D)
/// - `temperature`: Softmax temperature τ > 0
pub fn info_nce_loss(embeds1: &Tensor, embeds2: &Tensor, pool: &Tensor, temperature: f64) -> Result<Tensor> {
    let q = l2_normalize(embeds1)?;
    let k = l2_normalize(embeds2)?;
    let c = l2_normalize(pool)?;

    let numerator = (&q * &k)?.affine(1.0 / temperature, 0.0)?.sum(1)?.neg()?;
    let logits = q.matmul(&c.t()?)?.affine(1.0 / temperature, 0.0)?;
    let denominator = log_sum_exp(&logits)?;
    Ok((numerator + denominator)?.sum_all()?)
}

/// Row-wise `log Σ_j exp(x_ij)`, shifted by the row max so small
/// temperatures stay finite.
fn log_sum_exp(logits: &Tensor) -> Result<Tensor> {
    let max = logits.max_keepdim(1)?.detach();
    let shifted = logits.broadcast_sub(&max)?.exp()?.sum_keepdim(1)?.log()?;
    Ok((shifted + max)?.squeeze(1)?)
}

/// `Σ_params ||W||²` over every variable.
pub fn squared_l2(params: &[Var], device: &Device) -> Result<Tensor> {
    let mut total = Tensor::zeros((), DType::F32, device)?;
    for param in params {
        total = (total + param.as_tensor().sqr()?.sum_all()?)?;
    }
    Ok(total)
}

/// Per-term scalar values of one loss computation.
///
/// The composed training loss is `((bpr + reg) + cl) + kd`; [`total`]
/// adds in the same order, so it reproduces the scalar exactly.
///
/// [`total`]: LossBreakdown::total
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossBreakdown {
    /// Normalized BPR ranking loss on the clean view.
    pub bpr_loss: f32,
    /// Weighted parameter regularization.
    pub reg_loss: f32,
    /// Weighted, normalized contrastive loss between the two augmented views.
    pub cl_loss: f32,
    /// Weighted, normalized semantic distillation loss.
    pub kd_loss: f32,
}

impl LossBreakdown {
    pub fn total(&self) -> f32 {
        self.bpr_loss + self.reg_loss + self.cl_loss + self.kd_loss
    }

    /// Name → value view for logging.
    pub fn to_map(&self) -> BTreeMap<&'static str, f32> {
        BTreeMap::from([
            ("bpr_loss", self.bpr_loss),
            ("reg_loss", self.reg_loss),
            ("cl_loss", self.cl_loss),
            ("kd_loss", self.kd_loss),
        ])
    }

    /// Element-wise mean. Empty input gives all zeros.
    pub fn mean(items: &[LossBreakdown]) -> LossBreakdown {
        if items.is_empty() {
            return LossBreakdown::default();
        }
        let n = items.len() as f32;
        let sum = items.iter().fold(LossBreakdown::default(), |acc, b| LossBreakdown {
            bpr_loss: acc.bpr_loss + b.bpr_loss,
            reg_loss: acc.reg_loss + b.reg_loss,
            cl_loss: acc.cl_loss + b.cl_loss,
            kd_loss: acc.kd_loss + b.kd_loss,
        });
        LossBreakdown {
            bpr_loss: sum.bpr_loss / n,
            reg_loss: sum.reg_loss / n,
            cl_loss: sum.cl_loss / n,
            kd_loss: sum.kd_loss / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(t: &Tensor) -> f32 {
        t.to_scalar::<f32>().unwrap()
    }

    fn make_vecs(n: usize, d: usize, phase: f32) -> Tensor {
        let data: Vec<f32> = (0..n * d).map(|i| (i as f32 * 0.37 + phase).sin()).collect();
        Tensor::from_vec(data, (n, d), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_softplus_matches_reference() {
        let x = Tensor::new(&[-30f32, -1.0, 0.0, 1.0, 30.0], &Device::Cpu).unwrap();
        let y = softplus(&x).unwrap().to_vec1::<f32>().unwrap();
        let expected: Vec<f32> = [-30f32, -1.0, 0.0, 1.0, 30.0]
            .iter()
            .map(|&v| (1.0 + v.exp()).ln())
            .collect();
        for (a, b) in y.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_bpr_prefers_positive() {
        let device = Device::Cpu;
        let anc = Tensor::new(&[[1f32, 0.0]], &device).unwrap();
        let good = Tensor::new(&[[3f32, 0.0]], &device).unwrap();
        let bad = Tensor::new(&[[-3f32, 0.0]], &device).unwrap();

        let low = scalar(&bpr_loss(&anc, &good, &bad).unwrap());
        let high = scalar(&bpr_loss(&anc, &bad, &good).unwrap());
        assert!(low < high);
        assert!((low - (1.0 + (-6f32).exp()).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_info_nce_non_negative_when_positive_in_pool() {
        let x = make_vecs(6, 8, 0.0);
        let y = make_vecs(6, 8, 1.3);
        let loss = scalar(&info_nce_loss(&x, &y, &y, 0.2).unwrap());
        assert!(loss >= 0.0, "InfoNCE should be >= 0, got {loss}");
    }

    #[test]
    fn test_info_nce_aligned_views_score_lower() {
        let device = Device::Cpu;
        let x = Tensor::eye(4, DType::F32, &device).unwrap();
        // each row's positive is a different basis vector
        let shifted = Tensor::cat(&[x.narrow(0, 1, 3).unwrap(), x.narrow(0, 0, 1).unwrap()], 0).unwrap();

        let aligned = scalar(&info_nce_loss(&x, &x, &x, 0.2).unwrap());
        let misaligned = scalar(&info_nce_loss(&x, &shifted, &shifted, 0.2).unwrap());
        assert!(aligned < 0.2, "aligned loss {aligned}");
        assert!(misaligned > 4.0 * 4.0, "misaligned loss {misaligned}");
    }

    #[test]
    fn test_info_nce_finite_at_low_temperature() {
        let device = Device::Cpu;
        let x = Tensor::eye(2, DType::F32, &device).unwrap();
        let loss = scalar(&info_nce_loss(&x, &x, &x, 0.01).unwrap());
        assert!(loss.is_finite(), "loss {loss}");
        // exp(-100) terms vanish, leaving zero
        assert!(loss.abs() < 1e-4, "loss {loss}");

        let y = make_vecs(5, 4, 0.3);
        let z = make_vecs(5, 4, 2.1);
        let loss = info_nce_loss(&y, &z, &z, 0.005).unwrap();
        assert!(scalar(&loss).is_finite());
    }

    #[test]
    fn test_info_nce_matches_naive_form() {
        let x = make_vecs(4, 3, 0.1);
        let y = make_vecs(4, 3, 0.8);
        let temp = 0.5;
        let got = scalar(&info_nce_loss(&x, &y, &y, temp).unwrap());

        let q = l2_normalize(&x).unwrap().to_vec2::<f32>().unwrap();
        let k = l2_normalize(&y).unwrap().to_vec2::<f32>().unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(u, v)| u * v).sum::<f32>();
        let expected: f32 = (0..4)
            .map(|i| {
                let lse = k.iter().map(|kj| (dot(&q[i], kj) / temp as f32).exp()).sum::<f32>().ln();
                -dot(&q[i], &k[i]) / temp as f32 + lse
            })
            .sum();
        assert!((got - expected).abs() < 1e-4, "{got} vs {expected}");
    }

    #[test]
    fn test_info_nce_scale_invariant() {
        let x = make_vecs(3, 4, 0.5);
        let y = make_vecs(3, 4, 0.9);
        let a = scalar(&info_nce_loss(&x, &y, &y, 0.5).unwrap());
        let b = scalar(&info_nce_loss(&(&x * 10.0).unwrap(), &y, &y, 0.5).unwrap());
        assert!((a - b).abs() < 1e-4);
    }

    #[test]
    fn test_squared_l2() {
        let device = Device::Cpu;
        let a = Var::from_tensor(&Tensor::new(&[3f32, 4.0], &device).unwrap()).unwrap();
        let b = Var::from_tensor(&Tensor::new(&[[1f32, 1.0], [1.0, 1.0]], &device).unwrap()).unwrap();
        let reg = scalar(&squared_l2(&[a, b], &device).unwrap());
        assert!((reg - 29.0).abs() < 1e-6);
        assert_eq!(scalar(&squared_l2(&[], &device).unwrap()), 0.0);
    }

    #[test]
    fn test_breakdown_map_and_mean() {
        let a = LossBreakdown { bpr_loss: 1.0, reg_loss: 0.0, cl_loss: 2.0, kd_loss: 4.0 };
        let b = LossBreakdown { bpr_loss: 3.0, reg_loss: 2.0, cl_loss: 0.0, kd_loss: 0.0 };
        let m = LossBreakdown::mean(&[a, b]);
        assert_eq!(m, LossBreakdown { bpr_loss: 2.0, reg_loss: 1.0, cl_loss: 1.0, kd_loss: 2.0 });

        let map = a.to_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map["kd_loss"], 4.0);
        assert_eq!(a.total(), 7.0);
    }
}
