//! Training loss composition.
//!
//! One call to [`SglModel::compute_loss`] runs three forward passes:
//!
//! - views 1 and 2 at the configured keep rate (contrastive pair)
//! - view 3 at keep rate 1.0 (clean view for ranking and distillation)
//!
//! and combines four terms:
//!
//! ```text
//! bpr = BPR(anc3, pos3, neg3) / B
//! cl  = w_cl · [NCE(anc1, anc2, U2) + NCE(pos1, pos2, I2) + NCE(neg1, neg2, I2)] / B
//! kd  = w_kd · [NCE(anc3, ancP, UP) + NCE(pos3, posP, posP) + NCE(neg3, negP, negP)] / B
//! reg = w_reg · Σ ||W||²
//! total = ((bpr + reg) + cl) + kd
//! ```
//!
//! `P` marks rows of the projected semantic tables. For the anchor
//! distillation term the candidate pool is the whole projected user
//! table; for positives and negatives it is the gathered projected rows.

use candle_core::Tensor;
use sglrec_graph::Propagator;
use tracing::debug;

use crate::batch::Batch;
use crate::error::Result;
use crate::loss::{bpr_loss, info_nce_loss, squared_l2, LossBreakdown};
use crate::model::{EmbeddingPair, SglModel};

struct Gathered {
    anchors: Tensor,
    positives: Tensor,
    negatives: Tensor,
}

fn gather(users: &Tensor, items: &Tensor, ids: &(Tensor, Tensor, Tensor)) -> Result<Gathered> {
    Ok(Gathered {
        anchors: users.index_select(&ids.0, 0)?,
        positives: items.index_select(&ids.1, 0)?,
        negatives: items.index_select(&ids.2, 0)?,
    })
}

fn scalar(t: &Tensor) -> Result<f32> {
    Ok(t.to_scalar::<f32>()?)
}

impl<P: Propagator> SglModel<P> {
    /// Compute the weighted training loss for one batch.
    ///
    /// Puts the model in training mode, which drops any cached inference
    /// embeddings.
    ///
    /// # Returns
    /// - The scalar loss, differentiable w.r.t. every learnable variable
    /// - Its per-term breakdown; `breakdown.total()` equals the scalar
    pub fn compute_loss(&mut self, batch: &Batch) -> Result<(Tensor, LossBreakdown)> {
        batch.validate_bounds(self.user_count, self.item_count)?;
        self.set_training(true);

        let keep_rate = self.config.keep_rate;
        let view1 = self.forward(None, keep_rate)?;
        let view2 = self.forward(None, keep_rate)?;
        let view3 = self.forward(None, 1.0)?;

        let ids = batch.index_tensors(&self.device)?;
        let v1 = gather(&view1.users, &view1.items, &ids)?;
        let v2 = gather(&view2.users, &view2.items, &ids)?;
        let v3 = gather(&view3.users, &view3.items, &ids)?;

        let projected = EmbeddingPair {
            users: self.projector.project(self.semantic.users())?,
            items: self.projector.project(self.semantic.items())?,
        };
        let vp = gather(&projected.users, &projected.items, &ids)?;

        let batch_size = batch.len() as f64;
        let cfg = &self.config;

        let bpr = bpr_loss(&v3.anchors, &v3.positives, &v3.negatives)?.affine(1.0 / batch_size, 0.0)?;

        let cl_temp = cfg.cl_temperature;
        let cl = ((info_nce_loss(&v1.anchors, &v2.anchors, &view2.users, cl_temp)?
            + info_nce_loss(&v1.positives, &v2.positives, &view2.items, cl_temp)?)?
            + info_nce_loss(&v1.negatives, &v2.negatives, &view2.items, cl_temp)?)?
            .affine(cfg.cl_weight / batch_size, 0.0)?;

        let kd_temp = cfg.kd_temperature;
        let kd = ((info_nce_loss(&v3.anchors, &vp.anchors, &projected.users, kd_temp)?
            + info_nce_loss(&v3.positives, &vp.positives, &vp.positives, kd_temp)?)?
            + info_nce_loss(&v3.negatives, &vp.negatives, &vp.negatives, kd_temp)?)?
            .affine(cfg.kd_weight / batch_size, 0.0)?;

        let reg = squared_l2(&self.varmap.all_vars(), &self.device)?.affine(cfg.reg_weight, 0.0)?;

        let total = (((&bpr + &reg)? + &cl)? + &kd)?;
        let breakdown = LossBreakdown {
            bpr_loss: scalar(&bpr)?,
            reg_loss: scalar(&reg)?,
            cl_loss: scalar(&cl)?,
            kd_loss: scalar(&kd)?,
        };
        debug!(
            batch = batch.len(),
            bpr = breakdown.bpr_loss,
            reg = breakdown.reg_loss,
            cl = breakdown.cl_loss,
            kd = breakdown.kd_loss,
            "loss computed"
        );
        Ok((total, breakdown))
    }
}
