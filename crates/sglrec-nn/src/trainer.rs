//! Optimization loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use sglrec_nn::{PairwiseSampler, Trainer, TrainerConfig};
//!
//! let mut sampler = PairwiseSampler::new(users, items, &interactions, 7)?;
//! let mut trainer = Trainer::new(TrainerConfig::default().with_epochs(20), &model)?;
//! let report = trainer.fit(&mut model, &mut sampler)?;
//! println!("final loss {:?}", report.final_loss());
//! ```

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use serde::{Deserialize, Serialize};
use sglrec_graph::Propagator;
use tracing::{debug, info};

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::loss::LossBreakdown;
use crate::model::SglModel;
use crate::sampler::PairwiseSampler;

/// Optimizer and schedule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of epochs (default: 10).
    pub epochs: usize,
    /// Triples per batch (default: 1024).
    pub batch_size: usize,
    /// AdamW learning rate (default: 0.001).
    pub learning_rate: f64,
    /// AdamW decoupled weight decay (default: 0.0; the loss already
    /// carries an explicit L2 term).
    pub weight_decay: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 1024,
            learning_rate: 1e-3,
            weight_decay: 0.0,
        }
    }
}

impl TrainerConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Mean loss breakdown per epoch.
    pub epoch_losses: Vec<LossBreakdown>,
    /// Optimizer steps taken.
    pub steps: usize,
}

impl TrainingReport {
    /// Mean total loss of the last epoch.
    pub fn final_loss(&self) -> Option<f32> {
        self.epoch_losses.last().map(LossBreakdown::total)
    }
}

/// Drives [`SglModel::compute_loss`] with an AdamW optimizer.
pub struct Trainer {
    config: TrainerConfig,
    optimizer: AdamW,
}

impl Trainer {
    /// Create a trainer over every learnable variable of `model`.
    pub fn new<P: Propagator>(config: TrainerConfig, model: &SglModel<P>) -> Result<Self> {
        config.validate()?;
        let params = ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: config.weight_decay,
            ..Default::default()
        };
        let optimizer = AdamW::new(model.parameters(), params)?;
        Ok(Self { config, optimizer })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// One gradient step on `batch`.
    pub fn step<P: Propagator>(&mut self, model: &mut SglModel<P>, batch: &Batch) -> Result<LossBreakdown> {
        let (loss, breakdown) = model.compute_loss(batch)?;
        self.optimizer.backward_step(&loss)?;
        Ok(breakdown)
    }

    /// Train for the configured number of epochs.
    ///
    /// The model is left in inference mode, so the next forward pass
    /// recomputes and caches embeddings from the trained parameters.
    pub fn fit<P: Propagator>(
        &mut self,
        model: &mut SglModel<P>,
        sampler: &mut PairwiseSampler,
    ) -> Result<TrainingReport> {
        if sampler.user_count() != model.user_count() || sampler.item_count() != model.item_count() {
            return Err(Error::ShapeMismatch {
                what: "sampler user/item count",
                expected: model.user_count() + model.item_count(),
                got: sampler.user_count() + sampler.item_count(),
            });
        }

        let mut report = TrainingReport::default();
        for epoch in 0..self.config.epochs {
            let batches = sampler.epoch(self.config.batch_size)?;
            let mut losses = Vec::with_capacity(batches.len());
            for batch in &batches {
                let breakdown = self.step(model, batch)?;
                debug!(epoch, step = report.steps, total = breakdown.total(), "step");
                losses.push(breakdown);
                report.steps += 1;
            }
            let mean = LossBreakdown::mean(&losses);
            info!(
                epoch,
                batches = batches.len(),
                loss = mean.total(),
                bpr = mean.bpr_loss,
                cl = mean.cl_loss,
                kd = mean.kd_loss,
                "epoch finished"
            );
            report.epoch_losses.push(mean);
        }

        model.set_training(false);
        Ok(report)
    }
}
