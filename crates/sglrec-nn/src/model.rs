//! The forward engine and its embedding cache.
//!
//! [`SglModel`] owns the learnable user/item tables, the normalized
//! adjacency, the semantic projector and the cached final embeddings. A
//! forward pass runs as follows:
//!
//! 1. inference fast path: not training and a cache is present → return it
//! 2. `E0 = [users; items]`, optionally node-dropped
//! 3. L layers of propagation, each over the shared (possibly edge-dropped)
//!    adjacency, or over a fresh per-layer dropout under `random_walk`
//! 4. `E = E0 + E1 + ... + EL`, cached and split back into users/items
//!
//! The cache is cleared whenever the model enters training mode or flips
//! between modes, so inference never sees embeddings computed from an
//! older parameter state.

use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use sglrec_graph::{Adjacency, LightGcn, Propagator};
use tracing::{debug, trace};

use crate::augment::Augmentor;
use crate::config::SglConfig;
use crate::error::{Error, Result};
use crate::projector::{xavier_uniform, SemanticProjector};
use crate::semantic::SemanticEmbeddings;

/// User and item embeddings produced by one forward pass.
#[derive(Debug, Clone)]
pub struct EmbeddingPair {
    /// (U, D)
    pub users: Tensor,
    /// (I, D)
    pub items: Tensor,
}

/// Self-supervised graph recommender with semantic distillation.
///
/// Generic over the propagation rule; [`LightGcn`] by default.
pub struct SglModel<P: Propagator = LightGcn> {
    pub(crate) config: SglConfig,
    pub(crate) user_count: usize,
    pub(crate) item_count: usize,
    pub(crate) adjacency: Adjacency,
    pub(crate) propagator: P,
    pub(crate) augmentor: Augmentor,
    pub(crate) varmap: VarMap,
    pub(crate) user_embeds: Tensor,
    pub(crate) item_embeds: Tensor,
    pub(crate) projector: SemanticProjector,
    pub(crate) semantic: SemanticEmbeddings,
    pub(crate) training: bool,
    final_embeds: Option<Tensor>,
    rng: XorShiftRng,
    pub(crate) device: Device,
}

impl SglModel<LightGcn> {
    /// Create a model that propagates with [`LightGcn`].
    ///
    /// User and item counts are taken from the semantic tables; the
    /// adjacency must cover exactly `user_count + item_count` nodes.
    pub fn new(
        config: SglConfig,
        adjacency: Adjacency,
        semantic: SemanticEmbeddings,
        device: &Device,
    ) -> Result<Self> {
        Self::with_propagator(config, adjacency, semantic, LightGcn, device)
    }
}

impl<P: Propagator> SglModel<P> {
    /// Create a model with a custom propagation rule.
    pub fn with_propagator(
        config: SglConfig,
        adjacency: Adjacency,
        semantic: SemanticEmbeddings,
        propagator: P,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;

        let user_count = semantic.user_count();
        let item_count = semantic.item_count();
        if user_count == 0 || item_count == 0 {
            return Err(Error::InvalidConfig("model needs at least one user and one item".into()));
        }
        if adjacency.num_nodes() != user_count + item_count {
            return Err(Error::ShapeMismatch {
                what: "adjacency node count",
                expected: user_count + item_count,
                got: adjacency.num_nodes(),
            });
        }

        let dim = config.embedding_dim;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        // xavier on a (rows, D) table: fan_in = D, fan_out = rows
        let user_embeds = vb.get_with_hints((user_count, dim), "user_embeds", xavier_uniform(dim, user_count))?;
        let item_embeds = vb.get_with_hints((item_count, dim), "item_embeds", xavier_uniform(dim, item_count))?;
        let projector = SemanticProjector::new(semantic.dim(), dim, vb.pp("projector"))?;

        debug!(
            users = user_count,
            items = item_count,
            edges = adjacency.nnz(),
            dim,
            layers = config.layer_num,
            augmentation = %config.augmentation,
            "initialized model"
        );

        Ok(Self {
            augmentor: Augmentor::new(config.augmentation),
            rng: XorShiftRng::seed_from_u64(config.seed),
            config,
            user_count,
            item_count,
            adjacency,
            propagator,
            varmap,
            user_embeds,
            item_embeds,
            projector,
            semantic,
            training: false,
            final_embeds: None,
            device: device.clone(),
        })
    }

    /// Switch between training and inference mode.
    ///
    /// Entering training mode, or any change of mode, drops the cached
    /// final embeddings. Re-asserting inference mode keeps them.
    pub fn set_training(&mut self, training: bool) {
        if (training || training != self.training) && self.final_embeds.take().is_some() {
            trace!(training, "embedding cache invalidated");
        }
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Run the propagation forward pass.
    ///
    /// # Arguments
    /// - `adjacency`: Graph to propagate over; `None` uses the model's own
    /// - `keep_rate`: Keep probability for the configured augmentation
    ///   (`1.0` gives the clean, deterministic view)
    pub fn forward(&mut self, adjacency: Option<&Adjacency>, keep_rate: f64) -> Result<EmbeddingPair> {
        if !self.training {
            if let Some(cached) = &self.final_embeds {
                trace!("embedding cache hit");
                return self.split(cached);
            }
        }

        let base = adjacency.unwrap_or(&self.adjacency);
        if base.num_nodes() != self.user_count + self.item_count {
            return Err(Error::ShapeMismatch {
                what: "adjacency node count",
                expected: self.user_count + self.item_count,
                got: base.num_nodes(),
            });
        }

        let embeds = Tensor::cat(&[&self.user_embeds, &self.item_embeds], 0)?;
        let embeds = self.augmentor.perturb_nodes(&embeds, keep_rate, &mut self.rng)?;
        let shared = self.augmentor.perturb_graph(base, keep_rate, &mut self.rng)?;

        let mut current = embeds.clone();
        let mut summed = embeds;
        for layer in 0..self.config.layer_num {
            let layer_adj = self.augmentor.layer_graph(&shared, keep_rate, &mut self.rng)?;
            current = self.propagator.propagate(&layer_adj, &current)?;
            summed = (summed + &current)?;
            trace!(layer, edges = layer_adj.nnz(), "propagated");
        }

        self.final_embeds = Some(summed.detach());
        self.split(&summed)
    }

    fn split(&self, embeds: &Tensor) -> Result<EmbeddingPair> {
        Ok(EmbeddingPair {
            users: embeds.narrow(0, 0, self.user_count)?,
            items: embeds.narrow(0, self.user_count, self.item_count)?,
        })
    }

    /// Score users against every item on the clean view.
    ///
    /// Runs in inference mode (leaving the model there). Entries where
    /// `train_mask` is 1 are pushed to `-1e8` so already-seen items sink
    /// to the bottom of any ranking.
    ///
    /// # Returns
    /// - Scores (users.len() x I)
    pub fn full_predict(&mut self, users: &[u32], train_mask: Option<&Tensor>) -> Result<Tensor> {
        for &u in users {
            if u as usize >= self.user_count {
                return Err(Error::IndexOutOfBounds { what: "user", index: u as usize, bound: self.user_count });
            }
        }
        self.set_training(false);
        let pair = self.forward(None, 1.0)?;

        let ids = Tensor::from_slice(users, users.len(), &self.device)?;
        let preds = pair.users.index_select(&ids, 0)?.matmul(&pair.items.t()?)?;
        let Some(mask) = train_mask else {
            return Ok(preds);
        };
        let (rows, cols) = mask.dims2()?;
        if rows != users.len() {
            return Err(Error::ShapeMismatch { what: "train mask rows", expected: users.len(), got: rows });
        }
        if cols != self.item_count {
            return Err(Error::ShapeMismatch { what: "train mask columns", expected: self.item_count, got: cols });
        }
        let mask = mask.to_dtype(preds.dtype())?;
        let kept = (preds * mask.affine(-1.0, 1.0)?)?;
        Ok((kept - mask.affine(1e8, 0.0)?)?)
    }

    /// Top-`k` items for `user`, skipping `exclude`.
    pub fn recommend(&mut self, user: u32, k: usize, exclude: &[u32]) -> Result<Vec<(u32, f32)>> {
        let scores = self.full_predict(&[user], None)?.squeeze(0)?.to_vec1::<f32>()?;
        let mut ranked: Vec<(u32, f32)> = scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s))
            .filter(|(i, _)| !exclude.contains(i))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// The cached final embeddings, split, if a forward pass has populated them.
    pub fn cached_embeddings(&self) -> Result<Option<EmbeddingPair>> {
        self.final_embeds.as_ref().map(|e| self.split(e)).transpose()
    }

    /// Every learnable variable: user/item tables and projector weights.
    pub fn parameters(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Save all learnable variables as safetensors.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Load learnable variables saved by [`save_weights`](Self::save_weights).
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path)?;
        self.final_embeds = None;
        Ok(())
    }

    pub fn config(&self) -> &SglConfig {
        &self.config
    }

    pub fn user_count(&self) -> usize {
        self.user_count
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    pub fn propagator(&self) -> &P {
        &self.propagator
    }

    pub fn projector(&self) -> &SemanticProjector {
        &self.projector
    }

    pub fn semantic(&self) -> &SemanticEmbeddings {
        &self.semantic
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Augmentation;

    fn tiny_model(augmentation: Augmentation, keep_rate: f64) -> SglModel {
        let device = Device::Cpu;
        let adj = Adjacency::from_interactions(4, 3, &[(0, 0), (0, 1), (1, 1), (2, 2), (3, 0), (3, 2)], &device)
            .unwrap();
        let users = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]; 4];
        let items = vec![vec![0.6, 0.5, 0.4, 0.3, 0.2, 0.1]; 3];
        let sem = SemanticEmbeddings::from_rows(&users, &items, &device).unwrap();
        let config = SglConfig::default()
            .with_embedding_dim(8)
            .with_layer_num(2)
            .with_augmentation(augmentation)
            .with_keep_rate(keep_rate);
        SglModel::new(config, adj, sem, &device).unwrap()
    }

    fn values(t: &Tensor) -> Vec<Vec<f32>> {
        t.to_vec2::<f32>().unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let mut model = tiny_model(Augmentation::EdgeDrop, 0.5);
        let pair = model.forward(None, 1.0).unwrap();
        assert_eq!(pair.users.dims(), &[4, 8]);
        assert_eq!(pair.items.dims(), &[3, 8]);
        assert_eq!(model.parameters().len(), 6);
    }

    #[test]
    fn test_clean_forward_matches_layer_sum() {
        let mut model = tiny_model(Augmentation::None, 1.0);
        model.set_training(true);
        let pair = model.forward(None, 1.0).unwrap();

        let e0 = Tensor::cat(&[&model.user_embeds, &model.item_embeds], 0).unwrap();
        let expected = LightGcn.propagate_layers(&model.adjacency, &e0, 2).unwrap();
        let got = Tensor::cat(&[&pair.users, &pair.items], 0).unwrap();
        for (a, b) in values(&got).iter().flatten().zip(values(&expected).iter().flatten()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_inference_cache_hit() {
        let mut model = tiny_model(Augmentation::NodeDrop, 0.5);
        assert!(model.cached_embeddings().unwrap().is_none());

        let first = model.forward(None, 0.5).unwrap();
        let second = model.forward(None, 0.5).unwrap();
        assert_eq!(values(&first.users), values(&second.users));
        assert_eq!(values(&first.items), values(&second.items));
    }

    #[test]
    fn test_training_mode_bypasses_and_clears_cache() {
        let mut model = tiny_model(Augmentation::NodeDrop, 0.5);
        model.forward(None, 1.0).unwrap();
        assert!(model.cached_embeddings().unwrap().is_some());

        model.set_training(true);
        assert!(model.cached_embeddings().unwrap().is_none());

        // training forwards always recompute, so stochastic views differ
        let first = values(&model.forward(None, 0.5).unwrap().users);
        let differs = (0..6).any(|_| values(&model.forward(None, 0.5).unwrap().users) != first);
        assert!(differs);

        model.set_training(false);
        assert!(model.cached_embeddings().unwrap().is_none());
    }

    #[test]
    fn test_reasserting_inference_keeps_cache() {
        let mut model = tiny_model(Augmentation::None, 1.0);
        model.forward(None, 1.0).unwrap();
        model.set_training(false);
        assert!(model.cached_embeddings().unwrap().is_some());
    }

    #[test]
    fn test_full_predict_masks_seen_items() {
        let mut model = tiny_model(Augmentation::EdgeDrop, 0.5);
        let mask = Tensor::new(&[[1f32, 0.0, 0.0], [0.0, 0.0, 1.0]], &Device::Cpu).unwrap();
        let scores = values(&model.full_predict(&[0, 2], Some(&mask)).unwrap());
        assert!(scores[0][0] < -1e7);
        assert!(scores[1][2] < -1e7);
        assert!(scores[0][1] > -1e7);
        assert!(!model.is_training());
    }

    #[test]
    fn test_full_predict_rejects_unknown_user() {
        let mut model = tiny_model(Augmentation::None, 1.0);
        let err = model.full_predict(&[9], None).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { what: "user", index: 9, .. }));
    }

    #[test]
    fn test_recommend_excludes_and_sorts() {
        let mut model = tiny_model(Augmentation::None, 1.0);
        let recs = model.recommend(1, 2, &[1]).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|(item, _)| *item != 1));
        assert!(recs[0].1 >= recs[1].1);
    }

    #[test]
    fn test_one_projector_serves_both_tables() {
        let device = Device::Cpu;
        let adj = Adjacency::from_interactions(2, 2, &[(0, 0), (1, 1)], &device).unwrap();
        let shared = vec![0.4f32, -1.2, 0.7, 2.0];
        let users = vec![shared.clone(), vec![1.0, 0.0, 0.0, 0.0]];
        let items = vec![vec![0.0, 0.0, 1.0, 0.0], shared];
        let sem = SemanticEmbeddings::from_rows(&users, &items, &device).unwrap();
        let model = SglModel::new(SglConfig::default().with_embedding_dim(6), adj, sem, &device).unwrap();

        let projected_users = values(&model.projector().project(model.semantic().users()).unwrap());
        let projected_items = values(&model.projector().project(model.semantic().items()).unwrap());
        for (a, b) in projected_users[0].iter().zip(&projected_items[1]) {
            assert!((a - b).abs() < 1e-6);
        }

        let data = model.varmap().data().lock().unwrap();
        let mut names: Vec<&str> = data.keys().map(String::as_str).filter(|k| k.starts_with("projector.")).collect();
        names.sort();
        assert_eq!(
            names,
            ["projector.hidden.bias", "projector.hidden.weight", "projector.output.bias", "projector.output.weight"]
        );
    }

    #[test]
    fn test_adjacency_size_checked() {
        let device = Device::Cpu;
        let adj = Adjacency::from_interactions(2, 2, &[(0, 0)], &device).unwrap();
        let sem = SemanticEmbeddings::from_rows(&vec![vec![1.0]; 3], &vec![vec![1.0]; 2], &device).unwrap();
        let err = SglModel::new(SglConfig::default(), adj, sem, &device).err().unwrap();
        assert!(matches!(err, Error::ShapeMismatch { what: "adjacency node count", expected: 5, got: 4 }));
    }

    #[test]
    fn test_save_and_load_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");

        let mut model = tiny_model(Augmentation::None, 1.0);
        let before = values(&model.forward(None, 1.0).unwrap().users);
        model.save_weights(&path).unwrap();

        let mut other = tiny_model(Augmentation::None, 1.0);
        other.load_weights(&path).unwrap();
        let after = values(&other.forward(None, 1.0).unwrap().users);
        assert_eq!(before, after);
    }
}
