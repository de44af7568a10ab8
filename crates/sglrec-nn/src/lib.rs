//! Self-supervised graph recommender with semantic knowledge distillation.
//!
//! `sglrec-nn` learns user and item embeddings by LightGCN-style propagation
//! over the bipartite interaction graph ([`sglrec_graph`]). Training adds
//! two auxiliary signals to the BPR ranking loss:
//!
//! - a contrastive (InfoNCE) loss between two stochastically augmented views
//! - a distillation loss that aligns the clean view with externally supplied
//!   semantic embeddings, projected into the model's embedding space
//!
//! # Modules
//!
//! - [`config`]: Hyperparameters and the [`Augmentation`] policy
//! - [`augment`]: Where each policy perturbs the forward pass
//! - [`model`]: The forward engine and its inference cache
//! - [`composer`]: The four-term training loss
//! - [`projector`]: Semantic → embedding projection MLP
//! - [`loss`]: BPR, InfoNCE and L2 primitives
//! - [`sampler`], [`trainer`]: Triple sampling and the AdamW loop
//!
//! # Example
//!
//! ```rust,ignore
//! use sglrec_graph::Adjacency;
//! use sglrec_nn::{Batch, SemanticEmbeddings, SglConfig, SglModel};
//! use candle_core::Device;
//!
//! let device = Device::Cpu;
//! let adj = Adjacency::from_interactions(3, 2, &[(0, 0), (1, 1), (2, 0)], &device)?;
//! let semantic = SemanticEmbeddings::from_rows(&user_profiles, &item_profiles, &device)?;
//! let mut model = SglModel::new(SglConfig::default(), adj, semantic, &device)?;
//!
//! let batch = Batch::new(vec![0, 1], vec![0, 1], vec![1, 0])?;
//! let (loss, breakdown) = model.compute_loss(&batch)?;
//! println!("{:?}", breakdown.to_map());
//!
//! model.set_training(false);
//! let embeddings = model.forward(None, 1.0)?;  // users (3, D), items (2, D)
//! ```

pub mod augment;
pub mod batch;
pub mod composer;
pub mod config;
pub mod error;
pub mod loss;
pub mod model;
pub mod projector;
pub mod sampler;
pub mod semantic;
pub mod trainer;

pub use augment::Augmentor;
pub use batch::Batch;
pub use config::{Augmentation, SglConfig};
pub use error::{Error, Result};
pub use loss::LossBreakdown;
pub use model::{EmbeddingPair, SglModel};
pub use projector::SemanticProjector;
pub use sampler::PairwiseSampler;
pub use semantic::SemanticEmbeddings;
pub use trainer::{Trainer, TrainerConfig, TrainingReport};
