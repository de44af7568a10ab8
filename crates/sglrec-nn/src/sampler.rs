//! Uniform pairwise sampling of training triples.
//!
//! Each epoch visits every observed `(user, item)` interaction once, in a
//! shuffled order, and pairs it with a negative item drawn uniformly from
//! the items that user has not interacted with.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::batch::Batch;
use crate::error::{Error, Result};

/// Produces shuffled epochs of [`Batch`]es from observed interactions.
#[derive(Debug, Clone)]
pub struct PairwiseSampler {
    user_count: usize,
    item_count: usize,
    interactions: Vec<(u32, u32)>,
    seen: Vec<HashSet<u32>>,
    rng: XorShiftRng,
}

impl PairwiseSampler {
    /// Create a sampler over deduplicated interactions.
    ///
    /// Fails if an id is out of range or a user has interacted with every
    /// item, since no negative could be drawn for them.
    pub fn new(user_count: usize, item_count: usize, interactions: &[(usize, usize)], seed: u64) -> Result<Self> {
        let mut seen = vec![HashSet::new(); user_count];
        let mut pairs = Vec::with_capacity(interactions.len());
        for &(u, i) in interactions {
            if u >= user_count {
                return Err(Error::IndexOutOfBounds { what: "user", index: u, bound: user_count });
            }
            if i >= item_count {
                return Err(Error::IndexOutOfBounds { what: "item", index: i, bound: item_count });
            }
            if seen[u].insert(i as u32) {
                pairs.push((u as u32, i as u32));
            }
        }
        if let Some(user) = seen.iter().position(|s| s.len() == item_count) {
            return Err(Error::InvalidConfig(format!(
                "user {user} has interacted with every item; no negative can be sampled"
            )));
        }
        Ok(Self {
            user_count,
            item_count,
            interactions: pairs,
            seen,
            rng: XorShiftRng::seed_from_u64(seed),
        })
    }

    /// Number of distinct interactions per epoch.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user_count
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Whether `user` has an observed interaction with `item`.
    pub fn has_interaction(&self, user: u32, item: u32) -> bool {
        self.seen.get(user as usize).is_some_and(|s| s.contains(&item))
    }

    /// One shuffled pass over the interactions, chunked into batches of at
    /// most `batch_size` triples.
    pub fn epoch(&mut self, batch_size: usize) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        let mut order = self.interactions.clone();
        order.shuffle(&mut self.rng);

        let mut batches = Vec::with_capacity(order.len().div_ceil(batch_size));
        for chunk in order.chunks(batch_size) {
            let mut anchors = Vec::with_capacity(chunk.len());
            let mut positives = Vec::with_capacity(chunk.len());
            let mut negatives = Vec::with_capacity(chunk.len());
            for &(u, i) in chunk {
                anchors.push(u);
                positives.push(i);
                negatives.push(self.sample_negative(u));
            }
            batches.push(Batch::new(anchors, positives, negatives)?);
        }
        Ok(batches)
    }

    fn sample_negative(&mut self, user: u32) -> u32 {
        let seen = &self.seen[user as usize];
        loop {
            let candidate = self.rng.random_range(0..self.item_count as u32);
            if !seen.contains(&candidate) {
                return candidate;
            }
        }
    }
}
