//! One federation round: local training epochs, canonical pack, role-based
//! exchange over the link, then the two-way averaging merge.

use std::num::NonZeroUsize;

use link::{Initiator, LinkConfig, LinkHandle, Responder};
use log::{debug, info};
use mlp::{Model, codec};

use crate::{Dataset, FederationErr, Result};

/// Who drives the exchange. The merge arithmetic is symmetric; connection
/// and chunk timing are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connects, releases the barrier and paces every chunk.
    Initiator,
    /// Advertises, waits at the barrier and drains arrivals.
    Responder,
}

/// What one round did.
#[derive(Debug, Clone, Copy)]
pub struct RoundStats {
    /// Training examples visited across all local epochs.
    pub samples: usize,
    /// Mean training cross-entropy over those examples.
    pub mean_loss: f32,
}

/// One node's federation state: the model plus the two transfer buffers,
/// sized once and reused every round.
pub struct Federation {
    model: Model,
    local: Vec<f32>,
    remote: Vec<f32>,
    link_cfg: LinkConfig,
    local_epochs: NonZeroUsize,
}

impl Federation {
    /// Creates a node around an initialized model.
    ///
    /// # Arguments
    /// * `model` - The local model; mutated in place by every round.
    /// * `link_cfg` - Transfer protocol tunables.
    /// * `local_epochs` - Dataset sweeps per round before the exchange.
    pub fn new(model: Model, link_cfg: LinkConfig, local_epochs: NonZeroUsize) -> Self {
        let num_params = model.num_params();
        Self {
            model,
            local: Vec::with_capacity(num_params),
            remote: vec![0.0; num_params],
            link_cfg,
            local_epochs,
        }
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[inline]
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Runs one full round on `link`.
    ///
    /// Training, packing, the exchange and the merge all operate on the one
    /// parameter arena; this method sequences them strictly, which is what
    /// makes the shared arena safe without locking.
    ///
    /// # Returns
    /// Round statistics, or the first error hit. Errors are transient at
    /// this level: the caller may retry the whole round.
    pub async fn run_round<L: LinkHandle>(
        &mut self,
        role: Role,
        link: &mut L,
        data: &Dataset,
    ) -> Result<RoundStats> {
        if data.is_empty() {
            return Err(FederationErr::EmptyDataset);
        }

        let mut loss_sum = 0.0;
        let mut samples = 0usize;

        for epoch in 0..self.local_epochs.get() {
            for (input, label) in data.iter() {
                self.model.train_one(input, label)?;
                loss_sum += self.model.cross_entropy(label)?;
                samples += 1;
            }
            debug!(epoch = epoch; "local epoch finished");
        }

        let packed = codec::pack(&self.model, &mut self.local);
        debug!(params = packed; "parameters packed for exchange");

        match role {
            Role::Initiator => {
                let mut session = Initiator::new(link, &self.link_cfg);
                session.signal_start().await?;
                session.send(&self.local).await?;
                session.recv(&mut self.remote).await?;
            }
            Role::Responder => {
                let mut session = Responder::new(link, &self.link_cfg);
                session.wait_start().await?;
                session.recv(&mut self.remote).await?;
                // The pre-merge parameters travel back; both sides then
                // compute the same mean.
                session.send(&self.local).await?;
            }
        }

        codec::average(&mut self.remote, &mut self.model)?;

        let mean_loss = loss_sum / samples as f32;
        info!(samples = samples, mean_loss = mean_loss; "round merged");
        Ok(RoundStats { samples, mean_loss })
    }

    /// Fraction of `data` the current model classifies correctly.
    pub fn evaluate(&mut self, data: &Dataset) -> Result<f32> {
        if data.is_empty() {
            return Err(FederationErr::EmptyDataset);
        }

        let mut correct = 0usize;
        for (input, label) in data.iter() {
            if self.model.predict(input)? == label {
                correct += 1;
            }
        }
        Ok(correct as f32 / data.len() as f32)
    }
}
