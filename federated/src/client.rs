use std::{num::NonZeroUsize, sync::Arc};

use log::debug;
use machine_learning::{
    MlErr,
    arch::{Model, loss::CrossEntropy},
    dataset::Dataset,
    optimization::Adam,
    params::ParameterState,
    training::ModelTrainer,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{FederatedErr, Result};

/// The compute target of a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
}

/// The hyperparameters of a client's local training.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTraining {
    epochs: NonZeroUsize,
    learning_rate: f32,
    batch_size: NonZeroUsize,
}

impl LocalTraining {
    /// Creates a new `LocalTraining`.
    ///
    /// # Arguments
    /// * `epochs` - The amount of passes over the shard per round.
    /// * `learning_rate` - The learning rate of the optimizer.
    /// * `batch_size` - The maximum amount of samples per optimizer step.
    ///
    /// # Returns
    /// The hyperparameters or a `FederatedErr::Configuration` if any of them is invalid.
    pub fn new(epochs: usize, learning_rate: f32, batch_size: usize) -> Result<Self> {
        let invalid = |what: &str| FederatedErr::Configuration(format!("{what} must be positive"));

        let epochs = NonZeroUsize::new(epochs).ok_or_else(|| invalid("local epochs"))?;
        let batch_size = NonZeroUsize::new(batch_size).ok_or_else(|| invalid("the batch size"))?;

        if !(learning_rate.is_finite() && learning_rate > 0.) {
            return Err(invalid("the learning rate"));
        }

        Ok(Self {
            epochs,
            learning_rate,
            batch_size,
        })
    }

    pub fn epochs(&self) -> usize {
        self.epochs.get()
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }
}

/// The outcome of a client's local training.
#[derive(Clone, Debug)]
pub struct ClientUpdate {
    pub client_id: usize,
    pub state: ParameterState,
    /// The loss of the last local epoch.
    pub loss: f32,
    pub samples: usize,
}

/// A participant of the federation. Owns an immutable shard of the training set.
#[derive(Clone, Debug)]
pub struct Client {
    id: usize,
    shard: Arc<Dataset>,
    device: Device,
}

impl Client {
    pub fn new(id: usize, shard: Dataset) -> Self {
        Self {
            id,
            shard: Arc::new(shard),
            device: Device::Cpu,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shard(&self) -> &Dataset {
        &self.shard
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Trains the given snapshot of the global model on this client's shard with a fresh
    /// `Adam` optimizer, minimizing the cross entropy.
    ///
    /// # Arguments
    /// * `snapshot` - The client's own copy of the global model.
    /// * `training` - The local training hyperparameters.
    /// * `seed` - The seed of the shuffles of this round.
    ///
    /// # Returns
    /// The resulting state of the model or a `FederatedErr::Training` error.
    pub fn local_train<M: Model>(
        &self,
        snapshot: M,
        training: &LocalTraining,
        seed: u64,
    ) -> Result<ClientUpdate> {
        let failed = |source: MlErr| FederatedErr::Training {
            client_id: self.id,
            source,
        };

        let mut model = snapshot;
        let mut rng = StdRng::seed_from_u64(seed);
        let optimizer = Adam::with_learning_rate(model.size(), training.learning_rate);
        let mut trainer =
            ModelTrainer::new(optimizer, CrossEntropy, training.epochs, training.batch_size);

        let losses = trainer
            .train(&mut model, &self.shard, &mut rng)
            .map_err(failed)?;
        let state = model.parameters().map_err(failed)?;
        let loss = losses.last().copied().unwrap_or_default();

        debug!(client_id = self.id, loss = loss; "finished local training");

        Ok(ClientUpdate {
            client_id: self.id,
            state,
            loss,
            samples: self.shard.len(),
        })
    }
}

/// Derives the shuffling seed of a client in a round from the base seed, so results don't
/// depend on the order in which clients are scheduled.
pub fn client_seed(base: u64, round: usize, client_id: usize) -> u64 {
    let mut z = base
        ^ (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (client_id as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);

    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use machine_learning::{arch::ClassifierBuilder, dataset::make_blobs};

    use super::*;

    fn setup(samples: usize) -> (Client, machine_learning::arch::Sequential) {
        let mut rng = StdRng::seed_from_u64(7);
        let shard = make_blobs(samples, 3, 2, 1., &mut rng).unwrap();
        let model = ClassifierBuilder::new(3, 2).hidden(&[8]).build(&mut rng).unwrap();
        (Client::new(2, shard), model)
    }

    #[test]
    fn invalid_hyperparameters() {
        assert!(LocalTraining::new(0, 0.1, 10).is_err());
        assert!(LocalTraining::new(1, 0., 10).is_err());
        assert!(LocalTraining::new(1, 0.1, 0).is_err());
        assert!(LocalTraining::new(1, 0.1, 10).is_ok());
    }

    #[test]
    fn the_snapshot_is_not_shared() {
        let (client, model) = setup(40);
        let before = model.parameters().unwrap();
        let training = LocalTraining::new(2, 0.01, 16).unwrap();

        let update = client.local_train(model.clone(), &training, 1).unwrap();

        assert_eq!(update.client_id, 2);
        assert_eq!(update.samples, 40);
        assert_eq!(model.parameters().unwrap(), before);
        assert_ne!(update.state, before);
        update.state.check_compatible(&before).unwrap();
    }

    #[test]
    fn same_seed_same_update() {
        let (client, model) = setup(30);
        let training = LocalTraining::new(1, 0.01, 8).unwrap();

        let a = client.local_train(model.clone(), &training, 5).unwrap();
        let b = client.local_train(model, &training, 5).unwrap();
        assert_eq!(a.state, b.state);
    }

    #[test]
    fn empty_shard() {
        let (_, model) = setup(10);
        let client = Client::new(3, Dataset::empty(3));
        let training = LocalTraining::new(1, 0.01, 8).unwrap();

        match client.local_train(model, &training, 0) {
            Err(FederatedErr::Training { client_id, .. }) => assert_eq!(client_id, 3),
            other => panic!("expected a training error, got {other:?}"),
        }
    }

    #[test]
    fn seeds_differ_per_round_and_client() {
        let seeds = [
            client_seed(42, 1, 0),
            client_seed(42, 1, 1),
            client_seed(42, 2, 0),
            client_seed(43, 1, 0),
        ];

        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(client_seed(42, 1, 0), seeds[0]);
    }
}
