#![allow(dead_code)]

use std::{
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::Duration,
};

use federated::{
    client::{Client, LocalTraining},
    config::{DatasetConfig, FederatedConfig},
    experiment::Experiment,
    session::RoundPlan,
};
use machine_learning::{
    Result as MlResult,
    arch::{Model, Sequential},
    dataset::Dataset,
    optimization::Optimizer,
    params::ParameterState,
};
use ndarray::{Array2, ArrayView2};

/// A small synthetic experiment, fast enough to run a few rounds in every test.
pub fn config(num_clients: usize, rounds: usize) -> FederatedConfig {
    FederatedConfig {
        num_clients: NonZeroUsize::new(num_clients).unwrap(),
        round_count: NonZeroUsize::new(rounds).unwrap(),
        batch_size: NonZeroUsize::new(32).unwrap(),
        learning_rate: 0.05,
        hidden_layers: vec![16, 8],
        dataset: DatasetConfig::Synthetic {
            samples: 400,
            features: 4,
            classes: 3,
            std_dev: 1.5,
        },
        ..Default::default()
    }
}

pub fn experiment(num_clients: usize, rounds: usize) -> Experiment {
    Experiment::new(config(num_clients, rounds)).unwrap()
}

pub fn plan(rounds: usize) -> RoundPlan {
    RoundPlan {
        rounds: NonZeroUsize::new(rounds).unwrap(),
        training: LocalTraining::new(1, 0.01, 32).unwrap(),
        eval_batch_size: NonZeroUsize::new(64).unwrap(),
        seed: 42,
    }
}

/// The clients of `experiment` with the last one replaced by a client without samples.
pub fn clients_with_an_empty_one(experiment: &Experiment) -> Arc<[Client]> {
    let mut clients = experiment.clients().unwrap();
    let last = clients.len() - 1;
    clients[last] = Client::new(last, Dataset::empty(experiment.data().train.x_size()));
    clients.into()
}

/// How a `Faulty` model misbehaves during training.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    Sleep(Duration),
    Panic,
}

/// Wraps a model and misbehaves on every training forward pass.
#[derive(Clone, Debug)]
pub struct Faulty {
    pub inner: Sequential,
    pub fault: Fault,
}

impl Model for Faulty {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> MlResult<Array2<f32>> {
        if self.inner.is_training() {
            match self.fault {
                Fault::Sleep(duration) => thread::sleep(duration),
                Fault::Panic => panic!("faulty model"),
            }
        }

        self.inner.forward(x)
    }

    fn backward(&mut self, d: Array2<f32>) -> MlResult<()> {
        self.inner.backward(d)
    }

    fn optimize<O: Optimizer>(&mut self, optimizer: &mut O) -> MlResult<()> {
        self.inner.optimize(optimizer)
    }

    fn parameters(&self) -> MlResult<ParameterState> {
        self.inner.parameters()
    }

    fn load_parameters(&mut self, state: &ParameterState) -> MlResult<()> {
        self.inner.load_parameters(state)
    }

    fn train_mode(&mut self) {
        self.inner.train_mode();
    }

    fn eval_mode(&mut self) {
        self.inner.eval_mode();
    }

    fn is_training(&self) -> bool {
        self.inner.is_training()
    }
}
