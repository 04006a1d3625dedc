use std::sync::Arc;

use log::info;
use machine_learning::{
    arch::{ClassifierBuilder, Sequential},
    dataset::Dataset,
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    FederatedErr, Result,
    client::{Client, LocalTraining},
    config::FederatedConfig,
    execution::{ConcurrentExec, Executor, SerialExec},
    ingest::{self, PreparedData},
    metrics::{Comparison, RunMetrics},
    partition::partition,
    predict::Predictor,
    session::{RoundPlan, Session},
};

/// Runs the same federated simulation once per execution strategy and compares them.
pub struct Experiment {
    config: FederatedConfig,
    data: PreparedData,
}

impl Experiment {
    /// Validates `config` and loads the dataset it describes.
    pub fn new(config: FederatedConfig) -> Result<Self> {
        config.validate()?;
        let data = ingest::prepare(&config)?;
        Self::from_data(config, data)
    }

    /// Creates an experiment over already prepared data.
    pub fn from_data(config: FederatedConfig, data: PreparedData) -> Result<Self> {
        config.validate()?;

        if data.validation.is_empty() {
            return Err(FederatedErr::Configuration(
                "the validation set is empty".into(),
            ));
        }

        Ok(Self { config, data })
    }

    pub fn config(&self) -> &FederatedConfig {
        &self.config
    }

    pub fn data(&self) -> &PreparedData {
        &self.data
    }

    /// The untrained global model, the same one on every call.
    pub fn initial_model(&self) -> Result<Sequential> {
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let classes = self.data.num_classes().max(self.data.train.num_classes());

        Ok(ClassifierBuilder::new(self.data.train.x_size(), classes)
            .hidden(&self.config.hidden_layers)
            .activation(self.config.hidden_activation.act_fn())
            .build(&mut rng)?)
    }

    /// Splits the training set among the clients.
    pub fn clients(&self) -> Result<Vec<Client>> {
        let num_clients = self.config.num_clients.get();
        let shards = if self.config.shuffle_partition {
            let mut rng = StdRng::seed_from_u64(self.config.random_seed);
            partition(&self.data.train, num_clients, Some(&mut rng))?
        } else {
            partition(&self.data.train, num_clients, None::<&mut StdRng>)?
        };

        Ok(shards
            .into_iter()
            .enumerate()
            .map(|(id, shard)| Client::new(id, shard))
            .collect())
    }

    /// The rounds every strategy runs.
    pub fn plan(&self) -> Result<RoundPlan> {
        let training = LocalTraining::new(
            self.config.local_epochs_per_round.get(),
            self.config.learning_rate,
            self.config.batch_size.get(),
        )?;

        Ok(RoundPlan {
            rounds: self.config.round_count,
            training,
            eval_batch_size: self.config.eval_batch_size,
            seed: self.config.random_seed,
        })
    }

    /// Runs every round serially and then concurrently, both starting from the same initial
    /// model and with the same clients.
    pub fn run(&self) -> Result<Comparison> {
        self.run_and_keep_model().map(|(comparison, _)| comparison)
    }

    /// Same as `run`, also returning the global model trained by the concurrent strategy.
    pub fn run_and_keep_model(&self) -> Result<(Comparison, Sequential)> {
        let clients: Arc<[Client]> = self.clients()?.into();
        let validation = Arc::new(self.data.validation.clone());
        let initial = self.initial_model()?;

        info!(
            clients = clients.len(),
            rounds = self.config.round_count.get();
            "starting the serial run"
        );
        let (serial, _) = self.run_with(
            SerialExec::new(),
            initial.clone(),
            clients.clone(),
            validation.clone(),
        )?;

        info!(
            clients = clients.len(),
            rounds = self.config.round_count.get();
            "starting the concurrent run"
        );
        let executor = ConcurrentExec::new(self.config.num_clients, self.config.round_timeout())?;
        let (concurrent, model) = self.run_with(executor, initial, clients, validation)?;

        let comparison = Comparison::new(serial, concurrent, self.config.num_clients.get());
        info!(
            speedup = comparison.speedup,
            efficiency = comparison.efficiency;
            "finished the experiment"
        );

        Ok((comparison, model))
    }

    /// Runs every round with the given execution strategy.
    pub fn run_with<E: Executor>(
        &self,
        executor: E,
        model: Sequential,
        clients: Arc<[Client]>,
        validation: Arc<Dataset>,
    ) -> Result<(RunMetrics, Sequential)> {
        Session::new(model, clients, validation, executor, self.plan()?).run()
    }

    /// A predictor of raw samples built around `model`.
    pub fn predictor(&self, model: Sequential) -> Predictor<Sequential> {
        Predictor::new(
            model,
            self.data.scaler.clone(),
            self.data.encoder.clone(),
            self.data.feature_names.clone(),
            self.data.label_name.clone(),
        )
    }
}
