use std::{
    fmt::{self, Display},
    num::NonZeroUsize,
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info};
use machine_learning::{
    arch::Model,
    dataset::Dataset,
    training::{Accuracy, evaluate},
};

use crate::{
    Result,
    aggregation::aggregate,
    client::{Client, LocalTraining},
    execution::Executor,
    metrics::{RoundRecord, RunMetrics},
};

/// The phases every round goes through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// A snapshot of the global model is taken, it's immutable for the rest of the round.
    Broadcast,
    /// Every client trains it's own copy of the snapshot.
    Collect,
    /// The collected states are averaged and loaded into the global model.
    Aggregate,
    /// The global model is evaluated on the validation set.
    Evaluate,
    /// The round is appended to the records.
    Recorded,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Collect => "collect",
            Self::Aggregate => "aggregate",
            Self::Evaluate => "evaluate",
            Self::Recorded => "recorded",
        }
    }
}

impl Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a session needs to know about the rounds besides the participants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundPlan {
    pub rounds: NonZeroUsize,
    pub training: LocalTraining,
    pub eval_batch_size: NonZeroUsize,
    pub seed: u64,
}

/// A federated training session: owns the global model and drives it through every
/// round with the given execution strategy.
pub struct Session<M, E>
where
    M: Model + Send + 'static,
    E: Executor,
{
    model: M,
    clients: Arc<[Client]>,
    validation: Arc<Dataset>,
    executor: E,
    plan: RoundPlan,
    metrics: RunMetrics,
}

impl<M, E> Session<M, E>
where
    M: Model + Send + 'static,
    E: Executor,
{
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `model` - The initial global model.
    /// * `clients` - The participants, every one of them takes part in every round.
    /// * `validation` - The dataset the global model is evaluated on after each round.
    /// * `executor` - The execution strategy of the collect phase.
    /// * `plan` - The amount of rounds and their hyperparameters.
    pub fn new(
        model: M,
        clients: Arc<[Client]>,
        validation: Arc<Dataset>,
        executor: E,
        plan: RoundPlan,
    ) -> Self {
        let metrics = RunMetrics::new(executor.name());

        Self {
            model,
            clients,
            validation,
            executor,
            plan,
            metrics,
        }
    }

    /// The global model.
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Runs a single round. The global model is only modified if every client finished
    /// it's local training and the states could be averaged.
    ///
    /// # Arguments
    /// * `round` - The index of the round, starting at 1.
    ///
    /// # Returns
    /// The record of the round, also appended to the session's metrics.
    pub fn run_round(&mut self, round: usize) -> Result<RoundRecord> {
        let start = Instant::now();

        self.enter(round, RoundPhase::Broadcast);
        let snapshot = self.model.clone();

        self.enter(round, RoundPhase::Collect);
        let mut updates = self.executor.collect(
            round,
            &snapshot,
            &self.clients,
            &self.plan.training,
            self.plan.seed,
        )?;
        updates.sort_by_key(|update| update.client_id);

        self.enter(round, RoundPhase::Aggregate);
        let mean_loss =
            updates.iter().map(|update| update.loss).sum::<f32>() / updates.len().max(1) as f32;
        let states: Vec<_> = updates.into_iter().map(|update| update.state).collect();
        let averaged = aggregate(&states)?;
        self.model.load_parameters(&averaged)?;

        self.enter(round, RoundPhase::Evaluate);
        let accuracy = self.evaluate()?;

        self.enter(round, RoundPhase::Recorded);
        let record = RoundRecord {
            round,
            accuracy: accuracy.percent(),
            duration: start.elapsed(),
            mean_loss,
        };

        info!(
            strategy = self.executor.name(),
            round = round,
            accuracy = record.accuracy,
            secs = record.duration.as_secs_f64();
            "finished round"
        );

        self.metrics.push(record.clone());
        Ok(record)
    }

    /// Runs every round of the plan, stopping at the first failure.
    ///
    /// # Returns
    /// The metrics of the run and the trained global model.
    pub fn run(mut self) -> Result<(RunMetrics, M)> {
        let start = Instant::now();

        for round in 1..=self.plan.rounds.get() {
            if let Err(e) = self.run_round(round) {
                error!(strategy = self.executor.name(), round = round; "round failed: {e}");
                return Err(e);
            }
        }

        self.metrics.total = start.elapsed();
        Ok((self.metrics, self.model))
    }

    /// Measures the accuracy of the global model on the validation set, without modifying it.
    pub fn evaluate(&mut self) -> Result<Accuracy> {
        Ok(evaluate(
            &mut self.model,
            &self.validation,
            self.plan.eval_batch_size,
        )?)
    }

    fn enter(&self, round: usize, phase: RoundPhase) {
        debug!(strategy = self.executor.name(), round = round, phase = phase.as_str(); "entering phase");
    }
}
