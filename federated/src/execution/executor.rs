use machine_learning::arch::Model;

use crate::{
    FederatedErr, Result,
    client::{Client, ClientUpdate, LocalTraining},
};

/// Runs the local training of every client during the collect phase of a round.
///
/// An `Executor` decides how the clients are scheduled, but never what they compute: given
/// the same snapshot, clients and seed every implementation collects the same updates.
pub trait Executor {
    /// A short human readable name of the strategy.
    fn name(&self) -> &'static str;

    /// Trains every client on it's own copy of `snapshot` and waits for all of them.
    ///
    /// # Arguments
    /// * `round` - The index of the current round.
    /// * `snapshot` - The broadcasted global model, never modified.
    /// * `clients` - The participants of the round.
    /// * `training` - The local training hyperparameters.
    /// * `seed` - The base seed of the simulation.
    ///
    /// # Returns
    /// One update per client sorted by client id, or a `FederatedErr::Round` error carrying
    /// the first failure observed.
    fn collect<M>(
        &mut self,
        round: usize,
        snapshot: &M,
        clients: &[Client],
        training: &LocalTraining,
        seed: u64,
    ) -> Result<Vec<ClientUpdate>>
    where
        M: Model + Send + 'static;
}

/// Wraps a client failure in the error of the round it happened in.
pub(super) fn round_failed(round: usize, client_id: usize, source: FederatedErr) -> FederatedErr {
    FederatedErr::Round {
        round,
        client_id,
        source: Box::new(source),
    }
}
