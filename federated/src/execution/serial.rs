use log::debug;
use machine_learning::arch::Model;

use super::{Executor, executor::round_failed};
use crate::{
    Result,
    client::{Client, ClientUpdate, LocalTraining, client_seed},
};

/// An executor that trains one client at a time, in id order, on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialExec;

impl SerialExec {
    /// Creates a new `SerialExec`.
    pub fn new() -> Self {
        Self
    }
}

impl Executor for SerialExec {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn collect<M>(
        &mut self,
        round: usize,
        snapshot: &M,
        clients: &[Client],
        training: &LocalTraining,
        seed: u64,
    ) -> Result<Vec<ClientUpdate>>
    where
        M: Model + Send + 'static,
    {
        let mut order: Vec<&Client> = clients.iter().collect();
        order.sort_by_key(|client| client.id());

        let mut updates = Vec::with_capacity(clients.len());

        for client in order {
            debug!(round = round, client_id = client.id(); "training client");

            let seed = client_seed(seed, round, client.id());
            let update = client
                .local_train(snapshot.clone(), training, seed)
                .map_err(|e| round_failed(round, client.id(), e))?;

            updates.push(update);
        }

        Ok(updates)
    }
}
