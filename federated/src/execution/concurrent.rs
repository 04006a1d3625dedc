use std::{num::NonZeroUsize, time::Duration};

use futures::{StreamExt, stream::FuturesUnordered};
use log::{debug, warn};
use machine_learning::arch::Model;
use tokio::{
    runtime::{Builder, Runtime},
    task, time,
};

use super::{Executor, executor::round_failed};
use crate::{
    FederatedErr, Result,
    client::{Client, ClientUpdate, LocalTraining, client_seed},
};

/// An executor that trains every client at the same time, each one on a dedicated worker
/// of a fixed size pool, and waits for all of them before returning.
///
/// Every client receives it's own copy of the snapshot, made before dispatching any task.
/// `collect` must not be called from within an async context.
///
/// Clients abandoned by a failed round keep their worker until they finish, so after any
/// failure the pool is replaced by a fresh one and the old one is left to wind down.
pub struct ConcurrentExec {
    runtime: Option<Runtime>,
    workers: NonZeroUsize,
    timeout: Option<Duration>,
}

impl ConcurrentExec {
    /// Creates a new `ConcurrentExec`.
    ///
    /// # Arguments
    /// * `workers` - The size of the pool, one worker per client.
    /// * `timeout` - The maximum duration of a collect phase, unbounded if `None`.
    ///
    /// # Returns
    /// The executor or an io error if the pool couldn't be created.
    pub fn new(workers: NonZeroUsize, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            runtime: Some(Self::pool(workers)?),
            workers,
            timeout,
        })
    }

    fn pool(workers: NonZeroUsize) -> Result<Runtime> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.get())
            .max_blocking_threads(workers.get())
            .thread_name("fl-client")
            .enable_time()
            .build()?;

        Ok(runtime)
    }

    fn replace_pool(&mut self) {
        match Self::pool(self.workers) {
            Ok(fresh) => {
                if let Some(stale) = self.runtime.replace(fresh) {
                    stale.shutdown_background();
                }
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(error = msg.as_str(); "couldn't replace the worker pool, keeping the old one");
            }
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Executor for ConcurrentExec {
    fn name(&self) -> &'static str {
        "concurrent"
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
        let Some(runtime) = &self.runtime else {
            return Err(FederatedErr::Configuration(
                "the worker pool was shut down".into(),
            ));
        };

        if clients.len() > self.workers.get() {
            return Err(FederatedErr::Configuration(format!(
                "{} clients don't fit in a pool of {} workers",
                clients.len(),
                self.workers
            )));
        }

        let copies: Vec<M> = clients.iter().map(|_| snapshot.clone()).collect();
        let timeout = self.timeout;

        let res = runtime.block_on(async move {
            let mut tasks: FuturesUnordered<_> = clients
                .iter()
                .zip(copies)
                .map(|(client, model)| {
                    let client = client.clone();
                    let training = *training;
                    let client_id = client.id();
                    let seed = client_seed(seed, round, client_id);

                    debug!(round = round, client_id = client_id; "dispatching client");
                    let handle =
                        task::spawn_blocking(move || client.local_train(model, &training, seed));

                    async move { (client_id, handle.await) }
                })
                .collect();

            let barrier = async {
                let mut updates = Vec::with_capacity(clients.len());

                while let Some((client_id, joined)) = tasks.next().await {
                    let update = match joined {
                        Ok(Ok(update)) => update,
                        Ok(Err(e)) => return Err(round_failed(round, client_id, e)),
                        Err(e) => {
                            let panic = FederatedErr::WorkerPanic {
                                client_id,
                                msg: e.to_string(),
                            };
                            return Err(round_failed(round, client_id, panic));
                        }
                    };

                    updates.push(update);
                }

                updates.sort_by_key(|update: &ClientUpdate| update.client_id);
                Ok(updates)
            };

            match timeout {
                Some(timeout) => match time::timeout(timeout, barrier).await {
                    Ok(res) => res,
                    Err(_) => {
                        warn!(round = round; "round timed out, abandoning the remaining clients");
                        Err(FederatedErr::RoundTimeout { round, timeout })
                    }
                },
                None => barrier.await,
            }
        });

        if res.is_err() {
            self.replace_pool();
        }

        res
    }
}

impl Drop for ConcurrentExec {
    fn drop(&mut self) {
        // Abandoned clients of a failed round may still be running, don't wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
