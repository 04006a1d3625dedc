mod common;

use std::sync::Arc;

use federated::execution::{ConcurrentExec, Executor, SerialExec};
use machine_learning::arch::Model;

const TOLERANCE: f64 = 1e-6;

#[test]
fn strategies_collect_the_same_updates() -> federated::Result<()> {
    let experiment = common::experiment(4, 1);
    let clients = experiment.clients()?;
    let model = experiment.initial_model()?;
    let plan = experiment.plan()?;

    let mut serial = SerialExec::new();
    let mut concurrent = ConcurrentExec::new(experiment.config().num_clients, None)?;

    let a = serial.collect(1, &model, &clients, &plan.training, plan.seed)?;
    let b = concurrent.collect(1, &model, &clients, &plan.training, plan.seed)?;

    assert_eq!(a.len(), 4);
    for (a, b) in a.iter().zip(&b) {
        assert_eq!(a.client_id, b.client_id);
        assert!(a.state.max_abs_diff(&b.state).unwrap() <= TOLERANCE);
    }

    Ok(())
}

#[test]
fn strategies_reach_the_same_global_model() -> federated::Result<()> {
    let experiment = common::experiment(4, 3);
    let clients: Arc<[_]> = experiment.clients()?.into();
    let validation = Arc::new(experiment.data().validation.clone());
    let initial = experiment.initial_model()?;

    let (serial, serial_model) = experiment.run_with(
        SerialExec::new(),
        initial.clone(),
        clients.clone(),
        validation.clone(),
    )?;

    let executor = ConcurrentExec::new(experiment.config().num_clients, None)?;
    let (concurrent, concurrent_model) =
        experiment.run_with(executor, initial, clients, validation)?;

    let diff = serial_model
        .parameters()?
        .max_abs_diff(&concurrent_model.parameters()?)
        .unwrap();

    assert!(diff <= TOLERANCE, "the global models differ by {diff}");
    assert_eq!(serial.accuracies(), concurrent.accuracies());
    assert_eq!(serial.strategy, "serial");
    assert_eq!(concurrent.strategy, "concurrent");

    Ok(())
}
