mod common;

use std::{num::NonZeroUsize, sync::Arc};

use federated::{
    config::{DatasetConfig, FederatedConfig, HiddenActivation},
    execution::SerialExec,
    experiment::Experiment,
    session::Session,
};
use machine_learning::arch::{Model, activations::ActFn, layers::Layer};

#[test]
fn four_clients_five_rounds() -> federated::Result<()> {
    let config = FederatedConfig {
        num_clients: NonZeroUsize::new(4).unwrap(),
        round_count: NonZeroUsize::new(5).unwrap(),
        dataset: DatasetConfig::Synthetic {
            samples: 5000,
            features: 11,
            classes: 2,
            std_dev: 2.,
        },
        ..Default::default()
    };

    let experiment = Experiment::new(config)?;
    assert_eq!(experiment.data().validation.len(), 1000);
    assert_eq!(experiment.data().num_classes(), 2);

    let comparison = experiment.run()?;

    for run in [&comparison.serial, &comparison.concurrent] {
        let accuracies = run.accuracies();
        assert_eq!(accuracies.len(), 5);
        assert!(accuracies.iter().all(|a| (0.0..=100.0).contains(a)));
        assert_eq!(
            run.records.iter().map(|r| r.round).collect::<Vec<_>>(),
            [1, 2, 3, 4, 5]
        );
    }

    assert!(comparison.speedup.is_finite() && comparison.speedup > 0.);
    assert!(comparison.efficiency.is_finite() && comparison.efficiency > 0.);
    assert_eq!(comparison.efficiency, comparison.speedup / 4.);

    Ok(())
}

#[test]
fn evaluation_is_idempotent() -> federated::Result<()> {
    let experiment = common::experiment(3, 1);
    let clients: Arc<[_]> = experiment.clients()?.into();
    let validation = Arc::new(experiment.data().validation.clone());
    let mut session = Session::new(
        experiment.initial_model()?,
        clients,
        validation,
        SerialExec::new(),
        experiment.plan()?,
    );

    session.run_round(1)?;
    let before = session.model().parameters()?;

    let first = session.evaluate()?;
    let second = session.evaluate()?;

    assert_eq!(first, second);
    assert_eq!(session.model().parameters()?, before);

    Ok(())
}

#[test]
fn training_improves_the_global_model() -> federated::Result<()> {
    let experiment = common::experiment(2, 4);
    let comparison = experiment.run()?;

    let accuracies = comparison.concurrent.accuracies();
    assert!(accuracies[accuracies.len() - 1] > 60., "{accuracies:?}");

    Ok(())
}

#[test]
fn sigmoid_hidden_activation() -> federated::Result<()> {
    let config = FederatedConfig {
        hidden_activation: HiddenActivation::Sigmoid,
        ..common::config(2, 2)
    };
    let experiment = Experiment::new(config)?;

    let model = experiment.initial_model()?;
    let hidden: Vec<_> = model
        .layers()
        .iter()
        .filter_map(|layer| match layer {
            Layer::BatchNorm(bn) => bn.act_fn(),
            Layer::Dense(_) => None,
        })
        .collect();
    assert_eq!(hidden.len(), 2);
    assert!(hidden.iter().all(|act_fn| matches!(act_fn, ActFn::Sigmoid(_))));

    let comparison = experiment.run()?;
    assert_eq!(comparison.concurrent.accuracies().len(), 2);
    assert!(comparison.concurrent.final_accuracy().is_some());
    Ok(())
}
