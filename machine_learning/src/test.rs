#![cfg(test)]

use ndarray::array;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    arch::{ClassifierBuilder, Model, loss::CrossEntropy},
    dataset::{Dataset, make_blobs},
    optimization::Adam,
    preprocessing::StandardScaler,
    training::{ModelTrainer, evaluate},
};

#[test]
fn test_ml_and2_gate_convergence() {
    let dataset = Dataset::new(
        array![[0., 0.], [0., 1.], [1., 0.], [1., 1.]],
        vec![0, 0, 0, 1],
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let mut model = ClassifierBuilder::new(2, 2).hidden(&[]).build(&mut rng).unwrap();
    let optimizer = Adam::with_learning_rate(model.size(), 0.1);
    let mut trainer = ModelTrainer::new(optimizer, CrossEntropy, 500.try_into().unwrap(), 4.try_into().unwrap());
    let losses = trainer.train(&mut model, &dataset, &mut rng).unwrap();

    assert!(losses[losses.len() - 1] < losses[0]);

    model.eval_mode();
    let y_pred = model.predict(dataset.x()).unwrap();
    assert_eq!(y_pred, dataset.y());
}

#[test]
fn test_ml_or2_gate_convergence() {
    let dataset = Dataset::new(
        array![[0., 0.], [0., 1.], [1., 0.], [1., 1.]],
        vec![0, 1, 1, 1],
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let mut model = ClassifierBuilder::new(2, 2).hidden(&[]).build(&mut rng).unwrap();
    let mut trainer = ModelTrainer::new(
        Adam::with_learning_rate(model.size(), 0.05),
        CrossEntropy,
        2000.try_into().unwrap(),
        4.try_into().unwrap(),
    );
    trainer.train(&mut model, &dataset, &mut rng).unwrap();

    let acc = evaluate(&mut model, &dataset, 4.try_into().unwrap()).unwrap();
    assert_eq!(acc.correct, 4);
}

#[test]
fn test_ml_blobs_convergence() {
    let mut rng = StdRng::seed_from_u64(42);
    let dataset = make_blobs(500, 4, 2, 1., &mut rng).unwrap();
    let (train, validation) = dataset.split(0.2, &mut rng).unwrap();

    let scaler = StandardScaler::fit(train.x()).unwrap();
    let train = Dataset::new(scaler.transform(train.x()).unwrap(), train.y().to_vec()).unwrap();
    let validation =
        Dataset::new(scaler.transform(validation.x()).unwrap(), validation.y().to_vec()).unwrap();

    let mut model = ClassifierBuilder::new(4, 2).build(&mut rng).unwrap();
    let optimizer = Adam::with_learning_rate(model.size(), 0.01);
    let mut trainer = ModelTrainer::new(optimizer, CrossEntropy, 20.try_into().unwrap(), 32.try_into().unwrap());
    trainer.train(&mut model, &train, &mut rng).unwrap();

    let acc = evaluate(&mut model, &validation, 64.try_into().unwrap()).unwrap();
    assert_eq!(acc.total, 100);
    assert!(acc.percent() > 80., "accuracy too low: {acc}");
}
