mod utils;

use std::{
    error::Error as _,
    sync::{Arc, Mutex},
};
use symtensor_core::{
    array::Array,
    dtype::DType,
    error::{Error, ErrorKind, Result},
    shape::Shape,
};
use symtensor_graph::{Graph, VariableKind};
use symtensor_train::{
    Adam, BatchIterator, MultiDataSet, Nesterovs, ScoreListener, Sgd, Trainer, TrainingConfig, TrainingListener,
    VecBatchIterator,
};
use utils::{dummy_batches, line_batch, quadratic_config, quadratic_graph, regression_graph, scalar_value};

#[test]
fn single_sgd_step() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).build()?);

    let history = trainer.fit(&mut graph, &mut dummy_batches(1), 1)?;
    // d(p^2)/dp = 10, step = 0.1 * 10
    assert!((scalar_value(&graph, "p")? - 4.0).abs() < 1e-6);
    assert_eq!((history.iterations, history.epochs), (1, 1));
    assert!(history.losses.is_empty());
    assert_eq!(trainer.iteration_count(), 1);
    Ok(())
}

#[test]
fn maximize_moves_uphill() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).minimize(false).build()?);

    trainer.fit(&mut graph, &mut dummy_batches(1), 1)?;
    assert!((scalar_value(&graph, "p")? - 6.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn regularization_is_added_after_the_updater() -> Result<()> {
    // step = 0.1 * 10 + 0.5 * 5
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).l2(0.5).build()?);
    trainer.fit(&mut graph, &mut dummy_batches(1), 1)?;
    assert!((scalar_value(&graph, "p")? - 1.5).abs() < 1e-6);

    // step = 0.1 * -10 + 0.2 * sign(-5)
    let mut graph = quadratic_graph(-5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).l1(0.2).build()?);
    trainer.fit(&mut graph, &mut dummy_batches(1), 1)?;
    assert!((scalar_value(&graph, "p")? + 3.8).abs() < 1e-6);
    Ok(())
}

#[test]
fn linear_regression_converges() -> Result<()> {
    let mut graph = regression_graph()?;
    let config = TrainingConfig::builder()
        .updater(Sgd::new(0.05))
        .feature_mapping(&["x"])
        .label_mapping(&["y"])
        .loss_variables(&["mean"])
        .build()?;
    let listener = ScoreListener::new();
    let scores = listener.scores();

    let mut trainer = Trainer::new(config);
    trainer.add_listener(listener);
    let mut batches = VecBatchIterator::new(vec![line_batch()?]);
    let history = trainer.fit(&mut graph, &mut batches, 400)?;

    assert_eq!(history.losses.len(), 400);
    // initial loss: mean of (1, 3, 5, 7)^2
    assert!((history.losses[0] - 21.0).abs() < 1e-9);
    assert!(history.final_loss().unwrap_or(f64::MAX) < 1e-4);

    assert!((graph.get_array("w")?.to_f64_vec()[0] - 2.0).abs() < 1e-2);
    assert!((graph.get_array("b")?.to_f64_vec()[0] - 1.0).abs() < 1e-2);

    let recorded = scores.lock().map(|s| s.clone()).unwrap_or_default();
    assert_eq!(recorded.len(), 400);
    assert_eq!(recorded[0], (0, history.losses[0]));
    assert_eq!(recorded[399].0, 399);
    Ok(())
}

#[test]
fn explicit_trainable_subset() -> Result<()> {
    let mut graph = regression_graph()?;
    let config = TrainingConfig::builder()
        .updater(Sgd::new(0.05))
        .feature_mapping(&["x"])
        .label_mapping(&["y"])
        .trainable_params(&["b"])
        .build()?;

    Trainer::new(config).fit(&mut graph, &mut VecBatchIterator::new(vec![line_batch()?]), 3)?;
    assert_eq!(graph.get_array("w")?.to_f64_vec(), vec![0.0]);
    assert!(graph.get_array("b")?.to_f64_vec()[0] > 0.0);
    Ok(())
}

#[test]
fn momentum_and_adam_make_progress() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Adam::new(0.1, 0.9, 0.999, 1e-8)).build()?);
    trainer.fit(&mut graph, &mut dummy_batches(10), 1)?;
    // Adam moves roughly one learning rate per step
    let p = scalar_value(&graph, "p")?;
    assert!(p > 3.8 && p < 4.2, "p = {}", p);

    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Nesterovs::new(0.01, 0.9)).build()?);
    trainer.fit(&mut graph, &mut dummy_batches(1), 1)?;
    // first step: (1 + mu) * lr * g
    assert!((scalar_value(&graph, "p")? - (5.0 - 1.9 * 0.01 * 10.0)).abs() < 1e-5);
    Ok(())
}

#[test]
fn multiple_epochs_need_a_resettable_iterator() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).build()?);

    let batches = || vec![MultiDataSet::new(vec![Array::zeros(&[1], DType::F32)], vec![])];
    let mut stream = VecBatchIterator::non_resettable(batches());
    assert!(!stream.reset_supported());
    assert!(matches!(
        trainer.fit(&mut graph, &mut stream, 2),
        Err(Error::Configuration(_))
    ));
    // nothing was trained
    assert_eq!(scalar_value(&graph, "p")?, 5.0);

    let history = trainer.fit(&mut graph, &mut stream, 1)?;
    assert_eq!(history.iterations, 1);

    let history = trainer.fit(&mut graph, &mut VecBatchIterator::new(batches()), 3)?;
    assert_eq!((history.iterations, history.epochs), (3, 3));
    assert_eq!((trainer.iteration_count(), trainer.epoch_count()), (4, 4));
    Ok(())
}

#[test]
fn mapping_mismatch() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.1)).build()?);
    let batch = MultiDataSet::new(
        vec![Array::zeros(&[1], DType::F32), Array::zeros(&[1], DType::F32)],
        vec![],
    );

    let err = trainer.fit_batch(&mut graph, &batch).err();
    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Configuration));
    Ok(())
}

#[test]
fn parameter_size_change_is_reported() -> Result<()> {
    let mut graph = Graph::new();
    graph.placeholder("x", DType::F32, &[1])?;
    let w = graph.declare_variable(
        "w",
        VariableKind::Variable,
        Some(Shape::new(&[-1])),
        DType::F32,
        Some(Array::ones(&[3], DType::F32)),
    )?;
    let squared = graph.square(w)?;
    graph.sum(squared, &[], false)?;

    let mut trainer = Trainer::new(quadratic_config(Nesterovs::new(0.1, 0.9)).build()?);
    let batch = MultiDataSet::new(vec![Array::zeros(&[1], DType::F32)], vec![]);
    trainer.fit_batch(&mut graph, &batch)?;

    graph.set_array("w", Array::ones(&[5], DType::F32))?;
    match trainer.fit_batch(&mut graph, &batch) {
        Err(e @ Error::UpdaterApplication { .. }) => {
            assert!(e.to_string().contains("\"w\""));
            let cause = e.source().and_then(|s| s.downcast_ref::<Error>());
            assert!(matches!(cause, Some(Error::IllegalState(_))));
        },
        other => panic!("expected an updater error, got {:?}", other),
    }
    Ok(())
}

#[derive(Default)]
struct Counter {
    calls: Arc<Mutex<Vec<String>>>,
}

impl TrainingListener for Counter {
    fn iteration_done(&mut self, _graph: &Graph, iteration: usize, epoch: usize, _loss: Option<f64>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("iteration {} of epoch {}", iteration, epoch));
        }
    }

    fn epoch_done(&mut self, _graph: &Graph, epoch: usize) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("epoch {}", epoch));
        }
    }
}

#[test]
fn listeners_see_every_iteration_and_epoch() -> Result<()> {
    let mut graph = quadratic_graph(5.0)?;
    let counter = Counter::default();
    let calls = Arc::clone(&counter.calls);

    let mut trainer = Trainer::new(quadratic_config(Sgd::new(0.01)).build()?);
    trainer.add_listener(counter);
    trainer.fit(&mut graph, &mut dummy_batches(2), 2)?;

    let calls = calls.lock().map(|c| c.clone()).unwrap_or_default();
    assert_eq!(
        calls,
        vec![
            "iteration 0 of epoch 0",
            "iteration 1 of epoch 0",
            "epoch 0",
            "iteration 2 of epoch 1",
            "iteration 3 of epoch 1",
            "epoch 1",
        ]
    );
    Ok(())
}
