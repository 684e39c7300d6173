#![allow(dead_code)]

use symtensor_core::{array::Array, dtype::DType, error::Result};
use symtensor_graph::Graph;
use symtensor_train::{MultiDataSet, TrainingConfig, TrainingConfigBuilder, Updater, VecBatchIterator};

// Helper functions
/// `p * p` with `p = value`, plus an unused feature placeholder `x`.
pub fn quadratic_graph(value: f32) -> Result<Graph> {
    let mut graph = Graph::new();
    graph.placeholder("x", DType::F32, &[1])?;
    let p = graph.var_with_value("p", Array::scalar(value))?;
    graph.mul(p, p)?;
    Ok(graph)
}

pub fn dummy_batches(n: usize) -> VecBatchIterator {
    let batches = (0..n)
        .map(|_| MultiDataSet::new(vec![Array::zeros(&[1], DType::F32)], vec![]))
        .collect();
    VecBatchIterator::new(batches)
}

pub fn quadratic_config(updater: impl Updater + 'static) -> TrainingConfigBuilder {
    TrainingConfig::builder().updater(updater).feature_mapping(&["x"])
}

/// `mean((x @ w + b - y)^2)`, output named "mean".
pub fn regression_graph() -> Result<Graph> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F64, &[-1, 1])?;
    let y = graph.placeholder("y", DType::F64, &[-1, 1])?;
    let w = graph.var_with_value("w", Array::from_vec(vec![0.0f64], &[1, 1])?)?;
    let b = graph.var_with_value("b", Array::from_vec(vec![0.0f64], &[1])?)?;

    let xw = graph.matmul(x, w)?;
    let pred = graph.add(xw, b)?;
    graph.mean_squared_error(pred, y)?;
    Ok(graph)
}

/// Samples of `y = 2x + 1`.
pub fn line_batch() -> Result<MultiDataSet> {
    let xs = vec![0.0f64, 1.0, 2.0, 3.0];
    let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
    Ok(MultiDataSet::new(
        vec![Array::from_vec(xs, &[4, 1])?],
        vec![Array::from_vec(ys, &[4, 1])?],
    ))
}

pub fn scalar_value(graph: &Graph, name: &str) -> Result<f64> {
    Ok(graph.get_array(name)?.item()?.as_f64())
}
