#![allow(dead_code)]

use std::collections::HashMap;
use symtensor_core::{array::Array, dtype::DType, error::Result};
use symtensor_graph::Graph;

// Helper functions
pub fn feed(pairs: Vec<(&str, Array)>) -> HashMap<String, Array> {
    pairs.into_iter().map(|(name, array)| (name.to_string(), array)).collect()
}

pub fn matrix(rows: Vec<Vec<f32>>) -> Result<Array> {
    let shape = [rows.len(), rows.first().map_or(0, |r| r.len())];
    Array::from_vec(rows.into_iter().flatten().collect(), &shape)
}

pub fn assert_close(actual: &Array, expected: &[f64]) {
    let values = actual.to_f64_vec();
    assert_eq!(values.len(), expected.len(), "length of {:?}", values);
    for (a, e) in values.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{:?} != {:?}", values, expected);
    }
}

/// `loss = sum(x @ w + b)` with `x: [-1, 2]`, `w: [2, 1]`, `b: [1]`.
pub fn linear_graph() -> Result<Graph> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[-1, 2])?;
    let w = graph.var_with_value("w", matrix(vec![vec![1.0], vec![2.0]])?)?;
    let b = graph.var_with_value("b", Array::from_vec(vec![0.5f32], &[1])?)?;

    let xw = graph.matmul(x, w)?;
    let y = graph.add(xw, b)?;
    let loss = graph.sum(y, &[], false)?;
    let name = graph.variable(loss).name().to_string();
    graph.rename_variable(&name, "loss")?;
    Ok(graph)
}

/// Names plus edges of every node, for structural comparison.
pub fn structure(graph: &Graph) -> Vec<String> {
    let mut lines: Vec<String> = graph
        .variables()
        .iter()
        .map(|v| format!("var {} {}", v.name(), v.kind().as_str()))
        .collect();
    for op in graph.operations() {
        let names = |ids: &[symtensor_graph::VarId]| {
            ids.iter()
                .map(|&v| graph.variable(v).name().to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        lines.push(format!(
            "op {} {} ({}) -> ({})",
            op.name(),
            op.op_type(),
            names(op.inputs()),
            names(op.outputs())
        ));
    }
    lines
}
