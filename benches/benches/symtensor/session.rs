use criterion::{black_box, Criterion};
use std::collections::HashMap;
use symtensor_core::{array::Array, dtype::DType, error::Result};
use symtensor_graph::Graph;

// Constants for benchmark data sizes
const SIZES: [(usize, &str); 3] = [(16, "small"), (128, "medium"), (512, "large")];

// Two dense layers with tanh, summed to a scalar.
fn mlp(width: usize) -> Result<Graph> {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[-1, width as i64])?;
    let w1 = graph.var("w1", DType::F32, &[width, width])?;
    let w2 = graph.var("w2", DType::F32, &[width, 1])?;

    let h = graph.matmul(x, w1)?;
    let h = graph.tanh(h)?;
    let y = graph.matmul(h, w2)?;
    graph.sum(y, &[], false)?;
    Ok(graph)
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("session");

    for &(size, name) in &SIZES {
        let graph = match mlp(size) {
            Ok(graph) => graph,
            Err(e) => panic!("failed to build graph: {}", e),
        };
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Array::ones(&[32, size], DType::F32));

        group.bench_function(format!("forward_{}", name), |b| {
            b.iter(|| black_box(graph.output(&["sum"], &inputs)).unwrap())
        });
    }

    group.finish();
}
