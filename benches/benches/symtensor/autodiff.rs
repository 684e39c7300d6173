use criterion::{black_box, Criterion};
use std::collections::HashMap;
use symtensor_core::{array::Array, dtype::DType, error::Result};
use symtensor_graph::Graph;

const DEPTHS: [(usize, &str); 3] = [(4, "shallow"), (32, "medium"), (128, "deep")];

// A chain of `depth` sigmoid layers over one weight vector.
fn chain(depth: usize) -> Result<Graph> {
    let mut graph = Graph::new();
    let w = graph.var_with_value("w", Array::full(&[64], 0.5, DType::F32))?;
    let mut h = w;
    for _ in 0..depth {
        let scaled = graph.mul(h, w)?;
        h = graph.sigmoid(scaled)?;
    }
    graph.sum(h, &[], false)?;
    Ok(graph)
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("autodiff");

    for &(depth, name) in &DEPTHS {
        group.bench_function(format!("build_{}", name), |b| {
            b.iter(|| {
                let mut graph = chain(depth).unwrap();
                black_box(graph.create_grad_function()).unwrap()
            })
        });

        let mut graph = chain(depth).unwrap();
        let inputs = HashMap::new();
        group.bench_function(format!("exec_backwards_{}", name), |b| {
            b.iter(|| black_box(graph.exec_backwards(&inputs)).unwrap())
        });
    }

    group.finish();
}
