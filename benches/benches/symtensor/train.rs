use criterion::{black_box, Criterion};
use symtensor_core::{array::Array, dtype::DType};
use symtensor_graph::Graph;
use symtensor_train::{Adam, MultiDataSet, Sgd, Trainer, TrainingConfig, Updater, VecBatchIterator};

fn regression(features: usize) -> Graph {
    let mut graph = Graph::new();
    let x = graph.placeholder("x", DType::F32, &[-1, features as i64]).unwrap();
    let y = graph.placeholder("y", DType::F32, &[-1, 1]).unwrap();
    let w = graph.var("w", DType::F32, &[features, 1]).unwrap();
    let pred = graph.matmul(x, w).unwrap();
    graph.mean_squared_error(pred, y).unwrap();
    graph
}

fn bench_updater(criterion: &mut Criterion, name: &str, updater: impl Updater + Clone + 'static) {
    let features = 64;
    let batch = MultiDataSet::new(
        vec![Array::ones(&[32, features], DType::F32)],
        vec![Array::zeros(&[32, 1], DType::F32)],
    );

    criterion.bench_function(&format!("fit_{}", name), |b| {
        b.iter(|| {
            let mut graph = regression(features);
            let config = TrainingConfig::builder()
                .updater(updater.clone())
                .feature_mapping(&["x"])
                .label_mapping(&["y"])
                .build()
                .unwrap();
            let mut batches = VecBatchIterator::new(vec![batch.clone(); 8]);
            black_box(Trainer::new(config).fit(&mut graph, &mut batches, 1)).unwrap()
        })
    });
}

pub fn basic(criterion: &mut Criterion) {
    bench_updater(criterion, "sgd", Sgd::new(0.01));
    bench_updater(criterion, "adam", Adam::new(0.001, 0.9, 0.999, 1e-8));
}
