mod autodiff;
mod session;
mod train;

use criterion::{criterion_group, criterion_main};

criterion_group!(benches, session::basic, autodiff::basic, train::basic);
criterion_main!(benches);
