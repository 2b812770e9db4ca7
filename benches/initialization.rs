use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pompcore::prelude::*;
use pompcore::routines::initialization::{latin, sobol};

fn benchmark_samplers(c: &mut Criterion) {
    let seed = 22;

    c.bench_function("sobol_1_000", |b| {
        b.iter(|| sobol::generate(black_box(1000), black_box(4), black_box(seed)));
    });

    c.bench_function("sobol_100_000", |b| {
        b.iter(|| sobol::generate(black_box(100_000), black_box(4), black_box(seed)));
    });

    c.bench_function("latin_10_000", |b| {
        b.iter(|| latin::generate(black_box(10_000), black_box(4), black_box(seed)));
    });
}

fn benchmark_design(c: &mut Criterion) {
    let bounds = ParameterBox::new(&["Beta", "mu_IR", "rho", "eta", "N"])
        .range("Beta", 5.0, 80.0)
        .and_then(|b| b.range("mu_IR", 0.5, 4.0))
        .and_then(|b| b.range("rho", 0.1, 0.9))
        .and_then(|b| b.range("eta", 0.0, 0.4))
        .and_then(|b| b.fixed("N", 38000.0))
        .unwrap();

    c.bench_function("design_sobol_10_000", |b| {
        b.iter(|| design(black_box(&bounds), Sampler::Sobol, black_box(10_000), 22));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchmark_samplers, benchmark_design
}
criterion_main!(benches);
