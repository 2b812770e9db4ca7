use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pompcore::models::death::PureDeath;
use pompcore::models::sir::Sir;
use pompcore::prelude::*;

fn benchmark_death(c: &mut Criterion) {
    let model = PureDeath::new();
    let params = model
        .spec()
        .parameter_vector(&[("mu", 0.1), ("rho", 0.7), ("N0", 50.0)])
        .unwrap();
    let times: Vec<f64> = (1..=20).map(|t| t as f64).collect();
    let obs = simulate(&model, &params, 0.0, &times, &mut task_rng(1, 0))
        .unwrap()
        .observations;

    for np in [1_000, 10_000] {
        let filter = ParticleFilter::new(&model, &obs, np).unwrap();
        c.bench_function(&format!("pfilter_death_{}", np), |b| {
            b.iter(|| filter.run(black_box(&params), &mut task_rng(2, 0)).unwrap());
        });
    }
}

fn benchmark_sir(c: &mut Criterion) {
    let sir = Sir::weekly().unwrap();
    let params = sir
        .spec()
        .parameter_vector(&[
            ("Beta", 20.0),
            ("mu_IR", 2.0),
            ("rho", 0.6),
            ("eta", 0.2),
            ("N", 10000.0),
        ])
        .unwrap();
    let times: Vec<f64> = (1..=20).map(|w| w as f64).collect();
    let obs = simulate(&sir, &params, 0.0, &times, &mut task_rng(3, 0))
        .unwrap()
        .observations;
    let filter = ParticleFilter::new(&sir, &obs, 2000).unwrap();
    let sequential = filter.clone().parallel(false);

    c.bench_function("pfilter_sir_parallel", |b| {
        b.iter(|| filter.run(black_box(&params), &mut task_rng(4, 0)).unwrap());
    });
    c.bench_function("pfilter_sir_sequential", |b| {
        b.iter(|| sequential.run(black_box(&params), &mut task_rng(4, 0)).unwrap());
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10)).noise_threshold(0.05);
    targets = benchmark_death, benchmark_sir
}
criterion_main!(benches);
