//! Benchmarks for the NuFast kernel and full engine reweights
//!
//! Run with: cargo bench
//!
//! This benchmark compares:
//! - Vacuum vs Matter kernel calls
//! - Different N_Newton iterations
//! - Full-grid reweights, including the cached no-op path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nuoscillator::config::EngineConfig;
use nuoscillator::engine::{nufast_atmospheric, nufast_linear, EngineRegistry};
use nuoscillator::grid::{linspace, logspace};
use nuoscillator::nufast::{Medium, MixingParameters, PmnsSquares};

fn dune_medium(n_newton: u8) -> Medium {
    Medium { rho: 2.848, Ye: 0.5, N_Newton: n_newton }
}

/// Single-point kernel benchmarks
fn bench_kernel_single(c: &mut Criterion) {
    let pmns = PmnsSquares::new(&MixingParameters::nufit52_no());

    c.bench_function("vacuum_single", |b| b.iter(|| pmns.vacuum(black_box(1300.0), black_box(2.5))));

    let mut group = c.benchmark_group("matter_single");
    for n_newton in [0u8, 1, 2, 3] {
        let medium = dune_medium(n_newton);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("N_Newton={}", n_newton)),
            &medium,
            |b, medium| b.iter(|| pmns.matter(black_box(1300.0), black_box(2.5), medium)),
        );
    }
    group.finish();
}

/// Full reweight of a 1000-point long-baseline grid
fn bench_linear_reweight(c: &mut Criterion) {
    let registry = EngineRegistry::with_builtin();
    let config = EngineConfig::new(
        "beam",
        nufast_linear::IMPLEMENTATION,
        &["Muon:Electron", "Muon:Muon", "Electron:Electron"],
    );
    let mut engine = registry.build(&config).expect("engine");
    engine.set_energy_grid(logspace(0.5, 5.0, 1000)).expect("grid");
    engine.setup().expect("setup");

    let mut params = nufast_linear::reference_parameters();
    c.bench_function("linear_reweight_1000", |b| {
        b.iter(|| {
            // Alternate δCP so every iteration recomputes
            params[nufast_linear::param::DCP] = -params[nufast_linear::param::DCP];
            black_box(engine.reweight(&params).expect("reweight"))
        })
    });

    c.bench_function("linear_reweight_cached", |b| {
        b.iter(|| black_box(engine.reweight(&params).expect("reweight")))
    });
}

/// Full reweight of a 200 × 100 atmospheric grid
fn bench_atmospheric_reweight(c: &mut Criterion) {
    let registry = EngineRegistry::with_builtin();
    let config =
        EngineConfig::new("atm", nufast_atmospheric::IMPLEMENTATION, &["Muon:Muon", "Muon:Electron"]);
    let mut engine = registry.build(&config).expect("engine");
    engine.set_energy_grid(logspace(0.1, 100.0, 200)).expect("grid");
    engine.set_cosine_z_grid(linspace(-1.0, 1.0, 100)).expect("grid");
    engine.setup().expect("setup");

    let mut params = nufast_atmospheric::reference_parameters();
    let mut group = c.benchmark_group("throughput");
    group.throughput(criterion::Throughput::Elements(2 * 200 * 100));
    group.sample_size(20);
    group.bench_function("atmospheric_reweight_200x100", |b| {
        b.iter(|| {
            params[nufast_atmospheric::param::DCP] = -params[nufast_atmospheric::param::DCP];
            black_box(engine.reweight(&params).expect("reweight"))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_kernel_single, bench_linear_reweight, bench_atmospheric_reweight);

criterion_main!(benches);
