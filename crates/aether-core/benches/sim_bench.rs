//! Criterion benchmarks for the flow simulation.
//!
//! - `grid`: square grids up to 10k nodes, one full tick each
//! - `chain`: long source-fed chains where pressure ripples end to end
//! - `serialization`: snapshot encode/decode of a 2.5k node grid

use aether_core::engine::Simulation;
use aether_core::solver::FlowSolver;
use aether_core::test_utils::*;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn warmed(mut sim: Simulation) -> Simulation {
    for _ in 0..5 {
        sim.step();
    }
    sim
}

fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid");
    group.sample_size(30);

    for side in [10u32, 50, 100] {
        let mut sim = warmed(sim_from_parts(grid_parts(side, side)));
        group.bench_with_input(
            BenchmarkId::new("step", side * side),
            &side,
            |b, _| {
                b.iter(|| {
                    sim.step();
                });
            },
        );
    }
    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    group.sample_size(30);

    let parts = chain_parts(5000, 50);
    let solver = FlowSolver::default();
    group.bench_function("pure_tick_5000", |b| {
        b.iter(|| solver.tick(&parts.nodes, &parts.edges, fixed(1.0 / 60.0)));
    });

    let mut sim = warmed(sim_from_parts(chain_parts(5000, 50)));
    group.bench_function("step_5000", |b| {
        b.iter(|| {
            sim.step();
        });
    });
    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    group.sample_size(30);

    let sim = warmed(sim_from_parts(grid_parts(50, 50)));
    let data = sim.serialize().unwrap();

    group.bench_function("serialize_2500", |b| {
        b.iter(|| sim.serialize().unwrap());
    });
    group.bench_function("deserialize_2500", |b| {
        b.iter(|| Simulation::deserialize(&data).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_grid, bench_chain, bench_serialization);
criterion_main!(benches);
