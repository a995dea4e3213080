//! Benchmarks for graph compilation and pass evaluation
//!
//! Author: Moroya Sakamoto

use alice_magma::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

/// Value = float(Index) * 0.5 + |Position|
fn field_graph() -> Graph {
    let mut graph = Graph::standard();
    let index = graph.create_node("InputChannel").unwrap();
    graph.set_property(index, "channelName", "Index").unwrap();
    let to_float = graph.create_node("ToFloat").unwrap();
    graph.set_input(to_float, 0, index, 0).unwrap();
    let half = graph.create_node("Multiply").unwrap();
    graph.set_input(half, 0, to_float, 0).unwrap();
    graph.set_input_default_value(half, 1, 0.5f32).unwrap();
    let pos = graph.create_node("InputChannel").unwrap();
    let len = graph.create_node("Magnitude").unwrap();
    graph.set_input(len, 0, pos, 0).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, half, 0).unwrap();
    graph.set_input(add, 1, len, 0).unwrap();
    let out = graph.create_node("Output").unwrap();
    graph.set_property(out, "channelName", "Value").unwrap();
    graph.set_input(out, 0, add, 0).unwrap();
    graph
}

/// Value = Σ neighbour Value over the 8 nearest particles of "cloud"
fn search_graph() -> Graph {
    let mut graph = Graph::standard();
    let set = graph.create_node("InputParticles").unwrap();
    graph.set_property(set, "objectName", "cloud").unwrap();
    let search = graph.create_node("ParticleSearch").unwrap();
    graph.set_property(search, "searchMode", "Count").unwrap();
    graph.set_input(search, 0, set, 0).unwrap();
    let pos = graph.create_node("InputChannel").unwrap();
    graph.set_input(search, 1, pos, 0).unwrap();

    let source = graph.container_source(search).unwrap();
    let sink = graph.container_sink(search).unwrap();
    graph.push_editable(search).unwrap();
    let value = graph.create_node("LoopChannel").unwrap();
    graph.set_property(value, "channelName", "Value").unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input(add, 1, value, 0).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();

    let out = graph.create_node("Output").unwrap();
    graph.set_property(out, "channelName", "Value").unwrap();
    graph.set_input(out, 0, search, 0).unwrap();
    graph
}

fn grid(count: usize) -> ParticleSet {
    let side = (count as f64).cbrt().ceil() as usize;
    let positions: Vec<Vec3> = (0..count)
        .map(|i| {
            Vec3::new(
                (i % side) as f32,
                ((i / side) % side) as f32,
                (i / (side * side)) as f32,
            )
        })
        .collect();
    ParticleSet::from_positions(&positions, &[("Value", DataType::FLOAT)]).unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let records = grid(1);
    let ctx = CompileContext::new(records.map().clone());

    group.bench_function("field", |b| {
        let graph = field_graph();
        b.iter(|| CompiledGraph::compile(black_box(&graph), black_box(&ctx)).unwrap())
    });

    group.finish();
}

fn bench_single_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_record");
    let records = grid(64);
    let compiled =
        CompiledGraph::compile(&field_graph(), &CompileContext::new(records.map().clone())).unwrap();
    let mut record = records.records().record(42).to_vec();

    group.bench_function("field", |b| {
        b.iter(|| compiled.eval_record(black_box(42), black_box(&mut record)))
    });

    group.finish();
}

fn bench_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass");

    for count in [1_000usize, 100_000] {
        let mut records = grid(count);
        let compiled = CompiledGraph::compile(
            &field_graph(),
            &CompileContext::new(records.map().clone()),
        )
        .unwrap();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, _| {
            let config = EvalConfig::sequential();
            b.iter(|| eval_particles(&compiled, &mut records, &config).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &count, |b, _| {
            let config = EvalConfig::default();
            b.iter(|| eval_particles(&compiled, &mut records, &config).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("buffered", count), &count, |b, _| {
            let config = EvalConfig::default().buffered();
            b.iter(|| eval_particles(&compiled, &mut records, &config).unwrap())
        });
    }

    group.finish();
}

fn bench_particle_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_search");
    let cloud = Arc::new(grid(10_000));
    let mut records = grid(10_000);
    let ctx = CompileContext::new(records.map().clone()).with_particles("cloud", cloud);
    let compiled = CompiledGraph::compile(&search_graph(), &ctx).unwrap();
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("k8_parallel", |b| {
        let config = EvalConfig::default();
        b.iter(|| eval_particles(&compiled, &mut records, &config).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_single_record,
    bench_pass,
    bench_particle_search,
);

criterion_main!(benches);
