//! Common test helpers for ALICE-Magma integration tests
//!
//! Author: Moroya Sakamoto

#![allow(dead_code)]

use alice_magma::prelude::*;
use std::sync::Arc;

// ============================================================================
// Graph building
// ============================================================================

/// `InputChannel` reading `name`
pub fn channel(graph: &mut Graph, name: &str) -> NodeId {
    let id = graph.create_node("InputChannel").unwrap();
    graph.set_property(id, "channelName", name).unwrap();
    id
}

/// `Output` writing socket `socket` of `from` into `name`
pub fn output(graph: &mut Graph, name: &str, from: NodeId, socket: usize) -> NodeId {
    let id = graph.create_node("Output").unwrap();
    graph.set_property(id, "channelName", name).unwrap();
    graph.set_input(id, 0, from, socket).unwrap();
    id
}

/// `InputGeometry` or `InputParticles` bound to a context object
pub fn interface(graph: &mut Graph, type_name: &str, object: &str) -> NodeId {
    let id = graph.create_node(type_name).unwrap();
    graph.set_property(id, "objectName", object).unwrap();
    id
}

/// `LoopChannel` reading `name` inside the current container
pub fn loop_channel(graph: &mut Graph, name: &str) -> NodeId {
    let id = graph.create_node("LoopChannel").unwrap();
    graph.set_property(id, "channelName", name).unwrap();
    id
}

/// Sum = Σ neighbour `Value` over a particle search of the "cloud" set
/// around the record position
///
/// `mode` is "Radius" or "Count"; `extent` feeds the third control input.
pub fn neighbor_sum_graph(mode: &str, extent: Value) -> Graph {
    let mut graph = Graph::standard();
    let cloud = interface(&mut graph, "InputParticles", "cloud");
    let search = graph.create_node("ParticleSearch").unwrap();
    graph.set_property(search, "searchMode", mode).unwrap();
    graph.set_input(search, 0, cloud, 0).unwrap();
    let pos = channel(&mut graph, "Position");
    graph.set_input(search, 1, pos, 0).unwrap();
    graph.set_input_default_value(search, 2, extent).unwrap();

    let source = graph.container_source(search).unwrap();
    let sink = graph.container_sink(search).unwrap();
    graph.push_editable(search).unwrap();
    let value = loop_channel(&mut graph, "Value");
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input(add, 1, value, 0).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();

    output(&mut graph, "Sum", search, 0);
    graph
}

/// A pure per-record field: Value = Index * 0.5 + |Position|
pub fn field_graph() -> Graph {
    let mut graph = Graph::standard();
    let index = channel(&mut graph, "Index");
    let to_float = graph.create_node("ToFloat").unwrap();
    graph.set_input(to_float, 0, index, 0).unwrap();
    let half = graph.create_node("Multiply").unwrap();
    graph.set_input(half, 0, to_float, 0).unwrap();
    graph.set_input_default_value(half, 1, 0.5f32).unwrap();

    let pos = channel(&mut graph, "Position");
    let len = graph.create_node("Magnitude").unwrap();
    graph.set_input(len, 0, pos, 0).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, half, 0).unwrap();
    graph.set_input(add, 1, len, 0).unwrap();
    output(&mut graph, "Value", add, 0);
    graph
}

// ============================================================================
// Data
// ============================================================================

/// Particles with a float `Value` channel
pub fn cloud(points: &[(Vec3, f32)]) -> Arc<ParticleSet> {
    let positions: Vec<Vec3> = points.iter().map(|(p, _)| *p).collect();
    let mut set = ParticleSet::from_positions(&positions, &[("Value", DataType::FLOAT)]).unwrap();
    for (i, (_, v)) in points.iter().enumerate() {
        set.records_mut().set(i, "Value", &Value::Float(*v)).unwrap();
    }
    Arc::new(set)
}

/// Particles on a line along X with the given extra channels
pub fn line(count: usize, channels: &[(&str, DataType)]) -> ParticleSet {
    let positions: Vec<Vec3> = (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    ParticleSet::from_positions(&positions, channels).unwrap()
}

/// One particle at `at` carrying the given output channels
pub fn probe(at: Vec3, channels: &[(&str, DataType)]) -> ParticleSet {
    ParticleSet::from_positions(&[at], channels).unwrap()
}

/// Compile `graph` against `ctx` and evaluate it over `records`
pub fn run(graph: &Graph, ctx: CompileContext, records: &mut ParticleSet) -> CompiledGraph {
    let compiled = CompiledGraph::compile(graph, &ctx).unwrap();
    eval_particles(&compiled, records, &EvalConfig::sequential()).unwrap();
    compiled
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert two floats are within `1e-4`
pub fn assert_close(a: f32, b: f32, msg: &str) {
    assert!((a - b).abs() < 1e-4, "{}: {} vs {}", msg, a, b);
}
