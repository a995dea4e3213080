//! Integration tests: loop containers
//!
//! Author: Moroya Sakamoto

mod common;

use alice_magma::prelude::*;
use common::*;
use std::sync::Arc;

fn three_in_a_row() -> Arc<ParticleSet> {
    cloud(&[
        (Vec3::ZERO, 1.0),
        (Vec3::X, 2.0),
        (Vec3::new(2.0, 0.0, 0.0), 3.0),
    ])
}

fn sum_at(graph: &Graph, at: Vec3) -> f32 {
    let mut probe = probe(at, &[("Sum", DataType::FLOAT)]);
    let ctx = CompileContext::new(probe.map().clone()).with_particles("cloud", three_in_a_row());
    run(graph, ctx, &mut probe);
    probe.get(0, "Sum").unwrap().as_f32()
}

// ============================================================================
// ParticleSearch
// ============================================================================

#[test]
fn k_nearest_sum() {
    let graph = neighbor_sum_graph("Count", Value::Int(3));
    assert_close(sum_at(&graph, Vec3::ZERO), 6.0, "all three");

    let graph = neighbor_sum_graph("Count", Value::Int(2));
    assert_close(sum_at(&graph, Vec3::ZERO), 3.0, "two nearest of origin");
    assert_close(sum_at(&graph, Vec3::new(2.0, 0.0, 0.0)), 5.0, "two nearest of far end");
}

#[test]
fn radius_sum() {
    let graph = neighbor_sum_graph("Radius", Value::Float(1.5));
    assert_close(sum_at(&graph, Vec3::ZERO), 3.0, "within 1.5 of origin");
    assert_close(sum_at(&graph, Vec3::X), 6.0, "within 1.5 of the middle");
    assert_close(sum_at(&graph, Vec3::splat(50.0)), 0.0, "nothing in range");
}

#[test]
fn iteration_index_counts_neighbors() {
    // Total = Σ IterationIndex = 0 + 1 + 2
    let mut graph = Graph::standard();
    let cloud_in = interface(&mut graph, "InputParticles", "cloud");
    let search = graph.create_node("ParticleSearch").unwrap();
    graph.set_input(search, 0, cloud_in, 0).unwrap();
    graph.set_input_default_value(search, 3, Value::Int(0)).unwrap();

    let source = graph.container_source(search).unwrap();
    let sink = graph.container_sink(search).unwrap();
    graph.push_editable(search).unwrap();
    let iteration = loop_channel(&mut graph, "IterationIndex");
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input(add, 1, iteration, 0).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();
    output(&mut graph, "Total", search, 0);

    let mut probe = probe(Vec3::ZERO, &[("Total", DataType::INT)]);
    let ctx = CompileContext::new(probe.map().clone()).with_particles("cloud", three_in_a_row());
    run(&graph, ctx, &mut probe);
    assert_eq!(probe.get(0, "Total"), Some(Value::Int(3)));
}

#[test]
fn search_sum_matches_particle_sum_radius() {
    // Falloff 0 weighs every neighbour by 1, so the node and the loop agree
    let mut graph = Graph::standard();
    let cloud_in = interface(&mut graph, "InputParticles", "cloud");
    let sum = graph.create_node("ParticleSumRadius").unwrap();
    graph.set_input(sum, 0, cloud_in, 0).unwrap();
    let pos = channel(&mut graph, "Position");
    graph.set_input(sum, 1, pos, 0).unwrap();
    graph.set_input_default_value(sum, 2, 1.5f32).unwrap();
    graph.set_input_default_value(sum, 3, 0.0f32).unwrap();
    graph.set_property(sum, "channels", vec!["Value".to_string()]).unwrap();
    output(&mut graph, "Sum", sum, 2);

    let looped = neighbor_sum_graph("Radius", Value::Float(1.5));
    for at in [Vec3::ZERO, Vec3::X, Vec3::new(1.7, 0.2, 0.0)] {
        assert_close(sum_at(&graph, at), sum_at(&looped, at), "node vs loop");
    }
}

// ============================================================================
// Mesh loops
// ============================================================================

/// Two triangles sharing the diagonal 0-2
fn open_square() -> TriMesh {
    TriMesh::new(
        &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .unwrap()
}

/// Sum over a mesh loop around `vertex` of a loop channel, or of 1 per
/// iteration when `term` is `None`
fn mesh_loop_sum(
    type_name: &str,
    mesh: TriMesh,
    vertex: i32,
    term: Option<&str>,
    visible_only: bool,
) -> f32 {
    let geometry: Arc<dyn Geometry> = Arc::new(GeometrySet::new(vec![mesh]));
    let mut graph = Graph::standard();
    let geo = interface(&mut graph, "InputGeometry", "mesh");
    let lp = graph.create_node(type_name).unwrap();
    graph.set_input(lp, 0, geo, 0).unwrap();
    graph.set_input_default_value(lp, 2, Value::Int(vertex)).unwrap();
    if visible_only {
        graph.set_property(lp, "visibleOnly", true).unwrap();
    }

    let source = graph.container_source(lp).unwrap();
    let sink = graph.container_sink(lp).unwrap();
    graph.push_editable(lp).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    match term {
        Some(name) => {
            let value = loop_channel(&mut graph, name);
            let to_float = graph.create_node("ToFloat").unwrap();
            graph.set_input(to_float, 0, value, 0).unwrap();
            graph.set_input(add, 1, to_float, 0).unwrap();
        }
        None => graph.set_input_default_value(add, 1, 1.0f32).unwrap(),
    }
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();
    output(&mut graph, "Sum", lp, 0);

    let mut record = probe(Vec3::ZERO, &[("Sum", DataType::FLOAT)]);
    let ctx = CompileContext::new(record.map().clone()).with_geometry("mesh", geometry);
    run(&graph, ctx, &mut record);
    record.get(0, "Sum").unwrap().as_f32()
}

#[test]
fn vertex_loop_neighbor_indices() {
    // Cube vertex 0 shares edges with 1, 2, 3, 4, 5 and 7
    let mesh = || cube(1.0).unwrap();
    assert_close(mesh_loop_sum("VertexLoop", mesh(), 0, Some("NeighborVertex"), false), 22.0, "neighbors");
    assert_close(mesh_loop_sum("VertexLoop", mesh(), 0, None, false), 6.0, "edge count");
}

#[test]
fn vertex_loop_boundary_flags() {
    let closed = cube(1.0).unwrap();
    assert_close(mesh_loop_sum("VertexLoop", closed, 0, Some("EdgeIsBoundary"), false), 0.0, "closed mesh");
    // 0-1 and 0-3 are open edges, the diagonal 0-2 is shared
    assert_close(
        mesh_loop_sum("VertexLoop", open_square(), 0, Some("EdgeIsBoundary"), false),
        2.0,
        "open mesh",
    );
}

#[test]
fn vertex_loop_visible_only_skips_hidden_edges() {
    let hidden = || {
        let mut mesh = open_square();
        mesh.set_edge_visibility(0, [true, true, false]);
        mesh.set_edge_visibility(1, [false, true, true]);
        mesh
    };
    assert_close(mesh_loop_sum("VertexLoop", hidden(), 0, None, false), 3.0, "every edge");
    assert_close(mesh_loop_sum("VertexLoop", hidden(), 0, None, true), 2.0, "visible edges");
    assert_close(
        mesh_loop_sum("VertexLoop", hidden(), 0, Some("EdgeVisibility"), false),
        2.0,
        "visibility flags",
    );
    assert_close(mesh_loop_sum("VertexLoop", open_square(), 0, None, true), 3.0, "nothing hidden");
}

#[test]
fn face_loop_visits_faces_using_vertex() {
    // Cube vertex 0 is used by faces 0, 1, 4, 5, 10 and 11
    let mesh = || cube(1.0).unwrap();
    assert_close(mesh_loop_sum("FaceLoopByVertex", mesh(), 0, None, false), 6.0, "face count");
    assert_close(mesh_loop_sum("FaceLoopByVertex", mesh(), 0, Some("FaceIndex"), false), 31.0, "face indices");
    assert_close(
        mesh_loop_sum("FaceLoopByVertex", mesh(), 0, Some("IterationIndex"), false),
        15.0,
        "iterations",
    );
    assert_close(mesh_loop_sum("FaceLoopByVertex", open_square(), 1, None, false), 1.0, "corner of one face");
    assert_close(mesh_loop_sum("FaceLoopByVertex", mesh(), 99, None, false), 0.0, "missing vertex");
}

#[test]
fn face_loop_reads_face_channels() {
    let mut mesh = cube(1.0).unwrap();
    mesh.face_data_mut().add_channel("Weight", DataType::FLOAT).unwrap();
    for f in 0..12 {
        mesh.face_data_mut().set(f, "Weight", &Value::Float(f as f32 * 2.0)).unwrap();
    }
    assert_close(mesh_loop_sum("FaceLoopByVertex", mesh, 0, Some("Weight"), false), 62.0, "face weights");
}

// ============================================================================
// Loop and VertexLoop
// ============================================================================

#[test]
fn counted_loop_stops_on_condition() {
    // Sum = 0.5 * n while Iteration < 6
    let mut graph = Graph::standard();
    let lp = graph.create_node("Loop").unwrap();
    let source = graph.container_source(lp).unwrap();
    let sink = graph.container_sink(lp).unwrap();
    graph.push_editable(lp).unwrap();
    let less = graph.create_node("Less").unwrap();
    graph.set_input(less, 0, source, 0).unwrap();
    graph.set_input_default_value(less, 1, Value::Int(6)).unwrap();
    graph.set_input(sink, 0, less, 0).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input_default_value(add, 1, 0.5f32).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();
    output(&mut graph, "Sum", lp, 0);

    let mut records = line(3, &[("Sum", DataType::FLOAT)]);
    run(&graph, CompileContext::new(records.map().clone()), &mut records);
    for i in 0..3 {
        assert_close(records.get(i, "Sum").unwrap().as_f32(), 3.0, "six iterations");
    }
}

#[test]
fn vertex_loop_visits_edge_neighbors() {
    let geometry: Arc<dyn Geometry> = Arc::new(GeometrySet::new(vec![cube(1.0).unwrap()]));
    let expected = geometry.vertex_neighbors(0, 0).len();
    assert!(expected > 0);

    let mut graph = Graph::standard();
    let geo = interface(&mut graph, "InputGeometry", "box");
    let lp = graph.create_node("VertexLoop").unwrap();
    graph.set_input(lp, 0, geo, 0).unwrap();
    let source = graph.container_source(lp).unwrap();
    let sink = graph.container_sink(lp).unwrap();
    graph.push_editable(lp).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input_default_value(add, 1, 1.0f32).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    graph.pop_editable();
    output(&mut graph, "Count", lp, 0);

    let mut probe = probe(Vec3::ZERO, &[("Count", DataType::FLOAT)]);
    let ctx = CompileContext::new(probe.map().clone()).with_geometry("box", geometry);
    run(&graph, ctx, &mut probe);
    assert_close(
        probe.get(0, "Count").unwrap().as_f32(),
        expected as f32,
        "one iteration per edge",
    );
}

#[test]
fn loop_channel_outside_loop_is_rejected() {
    let mut graph = Graph::standard();
    let lc = loop_channel(&mut graph, "NeighborIndex");
    let to_float = graph.create_node("ToFloat").unwrap();
    graph.set_input(to_float, 0, lc, 0).unwrap();
    output(&mut graph, "Sum", to_float, 0);

    let probe = probe(Vec3::ZERO, &[("Sum", DataType::FLOAT)]);
    let ctx = CompileContext::new(probe.map().clone());
    assert!(matches!(
        CompiledGraph::compile(&graph, &ctx),
        Err(CompileError::LoopChannelOutsideLoop(id)) if id == lc
    ));
}

#[test]
fn updates_read_values_from_before_the_iteration() {
    // Moved += (1, 1, 1); Seen = Moved.x, both from the same iteration
    let mut graph = Graph::standard();
    let lp = graph.create_node("Loop").unwrap();
    graph.set_num_inputs(lp, 2).unwrap();
    graph.set_property(lp, "maxIterations", 2).unwrap();
    graph.set_input_default_value(lp, 0, Vec3::ZERO).unwrap();
    graph.set_input_default_value(lp, 1, 0.0f32).unwrap();

    let source = graph.container_source(lp).unwrap();
    let sink = graph.container_sink(lp).unwrap();
    graph.push_editable(lp).unwrap();
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, source, 1).unwrap();
    graph.set_input_default_value(add, 1, Vec3::ONE).unwrap();
    graph.set_input(sink, 1, add, 0).unwrap();
    let split = graph.create_node("Breakout").unwrap();
    graph.set_input(split, 0, source, 1).unwrap();
    graph.set_input(sink, 2, split, 0).unwrap();
    graph.pop_editable();
    output(&mut graph, "Moved", lp, 0);
    output(&mut graph, "Seen", lp, 1);

    let mut records = line(2, &[("Moved", DataType::VEC3), ("Seen", DataType::FLOAT)]);
    run(&graph, CompileContext::new(records.map().clone()), &mut records);
    for i in 0..2 {
        assert_eq!(records.get(i, "Moved"), Some(Value::Vec3(Vec3::splat(2.0))));
        assert_close(records.get(i, "Seen").unwrap().as_f32(), 1.0, "x before the last iteration");
    }
}
