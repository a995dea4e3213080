//! Integration tests: geometry and particle queries
//!
//! Author: Moroya Sakamoto

mod common;

use alice_magma::prelude::*;
use common::*;
use std::sync::Arc;

fn unit_box() -> Arc<dyn Geometry> {
    Arc::new(GeometrySet::new(vec![cube(1.0).unwrap()]))
}

fn three_in_a_row() -> Arc<ParticleSet> {
    cloud(&[
        (Vec3::ZERO, 1.0),
        (Vec3::X, 2.0),
        (Vec3::new(2.0, 0.0, 0.0), 3.0),
    ])
}

/// Wire `outputs` of `node` into same-named channels and evaluate one probe
fn probe_outputs(
    mut graph: Graph,
    node: NodeId,
    at: Vec3,
    outputs: &[(usize, &str, DataType)],
) -> ParticleSet {
    for (socket, name, _) in outputs {
        output(&mut graph, name, node, *socket);
    }
    let channels: Vec<(&str, DataType)> = outputs.iter().map(|(_, n, t)| (*n, *t)).collect();
    let mut probe = probe(at, &channels);
    let ctx = CompileContext::new(probe.map().clone())
        .with_geometry("box", unit_box())
        .with_particles("cloud", three_in_a_row());
    run(&graph, ctx, &mut probe);
    probe
}

fn geometry_node(type_name: &str) -> (Graph, NodeId) {
    let mut graph = Graph::standard();
    let geo = interface(&mut graph, "InputGeometry", "box");
    let node = graph.create_node(type_name).unwrap();
    graph.set_input(node, 0, geo, 0).unwrap();
    (graph, node)
}

fn particle_node(type_name: &str) -> (Graph, NodeId) {
    let mut graph = Graph::standard();
    let set = interface(&mut graph, "InputParticles", "cloud");
    let node = graph.create_node(type_name).unwrap();
    graph.set_input(node, 0, set, 0).unwrap();
    (graph, node)
}

/// Feed the record position into input `socket`
fn lookup_from_position(graph: &mut Graph, node: NodeId, socket: usize) {
    let pos = channel(graph, "Position");
    graph.set_input(node, socket, pos, 0).unwrap();
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn nearest_point_on_box() {
    let (mut graph, nearest) = geometry_node("NearestPoint");
    lookup_from_position(&mut graph, nearest, 1);
    let probe = probe_outputs(
        graph,
        nearest,
        Vec3::new(3.0, 0.0, 0.0),
        &[
            (0, "Hit", DataType::VEC3),
            (1, "Valid", DataType::INT),
            (4, "Distance", DataType::FLOAT),
            (5, "Normal", DataType::VEC3),
        ],
    );
    let hit = probe.get(0, "Hit").unwrap().as_vec3();
    assert!((hit - Vec3::X).length() < 1e-4, "hit {:?}", hit);
    assert_eq!(probe.get(0, "Valid"), Some(Value::Int(1)));
    assert_close(probe.get(0, "Distance").unwrap().as_f32(), 2.0, "distance");
    let normal = probe.get(0, "Normal").unwrap().as_vec3();
    assert!((normal - Vec3::X).length() < 1e-4, "normal {:?}", normal);
}

#[test]
fn ray_distance_in_direction_units() {
    let (mut graph, ray) = geometry_node("IntersectRay");
    lookup_from_position(&mut graph, ray, 1);
    graph.set_input_default_value(ray, 2, Vec3::new(0.0, 0.0, 2.0)).unwrap();
    let probe = probe_outputs(
        graph,
        ray,
        Vec3::new(0.0, 0.0, -5.0),
        &[(0, "Hit", DataType::VEC3), (4, "Distance", DataType::FLOAT)],
    );
    let hit = probe.get(0, "Hit").unwrap().as_vec3();
    assert!((hit - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4, "hit {:?}", hit);
    assert_close(probe.get(0, "Distance").unwrap().as_f32(), 2.0, "ray parameter");
}

#[test]
fn ray_miss_clears_outputs() {
    let (mut graph, ray) = geometry_node("IntersectRay");
    lookup_from_position(&mut graph, ray, 1);
    let probe = probe_outputs(
        graph,
        ray,
        Vec3::new(5.0, 5.0, 0.0),
        &[(1, "Valid", DataType::INT), (0, "Hit", DataType::VEC3)],
    );
    assert_eq!(probe.get(0, "Valid"), Some(Value::Int(0)));
    assert_eq!(probe.get(0, "Hit"), Some(Value::Vec3(Vec3::ZERO)));
}

#[test]
fn in_volume_inside_and_out() {
    for (at, expected) in [(Vec3::splat(0.5), 1), (Vec3::new(2.0, 0.0, 0.0), 0)] {
        let (mut graph, inside) = geometry_node("InVolume");
        lookup_from_position(&mut graph, inside, 1);
        let probe = probe_outputs(graph, inside, at, &[(0, "Inside", DataType::INT)]);
        assert_eq!(probe.get(0, "Inside"), Some(Value::Int(expected)), "{:?}", at);
    }
}

#[test]
fn mesh_counts() {
    let (graph, counts) = geometry_node("MeshQuery");
    let probe = probe_outputs(
        graph,
        counts,
        Vec3::ZERO,
        &[(0, "Faces", DataType::INT), (1, "Verts", DataType::INT)],
    );
    assert_eq!(probe.get(0, "Faces"), Some(Value::Int(12)));
    assert_eq!(probe.get(0, "Verts"), Some(Value::Int(8)));
}

#[test]
fn face_and_vertex_positions() {
    let (graph, face) = geometry_node("FaceQuery");
    let probe = probe_outputs(graph, face, Vec3::ZERO, &[(0, "At", DataType::VEC3)]);
    let at = probe.get(0, "At").unwrap().as_vec3();
    assert!((at - Vec3::new(1.0 / 3.0, -1.0 / 3.0, -1.0)).length() < 1e-4, "centroid {:?}", at);

    let (mut graph, vertex) = geometry_node("VertexQuery");
    graph.set_input_default_value(vertex, 2, Value::Int(6)).unwrap();
    let probe = probe_outputs(graph, vertex, Vec3::ZERO, &[(0, "At", DataType::VEC3)]);
    assert_eq!(probe.get(0, "At"), Some(Value::Vec3(Vec3::ONE)));
}

// ============================================================================
// Particles
// ============================================================================

#[test]
fn nearest_particle_by_rank() {
    let (mut graph, nearest) = particle_node("NearestParticle");
    graph.set_property(nearest, "whichNearest", 2).unwrap();
    let probe = probe_outputs(
        graph,
        nearest,
        Vec3::ZERO,
        &[
            (0, "Found", DataType::VEC3),
            (1, "Valid", DataType::INT),
            (2, "Which", DataType::INT),
        ],
    );
    assert_eq!(probe.get(0, "Found"), Some(Value::Vec3(Vec3::X)));
    assert_eq!(probe.get(0, "Valid"), Some(Value::Int(1)));
    assert_eq!(probe.get(0, "Which"), Some(Value::Int(1)));

    let (mut graph, nearest) = particle_node("NearestParticle");
    graph.set_property(nearest, "whichNearest", 4).unwrap();
    let probe = probe_outputs(graph, nearest, Vec3::ZERO, &[(1, "Valid", DataType::INT)]);
    assert_eq!(probe.get(0, "Valid"), Some(Value::Int(0)));
}

#[test]
fn particle_sum_count_weights() {
    let (mut graph, sum) = particle_node("ParticleSumCount");
    graph.set_input_default_value(sum, 2, Value::Int(2)).unwrap();
    graph.set_input_default_value(sum, 3, 1.0f32).unwrap();
    graph.set_property(sum, "channels", vec!["Value".to_string()]).unwrap();
    let probe = probe_outputs(
        graph,
        sum,
        Vec3::ZERO,
        &[
            (0, "MaxDistance", DataType::FLOAT),
            (1, "Weight", DataType::FLOAT),
            (2, "Sum", DataType::FLOAT),
        ],
    );
    // Weights (1 + d)^-1 for d = 0 and 1
    assert_close(probe.get(0, "MaxDistance").unwrap().as_f32(), 1.0, "max distance");
    assert_close(probe.get(0, "Weight").unwrap().as_f32(), 1.5, "total weight");
    assert_close(probe.get(0, "Sum").unwrap().as_f32(), 1.0 + 2.0 * 0.5, "weighted sum");
}

#[test]
fn particle_sum_radius_weights() {
    let (mut graph, sum) = particle_node("ParticleSumRadius");
    graph.set_input_default_value(sum, 2, 2.0f32).unwrap();
    graph.set_property(sum, "channels", vec!["Value".to_string()]).unwrap();
    let probe = probe_outputs(
        graph,
        sum,
        Vec3::ZERO,
        &[
            (0, "Count", DataType::INT),
            (1, "Weight", DataType::FLOAT),
            (2, "Sum", DataType::FLOAT),
        ],
    );
    // Weights (1 - d/2)^1 for d = 0 and 1; the particle at 2 weighs nothing
    assert_close(probe.get(0, "Weight").unwrap().as_f32(), 1.5, "total weight");
    assert_close(probe.get(0, "Sum").unwrap().as_f32(), 1.0 + 2.0 * 0.5, "weighted sum");
    assert!(matches!(probe.get(0, "Count"), Some(Value::Int(2 | 3))));
}

#[test]
fn particle_query_reads_by_index() {
    let (mut graph, query) = particle_node("ParticleQuery");
    graph.set_input_default_value(query, 1, Value::Int(2)).unwrap();
    graph.set_property(query, "channels", vec!["Value".to_string()]).unwrap();
    let probe = probe_outputs(graph, query, Vec3::ZERO, &[(0, "Read", DataType::FLOAT)]);
    assert_eq!(probe.get(0, "Read"), Some(Value::Float(3.0)));

    // Out of range reads zero
    let (mut graph, query) = particle_node("ParticleQuery");
    graph.set_input_default_value(query, 1, Value::Int(9)).unwrap();
    graph.set_property(query, "channels", vec!["Value".to_string()]).unwrap();
    let probe = probe_outputs(graph, query, Vec3::ZERO, &[(0, "Read", DataType::FLOAT)]);
    assert_eq!(probe.get(0, "Read"), Some(Value::Float(0.0)));
}
