//! Integration tests: graph document round-trips
//!
//! Verifies that saved graphs reload with the same structure and compile to
//! the same pass, containers included.
//!
//! Author: Moroya Sakamoto

mod common;

use alice_magma::io::{from_json_string, to_json_string, GraphDocument, FORMAT_VERSION};
use alice_magma::prelude::*;
use common::*;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("alice_magma_test_io");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn listing(graph: &Graph, ctx: &CompileContext) -> String {
    CompiledGraph::compile(graph, ctx).unwrap().to_string()
}

// ============================================================================
// File round-trip
// ============================================================================

#[test]
fn loop_graph_file_round_trip() {
    let graph = neighbor_sum_graph("Count", Value::Int(2));
    let path = temp_dir().join("neighbor_sum.json");

    save_graph_json(&graph, &path).expect("save_graph_json failed");
    let loaded = load_graph_json(&path).expect("load_graph_json failed");

    assert_eq!(loaded.len(), graph.len());
    assert_eq!(loaded.outputs(), graph.outputs());
    assert_eq!(
        loaded.nodes().collect::<Vec<_>>(),
        graph.nodes().collect::<Vec<_>>()
    );

    let set = cloud(&[(Vec3::ZERO, 1.0), (Vec3::X, 2.0), (Vec3::Y * 5.0, 4.0)]);
    let probe = probe(Vec3::ZERO, &[("Sum", DataType::FLOAT)]);
    let ctx = CompileContext::new(probe.map().clone()).with_particles("cloud", set);
    assert_eq!(listing(&loaded, &ctx), listing(&graph, &ctx));

    let mut a = probe.clone();
    let mut b = probe;
    run(&graph, ctx.clone(), &mut a);
    run(&loaded, ctx, &mut b);
    assert_eq!(a.get(0, "Sum"), b.get(0, "Sum"));
    assert_close(b.get(0, "Sum").unwrap().as_f32(), 3.0, "two nearest");

    std::fs::remove_file(&path).ok();
}

#[test]
fn compound_survives_string_round_trip() {
    let mut graph = field_graph();
    let inner: Vec<NodeId> = graph
        .nodes()
        .filter(|n| matches!(n.type_name(), "Magnitude" | "Add"))
        .map(|n| n.id())
        .collect();
    let compound = graph.create_compound(&inner).unwrap();

    let json = to_json_string(&graph).unwrap();
    let mut loaded = from_json_string(&json).unwrap();
    assert_eq!(loaded.type_name(compound).unwrap(), "Compound");
    assert_eq!(loaded.num_nodes(Some(compound)).unwrap(), graph.num_nodes(Some(compound)).unwrap());

    // The reloaded graph stays editable
    let restored = loaded.explode_compound(compound).unwrap();
    assert_eq!(restored.len(), inner.len());
    let records = line(8, &[("Value", DataType::FLOAT)]);
    let ctx = CompileContext::new(records.map().clone());
    assert_eq!(listing(&loaded, &ctx).lines().count(), listing(&field_graph(), &ctx).lines().count());
}

// ============================================================================
// Document validation
// ============================================================================

#[test]
fn document_carries_version_and_generator() {
    let doc = GraphDocument::from_graph(&field_graph());
    assert_eq!(doc.version, FORMAT_VERSION);
    assert!(doc.generator.starts_with("alice-magma"));
    assert_eq!(doc.nodes.len(), field_graph().len());
}

#[test]
fn dangling_connection_rejected() {
    let mut doc = GraphDocument::from_graph(&field_graph());
    let magnitude = doc
        .nodes
        .iter()
        .position(|n| n.type_name() == "Magnitude")
        .unwrap();
    let removed = doc.nodes.remove(magnitude).id();
    doc.root.retain(|id| *id != removed);

    assert!(matches!(
        doc.into_graph(Arc::new(NodeRegistry::standard())),
        Err(IoError::Graph(_))
    ));
}

#[test]
fn missing_properties_filled_on_load() {
    let mut graph = Graph::standard();
    let lp = graph.create_node("Loop").unwrap();
    let json = to_json_string(&graph).unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for node in value["nodes"].as_array_mut().unwrap() {
        if let Some(props) = node.get_mut("properties").and_then(|p| p.as_object_mut()) {
            props.remove("maxIterations");
        }
    }
    let loaded = from_json_string(&value.to_string()).unwrap();
    assert_eq!(
        loaded.property(lp, "maxIterations").unwrap(),
        graph.property(lp, "maxIterations").unwrap()
    );
}
