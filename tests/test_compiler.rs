//! Integration tests: compilation and single-record evaluation
//!
//! Author: Moroya Sakamoto

mod common;

use alice_magma::prelude::*;
use common::*;

fn compile(graph: &Graph, records: &ParticleSet) -> Result<CompiledGraph, CompileError> {
    CompiledGraph::compile(graph, &CompileContext::new(records.map().clone()))
}

// ============================================================================
// Type checking
// ============================================================================

#[test]
fn mismatch_lists_every_overload() {
    let mut graph = Graph::standard();
    let add = graph.create_node("Add").unwrap();
    graph.set_input_default_value(add, 0, true).unwrap();
    graph.set_input_default_value(add, 1, Vec3::ONE).unwrap();
    output(&mut graph, "Color", add, 0);

    let records = line(1, &[("Color", DataType::VEC3)]);
    match compile(&graph, &records) {
        Err(CompileError::TypeMismatch {
            node,
            observed,
            alternatives,
            ..
        }) => {
            assert_eq!(node, add);
            assert_eq!(
                observed,
                vec![SocketType::Data(DataType::BOOL), SocketType::Data(DataType::VEC3)]
            );
            assert_eq!(alternatives.len(), 3);
        }
        other => panic!("expected a type mismatch, got {:?}", other),
    }
}

#[test]
fn output_arity_must_match_channel() {
    let mut graph = Graph::standard();
    let pos = channel(&mut graph, "Position");
    let out = output(&mut graph, "Weight", pos, 0);

    let records = line(1, &[("Weight", DataType::FLOAT)]);
    assert_eq!(
        compile(&graph, &records).unwrap_err(),
        CompileError::ArityMismatch {
            node: out,
            channel: "Weight".into(),
            expected: 1,
            found: 3,
        }
    );
}

#[test]
fn float_into_int_channel_is_rejected() {
    let mut graph = Graph::standard();
    let value = graph.create_node("InputValue").unwrap();
    output(&mut graph, "Count", value, 0);

    let records = line(1, &[("Count", DataType::INT)]);
    assert!(matches!(
        compile(&graph, &records),
        Err(CompileError::IncompatibleChannelType { .. })
    ));
}

#[test]
fn bool_into_int_channel_converts() {
    // Flag = float(Index) < 2
    let mut graph = Graph::standard();
    let index = channel(&mut graph, "Index");
    let to_float = graph.create_node("ToFloat").unwrap();
    graph.set_input(to_float, 0, index, 0).unwrap();
    let less = graph.create_node("Less").unwrap();
    graph.set_input(less, 0, to_float, 0).unwrap();
    graph.set_input_default_value(less, 1, 2.0f32).unwrap();
    output(&mut graph, "Flag", less, 0);

    let mut records = line(4, &[("Flag", DataType::INT)]);
    run(&graph, CompileContext::new(records.map().clone()), &mut records);
    let flags: Vec<Value> = (0..4).map(|i| records.get(i, "Flag").unwrap()).collect();
    assert_eq!(
        flags,
        vec![Value::Int(1), Value::Int(1), Value::Int(0), Value::Int(0)]
    );
}

// ============================================================================
// Structural errors
// ============================================================================

#[test]
fn unconnected_output_is_reported() {
    let mut graph = Graph::standard();
    let out = graph.create_node("Output").unwrap();
    let records = line(1, &[("Color", DataType::VEC3)]);
    assert_eq!(
        compile(&graph, &records).unwrap_err(),
        CompileError::UnconnectedInput { node: out, input: 0 }
    );
}

#[test]
fn missing_interface_object() {
    let mut graph = Graph::standard();
    let geo = interface(&mut graph, "InputGeometry", "nowhere");
    let counts = graph.create_node("MeshQuery").unwrap();
    graph.set_input(counts, 0, geo, 0).unwrap();
    output(&mut graph, "Faces", counts, 0);

    let records = line(1, &[("Faces", DataType::INT)]);
    match compile(&graph, &records) {
        Err(CompileError::UnknownInterface { node, kind, name }) => {
            assert_eq!(node, geo);
            assert_eq!(kind, "geometry");
            assert_eq!(name, "nowhere");
        }
        other => panic!("expected a missing interface, got {:?}", other),
    }
}

#[test]
fn unknown_channel_names_the_node() {
    let mut graph = Graph::standard();
    let velocity = channel(&mut graph, "Velocity");
    output(&mut graph, "Color", velocity, 0);

    let records = line(1, &[("Color", DataType::VEC3)]);
    assert_eq!(
        compile(&graph, &records).unwrap_err(),
        CompileError::UnknownChannel {
            node: velocity,
            channel: "Velocity".into(),
        }
    );
}

// ============================================================================
// Listing and inspection
// ============================================================================

#[test]
fn listing_is_deterministic() {
    let graph = field_graph();
    let records = line(1, &[("Value", DataType::FLOAT)]);
    let a = compile(&graph, &records).unwrap().to_string();
    let b = compile(&graph.clone(), &records).unwrap().to_string();
    assert_eq!(a, b);
    assert!(a.starts_with("; "));
    assert!(a.contains("domain"));
}

#[test]
fn channel_sets_and_self_reference() {
    let records = line(1, &[("Value", DataType::FLOAT)]);
    let compiled = compile(&field_graph(), &records).unwrap();
    assert!(compiled.reads().contains("Position"));
    assert!(compiled.writes().contains("Value"));
    assert!(!compiled.is_self_referential());

    // Position = Position + X reads what it writes
    let mut graph = Graph::standard();
    let pos = channel(&mut graph, "Position");
    let add = graph.create_node("Add").unwrap();
    graph.set_input(add, 0, pos, 0).unwrap();
    graph.set_input_default_value(add, 1, Vec3::X).unwrap();
    output(&mut graph, "Position", add, 0);
    let mut records = line(3, &[]);
    let compiled = run(&graph, CompileContext::new(records.map().clone()), &mut records);
    assert!(compiled.is_self_referential());
    assert_eq!(records.position(2), Some(Vec3::new(3.0, 0.0, 0.0)));
}

#[test]
fn debug_eval_reports_intermediate_values() {
    let graph = field_graph();
    let magnitude = graph
        .nodes()
        .find(|n| n.type_name() == "Magnitude")
        .map(|n| n.id())
        .unwrap();
    let records = line(5, &[("Value", DataType::FLOAT)]);
    let compiled = compile(&graph, &records).unwrap();

    let before = records.records().record(3).to_vec();
    let values = compiled.debug_eval(3, records.records().record(3));
    assert_eq!(records.records().record(3), before.as_slice());
    assert_eq!(values.get(magnitude), Some(&[Value::Float(3.0)][..]));
    assert!(values.len() >= 4);

    // eval_record on a copy gives the same final value
    let mut record = before.clone();
    compiled.eval_record(3, &mut record);
    let mut scratch = records.clone();
    scratch.records_mut().record_mut(3).copy_from_slice(&record);
    assert_close(scratch.get(3, "Value").unwrap().as_f32(), 1.5 + 3.0, "index 3");
}
