//! JSON graph documents
//!
//! Author: Moroya Sakamoto

use super::{GraphDocument, IoError};
use crate::graph::Graph;
use crate::nodes::NodeRegistry;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

/// Save a graph as pretty-printed JSON
pub fn save_graph_json(graph: &Graph, path: impl AsRef<Path>) -> Result<(), IoError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &GraphDocument::from_graph(graph))
        .map_err(|e| IoError::Serialization(e.to_string()))
}

/// Load a graph over the built-in node types
pub fn load_graph_json(path: impl AsRef<Path>) -> Result<Graph, IoError> {
    load_graph_json_with(path, Arc::new(NodeRegistry::standard()))
}

/// Load a graph over a custom registry
pub fn load_graph_json_with(
    path: impl AsRef<Path>,
    registry: Arc<NodeRegistry>,
) -> Result<Graph, IoError> {
    let reader = BufReader::new(File::open(path)?);
    let doc: GraphDocument =
        serde_json::from_reader(reader).map_err(|e| IoError::Serialization(e.to_string()))?;
    doc.into_graph(registry)
}

/// Serialize a graph to a JSON string
pub fn to_json_string(graph: &Graph) -> Result<String, IoError> {
    serde_json::to_string_pretty(&GraphDocument::from_graph(graph))
        .map_err(|e| IoError::Serialization(e.to_string()))
}

/// Parse a graph from a JSON string, over the built-in node types
pub fn from_json_string(json: &str) -> Result<Graph, IoError> {
    let doc: GraphDocument =
        serde_json::from_str(json).map_err(|e| IoError::Serialization(e.to_string()))?;
    doc.into_graph(Arc::new(NodeRegistry::standard()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("alice_magma_json_{}", name));
        path
    }

    fn sample() -> Graph {
        let mut graph = Graph::standard();
        let pos = graph.create_node("InputChannel").unwrap();
        let add = graph.create_node("Add").unwrap();
        graph.set_input(add, 0, pos, 0).unwrap();
        let out = graph.create_node("Output").unwrap();
        graph.set_input(out, 0, add, 0).unwrap();
        graph.create_node("Loop").unwrap();
        graph
    }

    #[test]
    fn test_save_load_file() {
        let graph = sample();
        let path = temp_path("sample.json");

        save_graph_json(&graph, &path).unwrap();
        let loaded = load_graph_json(&path).unwrap();

        assert_eq!(loaded.len(), graph.len());
        assert_eq!(loaded.outputs(), graph.outputs());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_string_round_trip() {
        let graph = sample();
        let json = to_json_string(&graph).unwrap();
        let loaded = from_json_string(&json).unwrap();
        assert_eq!(
            loaded.nodes().collect::<Vec<_>>(),
            graph.nodes().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_rejects_future_version() {
        let json = r#"{"version": 99, "root": [], "nodes": []}"#;
        assert!(matches!(
            from_json_string(json),
            Err(IoError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let graph = sample();
        let json = to_json_string(&graph).unwrap().replace("\"Add\"", "\"Frobnicate\"");
        assert!(matches!(
            from_json_string(&json),
            Err(IoError::Graph(GraphError::UnknownNodeType(_)))
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            from_json_string("{ not json"),
            Err(IoError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_io() {
        assert!(matches!(
            load_graph_json(temp_path("does_not_exist.json")),
            Err(IoError::Io(_))
        ));
    }
}
