//! Graph persistence
//!
//! Graphs are stored as versioned JSON documents listing every node with
//! its sockets, connections and properties. Loading rebuilds the graph
//! through the same invariant checks as editing: unknown node types,
//! dangling connections and cycles are rejected.
//!
//! Author: Moroya Sakamoto

mod json;

pub use json::{from_json_string, load_graph_json, load_graph_json_with, save_graph_json, to_json_string};

use crate::graph::{Graph, GraphError, Node, NodeId};
use crate::nodes::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Current document version
pub const FORMAT_VERSION: u32 = 1;

/// File I/O errors
#[derive(Error, Debug)]
pub enum IoError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Document written by a newer format
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Document describes an invalid graph
    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),
}

/// On-disk form of a [`Graph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Format version
    pub version: u32,
    /// Writer identification
    #[serde(default)]
    pub generator: String,
    /// Top-level node ids in order
    pub root: Vec<NodeId>,
    /// Every node, containers' source and sink included
    pub nodes: Vec<Node>,
}

impl GraphDocument {
    /// Snapshot a graph
    pub fn from_graph(graph: &Graph) -> Self {
        GraphDocument {
            version: FORMAT_VERSION,
            generator: format!("alice-magma {}", crate::VERSION),
            root: graph.root_ids().to_vec(),
            nodes: graph.nodes().cloned().collect(),
        }
    }

    /// Rebuild the graph over `registry`
    ///
    /// Properties a node type declares but the document lacks are filled
    /// with their defaults.
    pub fn into_graph(mut self, registry: Arc<NodeRegistry>) -> Result<Graph, IoError> {
        if self.version > FORMAT_VERSION {
            return Err(IoError::UnsupportedVersion(self.version));
        }
        for node in &mut self.nodes {
            let Some(ty) = registry.get(&node.type_name) else {
                continue;
            };
            for decl in &ty.properties {
                if !node.properties.contains_key(decl.name) {
                    log::warn!(
                        "{} ({}) is missing property {}; using the default",
                        node.id,
                        node.type_name,
                        decl.name
                    );
                    node.properties
                        .insert(decl.name.to_string(), decl.default.clone());
                }
            }
        }
        Ok(Graph::from_parts(registry, self.nodes, self.root)?)
    }
}
