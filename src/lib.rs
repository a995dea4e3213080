//! # ALICE-Magma
//!
//! **A node-graph expression language for per-record computation**
//!
//! Users wire typed operator nodes into a graph; the graph is compiled into
//! a flat list of expressions over a per-record scratch arena, then run
//! over every record of a particle set or mesh in parallel.
//!
//! ## Features
//!
//! - **Graph**: id-addressed nodes, containers (compounds, loops), cycle-checked edits
//! - **Types**: channel maps over packed records with conversions at the boundary
//! - **Operators**: arithmetic, vector, quaternion, logic, comparison, random
//! - **Compiler**: overload resolution, constant dedup, compound inlining, loops
//! - **Queries**: nearest point, ray cast, inside test, k-nearest and radius particle sums
//! - **Drivers**: chunked rayon passes, buffered when a channel is read and written
//! - **File I/O**: versioned JSON graph documents
//!
//! ## Example
//!
//! ```rust
//! use alice_magma::prelude::*;
//!
//! // Color = Position + (0, 1, 0)
//! let mut graph = Graph::standard();
//! let pos = graph.create_node("InputChannel").unwrap();
//! let add = graph.create_node("Add").unwrap();
//! graph.set_input(add, 0, pos, 0).unwrap();
//! graph.set_input_default_value(add, 1, Vec3::Y).unwrap();
//! let out = graph.create_node("Output").unwrap();
//! graph.set_input(out, 0, add, 0).unwrap();
//!
//! let mut particles = ParticleSet::from_positions(
//!     &[Vec3::ZERO, Vec3::X],
//!     &[("Color", DataType::VEC3)],
//! ).unwrap();
//! let ctx = CompileContext::new(particles.map().clone());
//! let compiled = CompiledGraph::compile(&graph, &ctx).unwrap();
//! eval_particles(&compiled, &mut particles, &EvalConfig::default()).unwrap();
//!
//! assert_eq!(particles.get(1, "Color"), Some(Value::Vec3(Vec3::new(1.0, 1.0, 0.0))));
//! ```
//!
//! ## Author
//!
//! Moroya Sakamoto

#![warn(missing_docs)]

pub mod types;
pub mod ops;
pub mod nodes;
pub mod graph;
pub mod geometry;
pub mod particles;
pub mod compiled;
pub mod eval;
pub mod io;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::types::{
        ChannelBuffer, ChannelError, ChannelMap, DataType, ScalarType, SocketType, Value,
    };
    pub use crate::nodes::{NodeRegistry, NodeType, PropertyValue};
    pub use crate::graph::{Connection, Graph, GraphError, NodeId};
    pub use crate::geometry::{cube, Geometry, GeometrySet, TriMesh};
    pub use crate::particles::ParticleSet;
    pub use crate::compiled::{CompileContext, CompileError, CompiledGraph, Domain};
    pub use crate::eval::{eval_mesh, eval_particles, run_pass, EvalConfig, EvalError};
    pub use crate::io::{load_graph_json, save_graph_json, IoError};
    pub use glam::{Quat, Vec3};
}

// Re-exports for convenience
pub use compiled::CompiledGraph;
pub use graph::Graph;
pub use io::{load_graph_json, save_graph_json};
