//! Compiled graphs: a flat expression list over a per-record arena
//!
//! [`CompiledGraph::compile`] walks a [`Graph`] from its `Output` nodes and
//! emits an ordered list of expressions. Evaluation runs the list once per
//! record against an [`Arena`] holding every temporary.
//!
//! # Example
//!
//! ```rust
//! use alice_magma::prelude::*;
//!
//! let mut graph = Graph::standard();
//! let pos = graph.create_node("InputChannel").unwrap();
//! let out = graph.create_node("Output").unwrap();
//! graph.set_property(out, "channelName", "Offset").unwrap();
//! graph.set_input(out, 0, pos, 0).unwrap();
//!
//! let map = ChannelMap::from_channels([
//!     ("Position", DataType::VEC3),
//!     ("Offset", DataType::VEC3),
//! ]).unwrap();
//! let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map)).unwrap();
//! assert_eq!(compiled.len(), 2);
//! ```
//!
//! Author: Moroya Sakamoto

mod arena;
mod compiler;
mod eval;
mod expression;
mod loops;
mod queries;

pub use arena::{Arena, Slot, TempAllocator};
pub use eval::{NodeValues, RecordRow};
pub use expression::Expr;
pub use loops::{Accumulator, Foreach, IterationVars, LoopSource, SearchMode};
pub use queries::{ChannelCopy, Query, SumMode};

use crate::geometry::Geometry;
use crate::graph::{Graph, NodeId};
use crate::ops::Signature;
use crate::particles::ParticleSet;
use crate::types::{ChannelMap, DataType, SocketType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for graph compilation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A required input has neither a connection nor a default value
    #[error("Input {input} of node {node} is not connected")]
    UnconnectedInput {
        /// Node owning the socket
        node: NodeId,
        /// Socket index
        input: usize,
    },

    /// A node was reached again while its inputs were being compiled
    #[error("Cycle detected at node {0}")]
    CycleDetected(NodeId),

    /// No declared overload accepts the connected input types
    #[error("Node {node} ({type_name}) has no overload for ({}); expected one of: {}", join(observed), join(alternatives))]
    TypeMismatch {
        /// Offending node
        node: NodeId,
        /// Type name of the node
        type_name: String,
        /// Types found on the inputs
        observed: Vec<SocketType>,
        /// Every accepted overload
        alternatives: Vec<Signature>,
    },

    /// A channel named by a node does not exist
    #[error("Node {node}: channel \"{channel}\" not available")]
    UnknownChannel {
        /// Node naming the channel
        node: NodeId,
        /// Channel name
        channel: String,
    },

    /// An Output node writes a value of the wrong arity
    #[error("Node {node}: cannot write {found} elements to channel \"{channel}\" of arity {expected}")]
    ArityMismatch {
        /// Output node
        node: NodeId,
        /// Destination channel
        channel: String,
        /// Destination arity
        expected: u8,
        /// Arity of the written value
        found: u8,
    },

    /// An Output node writes a value whose primitive the channel cannot hold
    #[error("Node {node}: cannot write {from} to channel \"{channel}\" of type {to}")]
    IncompatibleChannelType {
        /// Output node
        node: NodeId,
        /// Destination channel
        channel: String,
        /// Written type
        from: DataType,
        /// Channel type
        to: DataType,
    },

    /// A connection names an output the upstream node does not have
    #[error("Node {node} has no output {output}")]
    InvalidOutputSocket {
        /// Upstream node
        node: NodeId,
        /// Requested output
        output: usize,
    },

    /// A named geometry or particle collaborator is missing from the context
    #[error("Node {node}: no {kind} named \"{name}\" in the compile context")]
    UnknownInterface {
        /// Input node
        node: NodeId,
        /// "geometry" or "particles"
        kind: &'static str,
        /// Requested name
        name: String,
    },

    /// A LoopChannel node outside of any loop body
    #[error("LoopChannel node {0} is not inside a loop")]
    LoopChannelOutsideLoop(NodeId),

    /// The registry does not know the node's type
    #[error("Node {node} has unknown type \"{type_name}\"")]
    UnknownNodeType {
        /// Offending node
        node: NodeId,
        /// Missing type name
        type_name: String,
    },

    /// Internal invariant violated; always a bug
    #[error("Internal compiler error: {0}")]
    Internal(String),
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Kind of record a compiled graph iterates over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Domain {
    /// Particle records
    #[default]
    Particles,
    /// Mesh vertex records
    Vertices,
    /// Mesh face records
    Faces,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Particles => write!(f, "particles"),
            Domain::Vertices => write!(f, "vertices"),
            Domain::Faces => write!(f, "faces"),
        }
    }
}

/// What a compiled graph may read, write and query
#[derive(Clone, Default)]
pub struct CompileContext {
    map: ChannelMap,
    domain: Domain,
    geometries: BTreeMap<String, Arc<dyn Geometry>>,
    particles: BTreeMap<String, Arc<ParticleSet>>,
}

impl CompileContext {
    /// Context over particle records laid out by `map`
    pub fn new(map: ChannelMap) -> Self {
        CompileContext {
            map,
            ..Default::default()
        }
    }

    /// Change the iteration domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Make a geometry available to `InputGeometry` nodes
    pub fn with_geometry(mut self, name: impl Into<String>, geometry: Arc<dyn Geometry>) -> Self {
        self.geometries.insert(name.into(), geometry);
        self
    }

    /// Make a particle set available to `InputParticles` nodes
    pub fn with_particles(mut self, name: impl Into<String>, particles: Arc<ParticleSet>) -> Self {
        self.particles.insert(name.into(), particles);
        self
    }

    /// Record layout
    #[inline]
    pub fn map(&self) -> &ChannelMap {
        &self.map
    }

    /// Iteration domain
    #[inline]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Named geometry
    pub fn geometry(&self, name: &str) -> Option<&Arc<dyn Geometry>> {
        self.geometries.get(name)
    }

    /// Named particle set
    pub fn particles(&self, name: &str) -> Option<&Arc<ParticleSet>> {
        self.particles.get(name)
    }
}

impl fmt::Debug for CompileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileContext")
            .field("channels", &self.map.len())
            .field("domain", &self.domain)
            .field("geometries", &self.geometries.keys().collect::<Vec<_>>())
            .field("particles", &self.particles.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A graph compiled against one record layout
///
/// Immutable after compilation and shared by reference between worker
/// threads during evaluation.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    exprs: Vec<Expr>,
    constants: Vec<(Slot, Value)>,
    arena_size: usize,
    allocations: Vec<Slot>,
    map: ChannelMap,
    domain: Domain,
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    node_slots: Vec<(NodeId, Vec<Slot>)>,
}

impl CompiledGraph {
    /// Compile every top-level Output node of `graph`
    pub fn compile(graph: &Graph, ctx: &CompileContext) -> Result<Self, CompileError> {
        compiler::Compiler::new(graph, ctx).finish()
    }

    /// Top-level expressions in execution order
    #[inline]
    pub fn expressions(&self) -> &[Expr] {
        &self.exprs
    }

    /// Number of top-level expressions (constants included)
    #[inline]
    pub fn len(&self) -> usize {
        self.exprs.len() + self.constants.len()
    }

    /// True if nothing is computed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deduplicated constants
    #[inline]
    pub fn constants(&self) -> &[(Slot, Value)] {
        &self.constants
    }

    /// Bytes needed per record arena
    #[inline]
    pub fn arena_size(&self) -> usize {
        self.arena_size
    }

    /// Every temporary allocated for this pass, in allocation order
    #[inline]
    pub fn allocations(&self) -> &[Slot] {
        &self.allocations
    }

    /// Record layout this graph was compiled against
    #[inline]
    pub fn map(&self) -> &ChannelMap {
        &self.map
    }

    /// Iteration domain
    #[inline]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Record channels read by the pass
    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }

    /// Record channels written by the pass
    pub fn writes(&self) -> &BTreeSet<String> {
        &self.writes
    }

    /// True if some channel is both read and written
    pub fn is_self_referential(&self) -> bool {
        self.reads.intersection(&self.writes).next().is_some()
    }

    /// A fresh arena with the constants already in place
    pub fn new_arena(&self) -> Arena {
        let mut arena = Arena::new(self.arena_size);
        for (slot, value) in &self.constants {
            arena.write(*slot, value);
        }
        arena
    }
}

impl fmt::Display for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} expressions, {} constants, arena {} bytes, domain {}",
            self.exprs.len(),
            self.constants.len(),
            self.arena_size,
            self.domain
        )?;
        for (slot, value) in &self.constants {
            writeln!(f, "{} = const {}", slot, value)?;
        }
        for expr in &self.exprs {
            expr.fmt_indented(f, 0)?;
        }
        Ok(())
    }
}
