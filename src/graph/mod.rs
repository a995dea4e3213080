//! Mutable node graph
//!
//! A [`Graph`] is an id-addressed arena of [`Node`]s. Nodes live either at
//! the top level or inside a container (compound or loop) which owns an
//! implicit *source* node, exposing the container's inputs to its children,
//! and an implicit *sink* node, collecting the container's outputs.
//!
//! Connections only join nodes that share a container. Every edit that
//! could introduce a cycle is checked before it is committed, so a graph
//! that has been successfully edited is always acyclic.
//!
//! # Example
//!
//! ```rust
//! use alice_magma::graph::Graph;
//!
//! let mut graph = Graph::standard();
//! let pos = graph.create_node("InputChannel").unwrap();
//! let add = graph.create_node("Add").unwrap();
//! let out = graph.create_node("Output").unwrap();
//! graph.set_input(add, 0, pos, 0).unwrap();
//! graph.set_input(out, 0, add, 0).unwrap();
//!
//! // Feeding the output back into the adder would close a loop
//! assert!(graph.set_input(add, 1, add, 0).is_err());
//! ```
//!
//! Author: Moroya Sakamoto

mod compound;
mod node;
mod property;

pub use node::{ContainerBody, InputSocket, Node};

use crate::nodes::{NodeKind, NodeRegistry, NodeType};
use crate::nodes::{COMPOUND_SINK, COMPOUND_SOURCE, LOOP_SINK, LOOP_SOURCE};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Process-unique node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Upstream end of an edge: an output socket of some node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Node producing the value
    pub node: NodeId,
    /// Output socket index on that node
    pub output: usize,
}

impl Connection {
    /// Connection to `node`'s output `output`
    #[inline]
    pub fn new(node: NodeId, output: usize) -> Self {
        Connection { node, output }
    }
}

/// Graph editing errors
///
/// A failed edit leaves the graph unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// No registered type has this name
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// The type exists but is managed by the graph itself
    #[error("Node type {0} cannot be created directly")]
    InternalNodeType(String),

    /// No node has this id
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    /// Socket index out of range
    #[error("Node {node} has no {kind} socket {socket}")]
    InvalidSocket {
        /// Node
        node: NodeId,
        /// Requested index
        socket: usize,
        /// "input" or "output"
        kind: &'static str,
    },

    /// The edit would make a node reachable from itself
    #[error("Connecting {upstream} into {target} would create a cycle")]
    CycleDetected {
        /// Node whose input was being set
        target: NodeId,
        /// Node that would feed it
        upstream: NodeId,
    },

    /// Derived properties cannot be set
    #[error("Property '{property}' of {node} is read-only")]
    ReadOnlyProperty {
        /// Node
        node: NodeId,
        /// Property name
        property: String,
    },

    /// Value outside an enumerated property's legal set
    #[error("'{value}' is not a legal value of '{property}' (expected one of {accepted:?})")]
    InvalidEnumValue {
        /// Property name
        property: String,
        /// Rejected value
        value: String,
        /// Legal values
        accepted: Vec<String>,
    },

    /// The node type declares no such property
    #[error("Node {node} has no property '{property}'")]
    UnknownProperty {
        /// Node
        node: NodeId,
        /// Property name
        property: String,
    },

    /// Property value of the wrong kind
    #[error("Property '{property}' expects {expected}, got {found}")]
    PropertyType {
        /// Property name
        property: String,
        /// Declared kind
        expected: &'static str,
        /// Supplied kind
        found: &'static str,
    },

    /// Integer property out of range
    #[error("Property '{property}' cannot be {value}")]
    PropertyRange {
        /// Property name
        property: String,
        /// Rejected value
        value: i32,
    },

    /// The node is not a compound or loop
    #[error("Node {0} is not a container")]
    NotAContainer(NodeId),

    /// The node is not a compound
    #[error("Node {0} is not a compound")]
    NotACompound(NodeId),

    /// Output nodes may only live at the top level
    #[error("Output nodes cannot be placed inside a container")]
    OutputInContainer,

    /// Edges may only join nodes that share a container
    #[error("{upstream} and {target} are in different containers")]
    CrossContainerConnection {
        /// Consumer
        target: NodeId,
        /// Producer
        upstream: NodeId,
    },

    /// Unusable node set for a compound
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The node's input count is fixed by its type
    #[error("Node {0} has a fixed number of inputs")]
    FixedInputCount(NodeId),

    /// Container source and sink nodes cannot be deleted or moved
    #[error("Node {0} is owned by its container")]
    ProtectedNode(NodeId),

    /// The node type cannot be bypassed
    #[error("Node {0} cannot be disabled")]
    NotDisableable(NodeId),
}

/// Result alias for graph edits
pub type GraphResult<T> = Result<T, GraphError>;

/// A node graph bound to a registry of node types
#[derive(Debug, Clone)]
pub struct Graph {
    registry: Arc<NodeRegistry>,
    nodes: BTreeMap<NodeId, Node>,
    root: Vec<NodeId>,
    editing: Vec<NodeId>,
}

impl Graph {
    /// Empty graph over a registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Graph {
            registry,
            nodes: BTreeMap::new(),
            root: Vec::new(),
            editing: Vec::new(),
        }
    }

    /// Empty graph over the built-in node types
    pub fn standard() -> Self {
        Self::new(Arc::new(NodeRegistry::standard()))
    }

    /// Node types this graph can instantiate
    #[inline]
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Total number of nodes, implicit container nodes included
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph has no nodes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// All nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Type descriptor of a node
    pub fn node_type(&self, id: NodeId) -> Option<&NodeType> {
        self.nodes
            .get(&id)
            .and_then(|n| self.registry.get(&n.type_name))
    }

    /// Type name of a node
    pub fn type_name(&self, id: NodeId) -> GraphResult<&str> {
        Ok(self.get(id)?.type_name())
    }

    pub(crate) fn get(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.node_type(id).map(|t| t.kind)
    }

    fn next_id(&self) -> NodeId {
        self.nodes
            .keys()
            .next_back()
            .map_or(NodeId(0), |id| NodeId(id.0 + 1))
    }

    // ------------------------------------------------------------------
    // Creation and deletion
    // ------------------------------------------------------------------

    /// Create a node of a public type in the current editing container
    pub fn create_node(&mut self, type_name: &str) -> GraphResult<NodeId> {
        self.create_node_with_id(type_name, None)
    }

    /// Create a node, reusing `requested` as its id when that id is free
    pub fn create_node_with_id(
        &mut self,
        type_name: &str,
        requested: Option<NodeId>,
    ) -> GraphResult<NodeId> {
        let registry = Arc::clone(&self.registry);
        let ty = registry
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        if !ty.public {
            return Err(GraphError::InternalNodeType(type_name.to_string()));
        }

        let parent = self.current_container();
        if ty.kind == NodeKind::Output && parent.is_some() {
            return Err(GraphError::OutputInContainer);
        }

        let id = match requested {
            Some(id) if !self.nodes.contains_key(&id) => id,
            _ => self.next_id(),
        };
        self.spawn(ty, id, parent)?;
        log::trace!("created {} {}", type_name, id);
        Ok(id)
    }

    pub(crate) fn spawn(
        &mut self,
        ty: &NodeType,
        id: NodeId,
        parent: Option<NodeId>,
    ) -> GraphResult<()> {
        self.nodes.insert(id, Node::from_type(id, ty, parent));
        if let Some(children) = self.children_mut(parent) {
            children.push(id);
        }

        if ty.is_container() {
            let (source_name, sink_name) = match ty.loop_kind() {
                Some(_) => (LOOP_SOURCE, LOOP_SINK),
                None => (COMPOUND_SOURCE, COMPOUND_SINK),
            };
            let source = self.spawn_inner(source_name, id)?;
            let sink = self.spawn_inner(sink_name, id)?;
            self.get_mut(id)?.body = Some(ContainerBody {
                source,
                sink,
                children: Vec::new(),
            });
            self.layout_container(id)?;
        }
        Ok(())
    }

    fn spawn_inner(&mut self, type_name: &str, container: NodeId) -> GraphResult<NodeId> {
        let registry = Arc::clone(&self.registry);
        let ty = registry
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        let id = self.next_id();
        self.nodes.insert(id, Node::from_type(id, ty, Some(container)));
        Ok(id)
    }

    /// Delete a node and, for containers, everything inside it
    ///
    /// Inputs elsewhere that read from a deleted node become unconnected.
    pub fn delete_node(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.get(id)?;
        if matches!(self.kind_of(id), Some(NodeKind::Source | NodeKind::Sink)) {
            return Err(GraphError::ProtectedNode(id));
        }
        let parent = node.parent;

        let doomed: HashSet<NodeId> = self.subtree(id).into_iter().collect();
        if let Some(children) = self.children_mut(parent) {
            children.retain(|c| *c != id);
        }
        for d in &doomed {
            self.nodes.remove(d);
        }
        for node in self.nodes.values_mut() {
            for socket in &mut node.inputs {
                if socket.connection.is_some_and(|c| doomed.contains(&c.node)) {
                    socket.connection = None;
                }
            }
        }
        if let Some(pos) = self.editing.iter().position(|c| doomed.contains(c)) {
            self.editing.truncate(pos);
        }
        log::trace!("deleted {} ({} nodes)", id, doomed.len());
        Ok(())
    }

    /// A node followed by everything it contains, depth first
    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(body) = self.nodes.get(&n).and_then(|n| n.body.as_ref()) {
                stack.push(body.source);
                stack.push(body.sink);
                stack.extend(body.children.iter().rev().copied());
            }
        }
        out
    }

    /// Delete `dest` and give its id to `src`
    ///
    /// Every connection that read from `dest` now reads from `src` (when
    /// `src` has that output socket).
    pub fn replace_node(&mut self, dest: NodeId, src: NodeId) -> GraphResult<()> {
        let dest_parent = self.get(dest)?.parent;
        let src_node = self.get(src)?;
        if dest == src {
            return Ok(());
        }
        for id in [dest, src] {
            if matches!(self.kind_of(id), Some(NodeKind::Source | NodeKind::Sink)) {
                return Err(GraphError::ProtectedNode(id));
            }
        }
        if src_node.parent != dest_parent {
            return Err(GraphError::CrossContainerConnection {
                target: dest,
                upstream: src,
            });
        }
        let src_outputs = src_node.outputs.len();

        let consumers = self.consumers(dest);
        let upstream = self.upstream_closure(src, Some(dest));
        if let Some(&(target, _, _)) = consumers.iter().find(|(t, _, _)| upstream.contains(t)) {
            return Err(GraphError::CycleDetected {
                target,
                upstream: src,
            });
        }

        self.delete_node(dest)?;
        self.rename(src, dest);
        for (target, input, output) in consumers {
            if target == src || output >= src_outputs {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&target) {
                node.inputs[input].connection = Some(Connection::new(dest, output));
            }
        }
        Ok(())
    }

    fn rename(&mut self, old: NodeId, new: NodeId) {
        let Some(mut node) = self.nodes.remove(&old) else {
            return;
        };
        node.id = new;
        if let Some(body) = &node.body {
            let mut inner = body.children.clone();
            inner.push(body.source);
            inner.push(body.sink);
            for c in inner {
                if let Some(child) = self.nodes.get_mut(&c) {
                    child.parent = Some(new);
                }
            }
        }
        let parent = node.parent;
        self.nodes.insert(new, node);

        if let Some(children) = self.children_mut(parent) {
            for c in children.iter_mut().filter(|c| **c == old) {
                *c = new;
            }
        }
        for n in self.nodes.values_mut() {
            for socket in &mut n.inputs {
                if let Some(conn) = socket.connection.as_mut().filter(|c| c.node == old) {
                    conn.node = new;
                }
            }
        }
        for c in self.editing.iter_mut().filter(|c| **c == old) {
            *c = new;
        }
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root.clear();
        self.editing.clear();
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect `upstream`'s output `output` into `target`'s input `input`
    pub fn set_input(
        &mut self,
        target: NodeId,
        input: usize,
        upstream: NodeId,
        output: usize,
    ) -> GraphResult<()> {
        let t = self.get(target)?;
        if input >= t.inputs.len() {
            return Err(GraphError::InvalidSocket {
                node: target,
                socket: input,
                kind: "input",
            });
        }
        let s = self.get(upstream)?;
        if output >= s.outputs.len() {
            return Err(GraphError::InvalidSocket {
                node: upstream,
                socket: output,
                kind: "output",
            });
        }
        if t.parent != s.parent {
            return Err(GraphError::CrossContainerConnection { target, upstream });
        }
        if target == upstream || self.depends_on(upstream, target) {
            return Err(GraphError::CycleDetected { target, upstream });
        }

        self.get_mut(target)?.inputs[input].connection = Some(Connection::new(upstream, output));
        Ok(())
    }

    /// Disconnect an input so it falls back to its default value
    pub fn clear_input(&mut self, target: NodeId, input: usize) -> GraphResult<()> {
        self.socket_mut(target, input)?.connection = None;
        Ok(())
    }

    /// Connection feeding an input
    pub fn input_connection(&self, target: NodeId, input: usize) -> GraphResult<Option<Connection>> {
        Ok(self.socket(target, input)?.connection)
    }

    /// Set the value an input uses while unconnected
    pub fn set_input_default_value(
        &mut self,
        target: NodeId,
        input: usize,
        value: impl Into<Value>,
    ) -> GraphResult<()> {
        self.socket_mut(target, input)?.default = Some(value.into());
        Ok(())
    }

    /// Value an input uses while unconnected
    pub fn input_default_value(&self, target: NodeId, input: usize) -> GraphResult<Option<Value>> {
        Ok(self.socket(target, input)?.default)
    }

    fn socket(&self, target: NodeId, input: usize) -> GraphResult<&InputSocket> {
        self.get(target)?
            .inputs
            .get(input)
            .ok_or(GraphError::InvalidSocket {
                node: target,
                socket: input,
                kind: "input",
            })
    }

    fn socket_mut(&mut self, target: NodeId, input: usize) -> GraphResult<&mut InputSocket> {
        self.get_mut(target)?
            .inputs
            .get_mut(input)
            .ok_or(GraphError::InvalidSocket {
                node: target,
                socket: input,
                kind: "input",
            })
    }

    /// Every `(consumer, input, output)` edge reading from `id`
    pub fn consumers(&self, id: NodeId) -> Vec<(NodeId, usize, usize)> {
        let mut out = Vec::new();
        for node in self.nodes.values() {
            for (i, socket) in node.inputs.iter().enumerate() {
                if let Some(c) = socket.connection.filter(|c| c.node == id) {
                    out.push((node.id, i, c.output));
                }
            }
        }
        out
    }

    /// True if `on` is reachable by walking upstream from `from`
    pub fn depends_on(&self, from: NodeId, on: NodeId) -> bool {
        self.upstream_closure(from, None).contains(&on)
    }

    /// Nodes reachable upstream from `from`, not walking through `skip`
    fn upstream_closure(&self, from: NodeId, skip: Option<NodeId>) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for up in node.upstream() {
                if Some(up) != skip && seen.insert(up) {
                    stack.push(up);
                }
            }
        }
        seen
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    pub(crate) fn children_mut(&mut self, container: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match container {
            None => Some(&mut self.root),
            Some(c) => self
                .nodes
                .get_mut(&c)
                .and_then(|n| n.body.as_mut())
                .map(|b| &mut b.children),
        }
    }

    /// Ids of the nodes directly inside a container (`None`: top level)
    ///
    /// The implicit source and sink nodes are not included.
    pub fn node_ids(&self, container: Option<NodeId>) -> GraphResult<&[NodeId]> {
        match container {
            None => Ok(&self.root),
            Some(c) => self
                .get(c)?
                .body
                .as_ref()
                .map(|b| b.children.as_slice())
                .ok_or(GraphError::NotAContainer(c)),
        }
    }

    /// Number of nodes directly inside a container
    pub fn num_nodes(&self, container: Option<NodeId>) -> GraphResult<usize> {
        Ok(self.node_ids(container)?.len())
    }

    /// Source node of a container
    pub fn container_source(&self, id: NodeId) -> GraphResult<NodeId> {
        self.body(id).map(|b| b.source)
    }

    /// Sink node of a container
    pub fn container_sink(&self, id: NodeId) -> GraphResult<NodeId> {
        self.body(id).map(|b| b.sink)
    }

    fn body(&self, id: NodeId) -> GraphResult<&ContainerBody> {
        self.get(id)?
            .body
            .as_ref()
            .ok_or(GraphError::NotAContainer(id))
    }

    /// Enclosing container of a node
    pub fn parent(&self, id: NodeId) -> GraphResult<Option<NodeId>> {
        Ok(self.get(id)?.parent)
    }

    /// Make `container` the target of subsequent `create_node` calls
    pub fn push_editable(&mut self, container: NodeId) -> GraphResult<()> {
        self.body(container)?;
        self.editing.push(container);
        Ok(())
    }

    /// Return to the previous editing container
    pub fn pop_editable(&mut self) -> Option<NodeId> {
        self.editing.pop()
    }

    /// Container new nodes are created in (`None`: top level)
    #[inline]
    pub fn current_container(&self) -> Option<NodeId> {
        self.editing.last().copied()
    }

    /// Top-level `Output` nodes in id order
    pub fn outputs(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .root
            .iter()
            .copied()
            .filter(|id| self.kind_of(*id) == Some(NodeKind::Output))
            .collect();
        ids.sort();
        ids
    }

    /// Bypass or restore a node
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> GraphResult<()> {
        let disableable = self.node_type(id).is_some_and(|t| t.disableable);
        let node = self.get_mut(id)?;
        if !enabled && !disableable {
            return Err(GraphError::NotDisableable(id));
        }
        node.enabled = enabled;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Whole-graph access for persistence
    // ------------------------------------------------------------------

    pub(crate) fn root_ids(&self) -> &[NodeId] {
        &self.root
    }

    /// Rebuild a graph from stored nodes, checking every invariant
    pub(crate) fn from_parts(
        registry: Arc<NodeRegistry>,
        nodes: Vec<Node>,
        root: Vec<NodeId>,
    ) -> GraphResult<Graph> {
        let mut graph = Graph::new(registry);
        for node in nodes {
            graph.nodes.insert(node.id, node);
        }
        graph.root = root;
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> GraphResult<()> {
        let mut placed = HashSet::new();
        for id in &self.root {
            if self.get(*id)?.parent.is_some() {
                return Err(GraphError::InvalidSelection(format!(
                    "{} is listed at the top level but has a parent",
                    id
                )));
            }
            placed.insert(*id);
        }

        for node in self.nodes.values() {
            let ty = self
                .registry
                .get(&node.type_name)
                .ok_or_else(|| GraphError::UnknownNodeType(node.type_name.clone()))?;
            if ty.kind == NodeKind::Output && node.parent.is_some() {
                return Err(GraphError::OutputInContainer);
            }
            if let Some(body) = &node.body {
                for c in body.children.iter().chain([&body.source, &body.sink]) {
                    if self.get(*c)?.parent != Some(node.id) {
                        return Err(GraphError::InvalidSelection(format!(
                            "{} is listed in {} but has another parent",
                            c, node.id
                        )));
                    }
                    placed.insert(*c);
                }
            }
            for socket in &node.inputs {
                let Some(c) = socket.connection else {
                    continue;
                };
                let up = self.get(c.node)?;
                if c.output >= up.outputs.len() {
                    return Err(GraphError::InvalidSocket {
                        node: c.node,
                        socket: c.output,
                        kind: "output",
                    });
                }
                if up.parent != node.parent {
                    return Err(GraphError::CrossContainerConnection {
                        target: node.id,
                        upstream: c.node,
                    });
                }
            }
        }
        if let Some(orphan) = self.nodes.keys().find(|id| !placed.contains(id)) {
            return Err(GraphError::InvalidSelection(format!(
                "{} is not placed in any container",
                orphan
            )));
        }

        if let Some((target, upstream)) = self.find_cycle() {
            return Err(GraphError::CycleDetected { target, upstream });
        }
        Ok(())
    }

    /// First back edge found by an iterative three-colour DFS
    fn find_cycle(&self) -> Option<(NodeId, NodeId)> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: BTreeMap<NodeId, Mark> = BTreeMap::new();
        for &start in self.nodes.keys() {
            if marks.contains_key(&start) {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            marks.insert(start, Mark::Visiting);
            while let Some((id, next)) = stack.pop() {
                let ups: Vec<NodeId> = self
                    .nodes
                    .get(&id)
                    .map(|n| n.upstream().collect())
                    .unwrap_or_default();
                if next < ups.len() {
                    stack.push((id, next + 1));
                    let up = ups[next];
                    match marks.get(&up) {
                        Some(Mark::Visiting) => return Some((id, up)),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(up, Mark::Visiting);
                            stack.push((up, 0));
                        }
                    }
                } else {
                    marks.insert(id, Mark::Done);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Graph, NodeId, NodeId, NodeId) {
        let mut g = Graph::standard();
        let a = g.create_node("InputChannel").unwrap();
        let b = g.create_node("Add").unwrap();
        let c = g.create_node("Output").unwrap();
        g.set_input(b, 0, a, 0).unwrap();
        g.set_input(c, 0, b, 0).unwrap();
        (g, a, b, c)
    }

    #[test]
    fn test_create_every_public_type() {
        let mut g = Graph::standard();
        let names: Vec<&str> = g.registry().public_names().collect();
        for name in names {
            let id = g.create_node(name).unwrap();
            assert_eq!(g.type_name(id).unwrap(), name);
        }
    }

    #[test]
    fn test_unknown_and_internal_types() {
        let mut g = Graph::standard();
        assert_eq!(
            g.create_node("Nope"),
            Err(GraphError::UnknownNodeType("Nope".into()))
        );
        assert!(matches!(
            g.create_node("Loop__Input"),
            Err(GraphError::InternalNodeType(_))
        ));
    }

    #[test]
    fn test_requested_id() {
        let mut g = Graph::standard();
        let a = g.create_node_with_id("Add", Some(NodeId(10))).unwrap();
        assert_eq!(a, NodeId(10));
        let b = g.create_node_with_id("Add", Some(NodeId(10))).unwrap();
        assert_eq!(b, NodeId(11));
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut g, a, b, _) = chain();
        let neg = g.create_node("Negate").unwrap();
        g.set_input(neg, 0, b, 0).unwrap();
        let err = g.set_input(b, 1, neg, 0).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert_eq!(g.input_connection(b, 1).unwrap(), None);
        assert!(g.depends_on(neg, a));
    }

    #[test]
    fn test_delete_disconnects_consumers() {
        let (mut g, _, b, c) = chain();
        g.delete_node(b).unwrap();
        assert!(g.node(b).is_none());
        assert_eq!(g.input_connection(c, 0).unwrap(), None);
    }

    #[test]
    fn test_container_delete_is_recursive() {
        let mut g = Graph::standard();
        let comp = g.create_node("Compound").unwrap();
        g.push_editable(comp).unwrap();
        let inner = g.create_node("Add").unwrap();
        assert_eq!(g.parent(inner).unwrap(), Some(comp));
        assert!(matches!(
            g.create_node("Output"),
            Err(GraphError::OutputInContainer)
        ));
        g.pop_editable();
        let before = g.len();
        assert_eq!(before, 4);
        g.delete_node(comp).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn test_cross_container_rejected() {
        let mut g = Graph::standard();
        let outer = g.create_node("InputValue").unwrap();
        let comp = g.create_node("Compound").unwrap();
        g.push_editable(comp).unwrap();
        let inner = g.create_node("Negate").unwrap();
        assert!(matches!(
            g.set_input(inner, 0, outer, 0),
            Err(GraphError::CrossContainerConnection { .. })
        ));
        let source = g.container_source(comp).unwrap();
        assert!(g.delete_node(source).is_err());
    }

    #[test]
    fn test_replace_node_keeps_consumers() {
        let (mut g, a, b, c) = chain();
        let sub = g.create_node("Subtract").unwrap();
        g.set_input(sub, 0, a, 0).unwrap();
        g.replace_node(b, sub).unwrap();
        assert!(g.node(sub).is_none());
        assert_eq!(g.type_name(b).unwrap(), "Subtract");
        assert_eq!(g.input_connection(c, 0).unwrap(), Some(Connection::new(b, 0)));
        assert_eq!(g.input_connection(b, 0).unwrap(), Some(Connection::new(a, 0)));
    }

    #[test]
    fn test_replace_node_cycle() {
        let (mut g, _, b, _) = chain();
        let neg = g.create_node("Negate").unwrap();
        let mul = g.create_node("Multiply").unwrap();
        g.set_input(neg, 0, b, 0).unwrap();
        g.set_input(mul, 0, neg, 0).unwrap();
        // `neg` reads from `b`; replacing `b` with something fed by `neg` loops
        let err = g.replace_node(b, mul).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert!(g.node(b).is_some());
    }

    #[test]
    fn test_disable_rules() {
        let (mut g, a, b, _) = chain();
        g.set_enabled(b, false).unwrap();
        assert!(!g.node(b).unwrap().is_enabled());
        assert_eq!(g.set_enabled(a, false), Err(GraphError::NotDisableable(a)));
    }

    #[test]
    fn test_outputs_and_clear() {
        let (mut g, _, _, c) = chain();
        assert_eq!(g.outputs(), vec![c]);
        g.clear();
        assert!(g.is_empty());
        assert!(g.outputs().is_empty());
    }
}
