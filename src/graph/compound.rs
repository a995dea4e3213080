//! Compound creation and explosion
//!
//! Author: Moroya Sakamoto

use super::{Connection, Graph, GraphError, GraphResult, NodeId};
use crate::nodes::{ContainerKind, NodeKind};
use std::collections::BTreeSet;

/// Input edits made while building a compound, newest last
#[derive(Default)]
struct UndoLog {
    inputs: Vec<(NodeId, usize, Option<Connection>)>,
}

impl UndoLog {
    fn set(&mut self, graph: &mut Graph, node: NodeId, input: usize, conn: Option<Connection>) {
        if let Some(socket) = graph.nodes.get_mut(&node).and_then(|n| n.inputs.get_mut(input)) {
            self.inputs.push((node, input, socket.connection));
            socket.connection = conn;
        }
    }

    fn rollback(self, graph: &mut Graph) {
        for (node, input, old) in self.inputs.into_iter().rev() {
            if let Some(socket) = graph.nodes.get_mut(&node).and_then(|n| n.inputs.get_mut(input)) {
                socket.connection = old;
            }
        }
    }
}

impl Graph {
    /// Move a set of sibling nodes into a new compound
    ///
    /// Edges that cross the selection boundary become compound inputs and
    /// outputs; several edges reading the same upstream socket share one
    /// compound input. If grouping would introduce a cycle through the new
    /// compound, every change is rolled back.
    pub fn create_compound(&mut self, ids: &[NodeId]) -> GraphResult<NodeId> {
        let selection: BTreeSet<NodeId> = ids.iter().copied().collect();
        if selection.is_empty() {
            return Err(GraphError::InvalidSelection("no nodes selected".into()));
        }
        let container = self.current_container();
        for &id in &selection {
            let node = self.get(id)?;
            if node.parent != container {
                return Err(GraphError::InvalidSelection(format!(
                    "{} is not in the current container",
                    id
                )));
            }
            match self.kind_of(id) {
                Some(NodeKind::Source | NodeKind::Sink) => return Err(GraphError::ProtectedNode(id)),
                Some(NodeKind::Output) => {
                    return Err(GraphError::InvalidSelection(format!(
                        "{} is an Output node",
                        id
                    )))
                }
                _ => {}
            }
        }

        let mut scan: Vec<NodeId> = self.node_ids(container)?.to_vec();
        if let Some(c) = container {
            scan.push(self.container_sink(c)?);
        }

        let mut ext_inputs: Vec<Connection> = Vec::new();
        let mut ext_outputs: Vec<Connection> = Vec::new();
        let mut in_rewires = Vec::new();
        let mut out_rewires = Vec::new();
        for &id in &scan {
            let inside = selection.contains(&id);
            for (j, socket) in self.get(id)?.inputs.iter().enumerate() {
                let Some(conn) = socket.connection else {
                    continue;
                };
                match (inside, selection.contains(&conn.node)) {
                    (true, false) => in_rewires.push((id, j, slot(&mut ext_inputs, conn))),
                    (false, true) => out_rewires.push((id, j, slot(&mut ext_outputs, conn))),
                    _ => {}
                }
            }
        }

        let compound = self.create_node("Compound")?;
        self.set_property(compound, "numInputs", ext_inputs.len() as i32)?;
        self.set_property(compound, "numOutputs", ext_outputs.len().max(1) as i32)?;
        let source = self.container_source(compound)?;
        let sink = self.container_sink(compound)?;
        for (k, conn) in ext_inputs.iter().enumerate() {
            self.get_mut(compound)?.inputs[k].connection = Some(*conn);
        }
        for (m, conn) in ext_outputs.iter().enumerate() {
            self.get_mut(sink)?.inputs[m].connection = Some(*conn);
        }

        let mut undo = UndoLog::default();
        for (id, j, k) in in_rewires {
            undo.set(self, id, j, Some(Connection::new(source, k)));
        }
        for (id, j, m) in out_rewires {
            undo.set(self, id, j, Some(Connection::new(compound, m)));
        }

        if let Some(conn) = ext_inputs
            .iter()
            .find(|c| self.depends_on(c.node, compound))
            .copied()
        {
            undo.rollback(self);
            self.delete_node(compound)?;
            return Err(GraphError::CycleDetected {
                target: compound,
                upstream: conn.node,
            });
        }

        for &id in &selection {
            if let Some(children) = self.children_mut(container) {
                children.retain(|c| *c != id);
            }
            self.get_mut(id)?.parent = Some(compound);
            if let Some(children) = self.children_mut(Some(compound)) {
                children.push(id);
            }
        }
        log::debug!(
            "grouped {} nodes into {} ({} inputs, {} outputs)",
            selection.len(),
            compound,
            ext_inputs.len(),
            ext_outputs.len()
        );
        Ok(compound)
    }

    /// Replace a compound by its contents, reconnecting through its sockets
    ///
    /// Returns the ids of the nodes that moved out.
    pub fn explode_compound(&mut self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        let node = self.get(id)?;
        if self.kind_of(id) != Some(NodeKind::Container(ContainerKind::Compound)) {
            return Err(GraphError::NotACompound(id));
        }
        let Some(body) = node.body.clone() else {
            return Err(GraphError::NotACompound(id));
        };
        let parent = node.parent;
        let outer: Vec<Option<Connection>> = node.inputs.iter().map(|s| s.connection).collect();
        let inner: Vec<Option<Connection>> = self
            .get(body.sink)?
            .inputs
            .iter()
            .map(|s| s.connection)
            .collect();

        let through_source = |conn: Option<Connection>| match conn {
            Some(c) if c.node == body.source => outer.get(c.output).copied().flatten(),
            other => other,
        };

        for (target, input, output) in self.consumers(id) {
            let conn = through_source(inner.get(output).copied().flatten());
            self.get_mut(target)?.inputs[input].connection = conn;
        }
        for (target, input, output) in self.consumers(body.source) {
            let conn = outer.get(output).copied().flatten();
            self.get_mut(target)?.inputs[input].connection = conn;
        }

        for &child in &body.children {
            self.get_mut(child)?.parent = parent;
        }
        if let Some(children) = self.children_mut(parent) {
            children.retain(|c| *c != id);
            children.extend(body.children.iter().copied());
        }
        for gone in [id, body.source, body.sink] {
            self.nodes.remove(&gone);
        }
        if let Some(pos) = self.editing.iter().position(|c| *c == id) {
            self.editing.truncate(pos);
        }
        log::debug!("exploded {} ({} nodes)", id, body.children.len());
        Ok(body.children)
    }
}

/// Index of `conn` in `list`, appending it if new
fn slot(list: &mut Vec<Connection>, conn: Connection) -> usize {
    match list.iter().position(|c| *c == conn) {
        Some(i) => i,
        None => {
            list.push(conn);
            list.len() - 1
        }
    }
}
