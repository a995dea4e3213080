//! Node properties and the socket layouts they control
//!
//! Some properties reshape their node when set: `numInputs` resizes mux,
//! compound and loop sockets, `channels` resizes query outputs and
//! `searchMode` swaps the third particle search input between a radius and
//! a neighbor count. Outputs that disappear are disconnected downstream.
//!
//! Author: Moroya Sakamoto

use super::{Graph, GraphError, GraphResult, InputSocket, NodeId};
use crate::nodes::{ContainerKind, NodeKind, PropertyValue};
use crate::types::Value;

impl Graph {
    /// Current value of a property
    pub fn property(&self, id: NodeId, name: &str) -> GraphResult<&PropertyValue> {
        self.get(id)?
            .properties
            .get(name)
            .ok_or_else(|| GraphError::UnknownProperty {
                node: id,
                property: name.to_string(),
            })
    }

    /// Names of every property of a node
    pub fn property_names(&self, id: NodeId) -> GraphResult<Vec<&str>> {
        Ok(self.get(id)?.properties.keys().map(String::as_str).collect())
    }

    /// False for derived properties
    pub fn property_writable(&self, id: NodeId, name: &str) -> GraphResult<bool> {
        self.property(id, name)?;
        Ok(self
            .node_type(id)
            .and_then(|t| t.property_decl(name))
            .is_some_and(|d| d.writable))
    }

    /// Legal values of an enumerated property (empty: unrestricted)
    pub fn property_accepted_values(
        &self,
        id: NodeId,
        name: &str,
    ) -> GraphResult<&'static [&'static str]> {
        self.property(id, name)?;
        Ok(self
            .node_type(id)
            .and_then(|t| t.property_decl(name))
            .map_or(&[][..], |d| d.accepted))
    }

    /// Set a property, applying any change to the node's sockets
    pub fn set_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<()> {
        let mut value = value.into();
        self.get(id)?;
        let kind = self.kind_of(id);
        let decl = self
            .node_type(id)
            .and_then(|t| t.property_decl(name))
            .cloned()
            .ok_or_else(|| GraphError::UnknownProperty {
                node: id,
                property: name.to_string(),
            })?;
        if !decl.writable {
            return Err(GraphError::ReadOnlyProperty {
                node: id,
                property: name.to_string(),
            });
        }

        if let (PropertyValue::Float(_), PropertyValue::Int(v)) = (&decl.default, &value) {
            value = PropertyValue::Float(*v as f32);
        }
        if !value.same_kind(&decl.default) {
            return Err(GraphError::PropertyType {
                property: name.to_string(),
                expected: decl.default.kind_name(),
                found: value.kind_name(),
            });
        }
        if !decl.accepted.is_empty() {
            let text = value.as_str().unwrap_or_default();
            if !decl.accepted.contains(&text) {
                return Err(GraphError::InvalidEnumValue {
                    property: name.to_string(),
                    value: text.to_string(),
                    accepted: decl.accepted.iter().map(|s| s.to_string()).collect(),
                });
            }
        }
        if let Some(v) = value.as_int() {
            let min = match (kind, name) {
                (Some(NodeKind::Mux), "numInputs") => 1,
                (_, "whichNearest") => 1,
                _ => 0,
            };
            if v < min {
                return Err(GraphError::PropertyRange {
                    property: name.to_string(),
                    value: v,
                });
            }
        }

        self.get_mut(id)?.properties.insert(name.to_string(), value);
        self.apply_layout(id, name)
    }

    /// Change the number of variable inputs of a mux, compound or loop
    pub fn set_num_inputs(&mut self, id: NodeId, count: usize) -> GraphResult<()> {
        let has = self
            .node_type(id)
            .is_some_and(|t| t.property_decl("numInputs").is_some());
        if !has {
            self.get(id)?;
            return Err(GraphError::FixedInputCount(id));
        }
        self.set_property(id, "numInputs", count as i32)
    }

    fn apply_layout(&mut self, id: NodeId, name: &str) -> GraphResult<()> {
        match (self.kind_of(id), name) {
            (Some(NodeKind::Container(_)), "numInputs" | "numOutputs") => self.layout_container(id),
            (Some(NodeKind::Mux), "numInputs") => self.layout_mux(id),
            (Some(kind), "channels" | "exposePosition") if query_prefix(kind).is_some() => {
                self.layout_query(id)
            }
            (Some(NodeKind::Container(ContainerKind::Loop(_))), "searchMode") => {
                self.layout_search(id)
            }
            _ => Ok(()),
        }
    }

    /// Size a container, its source and its sink from its properties
    pub(super) fn layout_container(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.get(id)?;
        let Some(body) = node.body.clone() else {
            return Err(GraphError::NotAContainer(id));
        };
        let n_in = node.int_property("numInputs").unwrap_or(0).max(0) as usize;

        match self.node_type(id).and_then(|t| t.loop_kind()) {
            None => {
                let n_out = node.int_property("numOutputs").unwrap_or(0).max(0) as usize;
                let node = self.get_mut(id)?;
                resize_inputs(&mut node.inputs, 0, n_in, |i| {
                    InputSocket::new(format!("Input {}", i), None)
                });
                node.outputs = numbered("Output", 0, n_out);

                self.get_mut(body.source)?.outputs = numbered("Input", 0, n_in);
                let sink = self.get_mut(body.sink)?;
                resize_inputs(&mut sink.inputs, 0, n_out, |i| {
                    InputSocket::new(format!("Output {}", i), None)
                });
            }
            Some(kind) => {
                let control = kind.num_control_inputs();
                let node = self.get_mut(id)?;
                resize_inputs(&mut node.inputs, control, n_in, |i| {
                    InputSocket::new(format!("Value {}", i), Some(Value::Float(0.0)))
                });
                node.outputs = numbered("Value", 0, n_in);
                node.properties
                    .insert("numOutputs".to_string(), PropertyValue::Int(n_in as i32));

                let source = self.get_mut(body.source)?;
                source.outputs = numbered("Value", 1, n_in);
                source.outputs[0] = "Iteration".to_string();

                let sink = self.get_mut(body.sink)?;
                if sink.inputs.is_empty() {
                    sink.inputs
                        .push(InputSocket::new("Continue", Some(Value::Bool(true))));
                }
                resize_inputs(&mut sink.inputs, 1, n_in, |i| {
                    InputSocket::new(format!("Value {}", i), None)
                });
            }
        }

        self.drop_dangling(id);
        self.drop_dangling(body.source);
        Ok(())
    }

    fn layout_mux(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.get_mut(id)?;
        let n = node.int_property("numInputs").unwrap_or(2).max(1) as usize;
        let selector = node
            .inputs
            .pop()
            .unwrap_or_else(|| InputSocket::new("Selector", Some(Value::Int(0))));
        resize_inputs(&mut node.inputs, 0, n, |i| {
            InputSocket::new(format!("Input {}", i), None)
        });
        node.inputs.push(selector);
        Ok(())
    }

    fn layout_query(&mut self, id: NodeId) -> GraphResult<()> {
        let Some(prefix) = self.kind_of(id).and_then(query_prefix) else {
            return Ok(());
        };
        let node = self.get_mut(id)?;
        let expose = node
            .properties
            .get("exposePosition")
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        let mut outputs: Vec<String> = prefix
            .iter()
            .filter(|name| expose || **name != "Position")
            .map(|s| s.to_string())
            .collect();
        outputs.extend(node.list_property("channels").iter().cloned());
        node.outputs = outputs;
        self.drop_dangling(id);
        Ok(())
    }

    fn layout_search(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.get_mut(id)?;
        let socket = match node.str_property("searchMode") {
            Some("Count") => ("Count", Value::Int(8)),
            _ => ("Radius", Value::Float(10.0)),
        };
        if let Some(input) = node.inputs.get_mut(2) {
            input.name = socket.0.to_string();
            input.default = Some(socket.1);
        }
        Ok(())
    }

    /// Disconnect consumers of outputs `id` no longer has
    fn drop_dangling(&mut self, id: NodeId) {
        let Some(count) = self.nodes.get(&id).map(|n| n.outputs.len()) else {
            return;
        };
        for node in self.nodes.values_mut() {
            for socket in &mut node.inputs {
                if socket
                    .connection
                    .is_some_and(|c| c.node == id && c.output >= count)
                {
                    socket.connection = None;
                }
            }
        }
    }
}

/// Fixed outputs preceding the channel outputs of a query node
fn query_prefix(kind: NodeKind) -> Option<&'static [&'static str]> {
    match kind {
        NodeKind::ParticleSumCount => Some(&["MaxDistance", "TotalWeight"]),
        NodeKind::ParticleSumRadius => Some(&["NumParticles", "TotalWeight"]),
        NodeKind::ParticleQuery => Some(&[]),
        NodeKind::FaceQuery | NodeKind::VertexQuery => Some(&["Position"]),
        _ => None,
    }
}

fn numbered(prefix: &str, offset: usize, count: usize) -> Vec<String> {
    (0..offset)
        .map(|_| String::new())
        .chain((0..count).map(|i| format!("{} {}", prefix, i)))
        .collect()
}

/// Keep the first `fixed` sockets and exactly `count` variable ones after them
fn resize_inputs(
    inputs: &mut Vec<InputSocket>,
    fixed: usize,
    count: usize,
    make: impl Fn(usize) -> InputSocket,
) {
    inputs.truncate(fixed + count);
    while inputs.len() < fixed + count {
        let i = inputs.len() - fixed;
        inputs.push(make(i));
    }
}
