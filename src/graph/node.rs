//! Node instances
//!
//! Author: Moroya Sakamoto

use super::{Connection, NodeId};
use crate::nodes::{NodeType, PropertyValue};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input socket of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSocket {
    /// Socket label
    pub name: String,
    /// Upstream output feeding this socket
    pub connection: Option<Connection>,
    /// Value used while unconnected; `None` means the socket must be connected
    pub default: Option<Value>,
}

impl InputSocket {
    pub(crate) fn new(name: impl Into<String>, default: Option<Value>) -> Self {
        InputSocket {
            name: name.into(),
            connection: None,
            default,
        }
    }
}

/// Contents of a compound or loop node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerBody {
    /// Implicit node whose outputs are the container's inputs
    pub source: NodeId,
    /// Implicit node whose inputs are the container's outputs
    pub sink: NodeId,
    /// Contained nodes in creation order, source and sink excluded
    pub children: Vec<NodeId>,
}

/// A node in a [`Graph`](super::Graph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) type_name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) inputs: Vec<InputSocket>,
    pub(crate) outputs: Vec<String>,
    pub(crate) properties: BTreeMap<String, PropertyValue>,
    pub(crate) enabled: bool,
    pub(crate) body: Option<ContainerBody>,
}

impl Node {
    /// Fresh node laid out from its type
    pub(crate) fn from_type(id: NodeId, ty: &NodeType, parent: Option<NodeId>) -> Self {
        Node {
            id,
            type_name: ty.name.to_string(),
            parent,
            inputs: ty
                .inputs
                .iter()
                .map(|decl| InputSocket::new(decl.name.clone(), decl.default))
                .collect(),
            outputs: ty.outputs.clone(),
            properties: ty
                .properties
                .iter()
                .map(|p| (p.name.to_string(), p.default.clone()))
                .collect(),
            enabled: true,
            body: None,
        }
    }

    /// Node id
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Registered type name
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Enclosing container (`None` at the top level)
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Input sockets
    #[inline]
    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    /// Output socket labels
    #[inline]
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Property value by name
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// All properties in name order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// False if the node is bypassed
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Container contents, if this is a compound or loop
    #[inline]
    pub fn body(&self) -> Option<&ContainerBody> {
        self.body.as_ref()
    }

    pub(crate) fn int_property(&self, name: &str) -> Option<i32> {
        self.properties.get(name).and_then(PropertyValue::as_int)
    }

    pub(crate) fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_str)
    }

    pub(crate) fn list_property(&self, name: &str) -> &[String] {
        self.properties
            .get(name)
            .and_then(PropertyValue::as_list)
            .unwrap_or(&[])
    }

    /// Ids of the nodes this node reads from
    pub(crate) fn upstream(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().filter_map(|s| s.connection.map(|c| c.node))
    }
}
