//! Node type descriptors and the node type registry
//!
//! A [`NodeType`] describes everything the graph and compiler need to know
//! about a kind of node: its sockets and their static defaults, its
//! properties, whether it is a container, and for plain operators the
//! overload table used for type-directed dispatch.
//!
//! Registries are ordinary values. Build one with
//! [`NodeRegistry::standard`], optionally add custom types, and share it
//! between graphs behind an `Arc`.
//!
//! Author: Moroya Sakamoto

mod standard;

pub(crate) use standard::{COMPOUND_SINK, COMPOUND_SOURCE, LOOP_SINK, LOOP_SOURCE};

use crate::ops::Binding;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Palette grouping of node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Scalar and vector arithmetic
    Arithmetic,
    /// Type conversions
    Convert,
    /// Functions of several inputs (blend, random, ...)
    Function,
    /// Record and constant inputs
    Input,
    /// Comparisons and boolean logic
    Logic,
    /// Loop containers
    Loop,
    /// Geometry and particle queries
    Object,
    /// Sub-graph containers
    Compound,
    /// Internal plumbing
    System,
    /// Rotations and transforms
    Transform,
    /// Trigonometric functions
    Trigonometry,
    /// Vector products and norms
    Vector,
}

impl NodeCategory {
    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            NodeCategory::Arithmetic => "Arithmetic",
            NodeCategory::Convert => "Convert",
            NodeCategory::Function => "Function",
            NodeCategory::Input => "Input",
            NodeCategory::Logic => "Logic",
            NodeCategory::Loop => "Loop",
            NodeCategory::Object => "Object",
            NodeCategory::Compound => "Compound",
            NodeCategory::System => "System",
            NodeCategory::Transform => "Transform",
            NodeCategory::Trigonometry => "Trigonometry",
            NodeCategory::Vector => "Vector",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Iteration source of a loop container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// Runs until the continue condition fails
    Counted,
    /// Visits particles within a radius or the k nearest to a point
    ParticleSearch,
    /// Visits the vertices connected to a mesh vertex by an edge
    VertexLoop,
    /// Visits the faces that use a mesh vertex
    FaceLoop,
}

impl LoopKind {
    /// Number of loop inputs that control the iteration
    pub fn num_control_inputs(self) -> usize {
        match self {
            LoopKind::Counted => 0,
            LoopKind::ParticleSearch | LoopKind::VertexLoop | LoopKind::FaceLoop => 3,
        }
    }

    /// Per-iteration values readable through `LoopChannel`, besides the
    /// neighbor's own channels
    pub fn loop_channels(self) -> &'static [&'static str] {
        match self {
            LoopKind::Counted => &[],
            LoopKind::ParticleSearch => &["NeighborIndex", "IterationIndex"],
            LoopKind::VertexLoop => &["NeighborVertex", "EdgeVisibility", "EdgeIsBoundary"],
            LoopKind::FaceLoop => &["FaceIndex", "IterationIndex"],
        }
    }
}

/// Container flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// A sub-graph inlined at compile time
    Compound,
    /// A loop body
    Loop(LoopKind),
}

/// How the compiler treats a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Pure function dispatched through the type's bindings
    Operator,
    /// Pass-through of any operand
    Elbow,
    /// Splits a Vec3 into three floats
    Breakout,
    /// Selects one of n inputs by index
    Mux,
    /// Constant taken from the `value` property
    InputValue,
    /// Reads a channel of the current record
    InputChannel,
    /// Writes a channel of the current record
    Output,
    /// Geometry collaborator handle
    InputGeometry,
    /// Particle collaborator handle
    InputParticles,
    /// Closest surface point
    NearestPoint,
    /// First surface hit along a ray
    IntersectRay,
    /// Point-in-volume test
    InVolume,
    /// n-th nearest particle
    NearestParticle,
    /// Weighted channel sums over the k nearest particles
    ParticleSumCount,
    /// Weighted channel sums over particles within a radius
    ParticleSumRadius,
    /// Channels of an indexed particle
    ParticleQuery,
    /// Channels of a mesh face at a barycentric location
    FaceQuery,
    /// Channels of a mesh vertex
    VertexQuery,
    /// Face and vertex counts of a mesh
    MeshQuery,
    /// Per-iteration value of the enclosing loop
    LoopChannel,
    /// Compound or loop container
    Container(ContainerKind),
    /// The implicit input node of a container
    Source,
    /// The implicit output node of a container
    Sink,
}

/// Value of a node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Flag
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Text, e.g. a channel name
    String(String),
    /// List of names, e.g. queried channels
    StringList(Vec<String>),
    /// A typed interpreter value
    Value(Value),
}

impl PropertyValue {
    /// Name of the variant for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Int(_) => "Int",
            PropertyValue::Float(_) => "Float",
            PropertyValue::String(_) => "String",
            PropertyValue::StringList(_) => "StringList",
            PropertyValue::Value(_) => "Value",
        }
    }

    /// True if both values have the same variant
    pub fn same_kind(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// String list payload
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    /// Value payload
    pub fn as_value(&self) -> Option<Value> {
        match self {
            PropertyValue::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "\"{}\"", v),
            PropertyValue::StringList(v) => write!(f, "{:?}", v),
            PropertyValue::Value(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::StringList(v)
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        PropertyValue::Value(v)
    }
}

/// Declared input socket
#[derive(Debug, Clone, PartialEq)]
pub struct InputDecl {
    /// Socket label
    pub name: String,
    /// Static value used while the socket is unconnected
    pub default: Option<Value>,
}

/// Declared property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Property name
    pub name: &'static str,
    /// Initial value; also fixes the property's kind
    pub default: PropertyValue,
    /// False for derived, read-only properties
    pub writable: bool,
    /// Legal values of an enumerated string property (empty: any)
    pub accepted: &'static [&'static str],
}

impl PropertyDecl {
    /// Writable property with a default
    pub fn new(name: &'static str, default: impl Into<PropertyValue>) -> Self {
        PropertyDecl {
            name,
            default: default.into(),
            writable: true,
            accepted: &[],
        }
    }

    /// Mark as read-only
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Restrict a string property to a list of values
    pub fn accepting(mut self, values: &'static [&'static str]) -> Self {
        self.accepted = values;
        self
    }
}

/// Static description of a node type
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type name used by `create_node`
    pub name: &'static str,
    /// Palette grouping
    pub category: NodeCategory,
    /// Compiler treatment
    pub kind: NodeKind,
    /// One line of help text
    pub description: &'static str,
    /// False for internal types that cannot be created directly
    pub public: bool,
    /// False if the node cannot be bypassed
    pub disableable: bool,
    /// Initial input sockets
    pub inputs: Vec<InputDecl>,
    /// Initial output socket labels
    pub outputs: Vec<String>,
    /// Declared properties
    pub properties: Vec<PropertyDecl>,
    /// Overload table for [`NodeKind::Operator`]
    pub bindings: &'static [Binding],
    /// Overload table used when `useTolerance` is set
    pub tolerant_bindings: &'static [Binding],
}

impl NodeType {
    /// Bare type with no sockets or properties
    pub fn new(name: &'static str, category: NodeCategory, kind: NodeKind) -> Self {
        NodeType {
            name,
            category,
            kind,
            description: "",
            public: true,
            disableable: true,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Vec::new(),
            bindings: &[],
            tolerant_bindings: &[],
        }
    }

    /// Operator with a single `Result` output
    pub fn operator(name: &'static str, category: NodeCategory, bindings: &'static [Binding]) -> Self {
        let mut ty = NodeType::new(name, category, NodeKind::Operator).output("Result");
        ty.bindings = bindings;
        ty
    }

    /// Append an input with a static default
    pub fn input(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.inputs.push(InputDecl {
            name: name.to_string(),
            default: Some(default.into()),
        });
        self
    }

    /// Append an input that must be connected
    pub fn input_required(mut self, name: &str) -> Self {
        self.inputs.push(InputDecl {
            name: name.to_string(),
            default: None,
        });
        self
    }

    /// Append an output
    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    /// Append a property
    pub fn property(mut self, decl: PropertyDecl) -> Self {
        self.properties.push(decl);
        self
    }

    /// Add the comparison tolerance properties and overloads
    pub fn with_tolerance(mut self, bindings: &'static [Binding]) -> Self {
        self.tolerant_bindings = bindings;
        self.property(PropertyDecl::new("useTolerance", false))
            .property(PropertyDecl::new("toleranceExp", 4))
    }

    /// Set help text
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Forbid disabling
    pub fn not_disableable(mut self) -> Self {
        self.disableable = false;
        self
    }

    /// Hide from `create_node`
    pub fn internal(mut self) -> Self {
        self.public = false;
        self.disableable = false;
        self
    }

    /// True for compound and loop types
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    /// Loop flavour, if this is a loop type
    #[inline]
    pub fn loop_kind(&self) -> Option<LoopKind> {
        match self.kind {
            NodeKind::Container(ContainerKind::Loop(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Declared property by name
    pub fn property_decl(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Set of node types addressable by name
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: BTreeMap<&'static str, NodeType>,
}

impl NodeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in node type
    pub fn standard() -> Self {
        standard::build()
    }

    /// Add a type, returning the one it replaced
    pub fn register(&mut self, ty: NodeType) -> Option<NodeType> {
        self.types.insert(ty.name, ty)
    }

    /// Look up a type by name
    #[inline]
    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    /// True if a type with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All type names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.keys().copied()
    }

    /// Names of types that `create_node` accepts
    pub fn public_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.values().filter(|t| t.public).map(|t| t.name)
    }

    /// All types
    pub fn iter(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
