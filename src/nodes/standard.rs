//! Built-in node types
//!
//! Author: Moroya Sakamoto

use super::{
    ContainerKind, LoopKind, NodeCategory, NodeKind, NodeRegistry, NodeType, PropertyDecl,
};
use crate::ops;
use crate::types::Value;
use glam::Vec3;

/// Outputs shared by `NearestPoint` and `IntersectRay`
pub(crate) const SURFACE_OUTPUTS: [&str; 7] = [
    "Position",
    "IsValid",
    "ObjIndex",
    "FaceIndex",
    "Distance",
    "FaceNormal",
    "BaryCoords",
];

/// Type names of the implicit container nodes
pub(crate) const COMPOUND_SOURCE: &str = "Compound__Input";
pub(crate) const COMPOUND_SINK: &str = "Compound__Output";
pub(crate) const LOOP_SOURCE: &str = "Loop__Input";
pub(crate) const LOOP_SINK: &str = "Loop__Output";

pub(super) fn build() -> NodeRegistry {
    let mut reg = NodeRegistry::new();
    ops::arithmetic::register(&mut reg);
    ops::vector_math::register(&mut reg);
    ops::logic::register(&mut reg);
    ops::random::register(&mut reg);
    register_system(&mut reg);
    register_objects(&mut reg);
    register_containers(&mut reg);
    reg
}

fn register_system(reg: &mut NodeRegistry) {
    use NodeCategory::{Convert, Input, Logic, System};

    reg.register(
        NodeType::new("Elbow", System, NodeKind::Elbow)
            .input_required("")
            .output("")
            .describe("A pass-through node for routing wires."),
    );
    reg.register(
        NodeType::new("Breakout", Convert, NodeKind::Breakout)
            .input_required("Vector")
            .output("X")
            .output("Y")
            .output("Z")
            .describe("Access to the individual components of a vector."),
    );
    reg.register(
        NodeType::new("Mux", Logic, NodeKind::Mux)
            .input_required("Input 0")
            .input_required("Input 1")
            .input("Selector", 0i32)
            .output("Result")
            .property(PropertyDecl::new("numInputs", 2))
            .describe("Selects an input by the 'Selector' index."),
    );
    reg.register(
        NodeType::new("InputValue", Input, NodeKind::InputValue)
            .output("Value")
            .property(PropertyDecl::new("value", Value::Float(0.0)))
            .not_disableable()
            .describe("A constant value."),
    );
    reg.register(
        NodeType::new("InputChannel", Input, NodeKind::InputChannel)
            .output("Value")
            .property(PropertyDecl::new("channelName", "Position"))
            .not_disableable()
            .describe("Reads a channel of the current record."),
    );
    reg.register(
        NodeType::new("Output", System, NodeKind::Output)
            .input_required("Value")
            .property(PropertyDecl::new("channelName", "Color"))
            .not_disableable()
            .describe("Writes a value into a channel of the current record."),
    );
    reg.register(
        NodeType::new("LoopChannel", Input, NodeKind::LoopChannel)
            .output("Value")
            .property(PropertyDecl::new("channelName", "NeighborIndex"))
            .not_disableable()
            .describe("Reads a value of the current iteration of the enclosing loop."),
    );
}

fn register_objects(reg: &mut NodeRegistry) {
    use NodeCategory::{Input, Object};

    reg.register(
        NodeType::new("InputGeometry", Input, NodeKind::InputGeometry)
            .output("Geometry")
            .property(PropertyDecl::new("objectName", ""))
            .not_disableable()
            .describe("A named set of meshes from the evaluation context."),
    );
    reg.register(
        NodeType::new("InputParticles", Input, NodeKind::InputParticles)
            .output("Particles")
            .property(PropertyDecl::new("objectName", ""))
            .not_disableable()
            .describe("A named particle set from the evaluation context."),
    );

    let mut nearest = NodeType::new("NearestPoint", Object, NodeKind::NearestPoint)
        .input_required("Geometry")
        .input("Lookup Point (WS)", Vec3::ZERO)
        .input("Ignore Backfaces", false)
        .not_disableable()
        .describe("Closest point on the geometry to the lookup point.");
    let mut ray = NodeType::new("IntersectRay", Object, NodeKind::IntersectRay)
        .input_required("Geometry")
        .input("Ray Origin (WS)", Vec3::ZERO)
        .input("Ray Direction (WS)", Vec3::Z)
        .input("Ignore Backfaces", false)
        .not_disableable()
        .describe("First hit of a ray on the geometry; distance is in units of the direction length.");
    for name in SURFACE_OUTPUTS {
        nearest = nearest.output(name);
        ray = ray.output(name);
    }
    reg.register(nearest);
    reg.register(ray);

    reg.register(
        NodeType::new("InVolume", Object, NodeKind::InVolume)
            .input_required("Geometry")
            .input("Lookup Point (WS)", Vec3::ZERO)
            .output("IsInVolume")
            .not_disableable()
            .describe("True if the point lies inside a closed mesh."),
    );
    reg.register(
        NodeType::new("NearestParticle", Object, NodeKind::NearestParticle)
            .input_required("Particles")
            .input("Lookup Point (WS)", Vec3::ZERO)
            .output("Position")
            .output("IsValid")
            .output("ParticleIndex")
            .property(PropertyDecl::new("whichNearest", 1))
            .not_disableable()
            .describe("The n-th closest particle to the lookup point."),
    );
    reg.register(
        NodeType::new("ParticleSumCount", Object, NodeKind::ParticleSumCount)
            .input_required("Particles")
            .input("Lookup Point (WS)", Vec3::ZERO)
            .input("Neighbors", 4i32)
            .input("Falloff", 0.0f32)
            .output("MaxDistance")
            .output("TotalWeight")
            .property(PropertyDecl::new("channels", Vec::<String>::new()))
            .not_disableable()
            .describe("Sums channels of the k nearest particles weighted by (1 + d)^-falloff."),
    );
    reg.register(
        NodeType::new("ParticleSumRadius", Object, NodeKind::ParticleSumRadius)
            .input_required("Particles")
            .input("Lookup Point (WS)", Vec3::ZERO)
            .input("Radius", 1.0f32)
            .input("Falloff", 1.0f32)
            .output("NumParticles")
            .output("TotalWeight")
            .property(PropertyDecl::new("channels", Vec::<String>::new()))
            .not_disableable()
            .describe("Sums channels of particles in a sphere weighted by (1 - d/r)^falloff."),
    );
    reg.register(
        NodeType::new("ParticleQuery", Object, NodeKind::ParticleQuery)
            .input_required("Particles")
            .input("Index", 0i32)
            .property(PropertyDecl::new("channels", Vec::<String>::new()))
            .not_disableable()
            .describe("Reads channels of the indexed particle."),
    );
    reg.register(
        NodeType::new("FaceQuery", Object, NodeKind::FaceQuery)
            .input_required("Geometry")
            .input("ObjIndex", 0i32)
            .input("FaceIndex", 0i32)
            .input("BaryCoords", Vec3::splat(1.0 / 3.0))
            .output("Position")
            .property(PropertyDecl::new("exposePosition", true))
            .property(PropertyDecl::new("channels", Vec::<String>::new()))
            .not_disableable()
            .describe("Interpolates mesh channels at a location on a face."),
    );
    reg.register(
        NodeType::new("VertexQuery", Object, NodeKind::VertexQuery)
            .input_required("Geometry")
            .input("ObjIndex", 0i32)
            .input("VertIndex", 0i32)
            .output("Position")
            .property(PropertyDecl::new("exposePosition", true))
            .property(PropertyDecl::new("channels", Vec::<String>::new()))
            .not_disableable()
            .describe("Reads mesh channels at a vertex."),
    );
    reg.register(
        NodeType::new("MeshQuery", Object, NodeKind::MeshQuery)
            .input_required("Geometry")
            .input("ObjIndex", 0i32)
            .output("FaceCount")
            .output("VertexCount")
            .not_disableable()
            .describe("Face and vertex counts of a mesh."),
    );
}

fn loop_type(name: &'static str, kind: LoopKind) -> NodeType {
    let control = kind.num_control_inputs() as i32;
    let channels: Vec<String> = kind.loop_channels().iter().map(|s| s.to_string()).collect();
    NodeType::new(name, NodeCategory::Loop, NodeKind::Container(ContainerKind::Loop(kind)))
        .property(PropertyDecl::new("maxIterations", 1000))
        .property(PropertyDecl::new("numInputs", 1))
        .property(PropertyDecl::new("numOutputs", 1).read_only())
        .property(PropertyDecl::new("numControlInputs", control).read_only())
        .property(PropertyDecl::new("loopChannels", channels).read_only())
        .not_disableable()
}

fn register_containers(reg: &mut NodeRegistry) {
    use NodeCategory::{Compound, System};

    reg.register(
        NodeType::new("Compound", Compound, NodeKind::Container(ContainerKind::Compound))
            .property(PropertyDecl::new("numInputs", 0))
            .property(PropertyDecl::new("numOutputs", 1))
            .not_disableable()
            .describe("A sub-graph with its own inputs and outputs."),
    );
    reg.register(NodeType::new(COMPOUND_SOURCE, System, NodeKind::Source).internal());
    reg.register(NodeType::new(COMPOUND_SINK, System, NodeKind::Sink).internal());
    reg.register(NodeType::new(LOOP_SOURCE, System, NodeKind::Source).internal());
    reg.register(NodeType::new(LOOP_SINK, System, NodeKind::Sink).internal());

    reg.register(
        loop_type("Loop", LoopKind::Counted)
            .describe("Repeats its body until the continue condition becomes false."),
    );
    reg.register(
        loop_type("ParticleSearch", LoopKind::ParticleSearch)
            .input_required("Particles")
            .input("Lookup Point (WS)", Vec3::ZERO)
            .input("Radius", 10.0f32)
            .property(PropertyDecl::new("searchMode", "Radius").accepting(&["Radius", "Count"]))
            .describe("Runs its body over particles within a radius or the k nearest."),
    );
    reg.register(
        loop_type("VertexLoop", LoopKind::VertexLoop)
            .input_required("Geometry")
            .input("ObjIndex", 0i32)
            .input("VertIndex", 0i32)
            .property(PropertyDecl::new("visibleOnly", false))
            .describe("Runs its body over the vertices sharing an edge with a vertex."),
    );
    reg.register(
        loop_type("FaceLoopByVertex", LoopKind::FaceLoop)
            .input_required("Geometry")
            .input("ObjIndex", 0i32)
            .input("VertIndex", 0i32)
            .describe("Runs its body over all faces using a vertex."),
    );
}
