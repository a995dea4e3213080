//! Compiler: node graph → ordered expression list
//!
//! Depth-first post-order walk from every top-level `Output` node. Each
//! node is visited once; its outputs are recorded as *ports* that later
//! consumers read. Compounds are inlined by pre-registering their source
//! node's ports; loops collect the expressions compiled for their body
//! into a single foreach expression.
//!
//! Author: Moroya Sakamoto

use super::arena::{Slot, TempAllocator};
use super::expression::{Expr, MAX_ARGS};
use super::loops::{Accumulator, Foreach, IterationVars, LoopSource, SearchMode};
use super::queries::{ChannelCopy, Query, SumMode};
use super::{CompileContext, CompileError, CompiledGraph};
use crate::geometry::Geometry;
use crate::graph::{Graph, Node, NodeId};
use crate::nodes::{ContainerKind, LoopKind, NodeKind, NodeType, PropertyValue};
use crate::ops::{resolve, Signature};
use crate::particles::ParticleSet;
use crate::types::{check_assignable, ChannelError, DataType, ScalarType, SocketType, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const F: SocketType = SocketType::Data(DataType::FLOAT);
const I: SocketType = SocketType::Data(DataType::INT);
const B: SocketType = SocketType::Data(DataType::BOOL);
const V: SocketType = SocketType::Data(DataType::VEC3);
const GEO: SocketType = SocketType::Geometry;
const PRT: SocketType = SocketType::Particles;

/// Compile-time value of a socket
#[derive(Debug, Clone)]
enum Operand {
    Data(Slot),
    Geometry(Arc<dyn Geometry>),
    Particles(Arc<ParticleSet>),
}

impl Operand {
    fn socket_type(&self) -> SocketType {
        match self {
            Operand::Data(s) => SocketType::Data(s.data_type),
            Operand::Geometry(_) => SocketType::Geometry,
            Operand::Particles(_) => SocketType::Particles,
        }
    }

    fn slot(&self) -> Option<Slot> {
        match self {
            Operand::Data(s) => Some(*s),
            _ => None,
        }
    }
}

/// An output of a compiled node; unconnected compound sockets carry their error
type Port = Result<Operand, CompileError>;

enum Visit {
    Visiting,
    Compiled(Vec<Port>),
}

/// Innermost loop being compiled, for `LoopChannel` nodes
struct LoopFrame {
    kind: LoopKind,
    vars: IterationVars,
    particles: Option<Arc<ParticleSet>>,
    geometry: Option<(Arc<dyn Geometry>, Slot)>,
}

pub(crate) struct Compiler<'a> {
    graph: &'a Graph,
    ctx: &'a CompileContext,
    alloc: TempAllocator,
    state: HashMap<NodeId, Visit>,
    exprs: Vec<Expr>,
    constants: Vec<(Slot, Value)>,
    constant_slots: HashMap<(DataType, [u32; 4]), Slot>,
    loops: Vec<LoopFrame>,
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    node_slots: Vec<(NodeId, Vec<Slot>)>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(graph: &'a Graph, ctx: &'a CompileContext) -> Self {
        Compiler {
            graph,
            ctx,
            alloc: TempAllocator::new(),
            state: HashMap::new(),
            exprs: Vec::new(),
            constants: Vec::new(),
            constant_slots: HashMap::new(),
            loops: Vec::new(),
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            node_slots: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self) -> Result<CompiledGraph, CompileError> {
        let outputs = self.graph.outputs();
        for id in &outputs {
            self.compile_node(*id)?;
        }
        log::debug!(
            "compiled {} outputs: {} expressions, {} constants, arena {} bytes",
            outputs.len(),
            self.exprs.len(),
            self.constants.len(),
            self.alloc.size()
        );
        Ok(CompiledGraph {
            exprs: self.exprs,
            constants: self.constants,
            arena_size: self.alloc.size(),
            allocations: self.alloc.allocations().to_vec(),
            map: self.ctx.map().clone(),
            domain: self.ctx.domain(),
            reads: self.reads,
            writes: self.writes,
            node_slots: self.node_slots,
        })
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    fn compile_node(&mut self, id: NodeId) -> Result<Vec<Port>, CompileError> {
        match self.state.get(&id) {
            Some(Visit::Visiting) => return Err(CompileError::CycleDetected(id)),
            Some(Visit::Compiled(ports)) => return Ok(ports.clone()),
            None => {}
        }
        self.state.insert(id, Visit::Visiting);
        log::trace!("compiling node {}", id);

        let ports = self.compile_fresh(id)?;
        let slots: Vec<Slot> = ports
            .iter()
            .filter_map(|p| p.as_ref().ok().and_then(Operand::slot))
            .collect();
        if !slots.is_empty() {
            self.node_slots.push((id, slots));
        }
        self.state.insert(id, Visit::Compiled(ports.clone()));
        Ok(ports)
    }

    fn compile_fresh(&mut self, id: NodeId) -> Result<Vec<Port>, CompileError> {
        let graph = self.graph;
        let node = graph
            .node(id)
            .ok_or_else(|| CompileError::Internal(format!("dangling node id {}", id)))?;
        let ty = graph
            .registry()
            .get(node.type_name())
            .ok_or_else(|| CompileError::UnknownNodeType {
                node: id,
                type_name: node.type_name().to_string(),
            })?;

        if !node.is_enabled() && ty.disableable {
            let op = self.input(id, 0)?;
            return Ok(vec![Ok(op); node.outputs().len().max(1)]);
        }

        let ops = match ty.kind {
            NodeKind::Operator => self.operator(node, ty)?,
            NodeKind::Elbow => vec![self.input(id, 0)?],
            NodeKind::Breakout => self.breakout(node)?,
            NodeKind::Mux => self.mux(node)?,
            NodeKind::InputValue => {
                let value = node
                    .property("value")
                    .and_then(PropertyValue::as_value)
                    .ok_or_else(|| CompileError::Internal(format!("{} has no value", id)))?;
                vec![Operand::Data(self.constant(value))]
            }
            NodeKind::InputChannel => self.input_channel(node)?,
            NodeKind::Output => self.output(node)?,
            NodeKind::InputGeometry => {
                let name = node.str_property("objectName").unwrap_or_default();
                let geo = self.ctx.geometry(name).ok_or_else(|| CompileError::UnknownInterface {
                    node: id,
                    kind: "geometry",
                    name: name.to_string(),
                })?;
                vec![Operand::Geometry(geo.clone())]
            }
            NodeKind::InputParticles => {
                let name = node.str_property("objectName").unwrap_or_default();
                let prt = self.ctx.particles(name).ok_or_else(|| CompileError::UnknownInterface {
                    node: id,
                    kind: "particles",
                    name: name.to_string(),
                })?;
                vec![Operand::Particles(prt.clone())]
            }
            NodeKind::NearestPoint
            | NodeKind::IntersectRay
            | NodeKind::InVolume
            | NodeKind::MeshQuery => self.surface_query(node, ty)?,
            NodeKind::NearestParticle
            | NodeKind::ParticleSumCount
            | NodeKind::ParticleSumRadius
            | NodeKind::ParticleQuery => self.particle_query(node, ty)?,
            NodeKind::FaceQuery | NodeKind::VertexQuery => self.mesh_channel_query(node, ty)?,
            NodeKind::LoopChannel => vec![self.loop_channel(node)?],
            NodeKind::Container(ContainerKind::Compound) => return self.compound(node),
            NodeKind::Container(ContainerKind::Loop(kind)) => self.foreach(node, kind)?,
            NodeKind::Source | NodeKind::Sink => {
                return Err(CompileError::Internal(format!(
                    "container socket node {} reached outside its container",
                    id
                )))
            }
        };
        Ok(ops.into_iter().map(Ok).collect())
    }

    /// Operand feeding input `i`, compiling upstream as needed
    fn input(&mut self, id: NodeId, i: usize) -> Result<Operand, CompileError> {
        self.port(id, i)?
    }

    /// Like [`input`](Self::input), but an unconnected socket without a
    /// default yields an error port instead of failing
    fn port(&mut self, id: NodeId, i: usize) -> Result<Port, CompileError> {
        let graph = self.graph;
        let node = graph
            .node(id)
            .ok_or_else(|| CompileError::Internal(format!("dangling node id {}", id)))?;
        let unconnected = CompileError::UnconnectedInput { node: id, input: i };
        let Some(socket) = node.inputs().get(i) else {
            return Ok(Err(unconnected));
        };
        if let Some(conn) = socket.connection {
            let ports = self.compile_node(conn.node)?;
            return ports
                .get(conn.output)
                .cloned()
                .ok_or(CompileError::InvalidOutputSocket {
                    node: conn.node,
                    output: conn.output,
                });
        }
        Ok(match socket.default {
            Some(value) => Ok(Operand::Data(self.constant(value))),
            None => Err(unconnected),
        })
    }

    fn inputs(&mut self, id: NodeId, count: usize) -> Result<Vec<Operand>, CompileError> {
        (0..count).map(|i| self.input(id, i)).collect()
    }

    /// Slot holding a constant, shared by equal values
    fn constant(&mut self, value: Value) -> Slot {
        if let Some(slot) = self.constant_slots.get(&value.key()) {
            return *slot;
        }
        let slot = self.alloc.allocate(value.data_type());
        self.constant_slots.insert(value.key(), slot);
        self.constants.push((slot, value));
        slot
    }

    // ------------------------------------------------------------------
    // Type checks
    // ------------------------------------------------------------------

    fn mismatch(node: &Node, ops: &[Operand], alternatives: Vec<Signature>) -> CompileError {
        CompileError::TypeMismatch {
            node: node.id(),
            type_name: node.type_name().to_string(),
            observed: ops.iter().map(Operand::socket_type).collect(),
            alternatives,
        }
    }

    /// Require exactly `expected` input types
    fn expect(
        node: &Node,
        ops: &[Operand],
        expected: &[SocketType],
        outputs: &[SocketType],
    ) -> Result<(), CompileError> {
        let ok = ops.len() == expected.len()
            && ops.iter().zip(expected).all(|(o, e)| o.socket_type() == *e);
        if ok {
            Ok(())
        } else {
            Err(Self::mismatch(
                node,
                ops,
                vec![Signature::new(expected.to_vec(), outputs.to_vec())],
            ))
        }
    }

    // ------------------------------------------------------------------
    // Node kinds
    // ------------------------------------------------------------------

    fn operator(&mut self, node: &Node, ty: &NodeType) -> Result<Vec<Operand>, CompileError> {
        let ops = self.inputs(node.id(), node.inputs().len())?;

        let tolerant = !ty.tolerant_bindings.is_empty()
            && node
                .property("useTolerance")
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false);
        let (table, tolerance) = if tolerant {
            let exp = node.int_property("toleranceExp").unwrap_or(4);
            (ty.tolerant_bindings, 10f32.powi(-exp))
        } else {
            (ty.bindings, 0.0)
        };

        let observed: Vec<SocketType> = ops.iter().map(Operand::socket_type).collect();
        let binding = resolve(table, &observed).ok_or_else(|| {
            Self::mismatch(node, &ops, table.iter().map(|b| b.signature()).collect())
        })?;
        if binding.inputs.len() > MAX_ARGS {
            return Err(CompileError::Internal(format!(
                "{} declares {} inputs",
                ty.name,
                binding.inputs.len()
            )));
        }

        let inputs: Vec<Slot> = ops.iter().filter_map(Operand::slot).collect();
        let out = self.alloc.allocate(binding.output);
        self.exprs.push(Expr::Operator {
            node: node.id(),
            name: ty.name.to_string(),
            handler: binding.handler,
            tolerance,
            inputs,
            out,
        });
        Ok(vec![Operand::Data(out)])
    }

    /// Components alias the vector slot
    fn breakout(&mut self, node: &Node) -> Result<Vec<Operand>, CompileError> {
        let ops = self.inputs(node.id(), 1)?;
        Self::expect(node, &ops, &[V], &[F, F, F])?;
        let v = ops[0].slot().ok_or_else(|| CompileError::Internal("breakout".into()))?;
        Ok((0..3).map(|i| Operand::Data(v.component(i))).collect())
    }

    fn mux(&mut self, node: &Node) -> Result<Vec<Operand>, CompileError> {
        let count = node.inputs().len();
        if count < 2 {
            return Err(CompileError::Internal(format!("{} has no selector", node.id())));
        }
        let ops = self.inputs(node.id(), count)?;
        let value_type = ops[0].socket_type();
        let mut expected = vec![value_type; count - 1];
        expected.push(I);
        Self::expect(node, &ops, &expected, &[value_type])?;
        if !matches!(value_type, SocketType::Data(_)) {
            return Err(Self::mismatch(node, &ops, Vec::new()));
        }

        let slots: Vec<Slot> = ops.iter().filter_map(Operand::slot).collect();
        let (selector, inputs) = slots
            .split_last()
            .ok_or_else(|| CompileError::Internal("mux".into()))?;
        let out = self.alloc.allocate(inputs[0].data_type);
        self.exprs.push(Expr::Mux {
            node: node.id(),
            inputs: inputs.to_vec(),
            selector: *selector,
            out,
        });
        Ok(vec![Operand::Data(out)])
    }

    fn input_channel(&mut self, node: &Node) -> Result<Vec<Operand>, CompileError> {
        let name = node.str_property("channelName").unwrap_or_default();
        let accessor = match self.ctx.map().get_accessor(name) {
            Ok(acc) => acc,
            Err(_) if name == "Index" => {
                let out = self.alloc.allocate(DataType::INT);
                self.exprs.push(Expr::ReadIndex { node: node.id(), out });
                return Ok(vec![Operand::Data(out)]);
            }
            Err(_) => {
                return Err(CompileError::UnknownChannel {
                    node: node.id(),
                    channel: name.to_string(),
                })
            }
        };
        let ty = accessor.data_type.canonical();
        if !ty.is_value_type() {
            return Err(CompileError::IncompatibleChannelType {
                node: node.id(),
                channel: name.to_string(),
                from: accessor.data_type,
                to: ty,
            });
        }
        let out = self.alloc.allocate(ty);
        self.reads.insert(name.to_string());
        self.exprs.push(Expr::ReadChannel {
            node: node.id(),
            channel: name.to_string(),
            accessor,
            out,
        });
        Ok(vec![Operand::Data(out)])
    }

    fn output(&mut self, node: &Node) -> Result<Vec<Operand>, CompileError> {
        let id = node.id();
        let ops = self.inputs(id, 1)?;
        let Some(input) = ops[0].slot() else {
            let alternatives = DataType::named_types()
                .iter()
                .filter_map(|n| DataType::from_name(n))
                .map(|t| Signature::new(vec![SocketType::Data(t)], Vec::new()))
                .collect();
            return Err(Self::mismatch(node, &ops, alternatives));
        };

        let name = node.str_property("channelName").unwrap_or_default();
        let accessor = self
            .ctx
            .map()
            .get_accessor(name)
            .map_err(|_| CompileError::UnknownChannel {
                node: id,
                channel: name.to_string(),
            })?;
        check_assignable(name, input.data_type, accessor.data_type).map_err(|e| match e {
            ChannelError::ArityMismatch {
                channel,
                expected,
                found,
            } => CompileError::ArityMismatch {
                node: id,
                channel,
                expected,
                found,
            },
            ChannelError::IncompatibleTypes { channel, from, to } => {
                CompileError::IncompatibleChannelType {
                    node: id,
                    channel,
                    from,
                    to,
                }
            }
            other => CompileError::Internal(other.to_string()),
        })?;

        self.writes.insert(name.to_string());
        self.exprs.push(Expr::WriteChannel {
            node: id,
            channel: name.to_string(),
            accessor,
            input,
        });
        Ok(Vec::new())
    }

    fn surface_query(&mut self, node: &Node, ty: &NodeType) -> Result<Vec<Operand>, CompileError> {
        let id = node.id();
        let ops = self.inputs(id, node.inputs().len())?;
        let surface = [V, B, I, I, F, V, V];
        let (expected, outputs): (&[SocketType], &[SocketType]) = match ty.kind {
            NodeKind::NearestPoint => (&[GEO, V, B], &surface),
            NodeKind::IntersectRay => (&[GEO, V, V, B], &surface),
            NodeKind::InVolume => (&[GEO, V], &[B]),
            _ => (&[GEO, I], &[I, I]),
        };
        Self::expect(node, &ops, expected, outputs)?;
        let Operand::Geometry(geometry) = ops[0].clone() else {
            return Err(CompileError::Internal("geometry operand".into()));
        };
        let slot = |i: usize| ops[i].slot().unwrap_or(Slot { data_type: DataType::INT, offset: 0 });
        let outs: Vec<Slot> = outputs
            .iter()
            .map(|t| match t {
                SocketType::Data(d) => self.alloc.allocate(*d),
                _ => self.alloc.allocate(DataType::INT),
            })
            .collect();

        let query = match ty.kind {
            NodeKind::NearestPoint => Query::NearestPoint {
                node: id,
                geometry,
                point: slot(1),
                ignore_backfaces: slot(2),
                out: surface_slots(&outs)?,
            },
            NodeKind::IntersectRay => Query::IntersectRay {
                node: id,
                geometry,
                origin: slot(1),
                dir: slot(2),
                ignore_backfaces: slot(3),
                out: surface_slots(&outs)?,
            },
            NodeKind::InVolume => Query::InVolume {
                node: id,
                geometry,
                point: slot(1),
                out: outs[0],
            },
            _ => Query::MeshQuery {
                node: id,
                geometry,
                obj: slot(1),
                out: [outs[0], outs[1]],
            },
        };
        self.exprs.push(Expr::Query(Box::new(query)));
        Ok(outs.into_iter().map(Operand::Data).collect())
    }

    fn particle_query(&mut self, node: &Node, ty: &NodeType) -> Result<Vec<Operand>, CompileError> {
        let id = node.id();
        let ops = self.inputs(id, node.inputs().len())?;
        let (expected, fixed): (&[SocketType], &[DataType]) = match ty.kind {
            NodeKind::NearestParticle => (&[PRT, V], &[DataType::VEC3, DataType::BOOL, DataType::INT]),
            NodeKind::ParticleSumCount => (&[PRT, V, I, F], &[DataType::FLOAT, DataType::FLOAT]),
            NodeKind::ParticleSumRadius => (&[PRT, V, F, F], &[DataType::INT, DataType::FLOAT]),
            _ => (&[PRT, I], &[]),
        };
        let fixed_types: Vec<SocketType> = fixed.iter().map(|d| SocketType::Data(*d)).collect();
        Self::expect(node, &ops, expected, &fixed_types)?;
        let Operand::Particles(particles) = ops[0].clone() else {
            return Err(CompileError::Internal("particle operand".into()));
        };
        let slot = |i: usize| ops[i].slot().unwrap_or(Slot { data_type: DataType::INT, offset: 0 });

        let outs: Vec<Slot> = fixed.iter().map(|d| self.alloc.allocate(*d)).collect();
        let summed = matches!(ty.kind, NodeKind::ParticleSumCount | NodeKind::ParticleSumRadius);
        let mut channels = Vec::new();
        if ty.kind != NodeKind::NearestParticle {
            for name in node.list_property("channels") {
                channels.push(self.particle_channel(id, &particles, name, summed)?);
            }
        }

        let query = match ty.kind {
            NodeKind::NearestParticle => Query::NearestParticle {
                node: id,
                particles,
                point: slot(1),
                which: node.int_property("whichNearest").unwrap_or(1).max(1) as usize,
                out: [outs[0], outs[1], outs[2]],
            },
            NodeKind::ParticleSumCount | NodeKind::ParticleSumRadius => Query::ParticleSum {
                node: id,
                particles,
                mode: if ty.kind == NodeKind::ParticleSumCount {
                    SumMode::Count
                } else {
                    SumMode::Radius
                },
                point: slot(1),
                extent: slot(2),
                falloff: slot(3),
                out: [outs[0], outs[1]],
                channels: channels.clone(),
            },
            _ => Query::ParticleQuery {
                node: id,
                particles,
                index: slot(1),
                channels: channels.clone(),
            },
        };
        self.exprs.push(Expr::Query(Box::new(query)));
        Ok(outs
            .into_iter()
            .chain(channels.into_iter().map(|c| c.out))
            .map(Operand::Data)
            .collect())
    }

    /// Resolve a particle channel and allocate its canonical slot
    fn particle_channel(
        &mut self,
        node: NodeId,
        particles: &ParticleSet,
        name: &str,
        summed: bool,
    ) -> Result<ChannelCopy, CompileError> {
        let accessor = particles
            .map()
            .get_accessor(name)
            .map_err(|_| CompileError::UnknownChannel {
                node,
                channel: name.to_string(),
            })?;
        let ty = accessor.data_type.canonical();
        if !ty.is_value_type() || (summed && ty.scalar == ScalarType::Bool) {
            return Err(CompileError::IncompatibleChannelType {
                node,
                channel: name.to_string(),
                from: accessor.data_type,
                to: ty,
            });
        }
        Ok(ChannelCopy {
            channel: name.to_string(),
            accessor,
            out: self.alloc.allocate(ty),
        })
    }

    fn mesh_channel_query(&mut self, node: &Node, ty: &NodeType) -> Result<Vec<Operand>, CompileError> {
        let id = node.id();
        let ops = self.inputs(id, node.inputs().len())?;
        let face = ty.kind == NodeKind::FaceQuery;
        let expected: &[SocketType] = if face { &[GEO, I, I, V] } else { &[GEO, I, I] };
        Self::expect(node, &ops, expected, &[])?;
        let Operand::Geometry(geometry) = ops[0].clone() else {
            return Err(CompileError::Internal("geometry operand".into()));
        };
        let slot = |i: usize| ops[i].slot().unwrap_or(Slot { data_type: DataType::INT, offset: 0 });

        let expose = node
            .property("exposePosition")
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        let position = expose.then(|| self.alloc.allocate(DataType::VEC3));
        let mut channels = Vec::new();
        for name in node.list_property("channels") {
            let out = self.mesh_channel(id, geometry.as_ref(), name)?;
            channels.push((name.clone(), out));
        }

        let outs: Vec<Operand> = position
            .iter()
            .chain(channels.iter().map(|(_, s)| s))
            .map(|s| Operand::Data(*s))
            .collect();
        let query = if face {
            Query::FaceQuery {
                node: id,
                geometry,
                obj: slot(1),
                face: slot(2),
                bary: slot(3),
                position,
                channels,
            }
        } else {
            Query::VertexQuery {
                node: id,
                geometry,
                obj: slot(1),
                vertex: slot(2),
                position,
                channels,
            }
        };
        self.exprs.push(Expr::Query(Box::new(query)));
        Ok(outs)
    }

    fn mesh_channel(&mut self, node: NodeId, geometry: &dyn Geometry, name: &str) -> Result<Slot, CompileError> {
        let info = geometry
            .channel_info(name)
            .ok_or_else(|| CompileError::UnknownChannel {
                node,
                channel: name.to_string(),
            })?;
        let ty = info.data_type.canonical();
        if !ty.is_value_type() {
            return Err(CompileError::IncompatibleChannelType {
                node,
                channel: name.to_string(),
                from: info.data_type,
                to: ty,
            });
        }
        Ok(self.alloc.allocate(ty))
    }

    fn loop_channel(&mut self, node: &Node) -> Result<Operand, CompileError> {
        let id = node.id();
        let name = node.str_property("channelName").unwrap_or_default();
        let Some(frame) = self.loops.last() else {
            return Err(CompileError::LoopChannelOutsideLoop(id));
        };
        let unknown = || CompileError::UnknownChannel {
            node: id,
            channel: name.to_string(),
        };
        let vars = frame.vars;
        let kind = frame.kind;
        let fixed = match (kind, name) {
            (LoopKind::ParticleSearch | LoopKind::FaceLoop, "IterationIndex") => Some(vars.iteration),
            (LoopKind::ParticleSearch, "NeighborIndex")
            | (LoopKind::VertexLoop, "NeighborVertex")
            | (LoopKind::FaceLoop, "FaceIndex") => vars.neighbor,
            (LoopKind::VertexLoop, "EdgeVisibility") => vars.visible,
            (LoopKind::VertexLoop, "EdgeIsBoundary") => vars.boundary,
            _ => None,
        };
        if let Some(slot) = fixed {
            return Ok(Operand::Data(slot));
        }
        let neighbor = vars.neighbor.ok_or_else(unknown)?;

        let query = match (frame.particles.clone(), frame.geometry.clone()) {
            (Some(particles), _) => {
                let copy = self.particle_channel(id, &particles, name, false)?;
                let out = copy.out;
                (
                    Query::ParticleQuery {
                        node: id,
                        particles,
                        index: neighbor,
                        channels: vec![copy],
                    },
                    out,
                )
            }
            // Face loops read the neighbour face at its centroid
            (None, Some((geometry, obj))) if kind == LoopKind::FaceLoop => {
                let out = self.mesh_channel(id, geometry.as_ref(), name)?;
                let bary = self.constant(Value::Vec3(glam::Vec3::splat(1.0 / 3.0)));
                (
                    Query::FaceQuery {
                        node: id,
                        geometry,
                        obj,
                        face: neighbor,
                        bary,
                        position: None,
                        channels: vec![(name.to_string(), out)],
                    },
                    out,
                )
            }
            (None, Some((geometry, obj))) => {
                let out = self.mesh_channel(id, geometry.as_ref(), name)?;
                (
                    Query::VertexQuery {
                        node: id,
                        geometry,
                        obj,
                        vertex: neighbor,
                        position: None,
                        channels: vec![(name.to_string(), out)],
                    },
                    out,
                )
            }
            (None, None) => return Err(unknown()),
        };
        self.exprs.push(Expr::Query(Box::new(query.0)));
        Ok(Operand::Data(query.1))
    }

    /// Inline a compound: its source forwards the compound's inputs and
    /// its outputs are whatever feeds the sink
    fn compound(&mut self, node: &Node) -> Result<Vec<Port>, CompileError> {
        let id = node.id();
        let body = node
            .body()
            .ok_or_else(|| CompileError::Internal(format!("{} has no body", id)))?;
        let inputs: Vec<Port> = (0..node.inputs().len())
            .map(|i| self.port(id, i))
            .collect::<Result<_, _>>()?;
        self.state.insert(body.source, Visit::Compiled(inputs));

        let graph = self.graph;
        let sink = graph
            .node(body.sink)
            .ok_or_else(|| CompileError::Internal(format!("{} has no sink", id)))?;
        (0..sink.inputs().len())
            .map(|j| self.port(body.sink, j))
            .collect()
    }

    fn foreach(&mut self, node: &Node, kind: LoopKind) -> Result<Vec<Operand>, CompileError> {
        let id = node.id();
        let graph = self.graph;
        let body = node
            .body()
            .ok_or_else(|| CompileError::Internal(format!("{} has no body", id)))?;
        let sink = graph
            .node(body.sink)
            .ok_or_else(|| CompileError::Internal(format!("{} has no sink", id)))?;

        let control = kind.num_control_inputs();
        let ctl = self.inputs(id, control)?;
        let slot = |i: usize| ctl[i].slot().unwrap_or(Slot { data_type: DataType::INT, offset: 0 });
        let (source, particles, geometry) = match kind {
            LoopKind::Counted => (LoopSource::Counted, None, None),
            LoopKind::ParticleSearch => {
                let by_count = node.str_property("searchMode") == Some("Count");
                Self::expect(node, &ctl, &[PRT, V, if by_count { I } else { F }], &[])?;
                let Operand::Particles(particles) = ctl[0].clone() else {
                    return Err(CompileError::Internal("particle operand".into()));
                };
                let mode = if by_count {
                    SearchMode::Count(slot(2))
                } else {
                    SearchMode::Radius(slot(2))
                };
                (
                    LoopSource::Particles {
                        particles: particles.clone(),
                        point: slot(1),
                        mode,
                    },
                    Some(particles),
                    None,
                )
            }
            LoopKind::VertexLoop => {
                Self::expect(node, &ctl, &[GEO, I, I], &[])?;
                let Operand::Geometry(geometry) = ctl[0].clone() else {
                    return Err(CompileError::Internal("geometry operand".into()));
                };
                let visible_only = node
                    .property("visibleOnly")
                    .and_then(PropertyValue::as_bool)
                    .unwrap_or(false);
                (
                    LoopSource::Vertices {
                        geometry: geometry.clone(),
                        obj: slot(1),
                        vertex: slot(2),
                        visible_only,
                    },
                    None,
                    Some((geometry, slot(1))),
                )
            }
            LoopKind::FaceLoop => {
                Self::expect(node, &ctl, &[GEO, I, I], &[])?;
                let Operand::Geometry(geometry) = ctl[0].clone() else {
                    return Err(CompileError::Internal("geometry operand".into()));
                };
                (
                    LoopSource::Faces {
                        geometry: geometry.clone(),
                        obj: slot(1),
                        vertex: slot(2),
                    },
                    None,
                    Some((geometry, slot(1))),
                )
            }
        };

        let mut initial = Vec::new();
        for k in control..node.inputs().len() {
            let op = self.input(id, k)?;
            let Some(s) = op.slot() else {
                return Err(Self::mismatch(node, &[op], Vec::new()));
            };
            initial.push(s);
        }
        let live: Vec<Slot> = initial
            .iter()
            .map(|s| self.alloc.allocate(s.data_type))
            .collect();

        let vars = IterationVars {
            iteration: self.alloc.allocate(DataType::INT),
            neighbor: (kind != LoopKind::Counted).then(|| self.alloc.allocate(DataType::INT)),
            visible: (kind == LoopKind::VertexLoop).then(|| self.alloc.allocate(DataType::BOOL)),
            boundary: (kind == LoopKind::VertexLoop).then(|| self.alloc.allocate(DataType::BOOL)),
        };
        let source_ports = std::iter::once(vars.iteration)
            .chain(live.iter().copied())
            .map(|s| Ok(Operand::Data(s)))
            .collect();
        self.state.insert(body.source, Visit::Compiled(source_ports));
        self.loops.push(LoopFrame {
            kind,
            vars,
            particles,
            geometry,
        });

        let start = self.exprs.len();
        let cond_op = self.input(body.sink, 0)?;
        let condition = match cond_op.slot() {
            Some(s) if s.data_type == DataType::BOOL => s,
            _ => return Err(Self::mismatch(sink, &[cond_op], vec![Signature::new(vec![B], Vec::new())])),
        };
        let condition_exprs = self.exprs.split_off(start);

        let mut updates = Vec::with_capacity(live.len());
        for (k, live_slot) in live.iter().enumerate() {
            let socket = sink.inputs().get(k + 1);
            let connected = socket.is_some_and(|s| s.connection.is_some() || s.default.is_some());
            if !connected {
                updates.push(*live_slot);
                continue;
            }
            let op = self.input(body.sink, k + 1)?;
            match op.slot() {
                Some(s) if s.data_type == live_slot.data_type => updates.push(s),
                _ => {
                    let want = SocketType::Data(live_slot.data_type);
                    return Err(Self::mismatch(sink, &[op], vec![Signature::new(vec![want], Vec::new())]));
                }
            }
        }
        // An update sharing bytes with another accumulator's live slot (the
        // slot itself or a Breakout component of it) must be copied before
        // the live slots are overwritten
        for k in 0..updates.len() {
            let aliased = live
                .iter()
                .enumerate()
                .any(|(j, l)| l.overlaps(&updates[k]) && !(j == k && *l == updates[k]));
            if aliased {
                let tmp = self.alloc.allocate(updates[k].data_type);
                self.exprs.push(Expr::Copy {
                    from: updates[k],
                    to: tmp,
                });
                updates[k] = tmp;
            }
        }
        let body_exprs = self.exprs.split_off(start);
        self.loops.pop();

        let accumulators = initial
            .iter()
            .zip(&live)
            .zip(&updates)
            .map(|((i, l), u)| Accumulator {
                initial: *i,
                live: *l,
                update: *u,
            })
            .collect();
        let max_iterations = node.int_property("maxIterations").unwrap_or(1000).max(0) as usize;
        log::trace!(
            "loop {}: {} condition and {} body expressions",
            id,
            condition_exprs.len(),
            body_exprs.len()
        );
        self.exprs.push(Expr::Foreach(Box::new(Foreach {
            node: id,
            source,
            vars,
            accumulators,
            condition,
            condition_exprs,
            body: body_exprs,
            max_iterations,
        })));
        Ok(live.into_iter().map(Operand::Data).collect())
    }
}

fn surface_slots(outs: &[Slot]) -> Result<[Slot; 7], CompileError> {
    outs.try_into()
        .map_err(|_| CompileError::Internal("surface query outputs".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelBuffer, ChannelMap};
    use glam::Vec3;

    fn map() -> ChannelMap {
        ChannelMap::from_channels([
            ("Position", DataType::VEC3),
            ("Value", DataType::FLOAT),
            ("X", DataType::FLOAT),
        ])
        .unwrap()
    }

    fn channel(graph: &mut Graph, name: &str) -> NodeId {
        let id = graph.create_node("InputChannel").unwrap();
        graph.set_property(id, "channelName", name).unwrap();
        id
    }

    fn output(graph: &mut Graph, name: &str, from: NodeId, socket: usize) -> NodeId {
        let id = graph.create_node("Output").unwrap();
        graph.set_property(id, "channelName", name).unwrap();
        graph.set_input(id, 0, from, socket).unwrap();
        id
    }

    fn run(graph: &Graph, position: Vec3, value: f32) -> ChannelBuffer {
        let compiled = CompiledGraph::compile(graph, &CompileContext::new(map())).unwrap();
        let mut buf = ChannelBuffer::with_len(map(), 1).unwrap();
        buf.set(0, "Position", &Value::Vec3(position)).unwrap();
        buf.set(0, "Value", &Value::Float(value)).unwrap();
        compiled.eval_record(0, buf.record_mut(0));
        buf
    }

    #[test]
    fn test_type_mismatch_lists_alternatives() {
        let mut graph = Graph::standard();
        let pos = channel(&mut graph, "Position");
        let not = graph.create_node("LogicalNot").unwrap();
        graph.set_input(not, 0, pos, 0).unwrap();
        let to_float = graph.create_node("ToFloat").unwrap();
        graph.set_input(to_float, 0, not, 0).unwrap();
        output(&mut graph, "X", to_float, 0);

        let err = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap_err();
        match err {
            CompileError::TypeMismatch {
                node,
                observed,
                alternatives,
                ..
            } => {
                assert_eq!(node, not);
                assert_eq!(observed, vec![V]);
                assert!(!alternatives.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_constants_deduplicated() {
        let mut graph = Graph::standard();
        let a = graph.create_node("Add").unwrap();
        let b = graph.create_node("Add").unwrap();
        output(&mut graph, "X", a, 0);
        output(&mut graph, "Value", b, 0);

        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap();
        assert_eq!(compiled.constants().len(), 1);
        assert_eq!(compiled.expressions().len(), 4);
    }

    #[test]
    fn test_unconnected_required_input() {
        let mut graph = Graph::standard();
        let not = graph.create_node("LogicalNot").unwrap();
        let to_float = graph.create_node("ToFloat").unwrap();
        graph.set_input(to_float, 0, not, 0).unwrap();
        output(&mut graph, "X", to_float, 0);

        let err = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap_err();
        assert_eq!(err, CompileError::UnconnectedInput { node: not, input: 0 });
    }

    #[test]
    fn test_unknown_channel() {
        let mut graph = Graph::standard();
        let ch = channel(&mut graph, "Velocity");
        output(&mut graph, "X", ch, 0);

        let err = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap_err();
        assert!(matches!(err, CompileError::UnknownChannel { node, .. } if node == ch));
    }

    #[test]
    fn test_compound_inlined() {
        let mut graph = Graph::standard();
        let ch = channel(&mut graph, "Value");
        let add = graph.create_node("Add").unwrap();
        graph.set_input(add, 0, ch, 0).unwrap();
        graph.set_input_default_value(add, 1, 0.5f32).unwrap();
        output(&mut graph, "X", add, 0);
        graph.create_compound(&[add]).unwrap();

        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap();
        assert_eq!(compiled.expressions().len(), 3);
        let buf = run(&graph, Vec3::ZERO, 2.0);
        assert!((buf.get(0, "X").unwrap().as_f32() - 2.5).abs() < 0.0001);
    }

    #[test]
    fn test_counted_loop_accumulates() {
        let mut graph = Graph::standard();
        let lp = graph.create_node("Loop").unwrap();
        let source = graph.container_source(lp).unwrap();
        let sink = graph.container_sink(lp).unwrap();

        graph.push_editable(lp).unwrap();
        let less = graph.create_node("Less").unwrap();
        graph.set_input(less, 0, source, 0).unwrap();
        graph.set_input_default_value(less, 1, 3i32).unwrap();
        graph.set_input(sink, 0, less, 0).unwrap();
        let add = graph.create_node("Add").unwrap();
        graph.set_input(add, 0, source, 1).unwrap();
        graph.set_input_default_value(add, 1, 2.0f32).unwrap();
        graph.set_input(sink, 1, add, 0).unwrap();
        graph.pop_editable();

        graph.set_input_default_value(lp, 0, 1.0f32).unwrap();
        output(&mut graph, "X", lp, 0);

        let buf = run(&graph, Vec3::ZERO, 0.0);
        assert!((buf.get(0, "X").unwrap().as_f32() - 7.0).abs() < 0.0001);
    }

    #[test]
    fn test_loop_respects_max_iterations() {
        let mut graph = Graph::standard();
        let lp = graph.create_node("Loop").unwrap();
        let source = graph.container_source(lp).unwrap();
        let sink = graph.container_sink(lp).unwrap();
        graph.set_property(lp, "maxIterations", 5).unwrap();

        graph.push_editable(lp).unwrap();
        let add = graph.create_node("Add").unwrap();
        graph.set_input(add, 0, source, 1).unwrap();
        graph.set_input_default_value(add, 1, 1.0f32).unwrap();
        graph.set_input(sink, 1, add, 0).unwrap();
        graph.pop_editable();
        output(&mut graph, "X", lp, 0);

        let buf = run(&graph, Vec3::ZERO, 0.0);
        assert!((buf.get(0, "X").unwrap().as_f32() - 5.0).abs() < 0.0001);
    }

    #[test]
    fn test_breakout_and_mux() {
        let mut graph = Graph::standard();
        let pos = channel(&mut graph, "Position");
        let split = graph.create_node("Breakout").unwrap();
        graph.set_input(split, 0, pos, 0).unwrap();
        let mux = graph.create_node("Mux").unwrap();
        graph.set_input(mux, 0, split, 0).unwrap();
        graph.set_input(mux, 1, split, 1).unwrap();
        graph.set_input_default_value(mux, 2, 1i32).unwrap();
        output(&mut graph, "X", mux, 0);

        let buf = run(&graph, Vec3::new(1.0, 2.0, 3.0), 0.0);
        assert!((buf.get(0, "X").unwrap().as_f32() - 2.0).abs() < 0.0001);
    }

    #[test]
    fn test_disabled_node_forwards_first_input() {
        let mut graph = Graph::standard();
        let ch = channel(&mut graph, "Value");
        let add = graph.create_node("Add").unwrap();
        graph.set_input(add, 0, ch, 0).unwrap();
        graph.set_input_default_value(add, 1, 5.0f32).unwrap();
        output(&mut graph, "X", add, 0);
        graph.set_enabled(add, false).unwrap();

        let buf = run(&graph, Vec3::ZERO, 1.5);
        assert!((buf.get(0, "X").unwrap().as_f32() - 1.5).abs() < 0.0001);
    }

    #[test]
    fn test_self_referential() {
        let mut graph = Graph::standard();
        let ch = channel(&mut graph, "Value");
        let out = output(&mut graph, "X", ch, 0);
        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap();
        assert!(!compiled.is_self_referential());

        graph.set_property(out, "channelName", "Value").unwrap();
        let compiled = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap();
        assert!(compiled.is_self_referential());
        assert!(compiled.reads().contains("Value"));
    }

    #[test]
    fn test_loop_channel_outside_loop() {
        let mut graph = Graph::standard();
        let lc = graph.create_node("LoopChannel").unwrap();
        let to_float = graph.create_node("ToFloat").unwrap();
        graph.set_input(to_float, 0, lc, 0).unwrap();
        output(&mut graph, "X", to_float, 0);

        let err = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap_err();
        assert_eq!(err, CompileError::LoopChannelOutsideLoop(lc));
    }

    #[test]
    fn test_missing_interface() {
        let mut graph = Graph::standard();
        let geo = graph.create_node("InputGeometry").unwrap();
        graph.set_property(geo, "objectName", "ground").unwrap();
        let inside = graph.create_node("InVolume").unwrap();
        graph.set_input(inside, 0, geo, 0).unwrap();
        let to_float = graph.create_node("ToFloat").unwrap();
        graph.set_input(to_float, 0, inside, 0).unwrap();
        output(&mut graph, "X", to_float, 0);

        let err = CompiledGraph::compile(&graph, &CompileContext::new(map())).unwrap_err();
        assert!(matches!(err, CompileError::UnknownInterface { kind: "geometry", .. }));
    }
}
