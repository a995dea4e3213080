//! Geometry and particle query expressions
//!
//! Queries never fail loudly: when a lookup finds nothing or an index is
//! out of range, every output slot of the query is zeroed and the validity
//! flag (if any) reads false.
//!
//! Author: Moroya Sakamoto

use super::arena::{Arena, Slot};
use super::expression::slots;
use crate::geometry::{Geometry, SurfaceHit};
use crate::graph::NodeId;
use crate::particles::{Neighbor, ParticleSet};
use crate::types::{ChannelAccessor, DataType, ScalarType, Value};
use glam::{Quat, Vec3, Vec4};
use std::fmt;
use std::sync::Arc;

/// A particle channel copied (or summed) into a slot
#[derive(Debug, Clone)]
pub struct ChannelCopy {
    /// Channel name
    pub channel: String,
    /// Location in the particle record
    pub accessor: ChannelAccessor,
    /// Destination slot (canonical type)
    pub out: Slot,
}

/// How `ParticleSum` picks particles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumMode {
    /// The k nearest, weighted by `(1 + d)^-falloff`
    Count,
    /// All within a radius, weighted by `(1 - d/r)^falloff`
    Radius,
}

/// Query expression payloads
#[derive(Debug, Clone)]
pub enum Query {
    /// Closest surface point
    NearestPoint {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Vec3 lookup point
        point: Slot,
        /// Bool flag
        ignore_backfaces: Slot,
        /// Surface outputs in socket order
        out: [Slot; 7],
    },
    /// First surface hit along a ray
    IntersectRay {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Vec3 ray origin
        origin: Slot,
        /// Vec3 ray direction
        dir: Slot,
        /// Bool flag
        ignore_backfaces: Slot,
        /// Surface outputs in socket order
        out: [Slot; 7],
    },
    /// Point-in-volume test
    InVolume {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Vec3 lookup point
        point: Slot,
        /// Bool result
        out: Slot,
    },
    /// The n-th nearest particle; invalid unless the set holds at least `which` particles
    NearestParticle {
        /// Source node
        node: NodeId,
        /// Particle collaborator
        particles: Arc<ParticleSet>,
        /// Vec3 lookup point
        point: Slot,
        /// 1 for the closest
        which: usize,
        /// Position, IsValid, ParticleIndex
        out: [Slot; 3],
    },
    /// Weighted channel sums over nearby particles
    ParticleSum {
        /// Source node
        node: NodeId,
        /// Particle collaborator
        particles: Arc<ParticleSet>,
        /// Selection rule
        mode: SumMode,
        /// Vec3 lookup point
        point: Slot,
        /// Int neighbour count or float radius
        extent: Slot,
        /// Float falloff power
        falloff: Slot,
        /// MaxDistance or NumParticles, then TotalWeight
        out: [Slot; 2],
        /// Summed channels
        channels: Vec<ChannelCopy>,
    },
    /// Channels of one particle
    ParticleQuery {
        /// Source node
        node: NodeId,
        /// Particle collaborator
        particles: Arc<ParticleSet>,
        /// Int particle index
        index: Slot,
        /// Copied channels
        channels: Vec<ChannelCopy>,
    },
    /// Channels at a location on a mesh face
    FaceQuery {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Int mesh index
        obj: Slot,
        /// Int face index
        face: Slot,
        /// Vec3 barycentric coordinates
        bary: Slot,
        /// Interpolated position, if exposed
        position: Option<Slot>,
        /// `(channel, slot)` pairs
        channels: Vec<(String, Slot)>,
    },
    /// Channels of a mesh vertex
    VertexQuery {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Int mesh index
        obj: Slot,
        /// Int vertex index
        vertex: Slot,
        /// Vertex position, if exposed
        position: Option<Slot>,
        /// `(channel, slot)` pairs
        channels: Vec<(String, Slot)>,
    },
    /// Face and vertex counts
    MeshQuery {
        /// Source node
        node: NodeId,
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Int mesh index
        obj: Slot,
        /// FaceCount, VertexCount
        out: [Slot; 2],
    },
}

impl Query {
    /// Node this query was compiled from
    pub fn node(&self) -> NodeId {
        match self {
            Query::NearestPoint { node, .. }
            | Query::IntersectRay { node, .. }
            | Query::InVolume { node, .. }
            | Query::NearestParticle { node, .. }
            | Query::ParticleSum { node, .. }
            | Query::ParticleQuery { node, .. }
            | Query::FaceQuery { node, .. }
            | Query::VertexQuery { node, .. }
            | Query::MeshQuery { node, .. } => *node,
        }
    }

    pub(crate) fn apply(&self, arena: &mut Arena) {
        match self {
            Query::NearestPoint {
                geometry,
                point,
                ignore_backfaces,
                out,
                ..
            } => {
                let hit = geometry.find_nearest_point(
                    arena.read(*point).as_vec3(),
                    f32::INFINITY,
                    arena.read(*ignore_backfaces).as_bool(),
                );
                write_surface(arena, out, hit);
            }
            Query::IntersectRay {
                geometry,
                origin,
                dir,
                ignore_backfaces,
                out,
                ..
            } => {
                let hit = geometry.intersect_ray(
                    arena.read(*origin).as_vec3(),
                    arena.read(*dir).as_vec3(),
                    f32::INFINITY,
                    arena.read(*ignore_backfaces).as_bool(),
                );
                write_surface(arena, out, hit);
            }
            Query::InVolume {
                geometry,
                point,
                out,
                ..
            } => {
                let inside = geometry.in_volume(arena.read(*point).as_vec3());
                arena.write(*out, &Value::Bool(inside));
            }
            Query::NearestParticle {
                particles,
                point,
                which,
                out,
                ..
            } => {
                let q = arena.read(*point).as_vec3();
                let tree = particles.kdtree();
                let mut found = Vec::with_capacity(*which);
                tree.locate_k_nearest(q, *which, &mut found);
                match found.get(which.saturating_sub(1)) {
                    Some(n) if found.len() == *which => {
                        let p = tree.point(n.index).unwrap_or(Vec3::ZERO);
                        arena.write(out[0], &Value::Vec3(p));
                        arena.write(out[1], &Value::Bool(true));
                        arena.write(out[2], &Value::Int(n.index as i32));
                    }
                    _ => out.iter().for_each(|s| arena.clear(*s)),
                }
            }
            Query::ParticleSum {
                particles,
                mode,
                point,
                extent,
                falloff,
                out,
                channels,
                ..
            } => particle_sum(arena, particles, *mode, *point, *extent, *falloff, out, channels),
            Query::ParticleQuery {
                particles,
                index,
                channels,
                ..
            } => {
                let i = arena.read(*index).as_i32();
                let record = usize::try_from(i)
                    .ok()
                    .filter(|&i| i < particles.len())
                    .map(|i| particles.records().record(i));
                for ch in channels {
                    match record.and_then(|r| ch.accessor.read(r)) {
                        Some(v) => arena.write(ch.out, &v),
                        None => arena.clear(ch.out),
                    }
                }
            }
            Query::FaceQuery {
                geometry,
                obj,
                face,
                bary,
                position,
                channels,
                ..
            } => {
                let obj = index_of(arena, *obj);
                let face = index_of(arena, *face);
                let bary = arena.read(*bary).as_vec3();
                if let Some(slot) = position {
                    let p = obj
                        .zip(face)
                        .and_then(|(o, f)| geometry.face_position(o, f, bary));
                    write_or_clear(arena, *slot, p.map(Value::Vec3));
                }
                for (name, slot) in channels {
                    let v = obj
                        .zip(face)
                        .and_then(|(o, f)| geometry.sample_face(o, f, bary, name));
                    write_or_clear(arena, *slot, v);
                }
            }
            Query::VertexQuery {
                geometry,
                obj,
                vertex,
                position,
                channels,
                ..
            } => {
                let at = index_of(arena, *obj).zip(index_of(arena, *vertex));
                if let Some(slot) = position {
                    let p = at.and_then(|(o, v)| geometry.vertex_position(o, v));
                    write_or_clear(arena, *slot, p.map(Value::Vec3));
                }
                for (name, slot) in channels {
                    let v = at.and_then(|(o, v)| geometry.sample_vertex(o, v, name));
                    write_or_clear(arena, *slot, v);
                }
            }
            Query::MeshQuery {
                geometry, obj, out, ..
            } => match index_of(arena, *obj).and_then(|o| geometry.mesh_counts(o)) {
                Some((faces, verts)) => {
                    arena.write(out[0], &Value::Int(faces as i32));
                    arena.write(out[1], &Value::Int(verts as i32));
                }
                None => out.iter().for_each(|s| arena.clear(*s)),
            },
        }
    }
}

/// Non-negative index held by an Int slot
#[inline]
fn index_of(arena: &Arena, slot: Slot) -> Option<usize> {
    usize::try_from(arena.read(slot).as_i32()).ok()
}

/// Write a value whose type matches the slot, or zero the slot
#[inline]
fn write_or_clear(arena: &mut Arena, slot: Slot, value: Option<Value>) {
    match value {
        Some(v) if v.data_type() == slot.data_type => arena.write(slot, &v),
        _ => arena.clear(slot),
    }
}

fn write_surface(arena: &mut Arena, out: &[Slot; 7], hit: Option<SurfaceHit>) {
    let Some(hit) = hit else {
        out.iter().for_each(|s| arena.clear(*s));
        return;
    };
    arena.write(out[0], &Value::Vec3(hit.position));
    arena.write(out[1], &Value::Bool(true));
    arena.write(out[2], &Value::Int(hit.obj_index));
    arena.write(out[3], &Value::Int(hit.face_index));
    arena.write(out[4], &Value::Float(hit.distance));
    arena.write(out[5], &Value::Vec3(hit.normal));
    arena.write(out[6], &Value::Vec3(hit.bary));
}

#[allow(clippy::too_many_arguments)]
fn particle_sum(
    arena: &mut Arena,
    particles: &ParticleSet,
    mode: SumMode,
    point: Slot,
    extent: Slot,
    falloff: Slot,
    out: &[Slot; 2],
    channels: &[ChannelCopy],
) {
    let q = arena.read(point).as_vec3();
    let power = arena.read(falloff).as_f32();
    let tree = particles.kdtree();
    let mut found: Vec<Neighbor> = Vec::new();

    let clear = |arena: &mut Arena| {
        out.iter().for_each(|s| arena.clear(*s));
        channels.iter().for_each(|c| arena.clear(c.out));
    };

    let weights: Vec<f32> = match mode {
        SumMode::Count => {
            let k = arena.read(extent).as_i32();
            if k <= 0 {
                return clear(arena);
            }
            tree.locate_k_nearest(q, k as usize, &mut found);
            let Some(last) = found.last() else {
                return clear(arena);
            };
            arena.write(out[0], &Value::Float(last.distance_sq.sqrt()));
            found
                .iter()
                .map(|n| (1.0 + n.distance_sq.sqrt()).powf(-power))
                .collect()
        }
        SumMode::Radius => {
            let r = arena.read(extent).as_f32();
            if r <= 0.0 {
                return clear(arena);
            }
            tree.locate_within_radius(q, r, &mut found);
            if found.is_empty() {
                return clear(arena);
            }
            arena.write(out[0], &Value::Int(found.len() as i32));
            found
                .iter()
                .map(|n| (1.0 - n.distance_sq.sqrt() / r).max(0.0).powf(power))
                .collect()
        }
    };
    arena.write(out[1], &Value::Float(weights.iter().sum()));

    for ch in channels {
        let mut acc = Vec4::ZERO;
        for (n, w) in found.iter().zip(&weights) {
            let record = particles.records().record(n.index);
            acc += lanes(ch.accessor.read(record)) * *w;
        }
        arena.write(ch.out, &from_lanes(ch.out.data_type, acc));
    }
}

fn lanes(value: Option<Value>) -> Vec4 {
    match value {
        Some(Value::Vec3(v)) => v.extend(0.0),
        Some(Value::Quat(q)) => Vec4::from(q),
        Some(v) => Vec4::new(v.as_f32(), 0.0, 0.0, 0.0),
        None => Vec4::ZERO,
    }
}

fn from_lanes(ty: DataType, v: Vec4) -> Value {
    match (ty.scalar, ty.arity) {
        (ScalarType::Int32, _) => Value::Int(v.x as i32),
        (_, 3) => Value::Vec3(v.truncate()),
        (_, 4) => Value::Quat(Quat::from_vec4(v)),
        _ => Value::Float(v.x),
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::NearestPoint {
                node, point, out, ..
            } => write!(f, "{} = nearest_point({}) ; {}", slots(out), point, node),
            Query::IntersectRay {
                node,
                origin,
                dir,
                out,
                ..
            } => write!(f, "{} = intersect_ray({}, {}) ; {}", slots(out), origin, dir, node),
            Query::InVolume {
                node, point, out, ..
            } => write!(f, "{} = in_volume({}) ; {}", out, point, node),
            Query::NearestParticle {
                node,
                point,
                which,
                out,
                ..
            } => write!(f, "{} = nearest_particle#{}({}) ; {}", slots(out), which, point, node),
            Query::ParticleSum {
                node,
                mode,
                point,
                extent,
                out,
                channels,
                ..
            } => {
                let chans: Vec<Slot> = channels.iter().map(|c| c.out).collect();
                write!(
                    f,
                    "{}, {} = particle_sum_{:?}({}, {}) ; {}",
                    slots(out),
                    slots(&chans),
                    mode,
                    point,
                    extent,
                    node
                )
            }
            Query::ParticleQuery {
                node,
                index,
                channels,
                ..
            } => {
                let chans: Vec<Slot> = channels.iter().map(|c| c.out).collect();
                write!(f, "{} = particle_query({}) ; {}", slots(&chans), index, node)
            }
            Query::FaceQuery {
                node,
                obj,
                face,
                bary,
                ..
            } => write!(f, "face_query({}, {}, {}) ; {}", obj, face, bary, node),
            Query::VertexQuery {
                node, obj, vertex, ..
            } => write!(f, "vertex_query({}, {}) ; {}", obj, vertex, node),
            Query::MeshQuery { node, obj, out, .. } => {
                write!(f, "{} = mesh_query({}) ; {}", slots(out), obj, node)
            }
        }
    }
}
