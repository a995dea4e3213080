//! Loop containers compiled to a single foreach expression
//!
//! A foreach owns two expression lists: the condition list computes the
//! sink's `Continue` flag and runs first on every iteration; the body list
//! computes the accumulator updates. Per-iteration values (iteration
//! index, neighbour identity, edge flags) live in named slots the
//! expression writes before each iteration.
//!
//! Author: Moroya Sakamoto

use super::arena::{Arena, Slot};
use super::eval::RecordRow;
use super::expression::Expr;
use crate::geometry::Geometry;
use crate::graph::NodeId;
use crate::particles::{Neighbor, ParticleSet};
use crate::types::Value;
use std::fmt;
use std::sync::Arc;

/// One value threaded through the iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    /// Value before the first iteration
    pub initial: Slot,
    /// Current value, read by the body and exposed as the loop output
    pub live: Slot,
    /// Value computed by the body, copied into `live` after each iteration
    pub update: Slot,
}

/// Particle selection for a particle search loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Float radius slot
    Radius(Slot),
    /// Int neighbour count slot
    Count(Slot),
}

/// Sequence a loop walks
#[derive(Debug, Clone)]
pub enum LoopSource {
    /// Iteration indices only
    Counted,
    /// Particles near a point, nearest first
    Particles {
        /// Particle collaborator
        particles: Arc<ParticleSet>,
        /// Vec3 lookup point
        point: Slot,
        /// Radius or count
        mode: SearchMode,
    },
    /// Vertices sharing an edge with a vertex, in index order
    Vertices {
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Int mesh index
        obj: Slot,
        /// Int vertex index
        vertex: Slot,
        /// Skip hidden edges
        visible_only: bool,
    },
    /// Faces using a vertex, in index order
    Faces {
        /// Geometry collaborator
        geometry: Arc<dyn Geometry>,
        /// Int mesh index
        obj: Slot,
        /// Int vertex index
        vertex: Slot,
    },
}

/// Slots written before each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationVars {
    /// Int iteration index
    pub iteration: Slot,
    /// Int neighbour particle, vertex or face
    pub neighbor: Option<Slot>,
    /// Bool edge visibility
    pub visible: Option<Slot>,
    /// Bool edge boundary flag
    pub boundary: Option<Slot>,
}

/// Compiled loop container
#[derive(Debug, Clone)]
pub struct Foreach {
    /// Loop node
    pub node: NodeId,
    /// Sequence walked
    pub source: LoopSource,
    /// Per-iteration slots
    pub vars: IterationVars,
    /// Threaded values
    pub accumulators: Vec<Accumulator>,
    /// Bool slot checked before each body run
    pub condition: Slot,
    /// Expressions computing the condition
    pub condition_exprs: Vec<Expr>,
    /// Expressions computing the updates
    pub body: Vec<Expr>,
    /// Hard iteration bound
    pub max_iterations: usize,
}

/// One step of a loop sequence
#[derive(Clone, Copy)]
struct Step {
    neighbor: i32,
    visible: bool,
    boundary: bool,
}

impl Foreach {
    pub(crate) fn apply(&self, arena: &mut Arena, row: &mut RecordRow<'_>) {
        for acc in &self.accumulators {
            arena.copy(acc.initial, acc.live);
        }

        let steps = self.steps(arena);
        let limit = match &steps {
            Some(s) => s.len().min(self.max_iterations),
            None => self.max_iterations,
        };

        for i in 0..limit {
            arena.write(self.vars.iteration, &Value::Int(i as i32));
            if let Some(step) = steps.as_ref().and_then(|s| s.get(i)) {
                self.write_step(arena, *step);
            }

            for expr in &self.condition_exprs {
                expr.apply(arena, row);
            }
            if !arena.read(self.condition).as_bool() {
                break;
            }

            for expr in &self.body {
                expr.apply(arena, row);
            }
            for acc in &self.accumulators {
                if acc.update != acc.live {
                    arena.copy(acc.update, acc.live);
                }
            }
        }
    }

    /// The sequence to walk, or `None` for a counted loop
    fn steps(&self, arena: &Arena) -> Option<Vec<Step>> {
        match &self.source {
            LoopSource::Counted => None,
            LoopSource::Particles {
                particles,
                point,
                mode,
            } => {
                let q = arena.read(*point).as_vec3();
                let tree = particles.kdtree();
                let mut found: Vec<Neighbor> = Vec::new();
                match mode {
                    SearchMode::Radius(r) => {
                        tree.locate_within_radius(q, arena.read(*r).as_f32(), &mut found)
                    }
                    SearchMode::Count(k) => {
                        let k = arena.read(*k).as_i32().max(0) as usize;
                        tree.locate_k_nearest(q, k, &mut found)
                    }
                }
                Some(
                    found
                        .iter()
                        .map(|n| Step {
                            neighbor: n.index as i32,
                            visible: true,
                            boundary: false,
                        })
                        .collect(),
                )
            }
            LoopSource::Vertices {
                geometry,
                obj,
                vertex,
                visible_only,
            } => {
                let obj = usize::try_from(arena.read(*obj).as_i32()).ok();
                let vertex = usize::try_from(arena.read(*vertex).as_i32()).ok();
                let edges = match obj.zip(vertex) {
                    Some((o, v)) => geometry.vertex_neighbors(o, v),
                    None => &[][..],
                };
                Some(
                    edges
                        .iter()
                        .filter(|e| e.visible || !visible_only)
                        .map(|e| Step {
                            neighbor: e.vertex as i32,
                            visible: e.visible,
                            boundary: e.boundary,
                        })
                        .collect(),
                )
            }
            LoopSource::Faces {
                geometry,
                obj,
                vertex,
            } => {
                let obj = usize::try_from(arena.read(*obj).as_i32()).ok();
                let vertex = usize::try_from(arena.read(*vertex).as_i32()).ok();
                let faces = match obj.zip(vertex) {
                    Some((o, v)) => geometry.vertex_faces(o, v),
                    None => &[][..],
                };
                Some(
                    faces
                        .iter()
                        .map(|&f| Step {
                            neighbor: f as i32,
                            visible: true,
                            boundary: false,
                        })
                        .collect(),
                )
            }
        }
    }

    #[inline]
    fn write_step(&self, arena: &mut Arena, step: Step) {
        if let Some(s) = self.vars.neighbor {
            arena.write(s, &Value::Int(step.neighbor));
        }
        if let Some(s) = self.vars.visible {
            arena.write(s, &Value::Bool(step.visible));
        }
        if let Some(s) = self.vars.boundary {
            arena.write(s, &Value::Bool(step.boundary));
        }
    }

    pub(crate) fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let kind = match self.source {
            LoopSource::Counted => "counted",
            LoopSource::Particles { .. } => "particles",
            LoopSource::Vertices { .. } => "vertices",
            LoopSource::Faces { .. } => "faces",
        };
        writeln!(
            f,
            "{}foreach {} (max {}, iteration {}) ; {}",
            pad, kind, self.max_iterations, self.vars.iteration, self.node
        )?;
        for acc in &self.accumulators {
            writeln!(f, "{}  acc {} <- {} | {}", pad, acc.live, acc.initial, acc.update)?;
        }
        writeln!(f, "{}  while {}:", pad, self.condition)?;
        for expr in &self.condition_exprs {
            expr.fmt_indented(f, depth + 2)?;
        }
        writeln!(f, "{}  do:", pad)?;
        for expr in &self.body {
            expr.fmt_indented(f, depth + 2)?;
        }
        Ok(())
    }
}
