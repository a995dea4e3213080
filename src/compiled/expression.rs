//! Compiled expressions and their per-record execution
//!
//! Author: Moroya Sakamoto

use super::arena::{Arena, Slot};
use super::eval::RecordRow;
use super::loops::Foreach;
use super::queries::Query;
use crate::graph::NodeId;
use crate::ops::Handler;
use crate::types::{ChannelAccessor, Value};
use std::fmt;

/// Most inputs an operator binding may declare
pub(crate) const MAX_ARGS: usize = 8;

/// One executable step
#[derive(Debug, Clone)]
pub enum Expr {
    /// Call an operator binding
    Operator {
        /// Source node
        node: NodeId,
        /// Type name, for listings
        name: String,
        /// Resolved body
        handler: Handler,
        /// Comparison tolerance (0 unless `useTolerance` is set)
        tolerance: f32,
        /// Argument slots
        inputs: Vec<Slot>,
        /// Result slot
        out: Slot,
    },
    /// Pick one of several same-typed slots by a clamped index
    Mux {
        /// Source node
        node: NodeId,
        /// Candidate slots
        inputs: Vec<Slot>,
        /// Int index slot
        selector: Slot,
        /// Result slot
        out: Slot,
    },
    /// Copy one slot to another
    Copy {
        /// Source slot
        from: Slot,
        /// Destination slot
        to: Slot,
    },
    /// Read a channel of the current record
    ReadChannel {
        /// Source node
        node: NodeId,
        /// Channel name
        channel: String,
        /// Channel location in the record
        accessor: ChannelAccessor,
        /// Result slot (canonical type)
        out: Slot,
    },
    /// Current record index
    ReadIndex {
        /// Source node
        node: NodeId,
        /// Int result slot
        out: Slot,
    },
    /// Write a slot into a channel of the current record
    WriteChannel {
        /// Output node
        node: NodeId,
        /// Channel name
        channel: String,
        /// Channel location in the record
        accessor: ChannelAccessor,
        /// Value slot
        input: Slot,
    },
    /// Geometry or particle query
    Query(Box<Query>),
    /// Loop container
    Foreach(Box<Foreach>),
}

impl Expr {
    /// Execute against one record
    #[inline]
    pub fn apply(&self, arena: &mut Arena, row: &mut RecordRow<'_>) {
        match self {
            Expr::Operator {
                handler,
                tolerance,
                inputs,
                out,
                ..
            } => {
                let mut args = [Value::Int(0); MAX_ARGS];
                for (arg, slot) in args.iter_mut().zip(inputs) {
                    *arg = arena.read(*slot);
                }
                let result = handler.call(&args[..inputs.len()], *tolerance);
                arena.write(*out, &result);
            }
            Expr::Mux {
                inputs,
                selector,
                out,
                ..
            } => {
                let last = inputs.len().saturating_sub(1) as i32;
                let i = arena.read(*selector).as_i32().clamp(0, last) as usize;
                if let Some(from) = inputs.get(i) {
                    arena.copy(*from, *out);
                }
            }
            Expr::Copy { from, to } => arena.copy(*from, *to),
            Expr::ReadChannel { accessor, out, .. } => match accessor.read(row.read_bytes()) {
                Some(v) => arena.write(*out, &v),
                None => arena.clear(*out),
            },
            Expr::ReadIndex { out, .. } => {
                arena.write(*out, &Value::Int(row.index() as i32));
            }
            Expr::WriteChannel {
                accessor, input, ..
            } => {
                let value = arena.read(*input);
                accessor.write(row.write_bytes(), &value);
            }
            Expr::Query(q) => q.apply(arena),
            Expr::Foreach(f) => f.apply(arena, row),
        }
    }

    /// Node this expression was compiled from
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Expr::Operator { node, .. }
            | Expr::Mux { node, .. }
            | Expr::ReadChannel { node, .. }
            | Expr::ReadIndex { node, .. }
            | Expr::WriteChannel { node, .. } => Some(*node),
            Expr::Query(q) => Some(q.node()),
            Expr::Foreach(f) => Some(f.node),
            Expr::Copy { .. } => None,
        }
    }

    pub(crate) fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Expr::Operator {
                node,
                name,
                inputs,
                out,
                ..
            } => writeln!(f, "{}{} = {}({}) ; {}", pad, out, name, slots(inputs), node),
            Expr::Mux {
                node,
                inputs,
                selector,
                out,
            } => writeln!(f, "{}{} = mux[{}]({}) ; {}", pad, out, selector, slots(inputs), node),
            Expr::Copy { from, to } => writeln!(f, "{}{} = copy {}", pad, to, from),
            Expr::ReadChannel {
                node, channel, out, ..
            } => writeln!(f, "{}{} = read \"{}\" ; {}", pad, out, channel, node),
            Expr::ReadIndex { node, out } => writeln!(f, "{}{} = index ; {}", pad, out, node),
            Expr::WriteChannel {
                node,
                channel,
                input,
                ..
            } => writeln!(f, "{}write \"{}\" = {} ; {}", pad, channel, input, node),
            Expr::Query(q) => writeln!(f, "{}{}", pad, q),
            Expr::Foreach(l) => l.fmt_indented(f, depth),
        }
    }
}

pub(crate) fn slots(list: &[Slot]) -> String {
    list.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
