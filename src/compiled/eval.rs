//! Single-record evaluation
//!
//! Author: Moroya Sakamoto

use super::arena::Arena;
use super::CompiledGraph;
use crate::graph::NodeId;
use crate::types::Value;

/// The record being evaluated
///
/// In place, channel reads see earlier writes of the same pass. Buffered,
/// reads come from a pre-pass snapshot and writes go to a staging copy.
#[derive(Debug)]
pub enum RecordRow<'a> {
    /// Read and write the same bytes
    InPlace {
        /// Record index
        index: usize,
        /// Record bytes
        record: &'a mut [u8],
    },
    /// Read a snapshot, write a staging record
    Buffered {
        /// Record index
        index: usize,
        /// Pre-pass record bytes
        read: &'a [u8],
        /// Staging record bytes
        write: &'a mut [u8],
    },
}

impl RecordRow<'_> {
    /// Record index
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            RecordRow::InPlace { index, .. } | RecordRow::Buffered { index, .. } => *index,
        }
    }

    /// Bytes channel reads see
    #[inline]
    pub fn read_bytes(&self) -> &[u8] {
        match self {
            RecordRow::InPlace { record, .. } => record,
            RecordRow::Buffered { read, .. } => read,
        }
    }

    /// Bytes channel writes go to
    #[inline]
    pub fn write_bytes(&mut self) -> &mut [u8] {
        match self {
            RecordRow::InPlace { record, .. } => record,
            RecordRow::Buffered { write, .. } => write,
        }
    }
}

/// Output values of every compiled node after a debug evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeValues {
    values: Vec<(NodeId, Vec<Value>)>,
}

impl NodeValues {
    /// Values of one node's outputs
    pub fn get(&self, node: NodeId) -> Option<&[Value]> {
        self.values
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, v)| v.as_slice())
    }

    /// Every node in compilation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[Value])> {
        self.values.iter().map(|(id, v)| (*id, v.as_slice()))
    }

    /// Number of nodes reported
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl CompiledGraph {
    /// Run every expression for one record
    ///
    /// `arena` must come from [`new_arena`](Self::new_arena) of this graph;
    /// it can be reused across records.
    #[inline]
    pub fn eval_row(&self, arena: &mut Arena, row: &mut RecordRow<'_>) {
        for expr in &self.exprs {
            expr.apply(arena, row);
        }
    }

    /// Evaluate one record in place
    pub fn eval_record(&self, index: usize, record: &mut [u8]) {
        let mut arena = self.new_arena();
        self.eval_row(&mut arena, &mut RecordRow::InPlace { index, record });
    }

    /// Evaluate one record and report every compiled node's outputs
    ///
    /// The record itself is not modified. Nodes inside loop bodies report
    /// the values of the last iteration.
    pub fn debug_eval(&self, index: usize, record: &[u8]) -> NodeValues {
        let mut scratch = record.to_vec();
        let mut arena = self.new_arena();
        self.eval_row(
            &mut arena,
            &mut RecordRow::InPlace {
                index,
                record: &mut scratch,
            },
        );
        NodeValues {
            values: self
                .node_slots
                .iter()
                .map(|(id, slots)| (*id, slots.iter().map(|s| arena.read(*s)).collect()))
                .collect(),
        }
    }
}
