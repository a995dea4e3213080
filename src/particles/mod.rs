//! Particle collaborator: a record buffer with a lazily built k-d tree
//!
//! Author: Moroya Sakamoto

mod kdtree;

pub use kdtree::{KdTree, Neighbor};

use crate::types::{ChannelBuffer, ChannelError, ChannelMap, DataType, Value};
use glam::Vec3;
use std::sync::OnceLock;

/// Particles whose records always carry a Vec3 `Position` channel
#[derive(Debug)]
pub struct ParticleSet {
    records: ChannelBuffer,
    tree: OnceLock<KdTree>,
}

impl Clone for ParticleSet {
    fn clone(&self) -> Self {
        ParticleSet {
            records: self.records.clone(),
            tree: OnceLock::new(),
        }
    }
}

impl ParticleSet {
    /// Wrap a record buffer
    pub fn new(records: ChannelBuffer) -> Result<Self, ChannelError> {
        let acc = records.map().get_accessor("Position")?;
        if acc.data_type.canonical() != DataType::VEC3 {
            return Err(ChannelError::ArityMismatch {
                channel: "Position".into(),
                expected: 3,
                found: acc.arity(),
            });
        }
        Ok(ParticleSet {
            records,
            tree: OnceLock::new(),
        })
    }

    /// Particles with the given positions and extra zeroed channels
    pub fn from_positions(positions: &[Vec3], channels: &[(&str, DataType)]) -> Result<Self, ChannelError> {
        let mut map = ChannelMap::new();
        map.append_channel("Position", 3, DataType::VEC3.scalar)?;
        for (name, ty) in channels {
            map.append_channel(name, ty.arity, ty.scalar)?;
        }
        map.seal(4, false)?;
        let mut records = ChannelBuffer::with_len(map, positions.len())?;
        for (i, p) in positions.iter().enumerate() {
            records.set(i, "Position", &Value::Vec3(*p))?;
        }
        Self::new(records)
    }

    /// Particle records
    #[inline]
    pub fn records(&self) -> &ChannelBuffer {
        &self.records
    }

    /// Particle records, mutable; the k-d tree is rebuilt on next query
    pub fn records_mut(&mut self) -> &mut ChannelBuffer {
        self.tree = OnceLock::new();
        &mut self.records
    }

    /// Give back the record buffer
    pub fn into_records(self) -> ChannelBuffer {
        self.records
    }

    /// Record layout
    #[inline]
    pub fn map(&self) -> &ChannelMap {
        self.records.map()
    }

    /// Number of particles
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no particles
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of one particle
    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.get(index, "Position").map(|v| v.as_vec3())
    }

    /// A channel of one particle
    pub fn get(&self, index: usize, channel: &str) -> Option<Value> {
        if index >= self.records.len() {
            return None;
        }
        self.records.get(index, channel).ok()
    }

    /// True if the k-d tree is currently built
    pub fn has_kdtree(&self) -> bool {
        self.tree.get().is_some()
    }

    /// Build (if needed) and return the k-d tree over positions
    pub fn kdtree(&self) -> &KdTree {
        self.tree.get_or_init(|| {
            let points = (0..self.records.len())
                .map(|i| self.position(i).unwrap_or(Vec3::ZERO))
                .collect();
            log::debug!("built k-d tree over {} particles", self.records.len());
            KdTree::build(points)
        })
    }
}
