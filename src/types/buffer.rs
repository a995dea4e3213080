//! Contiguous record storage laid out by a sealed channel map
//!
//! Author: Moroya Sakamoto

use super::channel_map::{ChannelError, ChannelMap};
use super::convert::check_assignable;
use super::{DataType, Value};

/// A block of records sharing one sealed [`ChannelMap`]
///
/// Records are stored back to back, `stride` bytes apart. This is the data
/// the particle and mesh drivers iterate over.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    map: ChannelMap,
    data: Vec<u8>,
    len: usize,
}

impl ChannelBuffer {
    /// Create an empty buffer; the map must be sealed
    pub fn new(map: ChannelMap) -> Result<Self, ChannelError> {
        Self::with_len(map, 0)
    }

    /// Create a buffer holding `len` zeroed records
    pub fn with_len(map: ChannelMap, len: usize) -> Result<Self, ChannelError> {
        if !map.is_sealed() {
            return Err(ChannelError::NotSealed);
        }
        let data = vec![0u8; map.stride() * len];
        Ok(ChannelBuffer { map, data, len })
    }

    /// Layout of every record
    #[inline]
    pub fn map(&self) -> &ChannelMap {
        &self.map
    }

    /// Record size in bytes
    #[inline]
    pub fn stride(&self) -> usize {
        self.map.stride()
    }

    /// Number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no records
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a zeroed record and return its index
    pub fn push_zeroed(&mut self) -> usize {
        self.data.resize(self.data.len() + self.stride(), 0);
        self.len += 1;
        self.len - 1
    }

    /// Bytes of record `index`
    #[inline]
    pub fn record(&self, index: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[index * stride..(index + 1) * stride]
    }

    /// Mutable bytes of record `index`
    #[inline]
    pub fn record_mut(&mut self, index: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.data[index * stride..(index + 1) * stride]
    }

    /// All record bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// All record bytes, mutable
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read a channel of one record as a canonical value
    pub fn get(&self, index: usize, channel: &str) -> Result<Value, ChannelError> {
        let acc = self.map.get_accessor(channel)?;
        acc.read(self.record(index)).ok_or(ChannelError::UnsupportedArity(acc.arity()))
    }

    /// Write a canonical value into a channel of one record
    pub fn set(&mut self, index: usize, channel: &str, value: &Value) -> Result<(), ChannelError> {
        let acc = self.map.get_accessor(channel)?;
        check_assignable(channel, value.data_type(), acc.data_type)?;
        acc.write(self.record_mut(index), value);
        Ok(())
    }

    /// Grow every record by one zero-initialised channel
    ///
    /// The buffer is re-laid under a new sealed map; existing channel bytes
    /// are copied to their new offsets.
    pub fn add_channel(&mut self, name: &str, ty: DataType) -> Result<(), ChannelError> {
        let map = self.map.with_channel(name, ty)?;
        let mut data = vec![0u8; map.stride() * self.len];

        for ch in self.map.iter() {
            let dst = map.get_accessor(&ch.name)?;
            let size = ch.data_type.size();
            for i in 0..self.len {
                let src = i * self.map.stride() + ch.offset;
                let out = i * map.stride() + dst.offset;
                data[out..out + size].copy_from_slice(&self.data[src..src + size]);
            }
        }

        self.map = map;
        self.data = data;
        Ok(())
    }
}
