//! Channel maps: named, typed, offset-addressed record layouts
//!
//! A channel map is built by appending channels and then sealed. Sealing
//! freezes the offsets and fixes the stride; a sealed map never changes.
//! Growing a record type means building a new map (see
//! [`ChannelBuffer::add_channel`](super::ChannelBuffer::add_channel)).
//!
//! Author: Moroya Sakamoto

use super::{DataType, ScalarType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by channel layouts and channel conversions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// No channel with this name exists in the map
    #[error("Channel \"{0}\" Not Available")]
    UnknownChannel(String),

    /// A channel with this name was already appended
    #[error("Channel \"{0}\" is already defined")]
    DuplicateChannel(String),

    /// The map is sealed and cannot grow
    #[error("Channel map is sealed")]
    Sealed,

    /// The map must be sealed before records can be laid out
    #[error("Channel map is not sealed")]
    NotSealed,

    /// Arity outside of the supported range
    #[error("Unsupported channel arity {0}")]
    UnsupportedArity(u8),

    /// Source and destination element counts differ
    #[error("Cannot write to channel \"{channel}\" due to mismatched arity ({found} vs {expected})")]
    ArityMismatch {
        /// Destination channel
        channel: String,
        /// Arity of the destination
        expected: u8,
        /// Arity of the value written
        found: u8,
    },

    /// Source primitive cannot be stored in the destination primitive
    #[error("Cannot write {from} to channel \"{channel}\" of type {to}: incompatible types")]
    IncompatibleTypes {
        /// Destination channel
        channel: String,
        /// Type of the value written
        from: DataType,
        /// Type of the destination
        to: DataType,
    },
}

/// One named field of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name, e.g. `Position`
    pub name: String,
    /// Stored element type and arity
    pub data_type: DataType,
    /// Byte offset inside the record
    pub offset: usize,
}

/// Offset and type of a channel, detached from its map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAccessor {
    /// Byte offset inside the record
    pub offset: usize,
    /// Stored type
    pub data_type: DataType,
}

impl ChannelAccessor {
    /// Number of elements
    #[inline]
    pub fn arity(&self) -> u8 {
        self.data_type.arity
    }

    /// Stored primitive
    #[inline]
    pub fn scalar(&self) -> ScalarType {
        self.data_type.scalar
    }

    /// Byte range of this channel inside a record
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.data_type.size()
    }
}

/// Ordered list of channels with a frozen byte layout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelMap {
    channels: Vec<Channel>,
    end: usize,
    stride: usize,
    sealed: bool,
}

impl ChannelMap {
    /// Empty, unsealed map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and seal a map from `(name, type)` pairs with 4-byte alignment
    pub fn from_channels<'a, I>(channels: I) -> Result<Self, ChannelError>
    where
        I: IntoIterator<Item = (&'a str, DataType)>,
    {
        let mut map = ChannelMap::new();
        for (name, ty) in channels {
            map.append_channel(name, ty.arity, ty.scalar)?;
        }
        map.seal(4, false)?;
        Ok(map)
    }

    /// Append a channel at the next naturally aligned offset
    ///
    /// Returns the index of the new channel.
    pub fn append_channel(
        &mut self,
        name: &str,
        arity: u8,
        scalar: ScalarType,
    ) -> Result<usize, ChannelError> {
        if self.sealed {
            return Err(ChannelError::Sealed);
        }
        if arity == 0 || arity > 4 {
            return Err(ChannelError::UnsupportedArity(arity));
        }
        if self.has_channel(name) {
            return Err(ChannelError::DuplicateChannel(name.to_string()));
        }

        let data_type = DataType::new(scalar, arity);
        let offset = align_up(self.end, scalar.size());
        self.end = offset + data_type.size();
        self.channels.push(Channel {
            name: name.to_string(),
            data_type,
            offset,
        });
        Ok(self.channels.len() - 1)
    }

    /// Freeze the layout
    ///
    /// With `packed` the channels are laid out back to back with no padding.
    /// The stride is the end of the last channel rounded up to `alignment`.
    pub fn seal(&mut self, alignment: usize, packed: bool) -> Result<(), ChannelError> {
        if self.sealed {
            return Err(ChannelError::Sealed);
        }
        if packed {
            let mut end = 0;
            for ch in &mut self.channels {
                ch.offset = end;
                end += ch.data_type.size();
            }
            self.end = end;
        }
        self.stride = align_up(self.end, alignment.max(1));
        self.sealed = true;
        Ok(())
    }

    /// True once [`seal`](Self::seal) has been called
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Record size in bytes (0 until sealed)
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of channels
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if no channels were appended
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// True if a channel with this name exists
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Channel by position
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Iterate over channels in layout order
    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.channels.iter()
    }

    /// Offset, arity and type of a channel
    pub fn get_accessor(&self, name: &str) -> Result<ChannelAccessor, ChannelError> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| ChannelAccessor {
                offset: c.offset,
                data_type: c.data_type,
            })
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Copy of this map with one more channel, sealed with the same stride rules
    pub fn with_channel(&self, name: &str, ty: DataType) -> Result<ChannelMap, ChannelError> {
        let mut map = ChannelMap::new();
        for ch in &self.channels {
            map.append_channel(&ch.name, ch.data_type.arity, ch.data_type.scalar)?;
        }
        map.append_channel(name, ty.arity, ty.scalar)?;
        map.seal(4, false)?;
        Ok(map)
    }
}

#[inline]
fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}
