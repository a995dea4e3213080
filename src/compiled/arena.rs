//! Temporary storage: compile-time slot allocation and the per-record arena
//!
//! Every temporary is a `(type, byte offset)` pair handed out by a
//! monotonic allocator. Offsets are never reused inside one compiled pass,
//! so the arena size is simply the end of the last allocation. Each element
//! occupies one 32-bit word (bools included), which keeps every slot word
//! aligned.
//!
//! Author: Moroya Sakamoto

use crate::types::{DataType, Value};
use std::fmt;

/// One typed temporary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Stored type
    pub data_type: DataType,
    /// Byte offset in the arena
    pub offset: usize,
}

impl Slot {
    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.data_type.arena_size()
    }

    /// Slot of one scalar component of this slot
    #[inline]
    pub fn component(&self, index: usize) -> Slot {
        Slot {
            data_type: DataType::new(self.data_type.scalar, 1),
            offset: self.offset + 4 * index,
        }
    }

    /// True if the two slots share any byte
    #[inline]
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.offset < other.offset + other.size() && other.offset < self.offset + self.size()
    }

    #[inline]
    fn word(&self) -> usize {
        self.offset / 4
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.data_type, self.offset)
    }
}

/// Monotonic temporary allocator for one compiled pass
#[derive(Debug, Clone, Default)]
pub struct TempAllocator {
    end: usize,
    log: Vec<Slot>,
}

impl TempAllocator {
    /// Empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for one value of `data_type`
    pub fn allocate(&mut self, data_type: DataType) -> Slot {
        let slot = Slot {
            data_type,
            offset: self.end,
        };
        self.end += slot.size();
        self.log.push(slot);
        slot
    }

    /// Bytes needed by a record arena
    #[inline]
    pub fn size(&self) -> usize {
        self.end
    }

    /// Every slot handed out, in allocation order
    #[inline]
    pub fn allocations(&self) -> &[Slot] {
        &self.log
    }
}

/// Scratch storage for evaluating one record
#[derive(Debug, Clone, PartialEq)]
pub struct Arena {
    words: Vec<u32>,
}

impl Arena {
    /// Zeroed arena of `size` bytes
    pub fn new(size: usize) -> Self {
        Arena {
            words: vec![0; size.div_ceil(4)],
        }
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    /// Value held by a slot
    #[inline]
    pub fn read(&self, slot: Slot) -> Value {
        let w = slot.word();
        let n = slot.data_type.arity as usize;
        self.words
            .get(w..w + n)
            .and_then(|words| Value::from_words(slot.data_type, words))
            .unwrap_or(Value::Int(0))
    }

    /// Store a value into a slot
    ///
    /// The value must already have the slot's type; the compiler guarantees
    /// this for every write it emits.
    #[inline]
    pub fn write(&mut self, slot: Slot, value: &Value) {
        let (words, n) = value.to_words();
        let w = slot.word();
        if let Some(dst) = self.words.get_mut(w..w + n) {
            dst.copy_from_slice(&words[..n]);
        }
    }

    /// Copy the contents of one slot to another of the same type
    #[inline]
    pub fn copy(&mut self, from: Slot, to: Slot) {
        let n = from.data_type.arity as usize;
        let (src, dst) = (from.word(), to.word());
        if src + n <= self.words.len() && dst + n <= self.words.len() {
            self.words.copy_within(src..src + n, dst);
        }
    }

    /// Fill a slot with zero bits
    #[inline]
    pub fn clear(&mut self, slot: Slot) {
        let w = slot.word();
        let n = slot.data_type.arity as usize;
        if let Some(dst) = self.words.get_mut(w..w + n) {
            dst.fill(0);
        }
    }

    /// Raw words, for tests and debugging
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use proptest::prelude::*;

    #[test]
    fn test_component_alias() {
        let mut alloc = TempAllocator::new();
        alloc.allocate(DataType::BOOL);
        let v = alloc.allocate(DataType::VEC3);
        let mut arena = Arena::new(alloc.size());
        arena.write(v, &Value::Vec3(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(arena.read(v.component(1)), Value::Float(2.0));
        assert_eq!(arena.read(v.component(2)), Value::Float(3.0));
    }

    #[test]
    fn test_overlaps() {
        let mut alloc = TempAllocator::new();
        let v = alloc.allocate(DataType::VEC3);
        let f = alloc.allocate(DataType::FLOAT);
        assert!(v.overlaps(&v));
        assert!(v.overlaps(&v.component(2)));
        assert!(v.component(0).overlaps(&v));
        assert!(!v.component(0).overlaps(&v.component(1)));
        assert!(!v.overlaps(&f));
        assert!(!f.overlaps(&v));
    }

    #[test]
    fn test_copy_and_clear() {
        let mut alloc = TempAllocator::new();
        let a = alloc.allocate(DataType::QUAT);
        let b = alloc.allocate(DataType::QUAT);
        let mut arena = Arena::new(alloc.size());
        arena.write(a, &Value::Quat(glam::Quat::from_xyzw(0.0, 0.0, 1.0, 0.0)));
        arena.copy(a, b);
        assert_eq!(arena.read(a), arena.read(b));
        arena.clear(a);
        assert_eq!(arena.read(a), Value::Quat(glam::Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)));
    }

    fn any_type() -> impl Strategy<Value = DataType> {
        prop_oneof![
            Just(DataType::FLOAT),
            Just(DataType::INT),
            Just(DataType::BOOL),
            Just(DataType::VEC3),
            Just(DataType::QUAT),
        ]
    }

    proptest! {
        #[test]
        fn prop_offsets_increase_without_overlap(types in proptest::collection::vec(any_type(), 1..64)) {
            let mut alloc = TempAllocator::new();
            for ty in &types {
                alloc.allocate(*ty);
            }
            let log = alloc.allocations();
            for pair in log.windows(2) {
                prop_assert!(pair[0].offset + pair[0].size() <= pair[1].offset);
                prop_assert!(pair[0].offset < pair[1].offset);
            }
            let last = log[log.len() - 1];
            prop_assert_eq!(alloc.size(), last.offset + last.size());
        }
    }
}
