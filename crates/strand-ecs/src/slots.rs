//! View indirection.
//!
//! Every component pool owns a fixed-capacity backing column per field. A
//! [`SlotStore`] decides which physical slots of those columns are live, and
//! a [`SlotView`] is an ordered list of physical slots through which fields
//! are read and written. Indexing a view with a [`Key`] composes a new list
//! of slots over the same columns; nothing is ever copied.

use std::fmt;
use std::ops::{Range, RangeFull};
use std::sync::Arc;

use fixedbitset::FixedBitSet;

use crate::error::{EcsError, EcsResult};

/// A physical position in a pool's backing columns.
pub type Slot = u32;

/// A Python-style slice: optional bounds, negative values count from the end,
/// and a non-zero step which may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl Slice {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    /// The whole range, in order.
    pub fn full() -> Self {
        Self::new(None, None, 1)
    }

    /// Resolve the slice against a sequence of `len` items.
    pub fn positions(&self, len: usize) -> EcsResult<Vec<usize>> {
        if self.step == 0 {
            return Err(EcsError::ZeroSliceStep);
        }
        let len = len as isize;
        let (lower, upper) = if self.step > 0 { (0, len) } else { (-1, len - 1) };
        let clamp = |bound: isize| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map_or(if self.step > 0 { lower } else { upper }, clamp);
        let stop = self
            .stop
            .map_or(if self.step > 0 { upper } else { lower }, clamp);

        let mut positions = Vec::new();
        let mut position = start;
        while (self.step > 0 && position < stop) || (self.step < 0 && position > stop) {
            positions.push(position as usize);
            position += self.step;
        }
        Ok(positions)
    }
}

/// Selects a subset of a view's positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Slice(Slice),
    /// Positions into the view; may repeat and need not be sorted.
    Indices(Vec<usize>),
    /// One flag per position of the view.
    Mask(Vec<bool>),
}

impl Key {
    /// Resolve to positions in a view of length `len`, in output order.
    pub fn positions(&self, len: usize) -> EcsResult<Vec<usize>> {
        match self {
            Key::Slice(slice) => slice.positions(len),
            Key::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&index| index >= len) {
                    return Err(EcsError::IndexOutOfRange { index, len });
                }
                Ok(indices.clone())
            }
            Key::Mask(mask) => {
                if mask.len() != len {
                    return Err(EcsError::MaskLength {
                        expected: len,
                        actual: mask.len(),
                    });
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(position, &keep)| keep.then_some(position))
                    .collect())
            }
        }
    }

    /// A single key equivalent to applying `self` and then `then` to a view
    /// of length `len`.
    pub fn compose(&self, then: &Key, len: usize) -> EcsResult<Key> {
        let first = self.positions(len)?;
        let second = then.positions(first.len())?;
        Ok(Key::Indices(
            second.into_iter().map(|position| first[position]).collect(),
        ))
    }
}

impl From<Slice> for Key {
    fn from(slice: Slice) -> Self {
        Key::Slice(slice)
    }
}

impl From<Range<usize>> for Key {
    fn from(range: Range<usize>) -> Self {
        Key::Slice(Slice::new(
            Some(range.start as isize),
            Some(range.end as isize),
            1,
        ))
    }
}

impl From<RangeFull> for Key {
    fn from(_: RangeFull) -> Self {
        Key::Slice(Slice::full())
    }
}

impl From<Vec<usize>> for Key {
    fn from(indices: Vec<usize>) -> Self {
        Key::Indices(indices)
    }
}

impl From<Vec<bool>> for Key {
    fn from(mask: Vec<bool>) -> Self {
        Key::Mask(mask)
    }
}

/// An ordered list of physical slots shared by every field viewed through it.
///
/// Cloning a view shares its slot list; indexing creates a new one.
#[derive(Clone)]
pub struct SlotView {
    slots: Arc<[Slot]>,
}

impl SlotView {
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    pub(crate) fn from_vec(slots: Vec<Slot>) -> Self {
        Self {
            slots: slots.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The physical slots, in view order.
    pub fn as_slice(&self) -> &[Slot] {
        &self.slots
    }

    /// Compose a new view: position `i` of the result is position `key[i]` of
    /// this view.
    pub fn index(&self, key: &Key) -> EcsResult<SlotView> {
        let positions = key.positions(self.len())?;
        Ok(self.pick(positions))
    }

    /// Whether both views share one slot list (clones of the same view).
    pub fn same_mapping(&self, other: &SlotView) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    /// Build a view from positions already known to be in range.
    pub(crate) fn pick(&self, positions: impl IntoIterator<Item = usize>) -> SlotView {
        SlotView::from_vec(
            positions
                .into_iter()
                .map(|position| self.slots[position])
                .collect(),
        )
    }
}

impl PartialEq for SlotView {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl Eq for SlotView {}

impl fmt::Debug for SlotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

/// Owns the live logical-to-physical mapping of one pool.
///
/// Freed slots go on a free list and are handed out again, lowest first,
/// before fresh slots are taken. Live slots never move.
#[derive(Debug)]
pub struct SlotStore {
    name: &'static str,
    capacity: usize,
    live: Vec<Slot>,
    free: Vec<Slot>,
    next_fresh: Slot,
}

impl SlotStore {
    /// A store for `name` with room for `capacity` live slots.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            live: Vec::with_capacity(capacity),
            free: Vec::new(),
            next_fresh: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Free room left in the store.
    pub fn remaining(&self) -> usize {
        self.capacity - self.live.len()
    }

    /// A view over every live slot, in spawn order.
    pub fn view(&self) -> SlotView {
        SlotView::from_vec(self.live.clone())
    }

    /// Make `num` more slots live and return a view over exactly those.
    ///
    /// Fails without touching the store if the capacity would be exceeded.
    pub fn spawn(&mut self, num: usize) -> EcsResult<SlotView> {
        if num > self.remaining() {
            return Err(EcsError::CapacityExceeded {
                component: self.name,
                requested: num,
                live: self.live.len(),
                capacity: self.capacity,
            });
        }
        let mut spawned = Vec::with_capacity(num);
        while spawned.len() < num {
            let slot = match self.free.pop() {
                Some(slot) => slot,
                None => {
                    let slot = self.next_fresh;
                    self.next_fresh += 1;
                    slot
                }
            };
            spawned.push(slot);
        }
        self.live.extend_from_slice(&spawned);
        Ok(SlotView::from_vec(spawned))
    }

    /// Remove the given slots from the live mapping and free them for reuse.
    /// Slots that are not live are ignored. Returns how many were removed.
    pub fn despawn(&mut self, slots: &[Slot]) -> usize {
        let mut doomed = FixedBitSet::with_capacity(self.capacity);
        for &slot in slots {
            if (slot as usize) < self.capacity {
                doomed.insert(slot as usize);
            }
        }
        let before = self.live.len();
        let free = &mut self.free;
        self.live.retain(|&slot| {
            let remove = doomed.contains(slot as usize);
            if remove {
                free.push(slot);
            }
            !remove
        });
        // Highest first so `pop` hands out the lowest free slot.
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        before - self.live.len()
    }
}
