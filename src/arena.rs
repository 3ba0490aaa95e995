//! Arena: node slots stored in one block from the table's allocator set.
//!
//! Slots are addressed by `NodeId`, which is the slot index plus one, so
//! `Option<NodeId>` is four bytes and all-zero bytes read as `None`.
//! Vacant slots form a free list threaded through their ids and are reused
//! last-freed first. When the block is full it doubles: a new block is
//! allocated, the initialized slots are moved over and the old block is
//! released. A failed growth leaves the arena as it was.

use crate::error::{Result, TableError};
use crate::mem_procs::MemProcs;
use core::fmt;
use core::mem;
use core::num::NonZeroU32;
use core::ops::{Index, IndexMut};
use core::ptr::{self, NonNull};
use log::trace;

/// Slots in the first block.
const MIN_SLOTS: u32 = 4;

/// Stable handle to an occupied arena slot.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeId(NonZeroU32);

impl NodeId {
    #[inline]
    fn from_index(index: u32) -> Option<Self> {
        NonZeroU32::new(index.wrapping_add(1)).map(NodeId)
    }

    #[inline]
    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

enum Slot<T> {
    Occupied(T),
    Vacant(Option<NodeId>),
}

pub(crate) struct Arena<T> {
    ptr: Option<NonNull<Slot<T>>>,
    // Slots in the block.
    cap: u32,
    // Slots `[0, used)` are initialized.
    used: u32,
    live: usize,
    free: Option<NodeId>,
    procs: MemProcs,
}

// The arena uniquely owns its block and the values in it.
unsafe impl<T: Send> Send for Arena<T> {}
unsafe impl<T: Sync> Sync for Arena<T> {}

impl<T> Arena<T> {
    /// An empty arena; nothing is allocated until the first insert.
    pub(crate) fn new(procs: &MemProcs) -> Self {
        Self {
            ptr: None,
            cap: 0,
            used: 0,
            live: 0,
            free: None,
            procs: procs.clone(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[cfg(test)]
    pub(crate) fn slot_capacity(&self) -> u32 {
        self.cap
    }

    #[inline]
    fn slots(&self) -> &[Slot<T>] {
        match self.ptr {
            Some(p) => unsafe { core::slice::from_raw_parts(p.as_ptr(), self.used as usize) },
            None => &[],
        }
    }

    #[inline]
    fn slots_mut(&mut self) -> &mut [Slot<T>] {
        match self.ptr {
            Some(p) => unsafe { core::slice::from_raw_parts_mut(p.as_ptr(), self.used as usize) },
            None => &mut [],
        }
    }

    /// Store `value` and return its id. When the block is full and cannot
    /// grow, `value` is dropped and the arena is unchanged.
    pub(crate) fn insert(&mut self, value: T) -> Result<NodeId> {
        if let Some(id) = self.free {
            let next = match &self.slots()[id.index()] {
                Slot::Vacant(next) => *next,
                Slot::Occupied(_) => None,
            };
            self.slots_mut()[id.index()] = Slot::Occupied(value);
            self.free = next;
            self.live += 1;
            return Ok(id);
        }

        if self.used == self.cap {
            self.grow()?;
        }
        let id = NodeId::from_index(self.used)
            .ok_or(TableError::oom(mem::size_of::<Slot<T>>()))?;
        let base = self.ptr.ok_or(TableError::oom(mem::size_of::<Slot<T>>()))?;
        unsafe { base.as_ptr().add(self.used as usize).write(Slot::Occupied(value)) };
        self.used += 1;
        self.live += 1;
        Ok(id)
    }

    fn grow(&mut self) -> Result<()> {
        let new_cap = self.cap.saturating_mul(2).max(MIN_SLOTS);
        let slot = mem::size_of::<Slot<T>>();
        if new_cap == self.cap {
            return Err(TableError::oom(slot));
        }
        let bytes = (new_cap as usize)
            .checked_mul(slot)
            .ok_or(TableError::oom(usize::MAX))?;
        let raw = self.procs.allocate(bytes).ok_or(TableError::oom(bytes))?;
        if raw.as_ptr() as usize % mem::align_of::<Slot<T>>() != 0 {
            unsafe { self.procs.release(raw) };
            return Err(TableError::InvalidArguments(
                "allocator returned a misaligned block",
            ));
        }

        let block = raw.cast::<Slot<T>>();
        if let Some(old) = self.ptr {
            unsafe {
                ptr::copy_nonoverlapping(old.as_ptr(), block.as_ptr(), self.used as usize);
                self.procs.release(old.cast::<u8>());
            }
        }
        trace!("node arena grew: {} -> {} slots", self.cap, new_cap);
        self.ptr = Some(block);
        self.cap = new_cap;
        Ok(())
    }

    /// Take the value out of `id`'s slot and put the slot on the free list.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        let free = self.free;
        let slot = self.slots_mut().get_mut(id.index())?;
        if let Slot::Vacant(_) = slot {
            return None;
        }
        let Slot::Occupied(value) = mem::replace(slot, Slot::Vacant(free)) else {
            return None;
        };
        self.free = Some(id);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        match self.slots().get(id.index()) {
            Some(Slot::Occupied(v)) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.slots_mut().get_mut(id.index()) {
            Some(Slot::Occupied(v)) => Some(v),
            _ => None,
        }
    }

    /// Drop every value. The block is kept for reuse.
    pub(crate) fn clear(&mut self) {
        let used = self.used as usize;
        self.used = 0;
        self.live = 0;
        self.free = None;
        if let Some(p) = self.ptr {
            unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(p.as_ptr(), used)) };
        }
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;
    #[inline]
    fn index(&self, id: NodeId) -> &T {
        match self.get(id) {
            Some(v) => v,
            None => panic!("invalid arena id {:?}", id),
        }
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        match self.get_mut(id) {
            Some(v) => v,
            None => panic!("invalid arena id {:?}", id),
        }
    }
}

impl<T> Drop for Arena<T> {
    fn drop(&mut self) {
        self.clear();
        if let Some(p) = self.ptr.take() {
            unsafe { self.procs.release(p.cast::<u8>()) }
        }
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("live", &self.live)
            .field("used", &self.used)
            .field("cap", &self.cap)
            .finish()
    }
}
