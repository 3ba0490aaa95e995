//! Bucket array: `capacity` chain heads in a block from the bound allocator.

use crate::error::{Result, TableError};
use crate::mem_procs::MemProcs;
use core::ops::{Index, IndexMut};
use core::ptr::NonNull;
use crate::arena::NodeId;

/// Head of one collision chain.
pub(crate) type Slot = Option<NodeId>;

pub(crate) struct Buckets {
    ptr: NonNull<Slot>,
    len: u32,
    procs: MemProcs,
}

// Buckets uniquely owns its block of `Copy` slots.
unsafe impl Send for Buckets {}
unsafe impl Sync for Buckets {}

impl Buckets {
    /// Zero-allocate `len` empty slots.
    pub(crate) fn new(len: u32, procs: &MemProcs) -> Result<Self> {
        let size = core::mem::size_of::<Slot>();
        let raw = procs
            .zero_allocate(len as usize, size)
            .ok_or(TableError::oom(len as usize * size))?;
        if raw.as_ptr() as usize % core::mem::align_of::<Slot>() != 0 {
            unsafe { procs.release(raw) };
            return Err(TableError::InvalidArguments(
                "allocator returned a misaligned block",
            ));
        }
        // All-zero bytes are `None` for `Option<NodeId>`.
        Ok(Self {
            ptr: raw.cast::<Slot>(),
            len,
            procs: procs.clone(),
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    fn as_slice(&self) -> &[Slot] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }

    #[inline]
    fn as_mut_slice(&mut self) -> &mut [Slot] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len as usize) }
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Slot> {
        self.as_slice().iter()
    }
}

impl Index<usize> for Buckets {
    type Output = Slot;
    #[inline]
    fn index(&self, i: usize) -> &Slot {
        &self.as_slice()[i]
    }
}

impl IndexMut<usize> for Buckets {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut Slot {
        &mut self.as_mut_slice()[i]
    }
}

impl Drop for Buckets {
    fn drop(&mut self) {
        unsafe { self.procs.release(self.ptr.cast::<u8>()) }
    }
}
