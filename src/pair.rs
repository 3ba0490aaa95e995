//! Pair: an owned, length-tagged byte buffer drawn from the table's
//! allocator set.

use crate::error::{Result, TableError};
use crate::mem_procs::MemProcs;
use core::fmt;
use core::ptr::NonNull;

pub(crate) struct Pair {
    ptr: NonNull<u8>,
    len: u32,
    procs: MemProcs,
}

// Pair uniquely owns its block; the procedures are Send + Sync.
unsafe impl Send for Pair {}
unsafe impl Sync for Pair {}

/// Length check shared by keys and values: non-empty and addressable by a
/// `u32` length tag.
pub(crate) fn checked_len(bytes: &[u8], what: &'static str) -> Result<u32> {
    if bytes.is_empty() {
        return Err(TableError::InvalidArguments(what));
    }
    u32::try_from(bytes.len()).map_err(|_| TableError::InvalidArguments("blob exceeds u32::MAX bytes"))
}

impl Pair {
    /// Duplicate `bytes` into a fresh block. `bytes` must be non-empty.
    pub(crate) fn copy_from(bytes: &[u8], procs: &MemProcs) -> Result<Self> {
        let len = checked_len(bytes, "empty blob")?;
        let ptr = procs
            .allocate(bytes.len())
            .ok_or(TableError::oom(bytes.len()))?;
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        Ok(Self {
            ptr,
            len,
            procs: procs.clone(),
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }

    /// Replace the contents with `bytes`. Equal lengths overwrite in place;
    /// otherwise the block is reallocated. On failure the previous contents
    /// are left intact.
    pub(crate) fn assign(&mut self, bytes: &[u8]) -> Result<()> {
        let len = checked_len(bytes, "empty blob")?;
        if len != self.len {
            let grown = unsafe { self.procs.reallocate(self.ptr, bytes.len()) }
                .ok_or(TableError::oom(bytes.len()))?;
            self.ptr = grown;
            self.len = len;
        }
        self.as_mut_slice().copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for Pair {
    fn drop(&mut self) {
        unsafe { self.procs.release(self.ptr) }
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pair")
            .field("len", &self.len)
            .field("bytes", &self.as_slice())
            .finish()
    }
}
