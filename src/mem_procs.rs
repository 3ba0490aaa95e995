//! Allocator capability set bound to a table at creation.
//!
//! A `MemProcs` bundles four malloc-style procedures: allocate,
//! zero-allocate, reallocate and release. Every buffer the table owns (key
//! and value payloads, the bucket array) is obtained from and returned to
//! the set bound at creation; the set is never swapped afterward.
//!
//! Contract for custom procedures, mirroring `malloc`/`realloc`/`free`:
//! - returned blocks are aligned for any fundamental type (at least 8);
//! - `reallocate` returns `None` on failure and leaves the original block
//!   untouched and valid;
//! - `release` receives only pointers previously returned by the same set.

use crate::error::{Result, TableError};
use core::fmt;
use core::ptr::NonNull;
use std::sync::Arc;

pub type AllocFn = dyn Fn(usize) -> Option<NonNull<u8>> + Send + Sync;
pub type ZeroAllocFn = dyn Fn(usize, usize) -> Option<NonNull<u8>> + Send + Sync;
pub type ReallocFn = dyn Fn(NonNull<u8>, usize) -> Option<NonNull<u8>> + Send + Sync;
pub type ReleaseFn = dyn Fn(NonNull<u8>) + Send + Sync;

struct Procs {
    allocate: Box<AllocFn>,
    zero_allocate: Box<ZeroAllocFn>,
    reallocate: Box<ReallocFn>,
    release: Box<ReleaseFn>,
}

/// Shared handle to a complete allocator capability set. Cloning is one
/// reference-count increment.
#[derive(Clone)]
pub struct MemProcs {
    inner: Arc<Procs>,
}

impl fmt::Debug for MemProcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemProcs")
            .field("set", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

impl Default for MemProcs {
    fn default() -> Self {
        Self::system()
    }
}

impl MemProcs {
    /// The process allocator, wrapped with a size header so that `release`
    /// and `reallocate` need only the pointer.
    pub fn system() -> Self {
        Self {
            inner: Arc::new(Procs {
                allocate: Box::new(system::allocate),
                zero_allocate: Box::new(system::zero_allocate),
                reallocate: Box::new(|p, n| unsafe { system::reallocate(p, n) }),
                release: Box::new(|p| unsafe { system::release(p) }),
            }),
        }
    }

    pub fn builder() -> MemProcsBuilder {
        MemProcsBuilder::default()
    }

    /// True when both handles share one underlying set.
    pub fn same_set(&self, other: &MemProcs) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub(crate) fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (self.inner.allocate)(size)
    }

    #[inline]
    pub(crate) fn zero_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        (self.inner.zero_allocate)(count, size)
    }

    /// Safety: `ptr` must be a live block obtained from this set.
    #[inline]
    pub(crate) unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        (self.inner.reallocate)(ptr, size)
    }

    /// Safety: `ptr` must be a live block obtained from this set; it is
    /// dangling afterwards.
    #[inline]
    pub(crate) unsafe fn release(&self, ptr: NonNull<u8>) {
        (self.inner.release)(ptr)
    }
}

/// Collects the four procedures; `build` fails unless all four are present.
#[derive(Default)]
pub struct MemProcsBuilder {
    allocate: Option<Box<AllocFn>>,
    zero_allocate: Option<Box<ZeroAllocFn>>,
    reallocate: Option<Box<ReallocFn>>,
    release: Option<Box<ReleaseFn>>,
}

impl MemProcsBuilder {
    pub fn allocate<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) -> Option<NonNull<u8>> + Send + Sync + 'static,
    {
        self.allocate = Some(Box::new(f));
        self
    }

    pub fn zero_allocate<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) -> Option<NonNull<u8>> + Send + Sync + 'static,
    {
        self.zero_allocate = Some(Box::new(f));
        self
    }

    pub fn reallocate<F>(mut self, f: F) -> Self
    where
        F: Fn(NonNull<u8>, usize) -> Option<NonNull<u8>> + Send + Sync + 'static,
    {
        self.reallocate = Some(Box::new(f));
        self
    }

    pub fn release<F>(mut self, f: F) -> Self
    where
        F: Fn(NonNull<u8>) + Send + Sync + 'static,
    {
        self.release = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<MemProcs> {
        let MemProcsBuilder {
            allocate,
            zero_allocate,
            reallocate,
            release,
        } = self;
        let procs = Procs {
            allocate: allocate
                .ok_or(TableError::InvalidArguments("allocator set is missing `allocate`"))?,
            zero_allocate: zero_allocate.ok_or(TableError::InvalidArguments(
                "allocator set is missing `zero_allocate`",
            ))?,
            reallocate: reallocate.ok_or(TableError::InvalidArguments(
                "allocator set is missing `reallocate`",
            ))?,
            release: release
                .ok_or(TableError::InvalidArguments("allocator set is missing `release`"))?,
        };
        Ok(MemProcs {
            inner: Arc::new(procs),
        })
    }
}

/// malloc-style entry points over `std::alloc`.
///
/// Each block carries a `HEADER`-byte prefix recording its payload size so
/// `release` and `reallocate` can rebuild the layout from the pointer alone.
pub mod system {
    use core::ptr::NonNull;
    use std::alloc::{self, Layout};

    const HEADER: usize = 16;

    fn layout_for(size: usize) -> Option<Layout> {
        let total = size.checked_add(HEADER)?;
        Layout::from_size_align(total, HEADER).ok()
    }

    /// Safety: `base` points at a freshly allocated block of at least
    /// `HEADER` bytes.
    unsafe fn finish(base: *mut u8, size: usize) -> Option<NonNull<u8>> {
        let base = NonNull::new(base)?;
        base.as_ptr().cast::<usize>().write(size);
        NonNull::new(base.as_ptr().add(HEADER))
    }

    pub fn allocate(size: usize) -> Option<NonNull<u8>> {
        let layout = layout_for(size)?;
        unsafe { finish(alloc::alloc(layout), size) }
    }

    pub fn zero_allocate(count: usize, size: usize) -> Option<NonNull<u8>> {
        let bytes = count.checked_mul(size)?;
        let layout = layout_for(bytes)?;
        unsafe { finish(alloc::alloc_zeroed(layout), bytes) }
    }

    /// # Safety
    ///
    /// `ptr` must come from this module and not have been released.
    pub unsafe fn reallocate(ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        let new_layout = layout_for(size)?;
        let base = ptr.as_ptr().sub(HEADER);
        let old = base.cast::<usize>().read();
        let old_layout = Layout::from_size_align_unchecked(old + HEADER, HEADER);
        let grown = alloc::realloc(base, old_layout, new_layout.size());
        finish(grown, size)
    }

    /// # Safety
    ///
    /// `ptr` must come from this module and not have been released.
    pub unsafe fn release(ptr: NonNull<u8>) {
        let base = ptr.as_ptr().sub(HEADER);
        let size = base.cast::<usize>().read();
        alloc::dealloc(base, Layout::from_size_align_unchecked(size + HEADER, HEADER));
    }
}
