//! SharedTable: a `ChainedTable` behind one reader/writer lock.
//!
//! Reads (`read_copy`, `read_ref`, `len`, `visit_all`) share the lock;
//! mutations (`upsert`, `delete`, `mutate_in_place`, `visit_all_mut`,
//! `reset`) hold it exclusively, and any resize they trigger runs inside
//! that exclusive section. Acquisition blocks; there are no timeouts.
//!
//! Callbacks run with the lock held. A callback that blocks, or that calls
//! back into the same `SharedTable`, deadlocks it.

use crate::chained_table::ChainedTable;
use crate::config::TableConfig;
use crate::error::{Result, TableError};
use crate::pair::checked_len;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

#[derive(Debug)]
pub struct SharedTable {
    inner: RwLock<ChainedTable>,
}

impl From<ChainedTable> for SharedTable {
    fn from(table: ChainedTable) -> Self {
        Self {
            inner: RwLock::new(table),
        }
    }
}

impl SharedTable {
    pub fn new(initial_capacity: u32) -> Result<Self> {
        ChainedTable::new(initial_capacity).map(Self::from)
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        ChainedTable::with_config(config).map(Self::from)
    }

    pub fn into_inner(self) -> ChainedTable {
        self.inner.into_inner()
    }

    pub fn upsert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.write().upsert(key, value)
    }

    pub fn read_copy(&self, key: &[u8], dest: &mut [u8]) -> Result<usize> {
        self.inner.read().read_copy(key, dest)
    }

    /// Borrow the stored value under a shared lock. Writers wait until the
    /// returned guard is dropped.
    pub fn read_ref(&self, key: &[u8]) -> Result<MappedRwLockReadGuard<'_, [u8]>> {
        checked_len(key, "empty key")?;
        RwLockReadGuard::try_map(self.inner.read(), |t| t.read_ref(key).ok())
            .map_err(|_| TableError::KeyNotFound)
    }

    pub fn mutate_in_place<F, R>(&self, key: &[u8], f: F) -> Result<R>
    where
        F: FnOnce(&[u8], &mut [u8]) -> R,
    {
        self.inner.write().mutate_in_place(key, f)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.write().delete(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.inner.read().capacity()
    }

    pub fn visit_all<F>(&self, f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.inner.read().visit_all(f)
    }

    pub fn visit_all_mut<F>(&self, f: F)
    where
        F: FnMut(&[u8], &mut [u8]),
    {
        self.inner.write().visit_all_mut(f)
    }

    pub fn reset(&self, new_capacity: u32) -> Result<()> {
        self.inner.write().reset(new_capacity)
    }
}
