//! Creation-time configuration.

use crate::error::{Result, TableError};
use crate::mem_procs::MemProcs;

/// Factor by which capacity grows and shrinks.
pub const SCALE_FACTOR: u32 = 4;
/// Default capacity floor.
pub const DEFAULT_MIN_CAPACITY: u32 = 64;
/// Largest bucket array a table will allocate.
pub const MAX_CAPACITY: u32 = 1 << 30;

/// Settings for a new table. Every field has a default; `initial_capacity`
/// is the only one most callers set.
#[derive(Clone, Debug)]
pub struct TableConfig {
    /// Requested bucket count, rounded up to a power of two and floored at
    /// `min_capacity`. Zero is rejected.
    pub initial_capacity: u32,
    /// Capacity floor; rounded up to a power of two.
    pub min_capacity: u32,
    /// A table shrinks only while its capacity is at or above this floor.
    /// Defaults to `min_capacity * SCALE_FACTOR`.
    pub shrink_floor: Option<u32>,
    /// Allocator set bound for the table's lifetime; the process allocator
    /// when `None`.
    pub procs: Option<MemProcs>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_MIN_CAPACITY,
            min_capacity: DEFAULT_MIN_CAPACITY,
            shrink_floor: None,
            procs: None,
        }
    }
}

impl TableConfig {
    pub fn new(initial_capacity: u32) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    pub fn with_min_capacity(mut self, min_capacity: u32) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    pub fn with_shrink_floor(mut self, shrink_floor: u32) -> Self {
        self.shrink_floor = Some(shrink_floor);
        self
    }

    pub fn with_procs(mut self, procs: MemProcs) -> Self {
        self.procs = Some(procs);
        self
    }

    pub(crate) fn resolve(self) -> Result<Resolved> {
        if self.initial_capacity == 0 {
            return Err(TableError::InvalidArguments("initial capacity must be non-zero"));
        }
        if self.min_capacity == 0 || self.min_capacity > MAX_CAPACITY {
            return Err(TableError::InvalidArguments(
                "capacity floor must be in 1..=MAX_CAPACITY",
            ));
        }
        let min_capacity = self.min_capacity.next_power_of_two();
        let capacity = round_capacity(self.initial_capacity, min_capacity)?;
        let shrink_floor = self
            .shrink_floor
            .unwrap_or_else(|| min_capacity.saturating_mul(SCALE_FACTOR));
        Ok(Resolved {
            capacity,
            min_capacity,
            shrink_floor,
            procs: self.procs.unwrap_or_else(MemProcs::system),
        })
    }
}

/// A validated configuration.
pub(crate) struct Resolved {
    pub(crate) capacity: u32,
    pub(crate) min_capacity: u32,
    pub(crate) shrink_floor: u32,
    pub(crate) procs: MemProcs,
}

/// Round `requested` up to a power of two no smaller than `floor`.
pub(crate) fn round_capacity(requested: u32, floor: u32) -> Result<u32> {
    if requested <= floor {
        return Ok(floor);
    }
    match requested.checked_next_power_of_two() {
        Some(c) if c <= MAX_CAPACITY => Ok(c),
        _ => Err(TableError::InvalidArguments("capacity exceeds MAX_CAPACITY")),
    }
}
