//! blob-chain-map: an embeddable hash table for byte-blob keys and values
//! of arbitrary length, with a pluggable allocator.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: an in-process associative store whose every buffer comes from
//!   an allocator chosen at creation, with O(count) full traversal.
//! - Layers:
//!   - `MemProcs`: the allocator capability set (allocate, zero-allocate,
//!     reallocate, release), bound once per table.
//!   - `Pair` / `Buckets` / `Arena`: owned payload buffers, the bucket
//!     array and the node slots, all drawn from and returned to the bound
//!     `MemProcs`.
//!   - `ChainedTable`: nodes in the arena, threaded on a
//!     per-bucket collision chain and a global doubly-linked list; owns the
//!     grow/shrink engine and every public operation.
//!   - `SharedTable`: optional reader/writer-locked wrapper for use across
//!     threads.
//!
//! Hashing
//! - Keys of 1, 2, 4 or 8 bytes hash to their own bytes read as an integer;
//!   other lengths use djb2. Each node stores its hash, so resizing never
//!   rehashes key bytes.
//!
//! Sizing
//! - Capacity is a power of two, never below the configured floor.
//! - Grow by `SCALE_FACTOR` when an insert brings the count to
//!   `capacity * 3 / 2`; shrink by the same factor when a delete drops it
//!   below `capacity / 8` and capacity is at or above the shrink floor.
//! - A failed resize allocation is logged and ignored; the insert or delete
//!   that triggered it has already succeeded.
//!
//! Access patterns
//! - `upsert`, `read_copy` (copy out), `read_ref` (borrow tied to `&self`
//!   or to a read guard), `mutate_in_place` (callback with `&mut [u8]`),
//!   `visit_all` / `visit_all_mut` (callback per entry).
//!
//! Notes and non-goals
//! - `ChainedTable` takes no locks; `SharedTable` is the opt-in locking
//!   policy.
//! - No ordering guarantee beyond global-list order (newest first).
//! - No persistence or on-disk format; hashes are process-local.

mod arena;
mod buckets;
mod chained_table;
#[cfg(test)]
mod chained_table_proptest;
mod config;
mod error;
mod hashing;
pub mod mem_procs;
mod pair;
mod shared_table;

// Public surface
pub use chained_table::{ChainedTable, Iter};
pub use config::{TableConfig, DEFAULT_MIN_CAPACITY, MAX_CAPACITY, SCALE_FACTOR};
pub use error::{Result, TableError};
pub use mem_procs::{MemProcs, MemProcsBuilder};
pub use shared_table::SharedTable;
