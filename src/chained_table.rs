//! ChainedTable: bucket-chained storage with a global traversal list.
//!
//! Nodes live in an `Arena` whose block comes from the bound allocator set.
//! Each node carries two kinds of links, both arena ids rather than
//! pointers:
//! - `chain_next`: the singly-linked collision chain rooted in its bucket;
//! - `prev`/`next`: the doubly-linked global list through all live nodes.
//!
//! New keys are prepended to both. The global list lets iteration, reset
//! and rehashing run in O(count) regardless of how sparse the bucket array
//! is. Resizing splices each node's chain link into a freshly allocated
//! bucket array; nodes themselves never move.

use crate::arena::{Arena, NodeId};
use crate::buckets::Buckets;
use crate::config::{round_capacity, TableConfig, MAX_CAPACITY, SCALE_FACTOR};
use crate::error::{Result, TableError};
use crate::hashing::{bucket_index, hash_key, keys_equal};
use crate::mem_procs::MemProcs;
use crate::pair::{checked_len, Pair};
use core::fmt;
use log::{debug, trace, warn};

#[derive(Debug)]
struct Node {
    hash: u64,
    key: Pair,
    value: Pair,
    chain_next: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Scale {
    Up,
    Down,
}

/// Hash table for byte-blob keys and values.
///
/// Not internally synchronized; wrap in [`SharedTable`](crate::SharedTable)
/// for concurrent use.
pub struct ChainedTable {
    // Field order is drop order: nodes are released before the bucket array.
    nodes: Arena<Node>,
    buckets: Buckets,
    head: Option<NodeId>,
    scale_up: u32,
    scale_down: u32,
    min_capacity: u32,
    shrink_floor: u32,
    procs: MemProcs,
}

impl fmt::Debug for ChainedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("scale_up", &self.scale_up)
            .field("scale_down", &self.scale_down)
            .finish()
    }
}

/// Iterator over live entries in global-list order (most recent first).
pub struct Iter<'a> {
    nodes: &'a Arena<Node>,
    cur: Option<NodeId>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        let node = &nodes[self.cur?];
        self.cur = node.next;
        self.remaining -= 1;
        Some((node.key.as_slice(), node.value.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl ChainedTable {
    /// Create an empty table with the default floor and the process
    /// allocator. `initial_capacity` must be non-zero.
    pub fn new(initial_capacity: u32) -> Result<Self> {
        Self::with_config(TableConfig::new(initial_capacity))
    }

    /// Create an empty table bound to `procs`.
    pub fn with_procs(initial_capacity: u32, procs: MemProcs) -> Result<Self> {
        Self::with_config(TableConfig::new(initial_capacity).with_procs(procs))
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        let resolved = config.resolve()?;
        let buckets = Buckets::new(resolved.capacity, &resolved.procs)?;
        let mut table = Self {
            nodes: Arena::new(&resolved.procs),
            buckets,
            head: None,
            scale_up: 0,
            scale_down: 0,
            min_capacity: resolved.min_capacity,
            shrink_floor: resolved.shrink_floor,
            procs: resolved.procs,
        };
        table.set_thresholds();
        debug!(
            "created table: capacity={} min_capacity={} shrink_floor={}",
            table.capacity(),
            table.min_capacity,
            table.shrink_floor
        );
        Ok(table)
    }

    /// Number of live entries. O(1).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current bucket count; always a power of two.
    pub fn capacity(&self) -> u32 {
        self.buckets.len()
    }

    /// Entry count at which the next insert grows the table.
    pub fn scale_up_threshold(&self) -> u32 {
        self.scale_up
    }

    /// Entry count below which a delete may shrink the table.
    pub fn scale_down_threshold(&self) -> u32 {
        self.scale_down
    }

    pub fn min_capacity(&self) -> u32 {
        self.min_capacity
    }

    /// The allocator set bound at creation.
    pub fn procs(&self) -> &MemProcs {
        &self.procs
    }

    fn set_thresholds(&mut self) {
        let cap = self.capacity() as u64;
        self.scale_up = (cap * 3 / 2) as u32;
        self.scale_down = (cap / 8) as u32;
    }

    fn find(&self, key: &[u8], hash: u64) -> Option<NodeId> {
        let mut cur = self.buckets[bucket_index(hash, self.capacity())];
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if keys_equal(node.key.as_slice(), key) {
                return Some(k);
            }
            cur = node.chain_next;
        }
        None
    }

    fn lookup(&self, key: &[u8]) -> Result<NodeId> {
        checked_len(key, "empty key")?;
        self.find(key, hash_key(key)).ok_or(TableError::KeyNotFound)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.lookup(key).is_ok()
    }

    /// Insert `key -> value`, or replace the value of an existing key.
    ///
    /// Both blobs are copied. Replacing with a value of a different length
    /// reallocates the stored buffer; if that fails the old value stays and
    /// `OutOfMemory` is returned. A new key that cannot be allocated leaves
    /// the table unchanged.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        checked_len(key, "empty key")?;
        checked_len(value, "empty value")?;
        let hash = hash_key(key);
        if let Some(k) = self.find(key, hash) {
            return self.nodes[k].value.assign(value);
        }

        let key = Pair::copy_from(key, &self.procs)?;
        let value = Pair::copy_from(value, &self.procs)?;
        self.link(hash, key, value)?;

        if self.nodes.len() >= self.scale_up as usize {
            self.scale(Scale::Up);
        }
        Ok(())
    }

    /// Store a node and prepend it to its chain and the global list. If the
    /// arena cannot grow, the node's buffers are released and nothing is
    /// linked.
    fn link(&mut self, hash: u64, key: Pair, value: Pair) -> Result<()> {
        let idx = bucket_index(hash, self.capacity());
        let next = self.head;
        let k = self.nodes.insert(Node {
            hash,
            key,
            value,
            chain_next: self.buckets[idx],
            prev: None,
            next,
        })?;
        if let Some(n) = next {
            self.nodes[n].prev = Some(k);
        }
        self.head = Some(k);
        self.buckets[idx] = Some(k);
        trace!("linked node into bucket {}", idx);
        Ok(())
    }

    fn detach(&mut self, prev: Option<NodeId>, next: Option<NodeId>) {
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
    }

    /// Copy up to `dest.len()` bytes of the stored value into `dest` and
    /// return how many were copied.
    pub fn read_copy(&self, key: &[u8], dest: &mut [u8]) -> Result<usize> {
        if dest.is_empty() {
            return Err(TableError::InvalidArguments("empty destination"));
        }
        let value = self.read_ref(key)?;
        let n = value.len().min(dest.len());
        dest[..n].copy_from_slice(&value[..n]);
        Ok(n)
    }

    /// Borrow the stored value. The borrow ends before the next mutation.
    pub fn read_ref(&self, key: &[u8]) -> Result<&[u8]> {
        let k = self.lookup(key)?;
        Ok(self.nodes[k].value.as_slice())
    }

    /// Run `f` with the entry's key and mutable value bytes and return its
    /// result. The value's length is fixed for the call.
    pub fn mutate_in_place<F, R>(&mut self, key: &[u8], f: F) -> Result<R>
    where
        F: FnOnce(&[u8], &mut [u8]) -> R,
    {
        let k = self.lookup(key)?;
        let Node { key, value, .. } = &mut self.nodes[k];
        Ok(f(key.as_slice(), value.as_mut_slice()))
    }

    /// Remove `key` and release its buffers.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        checked_len(key, "empty key")?;
        let idx = bucket_index(hash_key(key), self.capacity());

        let mut before: Option<NodeId> = None;
        let mut cur = self.buckets[idx];
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if keys_equal(node.key.as_slice(), key) {
                break;
            }
            before = cur;
            cur = node.chain_next;
        }
        let k = cur.ok_or(TableError::KeyNotFound)?;

        let node = self
            .nodes
            .remove(k)
            .ok_or(TableError::KeyNotFound)?;
        match before {
            Some(b) => self.nodes[b].chain_next = node.chain_next,
            None => self.buckets[idx] = node.chain_next,
        }
        self.detach(node.prev, node.next);
        drop(node);
        trace!("unlinked node from bucket {}", idx);

        if (self.nodes.len() as u64) < self.scale_down as u64 && self.capacity() >= self.shrink_floor
        {
            self.scale(Scale::Down);
        }
        Ok(())
    }

    /// Rebuild the chains over a bucket array `SCALE_FACTOR` times larger or
    /// smaller. Allocation failure leaves the table at its current size.
    fn scale(&mut self, dir: Scale) {
        let old = self.capacity();
        let target = match dir {
            Scale::Up => old
                .checked_mul(SCALE_FACTOR)
                .filter(|&c| c <= MAX_CAPACITY),
            Scale::Down => Some((old / SCALE_FACTOR).max(self.min_capacity)),
        };
        let Some(new) = target.filter(|&c| c != old) else {
            return;
        };

        let mut buckets = match Buckets::new(new, &self.procs) {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    "resize {:?} from {} to {} buckets skipped: {}",
                    dir, old, new, e
                );
                return;
            }
        };

        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &mut self.nodes[k];
            let idx = bucket_index(node.hash, new);
            node.chain_next = buckets[idx];
            buckets[idx] = Some(k);
            cur = node.next;
        }
        self.buckets = buckets;
        self.set_thresholds();
        debug!(
            "resized {:?}: {} -> {} buckets, {} entries",
            dir,
            old,
            new,
            self.nodes.len()
        );
    }

    /// Iterate entries in global-list order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            nodes: &self.nodes,
            cur: self.head,
            remaining: self.nodes.len(),
        }
    }

    /// Call `f(key, value)` for every live entry.
    pub fn visit_all<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &[u8]),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// Call `f(key, value)` for every live entry with the value writable.
    pub fn visit_all_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&[u8], &mut [u8]),
    {
        let mut cur = self.head;
        while let Some(k) = cur {
            let Node {
                key, value, next, ..
            } = &mut self.nodes[k];
            f(key.as_slice(), value.as_mut_slice());
            cur = *next;
        }
    }

    /// Destroy every entry. A non-zero `new_capacity` also replaces the
    /// bucket array with one of the rounded size; if that allocation fails
    /// the current array is kept and `OutOfMemory` is returned, but the
    /// entries are gone either way.
    ///
    /// A `new_capacity` that rounds above [`MAX_CAPACITY`] is rejected with
    /// `InvalidArguments` before anything is touched: entries, capacity and
    /// thresholds all stay as they were.
    pub fn reset(&mut self, new_capacity: u32) -> Result<()> {
        let target = match new_capacity {
            0 => None,
            n => Some(round_capacity(n, self.min_capacity)?),
        };

        let cap = self.capacity();
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            self.buckets[bucket_index(node.hash, cap)] = None;
            cur = node.next;
        }
        let dropped = self.nodes.len();
        self.nodes.clear();
        self.head = None;

        let mut outcome = Ok(());
        if let Some(new) = target.filter(|&c| c != cap) {
            match Buckets::new(new, &self.procs) {
                Ok(b) => {
                    self.buckets = b;
                    self.set_thresholds();
                }
                Err(e) => {
                    warn!("reset kept {} buckets, resize to {} failed: {}", cap, new, e);
                    outcome = Err(e);
                }
            }
        }
        debug!(
            "reset: dropped {} entries, capacity {}",
            dropped,
            self.capacity()
        );
        outcome
    }

    /// Check every structural invariant; panics on the first violation.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let cap = self.capacity();
        assert!(cap.is_power_of_two(), "capacity {} not a power of two", cap);
        assert!(cap >= self.min_capacity, "capacity below floor");
        assert_eq!(self.scale_up as u64, cap as u64 * 3 / 2);
        assert_eq!(self.scale_down, cap / 8);

        let mut chained = 0usize;
        for (i, head) in self.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(k) = cur {
                let node = &self.nodes[k];
                assert_eq!(node.hash, hash_key(node.key.as_slice()));
                assert_eq!(bucket_index(node.hash, cap), i, "node in wrong bucket");
                chained += 1;
                cur = node.chain_next;
            }
        }

        let mut listed = 0usize;
        let mut prev = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            let node = &self.nodes[k];
            assert_eq!(node.prev, prev, "global list back link broken");
            listed += 1;
            prev = cur;
            cur = node.next;
        }

        assert_eq!(chained, self.len(), "sum of chain lengths != count");
        assert_eq!(listed, self.len(), "global list length != count");
    }
}
