//! Key hashing, bucket indexing and key equality.
//!
//! Keys whose length is a native word width (1, 2, 4 or 8 bytes) hash to
//! their own bytes read as a native-endian unsigned integer; equal bytes
//! therefore always give equal hashes and fixed-width keys skip hashing.
//! Every other length uses the djb2 running hash (seed 5381, `h * 33 + b`).
//! The scheme is fixed for the life of the process; no hash crosses a
//! process boundary.

const DJB2_SEED: u64 = 5381;

#[inline]
fn word(key: &[u8]) -> Option<u64> {
    Some(match key.len() {
        1 => key[0] as u64,
        2 => u16::from_ne_bytes([key[0], key[1]]) as u64,
        4 => u32::from_ne_bytes(key.try_into().ok()?) as u64,
        8 => u64::from_ne_bytes(key.try_into().ok()?),
        _ => return None,
    })
}

#[inline]
fn djb2(key: &[u8]) -> u64 {
    key.iter().fold(DJB2_SEED, |h, &b| {
        h.wrapping_mul(33).wrapping_add(b as u64)
    })
}

/// Hash of a key's bytes.
#[inline]
pub(crate) fn hash_key(key: &[u8]) -> u64 {
    word(key).unwrap_or_else(|| djb2(key))
}

/// Bucket for `hash` in a table of `capacity` slots (a power of two).
#[inline]
pub(crate) fn bucket_index(hash: u64, capacity: u32) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash & (capacity as u64 - 1)) as usize
}

/// Key equality: lengths first, then word compare for 1/2/4/8-byte keys,
/// bytewise otherwise.
#[inline]
pub(crate) fn keys_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    match (word(a), word(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
