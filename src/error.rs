//! Error taxonomy shared by every table operation.

/// Outcome of a failed table operation.
///
/// Every operation reports through its return value; nothing unwinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TableError {
    /// A key, value or destination was empty or oversized, or the table
    /// configuration (capacity, floors, allocator set) is malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// Lookup or delete against a key that is not stored.
    #[error("key not found")]
    KeyNotFound,

    /// The bound allocator could not provide `requested` bytes.
    #[error("out of memory: failed to allocate {requested} bytes")]
    OutOfMemory { requested: usize },
}

impl TableError {
    pub(crate) fn oom(requested: usize) -> Self {
        TableError::OutOfMemory { requested }
    }
}

pub type Result<T, E = TableError> = core::result::Result<T, E>;
