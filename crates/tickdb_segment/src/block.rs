//! Shared storage payloads.

use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// An immutable stored payload, possibly referenced by several dimension
/// indices.
///
/// The payload bytes are copied out of the caller's buffer at construction
/// and never mutated afterwards. The memory itself is owned by the
/// surrounding [`Arc`], so deallocation happens exactly once, when the last
/// reference goes away, no matter how many readers still hold the block.
///
/// Separately from the `Arc` count, a block tracks how many *dimension
/// indices* still hold it. Every path that detaches the block from an index
/// (a GC pass, a key teardown, a point delete) releases exactly one
/// ownership, and the path that drops the count to zero reports the record
/// as freed in its accounting. A multi-dimension row inserted into four
/// indices is therefore counted as one freed record, by whichever index
/// releases it last.
#[derive(Debug)]
pub struct DataBlock {
    data: Bytes,
    owners: AtomicU32,
}

impl DataBlock {
    /// Creates a block holding a copy of `data`, owned by `owner_count`
    /// dimension indices.
    ///
    /// `owner_count` must match the number of indices the block will be
    /// inserted into; the single-index write path uses `1`.
    #[must_use]
    pub fn new(owner_count: u32, data: &[u8]) -> Arc<Self> {
        debug_assert!(owner_count > 0, "a block must have at least one owner");
        Arc::new(Self {
            data: Bytes::copy_from_slice(data),
            owners: AtomicU32::new(owner_count),
        })
    }

    /// Returns the stored payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of dimension indices still holding this block.
    #[must_use]
    pub fn remaining_owners(&self) -> u32 {
        self.owners.load(Ordering::Acquire)
    }

    /// Drops one dimension-index ownership.
    ///
    /// Returns `true` iff this release was the last one. The decrement is a
    /// single atomic operation, so exactly one of any number of concurrent
    /// releases observes the count reach zero. Releasing more ownerships
    /// than the block was constructed with is a contract violation.
    pub(crate) fn release_owner(&self) -> bool {
        let prev = self.owners.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "dimension ownership released below zero");
        prev == 1
    }
}
