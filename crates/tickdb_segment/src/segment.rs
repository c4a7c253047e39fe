//! The segment: one shard of the time-series store.

use crate::block::DataBlock;
use crate::entry::KeyEntry;
use crate::iter::SegmentIterator;
use crate::stats::{GcStats, SegmentStats};
use crate::ticket::Ticket;
use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One shard of the key/value time-series store.
///
/// A two-level ordered index: keys are compared byte-lexicographically and
/// map to [`KeyEntry`] timelines sorted by descending timestamp. Writers,
/// readers and garbage collection run concurrently; both levels are
/// lock-free ordered maps, and the only lock in the structure guards
/// key-entry creation. Aggregate counters are relaxed atomics, eventually
/// consistent with the live contents while a GC pass is in flight.
///
/// Retention passes ([`gc_ttl`](Self::gc_ttl), [`gc_head`](Self::gc_head))
/// are idempotent and resumable: a pass interrupted between keys leaves the
/// segment consistent, and slots kept alive by a pinned scan are collected
/// by a later pass.
pub struct Segment {
    entries: SkipMap<Bytes, Arc<KeyEntry>>,
    /// Guards key-entry creation only; reads, scans and GC never take it.
    create_lock: Mutex<()>,
    slot_count: AtomicU64,
    byte_size: AtomicU64,
    key_count: AtomicU64,
}

impl Segment {
    /// Creates an empty segment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: SkipMap::new(),
            create_lock: Mutex::new(()),
            slot_count: AtomicU64::new(0),
            byte_size: AtomicU64::new(0),
            key_count: AtomicU64::new(0),
        }
    }

    /// Writes one `(timestamp, payload)` into `key`'s timeline.
    ///
    /// The payload bytes are copied and the block is created with a single
    /// dimension ownership. Writing a timestamp that already exists for the
    /// key overwrites the stored payload; the displaced block's ownership is
    /// released through the usual path.
    pub fn put(&self, key: &[u8], ts: u64, data: &[u8]) {
        self.put_block(key, ts, DataBlock::new(1, data));
    }

    /// Inserts an already-constructed block into `key`'s timeline without
    /// copying.
    ///
    /// This is the multi-dimension sharing path: the block's owner-count
    /// must account for every dimension index that will reference it, this
    /// segment included.
    pub fn put_block(&self, key: &[u8], ts: u64, block: Arc<DataBlock>) {
        let entry = self.find_or_create(key);
        let added = block.len() as u64;
        match entry.put(ts, block) {
            Some(displaced) => {
                self.byte_size.fetch_add(added, Ordering::Relaxed);
                self.byte_size
                    .fetch_sub(displaced.len() as u64, Ordering::Relaxed);
                displaced.release_owner();
            }
            None => {
                self.slot_count.fetch_add(1, Ordering::Relaxed);
                self.byte_size.fetch_add(added, Ordering::Relaxed);
            }
        }
    }

    /// Point lookup for the exact `(key, timestamp)` pair.
    ///
    /// Returns `None` if either the key or the timestamp is absent. Does not
    /// allocate; the returned handle shares the stored payload.
    #[must_use]
    pub fn get(&self, key: &[u8], ts: u64) -> Option<Arc<DataBlock>> {
        self.entries.get(key).and_then(|e| e.value().get(ts))
    }

    /// Removes the slot at exactly `(key, timestamp)`.
    ///
    /// Returns `true` if a slot was removed.
    pub fn delete(&self, key: &[u8], ts: u64) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        match entry.value().remove(ts) {
            Some(block) => {
                self.slot_count.fetch_sub(1, Ordering::Relaxed);
                self.byte_size
                    .fetch_sub(block.len() as u64, Ordering::Relaxed);
                block.release_owner();
                true
            }
            None => false,
        }
    }

    /// Opens a scan cursor over `key`'s timeline, pinned through `ticket`.
    ///
    /// An absent key yields a permanently invalid cursor rather than an
    /// error. On a hit the entry is pinned until the ticket drops, which
    /// keeps GC away from the timeline for the duration of the scan — scope
    /// the ticket to the scan.
    pub fn new_iterator<'t>(&self, key: &[u8], ticket: &'t Ticket) -> SegmentIterator<'t> {
        match self.entries.get(key) {
            Some(e) => {
                let entry = Arc::clone(e.value());
                ticket.pin(Arc::clone(&entry));
                SegmentIterator::new(Some(entry))
            }
            None => SegmentIterator::new(None),
        }
    }

    /// Removes every slot with timestamp strictly older than `cutoff`,
    /// across all keys.
    ///
    /// Entries pinned by a live ticket are skipped wholesale and picked up
    /// by a later pass; the skip is deferral, not failure. Re-running with
    /// the same or an older cutoff removes nothing further.
    pub fn gc_ttl(&self, cutoff: u64, stats: &mut GcStats) {
        let before = *stats;
        for entry in self.entries.iter() {
            let entry = entry.value();
            if entry.is_pinned() {
                stats.skipped_pinned += 1;
                continue;
            }
            entry.gc_expired(cutoff, stats);
        }
        self.apply_gc_delta(&before, stats);
    }

    /// Retains only the newest `keep` slots per key and removes the
    /// remainder, subject to the same pin-skip rule as
    /// [`gc_ttl`](Self::gc_ttl).
    pub fn gc_head(&self, keep: u64, stats: &mut GcStats) {
        let before = *stats;
        for entry in self.entries.iter() {
            let entry = entry.value();
            if entry.is_pinned() {
                stats.skipped_pinned += 1;
                continue;
            }
            entry.gc_keep_head(keep, stats);
        }
        self.apply_gc_delta(&before, stats);
    }

    /// Tears down every key entry, releasing all block ownerships.
    ///
    /// Returns the number of slots removed. All counters read zero
    /// afterwards.
    pub fn release(&self) -> u64 {
        let mut removed = 0;
        while let Some(entry) = self.entries.pop_front() {
            removed += entry.value().release();
        }
        self.slot_count.store(0, Ordering::Relaxed);
        self.byte_size.store(0, Ordering::Relaxed);
        self.key_count.store(0, Ordering::Relaxed);
        removed
    }

    /// Live timeline slots across all keys.
    #[must_use]
    pub fn slot_count(&self) -> u64 {
        self.slot_count.load(Ordering::Relaxed)
    }

    /// Payload bytes reachable through the index.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.byte_size.load(Ordering::Relaxed)
    }

    /// Distinct keys in the segment.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Snapshot of the aggregate counters.
    #[must_use]
    pub fn stats(&self) -> SegmentStats {
        SegmentStats {
            slots: self.slot_count(),
            payload_bytes: self.byte_size(),
            keys: self.key_count(),
        }
    }

    fn find_or_create(&self, key: &[u8]) -> Arc<KeyEntry> {
        if let Some(entry) = self.entries.get(key) {
            return Arc::clone(entry.value());
        }
        let _guard = self.create_lock.lock();
        // Re-check under the lock: another writer may have created the entry
        // between the lock-free probe and acquisition.
        if let Some(entry) = self.entries.get(key) {
            return Arc::clone(entry.value());
        }
        let key = Bytes::copy_from_slice(key);
        let entry = Arc::new(KeyEntry::new(key.clone()));
        self.entries.insert(key, Arc::clone(&entry));
        self.key_count.fetch_add(1, Ordering::Relaxed);
        entry
    }

    fn apply_gc_delta(&self, before: &GcStats, after: &GcStats) {
        self.slot_count
            .fetch_sub(after.removed_slots - before.removed_slots, Ordering::Relaxed);
        self.byte_size
            .fetch_sub(after.removed_bytes - before.removed_bytes, Ordering::Relaxed);
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("keys", &self.key_count())
            .field("slots", &self.slot_count())
            .field("payload_bytes", &self.byte_size())
            .finish_non_exhaustive()
    }
}
