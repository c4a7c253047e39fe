//! Per-key timelines.

use crate::block::DataBlock;
use crate::stats::GcStats;
use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Timeline key ordered newest-first.
///
/// Iteration must see descending timestamps, so the map key reverses the
/// natural ordering of `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RevTs(pub(crate) u64);

impl Ord for RevTs {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for RevTs {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// The ordered history of one key.
///
/// Owns a copy of the key bytes, the `(timestamp, block)` timeline sorted
/// newest-first, and the pin count consulted by garbage collection. An entry
/// with a nonzero pin count has a live scan over it; GC leaves its timeline
/// alone and retries on a later pass.
///
/// Timestamps are unique within one entry: writing an existing timestamp
/// replaces the stored block.
pub struct KeyEntry {
    key: Bytes,
    timeline: SkipMap<RevTs, Arc<DataBlock>>,
    pins: AtomicU64,
}

impl KeyEntry {
    pub(crate) fn new(key: Bytes) -> Self {
        Self {
            key,
            timeline: SkipMap::new(),
            pins: AtomicU64::new(0),
        }
    }

    /// Returns the key this entry indexes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Number of timeline slots currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    /// Returns `true` if the timeline holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Number of live tickets pinning this entry.
    #[must_use]
    pub fn pin_count(&self) -> u64 {
        self.pins.load(Ordering::Relaxed)
    }

    pub(crate) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unpin(&self) {
        let prev = self.pins.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "pin count released below zero");
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Inserts a slot, returning the block it displaced if the timestamp was
    /// already present.
    pub(crate) fn put(&self, ts: u64, block: Arc<DataBlock>) -> Option<Arc<DataBlock>> {
        let displaced = self.timeline.remove(&RevTs(ts)).map(|e| e.value().clone());
        self.timeline.insert(RevTs(ts), block);
        displaced
    }

    /// Exact-timestamp lookup.
    pub(crate) fn get(&self, ts: u64) -> Option<Arc<DataBlock>> {
        self.timeline.get(&RevTs(ts)).map(|e| e.value().clone())
    }

    /// Removes the slot at exactly `ts`, returning its block.
    pub(crate) fn remove(&self, ts: u64) -> Option<Arc<DataBlock>> {
        self.timeline.remove(&RevTs(ts)).map(|e| e.value().clone())
    }

    /// Newest slot in the timeline.
    pub(crate) fn newest(&self) -> Option<(u64, Arc<DataBlock>)> {
        self.timeline
            .front()
            .map(|e| (e.key().0, e.value().clone()))
    }

    /// First slot with timestamp less than or equal to `ts`.
    pub(crate) fn at_or_older(&self, ts: u64) -> Option<(u64, Arc<DataBlock>)> {
        self.timeline
            .lower_bound(Bound::Included(&RevTs(ts)))
            .map(|e| (e.key().0, e.value().clone()))
    }

    /// First slot with timestamp strictly less than `ts`.
    pub(crate) fn older_than(&self, ts: u64) -> Option<(u64, Arc<DataBlock>)> {
        self.timeline
            .lower_bound(Bound::Excluded(&RevTs(ts)))
            .map(|e| (e.key().0, e.value().clone()))
    }

    /// Removes every slot strictly older than `cutoff`.
    ///
    /// The timeline is sorted newest-first, so the expired slots form a
    /// suffix; the range scan starts at the first expired slot and never
    /// visits a live one.
    pub(crate) fn gc_expired(&self, cutoff: u64, stats: &mut GcStats) {
        let expired: (Bound<RevTs>, Bound<RevTs>) = (Bound::Excluded(RevTs(cutoff)), Bound::Unbounded);
        for slot in self.timeline.range(expired) {
            let block = slot.value().clone();
            if slot.remove() {
                stats.record_removed(&block);
            }
        }
    }

    /// Keeps the newest `keep` slots and removes the remainder.
    pub(crate) fn gc_keep_head(&self, keep: u64, stats: &mut GcStats) {
        let mut kept = 0u64;
        for slot in self.timeline.iter() {
            if kept < keep {
                kept += 1;
                continue;
            }
            let block = slot.value().clone();
            if slot.remove() {
                stats.record_removed(&block);
            }
        }
    }

    /// Tears the timeline down, releasing every block ownership.
    ///
    /// Returns the number of slots removed. Pins are not consulted: this is
    /// the shutdown path, called once no scan can still be issued.
    pub(crate) fn release(&self) -> u64 {
        let mut removed = 0;
        while let Some(slot) = self.timeline.pop_front() {
            slot.value().release_owner();
            removed += 1;
        }
        removed
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("key", &self.key)
            .field("slots", &self.len())
            .field("pins", &self.pin_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(timestamps: &[u64]) -> KeyEntry {
        let entry = KeyEntry::new(Bytes::from_static(b"k"));
        for ts in timestamps {
            entry.put(*ts, DataBlock::new(1, b"v"));
        }
        entry
    }

    fn timestamps(entry: &KeyEntry) -> Vec<u64> {
        let mut out = Vec::new();
        let mut cursor = entry.newest();
        while let Some((ts, _)) = cursor {
            out.push(ts);
            cursor = entry.older_than(ts);
        }
        out
    }

    #[test]
    fn rev_ts_orders_descending() {
        assert!(RevTs(100) < RevTs(50));
        assert!(RevTs(50) > RevTs(100));
        assert_eq!(RevTs(7), RevTs(7));
    }

    #[test]
    fn timeline_is_newest_first() {
        let entry = entry_with(&[50, 300, 100]);
        assert_eq!(timestamps(&entry), vec![300, 100, 50]);
    }

    #[test]
    fn put_same_timestamp_displaces() {
        let entry = KeyEntry::new(Bytes::from_static(b"k"));
        assert!(entry.put(10, DataBlock::new(1, b"old")).is_none());
        let displaced = entry.put(10, DataBlock::new(1, b"new")).unwrap();
        assert_eq!(displaced.data(), b"old");
        assert_eq!(entry.len(), 1);
        assert_eq!(entry.get(10).unwrap().data(), b"new");
    }

    #[test]
    fn seek_helpers() {
        let entry = entry_with(&[100, 200, 300]);
        assert_eq!(entry.newest().unwrap().0, 300);
        assert_eq!(entry.at_or_older(250).unwrap().0, 200);
        assert_eq!(entry.at_or_older(200).unwrap().0, 200);
        assert_eq!(entry.older_than(200).unwrap().0, 100);
        assert!(entry.at_or_older(99).is_none());
    }

    #[test]
    fn gc_expired_keeps_cutoff_slot() {
        let entry = entry_with(&[100, 75, 50]);
        let mut stats = GcStats::new();
        entry.gc_expired(75, &mut stats);

        assert_eq!(stats.removed_slots, 1);
        assert_eq!(timestamps(&entry), vec![100, 75]);

        // Re-running with the same cutoff removes nothing further.
        let mut again = GcStats::new();
        entry.gc_expired(75, &mut again);
        assert_eq!(again.removed_slots, 0);
    }

    #[test]
    fn gc_keep_head_retains_newest() {
        let entry = entry_with(&[300, 200, 100]);
        let mut stats = GcStats::new();
        entry.gc_keep_head(2, &mut stats);

        assert_eq!(stats.removed_slots, 1);
        assert_eq!(timestamps(&entry), vec![300, 200]);
    }

    #[test]
    fn gc_keep_head_larger_than_timeline() {
        let entry = entry_with(&[300, 200]);
        let mut stats = GcStats::new();
        entry.gc_keep_head(5, &mut stats);
        assert_eq!(stats.removed_slots, 0);
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn release_counts_all_slots() {
        let entry = entry_with(&[1, 2, 3, 4]);
        assert_eq!(entry.release(), 4);
        assert!(entry.is_empty());
    }

    #[test]
    fn pin_bookkeeping() {
        let entry = KeyEntry::new(Bytes::from_static(b"k"));
        assert!(!entry.is_pinned());
        entry.pin();
        entry.pin();
        assert_eq!(entry.pin_count(), 2);
        entry.unpin();
        assert!(entry.is_pinned());
        entry.unpin();
        assert!(!entry.is_pinned());
    }
}
