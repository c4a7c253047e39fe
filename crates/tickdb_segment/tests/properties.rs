//! Property tests for the segment storage layer.

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use tickdb_segment::{GcStats, Segment, Ticket};

proptest! {
    #[test]
    fn put_get_roundtrip(
        entries in btree_map(
            (vec(any::<u8>(), 1..8), any::<u64>()),
            vec(any::<u8>(), 0..64),
            1..40,
        )
    ) {
        let segment = Segment::new();
        for ((key, ts), payload) in &entries {
            segment.put(key, *ts, payload);
        }

        prop_assert_eq!(segment.slot_count() as usize, entries.len());
        for ((key, ts), payload) in &entries {
            let block = segment.get(key, *ts).expect("written slot must be readable");
            prop_assert_eq!(block.data(), payload.as_slice());
        }
    }

    #[test]
    fn iterator_descends_regardless_of_insert_order(
        mut timestamps in vec(any::<u64>(), 1..50)
    ) {
        let segment = Segment::new();
        for ts in &timestamps {
            segment.put(b"series", *ts, b"x");
        }

        let ticket = Ticket::new();
        let mut iter = segment.new_iterator(b"series", &ticket);
        iter.seek_to_first();
        let mut seen = Vec::new();
        while iter.valid() {
            seen.push(iter.timestamp().unwrap());
            iter.next();
        }

        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        timestamps.dedup();
        prop_assert_eq!(seen, timestamps);
    }

    #[test]
    fn gc_ttl_partitions_exactly_at_cutoff(
        entries in btree_map(any::<u64>(), vec(any::<u8>(), 1..16), 1..40),
        cutoff in any::<u64>(),
    ) {
        let segment = Segment::new();
        for (ts, payload) in &entries {
            segment.put(b"k", *ts, payload);
        }

        let mut stats = GcStats::new();
        segment.gc_ttl(cutoff, &mut stats);

        let expired = entries.keys().filter(|ts| **ts < cutoff).count() as u64;
        prop_assert_eq!(stats.removed_slots, expired);
        prop_assert_eq!(stats.freed_records, expired);
        for ts in entries.keys() {
            prop_assert_eq!(segment.get(b"k", *ts).is_some(), *ts >= cutoff);
        }

        // A second pass with the same cutoff is a no-op.
        let mut again = GcStats::new();
        segment.gc_ttl(cutoff, &mut again);
        prop_assert_eq!(again.removed_slots, 0);
    }

    #[test]
    fn gc_head_keeps_min_of_keep_and_len(
        timestamps in btree_map(any::<u64>(), Just(()), 1..30),
        keep in 0u64..40,
    ) {
        let segment = Segment::new();
        for ts in timestamps.keys() {
            segment.put(b"k", *ts, b"v");
        }

        let mut stats = GcStats::new();
        segment.gc_head(keep, &mut stats);

        let expected = (timestamps.len() as u64).min(keep);
        prop_assert_eq!(segment.slot_count(), expected);

        // The survivors are the newest `expected` timestamps.
        let ticket = Ticket::new();
        let mut iter = segment.new_iterator(b"k", &ticket);
        iter.seek_to_first();
        let mut survivors = Vec::new();
        while iter.valid() {
            survivors.push(iter.timestamp().unwrap());
            iter.next();
        }
        let newest: Vec<u64> = timestamps.keys().rev().take(expected as usize).copied().collect();
        prop_assert_eq!(survivors, newest);
    }
}
