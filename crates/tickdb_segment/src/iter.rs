//! Timeline cursors.

use crate::block::DataBlock;
use crate::entry::KeyEntry;
use crate::ticket::Ticket;
use std::marker::PhantomData;
use std::sync::Arc;

/// A cursor over one key's timeline, newest slot first.
///
/// Returned by [`Segment::new_iterator`](crate::Segment::new_iterator). The
/// cursor starts positioned before the first slot; call
/// [`seek_to_first`](Self::seek_to_first) or [`seek`](Self::seek) before
/// reading. A cursor opened on an absent key is permanently invalid.
///
/// The cursor cannot outlive the [`Ticket`] it was bound to, and the pin
/// held by that ticket keeps garbage collection away from slots the scan may
/// still visit. Position is re-resolved against the live timeline on every
/// step, so concurrent inserts are tolerated mid-scan.
#[derive(Debug)]
pub struct SegmentIterator<'t> {
    entry: Option<Arc<KeyEntry>>,
    current: Option<(u64, Arc<DataBlock>)>,
    _ticket: PhantomData<&'t Ticket>,
}

impl<'t> SegmentIterator<'t> {
    pub(crate) fn new(entry: Option<Arc<KeyEntry>>) -> Self {
        Self {
            entry,
            current: None,
            _ticket: PhantomData,
        }
    }

    /// Returns `true` while the cursor is positioned on a slot.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Positions the cursor on the newest slot.
    pub fn seek_to_first(&mut self) {
        self.current = self.entry.as_ref().and_then(|e| e.newest());
    }

    /// Positions the cursor on the first slot with timestamp less than or
    /// equal to `ts`.
    pub fn seek(&mut self, ts: u64) {
        self.current = self.entry.as_ref().and_then(|e| e.at_or_older(ts));
    }

    /// Advances to the next (older) slot.
    pub fn next(&mut self) {
        self.current = match (&self.entry, &self.current) {
            (Some(entry), Some((ts, _))) => entry.older_than(*ts),
            _ => None,
        };
    }

    /// Timestamp of the current slot.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        self.current.as_ref().map(|(ts, _)| *ts)
    }

    /// Block stored at the current slot.
    #[must_use]
    pub fn block(&self) -> Option<&Arc<DataBlock>> {
        self.current.as_ref().map(|(_, block)| block)
    }

    /// Payload bytes of the current slot.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, block)| block.data())
    }

    /// Payload size of the current slot in bytes.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.current.as_ref().map(|(_, block)| block.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn entry_with(timestamps: &[u64]) -> Arc<KeyEntry> {
        let entry = Arc::new(KeyEntry::new(Bytes::from_static(b"k")));
        for ts in timestamps {
            entry.put(*ts, DataBlock::new(1, b"v"));
        }
        entry
    }

    #[test]
    fn absent_key_cursor_is_invalid() {
        let mut iter = SegmentIterator::new(None);
        assert!(!iter.valid());
        iter.seek_to_first();
        assert!(!iter.valid());
        iter.seek(100);
        assert!(!iter.valid());
        assert_eq!(iter.timestamp(), None);
        assert_eq!(iter.value(), None);
        assert_eq!(iter.size(), None);
    }

    #[test]
    fn cursor_starts_before_first() {
        let mut iter = SegmentIterator::new(Some(entry_with(&[10])));
        assert!(!iter.valid());
        iter.seek_to_first();
        assert!(iter.valid());
        assert_eq!(iter.timestamp(), Some(10));
    }

    #[test]
    fn walks_descending_and_exhausts() {
        let mut iter = SegmentIterator::new(Some(entry_with(&[50, 300, 100])));
        iter.seek_to_first();

        let mut seen = Vec::new();
        while iter.valid() {
            seen.push(iter.timestamp().unwrap());
            iter.next();
        }
        assert_eq!(seen, vec![300, 100, 50]);
        assert!(!iter.valid());

        // next() past the end stays invalid
        iter.next();
        assert!(!iter.valid());
    }

    #[test]
    fn seek_lands_at_or_below() {
        let mut iter = SegmentIterator::new(Some(entry_with(&[100, 200, 300])));

        iter.seek(250);
        assert_eq!(iter.timestamp(), Some(200));

        iter.seek(300);
        assert_eq!(iter.timestamp(), Some(300));

        iter.seek(99);
        assert!(!iter.valid());
    }
}
