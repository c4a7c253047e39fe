//! Scan pins.

use crate::entry::KeyEntry;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A scoped pin over the key entries visited by one logical scan.
///
/// Binding an iterator to a ticket pins the target entry; while any pin is
/// held, garbage collection leaves that entry's timeline alone and defers it
/// to a later pass. Dropping the ticket releases every pin, on every exit
/// path.
///
/// One ticket may back several iterators — a multi-dimension read pins each
/// index it touches on the same ticket and releases them together. Scope a
/// ticket to a single logical scan: a ticket held across unrelated
/// long-lived work keeps expired slots alive.
#[derive(Default)]
pub struct Ticket {
    pinned: Mutex<Vec<Arc<KeyEntry>>>,
}

impl Ticket {
    /// Creates an empty ticket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently pinned.
    #[must_use]
    pub fn pinned(&self) -> usize {
        self.pinned.lock().len()
    }

    pub(crate) fn pin(&self, entry: Arc<KeyEntry>) {
        entry.pin();
        self.pinned.lock().push(entry);
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        for entry in self.pinned.get_mut().drain(..) {
            entry.unpin();
        }
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("pinned", &self.pinned())
            .finish()
    }
}
