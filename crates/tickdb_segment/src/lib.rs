//! # TickDB Segment
//!
//! In-memory storage segment for a time-series key/value engine.
//!
//! A [`Segment`] is one shard holding many keys; each key maps to a timeline
//! of `(timestamp, payload)` pairs ordered newest-first. Writers, readers and
//! background garbage collection operate on one segment concurrently:
//!
//! - [`Segment::put`] / [`Segment::get`] for writes and point lookups
//! - [`Segment::new_iterator`] with a [`Ticket`] for ordered scans
//! - [`Segment::gc_ttl`] / [`Segment::gc_head`] for retention passes
//! - [`Collector`] for scheduled background retention
//!
//! Payloads are opaque bytes: the segment copies exactly what it is given and
//! returns the same bytes unmodified. Durability, replication and query
//! planning are external collaborators that call into this crate as their
//! storage primitive.
//!
//! ## Example
//!
//! ```rust
//! use tickdb_segment::{Segment, Ticket};
//!
//! let segment = Segment::new();
//! segment.put(b"sensor-1", 100, b"v1");
//! segment.put(b"sensor-1", 50, b"v2");
//!
//! let ticket = Ticket::new();
//! let mut iter = segment.new_iterator(b"sensor-1", &ticket);
//! iter.seek_to_first();
//! assert_eq!(iter.timestamp(), Some(100));
//! iter.next();
//! assert_eq!(iter.timestamp(), Some(50));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod block;
mod collector;
mod entry;
mod error;
mod iter;
mod segment;
mod stats;
mod ticket;

pub use block::DataBlock;
pub use collector::{Collector, CollectorConfig, RetentionPolicy};
pub use entry::KeyEntry;
pub use error::{SegmentError, SegmentResult};
pub use iter::SegmentIterator;
pub use segment::Segment;
pub use stats::{GcStats, SegmentStats};
pub use ticket::Ticket;
