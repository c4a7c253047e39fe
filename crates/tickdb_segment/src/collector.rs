//! Background retention collection.
//!
//! A [`Collector`] drives [`Segment::gc_ttl`] / [`Segment::gc_head`] from a
//! dedicated thread on a fixed interval, so retention keeps up with writers
//! without any caller involvement. Passes skipped because of pinned scans
//! are simply retried on the next tick.

use crate::error::{SegmentError, SegmentResult};
use crate::segment::Segment;
use crate::stats::GcStats;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Retention policy applied by a [`Collector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Remove slots older than the window. Timestamps are interpreted as
    /// milliseconds since the Unix epoch; the cutoff for each pass is
    /// `now - window`.
    Ttl(Duration),
    /// Keep only the newest N slots per key.
    Head(u64),
}

/// Configuration for a [`Collector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Time between collection passes.
    pub interval: Duration,
    /// Retention policy applied on each pass.
    pub policy: RetentionPolicy,
}

impl CollectorConfig {
    /// Creates a configuration with the given policy and a one-minute
    /// interval.
    #[must_use]
    pub const fn new(policy: RetentionPolicy) -> Self {
        Self {
            interval: Duration::from_secs(60),
            policy,
        }
    }

    /// Sets the time between collection passes.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn validate(&self) -> SegmentResult<()> {
        if self.interval.is_zero() {
            return Err(SegmentError::invalid_config(
                "collector interval must be nonzero",
            ));
        }
        if self.policy == RetentionPolicy::Head(0) {
            return Err(SegmentError::invalid_config(
                "head retention must keep at least one slot",
            ));
        }
        Ok(())
    }
}

/// A background thread applying a retention policy to one segment.
///
/// Spawned with [`Collector::spawn`]; stopped by [`Collector::shutdown`] or
/// by dropping the handle. Each pass logs its accounting through `tracing`.
#[derive(Debug)]
pub struct Collector {
    handle: Option<JoinHandle<()>>,
    shutdown: Sender<()>,
}

impl Collector {
    /// Spawns the collection thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation or the thread
    /// cannot be spawned.
    pub fn spawn(config: CollectorConfig, segment: Arc<Segment>) -> SegmentResult<Self> {
        config.validate()?;
        let (shutdown, signal) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("tickdb-gc".into())
            .spawn(move || run(config, &segment, &signal))?;
        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Stops the collection thread and waits for it to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(config: CollectorConfig, segment: &Segment, signal: &Receiver<()>) {
    info!(
        interval_ms = config.interval.as_millis() as u64,
        policy = ?config.policy,
        "collector started"
    );
    loop {
        match signal.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let mut stats = GcStats::new();
        match config.policy {
            RetentionPolicy::Ttl(window) => {
                let cutoff = unix_millis().saturating_sub(window.as_millis() as u64);
                segment.gc_ttl(cutoff, &mut stats);
            }
            RetentionPolicy::Head(keep) => segment.gc_head(keep, &mut stats),
        }
        debug!(
            removed_slots = stats.removed_slots,
            freed_records = stats.freed_records,
            freed_bytes = stats.freed_bytes,
            skipped_pinned = stats.skipped_pinned,
            "collection pass finished"
        );
    }
    info!("collector stopped");
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
