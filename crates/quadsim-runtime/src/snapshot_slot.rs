//! Published frames and the latest-frame slot
//!
//! The slot is a single-value container with overwrite semantics: each
//! publication replaces the previous one, so readers always see the most
//! recent state and nothing accumulates when nobody reads.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use quadsim_core::simulation::{Snapshot, StepReport};

/// What the simulation thread publishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Steps executed since the thread started
    pub step_count: u64,
    /// Deep copy of the simulator state; `session_reset` is latched across
    /// the steps since the previous frame
    pub snapshot: Snapshot,
    /// Detail of the most recent step, `None` before the first step
    pub last_step: Option<StepReport>,
}

impl Frame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct SnapshotSlot {
    latest: Mutex<Option<Arc<Frame>>>,
    /// Number of publications so far
    version: AtomicU64,
    /// Frames the bounded feed could not accept
    feed_dropped: AtomicUsize,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            version: AtomicU64::new(0),
            feed_dropped: AtomicUsize::new(0),
        }
    }

    /// Replace the stored frame
    pub fn publish(&self, frame: Arc<Frame>) {
        let mut guard = self.latest.lock();
        *guard = Some(frame);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Most recent frame, if any was published
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.lock().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn record_feed_drop(&self) {
        self.feed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feed_dropped(&self) -> usize {
        self.feed_dropped.load(Ordering::Relaxed)
    }
}

impl Default for SnapshotSlot {
    fn default() -> Self {
        Self::new()
    }
}
