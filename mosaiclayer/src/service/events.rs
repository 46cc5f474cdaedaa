//! Notifications published by the ingestion service.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::compositor::UpdateReport;
use crate::coord::Envelope;

/// Outcome of one frame, broadcast to every subscriber.
#[derive(Debug, Clone)]
pub enum MosaicEvent {
    /// The frame was mosaicked; `envelope` is its projected footprint.
    FrameMosaicked {
        version: u64,
        envelope: Envelope,
        report: UpdateReport,
    },

    /// The update failed and the mosaic version did not change.
    UpdateFailed {
        reason: String,
        /// True when the frame itself was malformed
        invalid_input: bool,
    },
}

/// Frame counters shared by the service and its submitters.
#[derive(Debug, Default)]
pub struct ServiceStats {
    frames_mosaicked: AtomicU64,
    frames_failed: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub frames_mosaicked: u64,
    pub frames_failed: u64,
    /// Frames replaced by a newer one before they were processed
    pub frames_dropped: u64,
}

impl ServiceStats {
    pub(super) fn record_mosaicked(&self) {
        self.frames_mosaicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            frames_mosaicked: self.frames_mosaicked.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}
