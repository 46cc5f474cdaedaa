//! Producer side of the ingestion service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use super::events::ServiceStats;
use super::{IngestMode, ServiceError};
use crate::frame::Frame;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The frame is waiting to be mosaicked.
    Accepted,
    /// The frame took the place of an older frame that had not started yet;
    /// the older frame is dropped.
    ReplacedPending,
}

/// Single-frame mailbox used in [`IngestMode::LatestOnly`].
#[derive(Default)]
pub(super) struct LatestSlot {
    frame: Mutex<Option<Frame>>,
    notify: Notify,
    submitters: AtomicUsize,
    closed: AtomicBool,
}

impl LatestSlot {
    /// Waits for the next frame; `None` once every submitter is gone and the
    /// slot is empty.
    pub(super) async fn next(&self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.frame.lock().take() {
                return Some(frame);
            }
            if self.submitters.load(Ordering::Acquire) == 0 {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Receiving end of the latest-only mailbox; closes the slot when dropped.
pub(super) struct LatestReceiver(pub(super) Arc<LatestSlot>);

impl Drop for LatestReceiver {
    fn drop(&mut self) {
        self.0.close();
    }
}

struct LatestSender(Arc<LatestSlot>);

impl LatestSender {
    fn new(slot: Arc<LatestSlot>) -> Self {
        slot.submitters.fetch_add(1, Ordering::AcqRel);
        Self(slot)
    }
}

impl Clone for LatestSender {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.0))
    }
}

impl Drop for LatestSender {
    fn drop(&mut self) {
        if self.0.submitters.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.notify.notify_one();
        }
    }
}

#[derive(Clone)]
enum Channel {
    Queued(mpsc::Sender<Frame>),
    Latest(LatestSender),
}

/// Cloneable handle for handing frames to a running [`MosaicService`].
///
/// [`MosaicService`]: super::MosaicService
#[derive(Clone)]
pub struct FrameSubmitter {
    channel: Channel,
    stats: Arc<ServiceStats>,
}

impl FrameSubmitter {
    pub(super) fn queued(sender: mpsc::Sender<Frame>, stats: Arc<ServiceStats>) -> Self {
        Self {
            channel: Channel::Queued(sender),
            stats,
        }
    }

    pub(super) fn latest(slot: Arc<LatestSlot>, stats: Arc<ServiceStats>) -> Self {
        Self {
            channel: Channel::Latest(LatestSender::new(slot)),
            stats,
        }
    }

    pub fn mode(&self) -> IngestMode {
        match self.channel {
            Channel::Queued(_) => IngestMode::Queued,
            Channel::Latest(_) => IngestMode::LatestOnly,
        }
    }

    /// Submits a frame, waiting for queue space in queued mode.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Closed` if the service has stopped.
    pub async fn submit(&self, frame: Frame) -> Result<SubmitOutcome, ServiceError> {
        match &self.channel {
            Channel::Queued(sender) => {
                sender.send(frame).await.map_err(|_| ServiceError::Closed)?;
                Ok(SubmitOutcome::Accepted)
            }
            Channel::Latest(sender) => self.replace_latest(sender, frame),
        }
    }

    /// Submits a frame without waiting.
    ///
    /// # Errors
    ///
    /// - `ServiceError::QueueFull` if the queue has no room (queued mode only)
    /// - `ServiceError::Closed` if the service has stopped
    pub fn try_submit(&self, frame: Frame) -> Result<SubmitOutcome, ServiceError> {
        match &self.channel {
            Channel::Queued(sender) => match sender.try_send(frame) {
                Ok(()) => Ok(SubmitOutcome::Accepted),
                Err(mpsc::error::TrySendError::Full(_)) => Err(ServiceError::QueueFull),
                Err(mpsc::error::TrySendError::Closed(_)) => Err(ServiceError::Closed),
            },
            Channel::Latest(sender) => self.replace_latest(sender, frame),
        }
    }

    fn replace_latest(
        &self,
        sender: &LatestSender,
        frame: Frame,
    ) -> Result<SubmitOutcome, ServiceError> {
        let slot = &sender.0;
        if slot.closed.load(Ordering::Acquire) {
            return Err(ServiceError::Closed);
        }
        let previous = slot.frame.lock().replace(frame);
        slot.notify.notify_one();
        if previous.is_some() {
            self.stats.record_dropped();
            Ok(SubmitOutcome::ReplacedPending)
        } else {
            Ok(SubmitOutcome::Accepted)
        }
    }
}
