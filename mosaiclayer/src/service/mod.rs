//! Frame ingestion service.
//!
//! [`MosaicService`] is a long-running task that owns the write side of one
//! [`Mosaic`]. Producers hand it frames through a [`FrameSubmitter`]; each
//! frame is mosaicked on tokio's blocking pool, one at a time, and the outcome
//! is broadcast as a [`MosaicEvent`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MosaicService                         │
//! │                                                              │
//! │  FrameSubmitter ──► ┌──────────────┐                         │
//! │   (Queued)          │ bounded mpsc │──┐                      │
//! │                     └──────────────┘  │   ┌───────────────┐  │
//! │                                       ├──►│ spawn_blocking│  │
//! │  FrameSubmitter ──► ┌──────────────┐  │   │ update_mosaic │  │
//! │   (LatestOnly)      │ 1-frame slot │──┘   └───────┬───────┘  │
//! │                     └──────────────┘              ▼          │
//! │                                          broadcast MosaicEvent│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! In `LatestOnly` mode a frame that has not started yet is replaced by a
//! newer one, so a slow mosaic never falls behind a live feed. `Queued` mode
//! keeps every frame and applies back-pressure when the queue is full.
//!
//! # Example
//!
//! ```ignore
//! let (service, submitter) = MosaicService::new(mosaic, ServiceConfig::default());
//! let mut events = service.subscribe();
//! let shutdown = CancellationToken::new();
//! tokio::spawn(service.run(shutdown.clone()));
//!
//! submitter.submit(frame).await?;
//! let event = events.recv().await?;
//! ```

mod events;
mod submitter;

pub use events::{MosaicEvent, ServiceStats, ServiceStatsSnapshot};
pub use submitter::{FrameSubmitter, SubmitOutcome};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::IngestSettings;
use crate::frame::Frame;
use crate::mosaic::Mosaic;
use submitter::{LatestReceiver, LatestSlot};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// How submitted frames wait for the mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Every frame is mosaicked in submission order.
    #[default]
    Queued,
    /// Only the most recent unprocessed frame is kept.
    LatestOnly,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestMode::Queued => write!(f, "queued"),
            IngestMode::LatestOnly => write!(f, "latest"),
        }
    }
}

/// Errors returned to frame producers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Mosaic service is not running")]
    Closed,

    #[error("Mosaic service queue is full")]
    QueueFull,
}

/// Configuration for the ingestion service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub mode: IngestMode,
    /// Frames buffered in queued mode
    pub queue_capacity: usize,
    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::Queued,
            queue_capacity: crate::config::DEFAULT_QUEUE_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&IngestSettings> for ServiceConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            mode: settings.mode,
            queue_capacity: settings.queue_capacity,
            ..Self::default()
        }
    }
}

enum Inbox {
    Queued(mpsc::Receiver<Frame>),
    Latest(LatestReceiver),
}

impl Inbox {
    async fn next(&mut self) -> Option<Frame> {
        match self {
            Inbox::Queued(receiver) => receiver.recv().await,
            Inbox::Latest(receiver) => receiver.0.next().await,
        }
    }
}

/// The ingestion service.
///
/// Serializes all updates to its mosaic; readers keep using
/// [`Mosaic::tiles`] concurrently.
pub struct MosaicService {
    mosaic: Arc<Mosaic>,
    mode: IngestMode,
    inbox: Inbox,
    events: broadcast::Sender<MosaicEvent>,
    stats: Arc<ServiceStats>,
}

impl MosaicService {
    /// Creates a new service with its submission channel.
    ///
    /// Returns the service and a submitter that can be cloned for producers.
    ///
    /// # Arguments
    ///
    /// * `mosaic` - Mosaic the service writes to
    /// * `config` - Ingestion mode and buffer sizes
    pub fn new(mosaic: Arc<Mosaic>, config: ServiceConfig) -> (Self, FrameSubmitter) {
        let stats = Arc::new(ServiceStats::default());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let (inbox, submitter) = match config.mode {
            IngestMode::Queued => {
                let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
                (
                    Inbox::Queued(rx),
                    FrameSubmitter::queued(tx, Arc::clone(&stats)),
                )
            }
            IngestMode::LatestOnly => {
                let slot = Arc::new(LatestSlot::default());
                let submitter = FrameSubmitter::latest(Arc::clone(&slot), Arc::clone(&stats));
                (Inbox::Latest(LatestReceiver(slot)), submitter)
            }
        };

        let service = Self {
            mosaic,
            mode: config.mode,
            inbox,
            events,
            stats,
        };
        (service, submitter)
    }

    /// Subscribes to update events.
    pub fn subscribe(&self) -> broadcast::Receiver<MosaicEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> Arc<ServiceStats> {
        Arc::clone(&self.stats)
    }

    pub fn mosaic(&self) -> &Arc<Mosaic> {
        &self.mosaic
    }

    /// Runs the service until shutdown is signalled or every submitter is
    /// dropped.
    ///
    /// An update already running when shutdown is signalled completes first.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(mode = %self.mode, "Mosaic service starting");

        loop {
            let frame = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Mosaic service shutting down");
                    break;
                }

                frame = self.inbox.next() => match frame {
                    Some(frame) => frame,
                    None => {
                        debug!("All frame submitters dropped");
                        break;
                    }
                },
            };
            self.process(frame).await;
        }

        let stats = self.stats.snapshot();
        info!(
            mosaicked = stats.frames_mosaicked,
            failed = stats.frames_failed,
            dropped = stats.frames_dropped,
            "Mosaic service stopped"
        );
    }

    async fn process(&self, frame: Frame) {
        let start = Instant::now();
        let mosaic = Arc::clone(&self.mosaic);
        let result = tokio::task::spawn_blocking(move || mosaic.update_mosaic(&frame)).await;

        let event = match result {
            Ok(Ok(report)) => {
                self.stats.record_mosaicked();
                debug!(
                    version = report.version,
                    duration_ms = start.elapsed().as_millis(),
                    "Frame processed"
                );
                MosaicEvent::FrameMosaicked {
                    version: report.version,
                    envelope: report.envelope,
                    report,
                }
            }
            Ok(Err(e)) => {
                self.stats.record_failed();
                warn!(error = %e, "Frame rejected");
                MosaicEvent::UpdateFailed {
                    reason: e.to_string(),
                    invalid_input: e.is_invalid_input(),
                }
            }
            Err(e) => {
                self.stats.record_failed();
                error!(error = %e, "Mosaic update task failed");
                MosaicEvent::UpdateFailed {
                    reason: e.to_string(),
                    invalid_input: false,
                }
            }
        };

        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
