//! Errors returned by mosaic updates.

use thiserror::Error;

use crate::frame::FrameError;
use crate::pyramid::PyramidError;
use crate::store::StoreError;

/// Errors that can occur while building or updating a mosaic.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// The frame was rejected before any store was touched.
    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    /// A store failed in a way that aborts the update.
    ///
    /// Tiles written before the failure remain; the version is not advanced.
    #[error("Tile store failure: {0}")]
    Store(#[from] StoreError),

    /// The pyramid definition is invalid.
    #[error("Invalid pyramid: {0}")]
    Pyramid(#[from] PyramidError),

    /// Source and foreground stores were built for different grids.
    #[error("Store '{store}' uses a different pyramid than the mosaic")]
    PyramidMismatch { store: String },
}

impl MosaicError {
    /// True when retrying with corrected input can succeed.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, MosaicError::InvalidFrame(_))
    }
}
