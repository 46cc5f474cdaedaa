//! Tile encoding abstractions.
//!
//! Stores hold tiles as bytes and go through a [`TileCodec`] on every read and
//! write, so the persisted format can change without touching the compositor.
//!
//! ```text
//! ┌──────────────┐   encode   ┌──────────────┐
//! │     Tile     │ ─────────► │   Vec<u8>    │
//! │  (RgbaImage) │ ◄───────── │ (TileStore)  │
//! └──────────────┘   decode   └──────────────┘
//! ```

use std::io::Cursor;

use image::ImageFormat;
use thiserror::Error;

use super::Tile;

/// Errors that can occur while encoding a tile.
///
/// Encoding failures are per tile and recoverable: the compositor records the
/// key and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileEncodeError {
    /// Image dimensions the codec cannot represent
    #[error("Invalid dimensions {width}×{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },
    /// Encoder reported a failure
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Errors that can occur while decoding stored tile bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileDecodeError {
    #[error("Decoding failed: {0}")]
    DecodingFailed(String),
    #[error("Empty tile data")]
    Empty,
}

/// Converts tiles to and from stored bytes.
///
/// Implementations must be lossless for the alpha channel, since a fully
/// transparent pixel means "no data".
pub trait TileCodec: Send + Sync {
    /// Encodes a tile to bytes.
    ///
    /// # Errors
    ///
    /// Returns `TileEncodeError` if the tile cannot be represented.
    fn encode(&self, tile: &Tile) -> Result<Vec<u8>, TileEncodeError>;

    /// Decodes bytes produced by [`TileCodec::encode`].
    fn decode(&self, data: &[u8]) -> Result<Tile, TileDecodeError>;

    /// File extension used by disk stores, without the dot.
    fn extension(&self) -> &str;

    /// Human-readable codec name for logs.
    fn name(&self) -> &str;
}

/// Lossless PNG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TileCodec for PngCodec {
    fn encode(&self, tile: &Tile) -> Result<Vec<u8>, TileEncodeError> {
        if tile.width() == 0 || tile.height() == 0 {
            return Err(TileEncodeError::InvalidDimensions {
                width: tile.width(),
                height: tile.height(),
                reason: "tile has no pixels".to_string(),
            });
        }

        let mut buffer = Vec::new();
        tile.image()
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| TileEncodeError::EncodingFailed(e.to_string()))?;
        Ok(buffer)
    }

    fn decode(&self, data: &[u8]) -> Result<Tile, TileDecodeError> {
        if data.is_empty() {
            return Err(TileDecodeError::Empty);
        }
        let image = image::load_from_memory_with_format(data, ImageFormat::Png)
            .map_err(|e| TileDecodeError::DecodingFailed(e.to_string()))?;
        Ok(Tile::from_image(image.into_rgba8()))
    }

    fn extension(&self) -> &str {
        "png"
    }

    fn name(&self) -> &str {
        "PNG"
    }
}
