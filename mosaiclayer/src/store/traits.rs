//! Core trait for tile stores.
//!
//! The `TileStore` trait is the only interface the compositor needs from
//! storage. Any backing that satisfies it (in-memory map, directory of files)
//! can hold the source tiles or the foreground composite.
//!
//! # Contract
//!
//! - **Sparse reads**: `get` on a key that was never written is `Ok(None)`,
//!   including keys outside the pyramid.
//! - **Atomic tiles**: a concurrent reader observes either the previous tile
//!   or the new one, never a partially written tile.
//! - **Recoverable encode failures**: `set` reports codec failures as
//!   [`StoreError::Encode`]; callers decide whether to record or abort.
//!   Everything else is a storage failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::coord::{Envelope, TileKey};
use crate::pyramid::TilePyramid;
use crate::raster::RasterError;
use crate::tile::{Tile, TileDecodeError, TileEncodeError};

/// Errors that can occur during tile store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The codec rejected the tile.
    #[error("Failed to encode tile {key}: {source}")]
    Encode {
        key: TileKey,
        #[source]
        source: TileEncodeError,
    },

    /// The tile does not match its level's pixel dimensions.
    #[error("Tile {key} is {width}x{height}, level expects {expected_width}x{expected_height}")]
    SizeMismatch {
        key: TileKey,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// Stored bytes could not be decoded.
    #[error("Failed to decode tile {key}: {source}")]
    Decode {
        key: TileKey,
        #[source]
        source: TileDecodeError,
    },

    /// Write to a zoom level the pyramid does not define.
    #[error("Zoom level {0} is not part of the pyramid")]
    UnknownLevel(u8),

    /// Drawing surface failure while synthesizing a tile.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// I/O error in a disk-backed store.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True for per-tile failures that leave the store untouched and should
    /// be recorded rather than abort an update.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Encode { .. } | StoreError::SizeMismatch { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Key-value store of encoded tiles keyed by `(zoom, col, row)`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the compositor writes from rayon
/// workers while readers query the composite view from other threads.
pub trait TileStore: Send + Sync {
    /// Pyramid that defines valid keys and tile dimensions.
    fn pyramid(&self) -> &TilePyramid;

    /// Retrieve a tile.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(tile))` if the key holds a tile
    /// - `Ok(None)` if it does not (never written, deleted, or outside the pyramid)
    /// - `Err(_)` on storage or decode failure
    fn get(&self, key: &TileKey) -> Result<Option<Tile>, StoreError>;

    /// Store a tile, replacing any previous tile at the key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Encode` or `StoreError::SizeMismatch` if the tile
    /// cannot be written; the previous tile, if any, is left in place.
    fn set(&self, key: &TileKey, tile: &Tile) -> Result<(), StoreError>;

    /// Delete a tile.
    ///
    /// Returns `Ok(true)` if the key existed.
    fn delete(&self, key: &TileKey) -> Result<bool, StoreError>;

    /// Check if a key holds a tile without decoding it.
    fn contains(&self, key: &TileKey) -> Result<bool, StoreError>;

    /// Number of tiles stored at a zoom level.
    fn tile_count(&self, zoom: u8) -> Result<usize, StoreError>;

    /// Remove every tile.
    fn clear(&self) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Visit every stored tile key at `zoom` whose footprint intersects
    /// `envelope`, in row-major order.
    ///
    /// Keys without a tile are skipped. Iteration stops as soon as `visit`
    /// returns `false`.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if every key was visited, `Ok(false)` if `visit` stopped early.
    fn for_each_tile(
        &self,
        zoom: u8,
        envelope: &Envelope,
        visit: &mut dyn FnMut(TileKey) -> bool,
    ) -> Result<bool, StoreError> {
        let pyramid = self.pyramid();
        let Some(index) = pyramid.find_level_index(zoom) else {
            return Ok(true);
        };
        let Some(range) = pyramid.tile_range(index, envelope) else {
            return Ok(true);
        };

        for (col, row) in range.iter() {
            let key = TileKey::new(zoom, col, row);
            if self.contains(&key)? && !visit(key) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Checks a tile against the dimensions of its level.
pub(crate) fn check_dimensions(
    pyramid: &TilePyramid,
    key: &TileKey,
    tile: &Tile,
) -> Result<(), StoreError> {
    let index = pyramid
        .find_level_index(key.zoom)
        .ok_or(StoreError::UnknownLevel(key.zoom))?;
    let level = &pyramid.levels()[index];
    if tile.width() != level.tile_width || tile.height() != level.tile_height {
        return Err(StoreError::SizeMismatch {
            key: *key,
            width: tile.width(),
            height: tile.height(),
            expected_width: level.tile_width,
            expected_height: level.tile_height,
        });
    }
    Ok(())
}

/// True if the key names a tile inside the pyramid grid.
pub(crate) fn key_in_grid(pyramid: &TilePyramid, key: &TileKey) -> bool {
    match pyramid.find_level_index(key.zoom) {
        Some(index) => {
            let (cols, rows) = pyramid.grid_size(index);
            key.col < cols && key.row < rows
        }
        None => false,
    }
}
