//! Read-only composite of the foreground pyramid over a background source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::background::BackgroundTileSource;
use crate::coord::TileKey;
use crate::pyramid::TilePyramid;
use crate::raster::Canvas;
use crate::store::{StoreError, TileStore};
use crate::tile::Tile;

/// Tile source presented to renderers.
///
/// Holds only shared handles to the mosaic's stores and version counter, so
/// it is cheap to clone and safe to query from any number of threads while
/// an update is running. A reader sees each tile either before or after the
/// update, never half written.
#[derive(Clone)]
pub struct CompositeView {
    foreground: Arc<dyn TileStore>,
    background: Arc<dyn BackgroundTileSource>,
    version: Arc<AtomicU64>,
}

impl CompositeView {
    pub(crate) fn new(
        foreground: Arc<dyn TileStore>,
        background: Arc<dyn BackgroundTileSource>,
        version: Arc<AtomicU64>,
    ) -> Self {
        Self {
            foreground,
            background,
            version,
        }
    }

    pub fn pyramid(&self) -> &TilePyramid {
        self.foreground.pyramid()
    }

    /// Foreground tile if present, otherwise the background's tile for the
    /// same key, otherwise `None`.
    pub fn get_tile(&self, zoom: u8, col: u32, row: u32) -> Result<Option<Tile>, StoreError> {
        let key = TileKey::new(zoom, col, row);
        if let Some(tile) = self.foreground.get(&key)? {
            return Ok(Some(tile));
        }
        self.background.get_tile(&key)
    }

    /// Foreground composited over the background, for display.
    ///
    /// Unlike [`CompositeView::get_tile`], background pixels show through
    /// transparent parts of a foreground tile.
    pub fn render_tile(&self, zoom: u8, col: u32, row: u32) -> Result<Option<Tile>, StoreError> {
        let key = TileKey::new(zoom, col, row);
        let foreground = self.foreground.get(&key)?;
        let background = self.background.get_tile(&key)?;
        match (foreground, background) {
            (None, None) => Ok(None),
            (Some(tile), None) | (None, Some(tile)) => Ok(Some(tile)),
            (Some(fg), Some(bg)) => {
                let mut canvas = Canvas::new(fg.width(), fg.height())?;
                canvas.draw_tile(&bg)?;
                canvas.draw_tile(&fg)?;
                Ok(Some(canvas.to_tile()))
            }
        }
    }

    /// True if the foreground holds a tile for the key.
    pub fn has_foreground(&self, zoom: u8, col: u32, row: u32) -> Result<bool, StoreError> {
        self.foreground.contains(&TileKey::new(zoom, col, row))
    }

    /// Mosaic version at call time. Changes whenever an update completes.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
