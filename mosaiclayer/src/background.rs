//! Background tile sources
//!
//! A background fills the pyramid wherever the foreground has no tile. It is
//! read-only and never ingests anything.
//!
//! - [`EmptyBackground`]: no fallback at all
//! - [`AncestorBackground`]: upsamples coarser source tiles covering the key
//! - [`PlaceholderBackground`]: a solid colour tile inside the pyramid extent

use std::sync::Arc;

use crate::coord::{Envelope, TileKey};
use crate::pyramid::TilePyramid;
use crate::raster::{Canvas, Layer, PixelRect};
use crate::store::{StoreError, TileStore};
use crate::tile::Tile;

/// Default placeholder colour: magenta, so gaps are obvious.
pub const DEFAULT_PLACEHOLDER_COLOR: [u8; 4] = [255, 0, 255, 255];

/// Read-only provider of fallback tiles.
pub trait BackgroundTileSource: Send + Sync {
    /// Tile for `key`, or `None` if this source has nothing there.
    fn get_tile(&self, key: &TileKey) -> Result<Option<Tile>, StoreError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Background that never supplies a tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBackground;

impl BackgroundTileSource for EmptyBackground {
    fn get_tile(&self, _key: &TileKey) -> Result<Option<Tile>, StoreError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "empty"
    }
}

/// Synthesizes a tile by upsampling every coarser ancestor found in a store.
///
/// Ancestors are drawn coarsest first so finer data ends up on top.
pub struct AncestorBackground {
    source: Arc<dyn TileStore>,
}

impl AncestorBackground {
    pub fn new(source: Arc<dyn TileStore>) -> Self {
        Self { source }
    }
}

impl BackgroundTileSource for AncestorBackground {
    fn get_tile(&self, key: &TileKey) -> Result<Option<Tile>, StoreError> {
        let pyramid = self.source.pyramid();
        let Some(index) = pyramid.find_level_index(key.zoom) else {
            return Ok(None);
        };
        let level = pyramid.levels()[index];
        let bounds = pyramid.tile_bounds(index, key.col, key.row);

        let mut canvas: Option<Canvas> = None;
        for ancestor_index in 0..index {
            let Some(range) = pyramid.tile_range(ancestor_index, &bounds) else {
                continue;
            };
            let ancestor_level = pyramid.levels()[ancestor_index];
            for (col, row) in range.iter() {
                let ancestor_key = TileKey::new(ancestor_level.level, col, row);
                let Some(ancestor) = self.source.get(&ancestor_key)? else {
                    continue;
                };
                if canvas.is_none() {
                    canvas = Some(Canvas::new(level.tile_width, level.tile_height)?);
                }
                let Some(surface) = canvas.as_mut() else {
                    continue;
                };
                let ancestor_bounds = pyramid.tile_bounds(ancestor_index, col, row);
                let layer = Layer::from_tile(&ancestor)?;
                copy_intersecting_region(
                    surface,
                    &layer,
                    &ancestor_bounds,
                    &bounds,
                    level.tile_width,
                    level.tile_height,
                );
            }
        }

        Ok(canvas.filter(Canvas::has_data).map(|c| c.to_tile()))
    }

    fn name(&self) -> &str {
        "ancestors"
    }
}

/// Draws the part of `layer` (covering `src_bounds`) that overlaps
/// `dst_bounds` onto a canvas covering `dst_bounds`.
pub(crate) fn copy_intersecting_region(
    canvas: &mut Canvas,
    layer: &Layer,
    src_bounds: &Envelope,
    dst_bounds: &Envelope,
    dst_width: u32,
    dst_height: u32,
) -> bool {
    let Some(overlap) = src_bounds.intersection(dst_bounds) else {
        return false;
    };
    let to_pixels = |bounds: &Envelope, w: u32, h: u32| {
        let sx = w as f64 / bounds.width();
        let sy = h as f64 / bounds.height();
        PixelRect::new(
            (overlap.min_x - bounds.min_x) * sx,
            (bounds.max_y - overlap.max_y) * sy,
            overlap.width() * sx,
            overlap.height() * sy,
        )
    };
    let src = to_pixels(src_bounds, layer.width(), layer.height());
    let dst = to_pixels(dst_bounds, dst_width, dst_height);
    canvas.draw_region(layer, src, dst)
}

/// Solid colour tile for every key inside the pyramid grid.
pub struct PlaceholderBackground {
    pyramid: Arc<TilePyramid>,
    color: [u8; 4],
}

impl PlaceholderBackground {
    pub fn new(pyramid: Arc<TilePyramid>, color: [u8; 4]) -> Self {
        Self { pyramid, color }
    }

    /// Placeholder using [`DEFAULT_PLACEHOLDER_COLOR`].
    pub fn magenta(pyramid: Arc<TilePyramid>) -> Self {
        Self::new(pyramid, DEFAULT_PLACEHOLDER_COLOR)
    }
}

impl BackgroundTileSource for PlaceholderBackground {
    fn get_tile(&self, key: &TileKey) -> Result<Option<Tile>, StoreError> {
        let Some(index) = self.pyramid.find_level_index(key.zoom) else {
            return Ok(None);
        };
        let (cols, rows) = self.pyramid.grid_size(index);
        if key.col >= cols || key.row >= rows {
            return Ok(None);
        }
        let level = &self.pyramid.levels()[index];
        Ok(Some(Tile::solid(level.tile_width, level.tile_height, self.color)))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}
