//! Rasterizing a frame into the source store.

use tracing::debug;

use super::{prepare_canvas, process_level, LevelOutcome, Stage};
use crate::coord::TileKey;
use crate::frame::{Frame, ProjectedFrame};
use crate::pyramid::TilePyramid;
use crate::raster::Layer;
use crate::store::{StoreError, TileStore};

/// Warps `frame` onto every tile of level `index` its footprint overlaps and
/// writes the results into `source`.
///
/// Existing source pixels are kept wherever the frame is transparent or
/// absent; opaque frame pixels replace them. Tiles the frame does not
/// actually touch are left alone, and no fully transparent tile is written.
///
/// # Arguments
///
/// * `source` - Store holding merged frames
/// * `pyramid` - Grid the frame is rasterized into
/// * `index` - Pyramid index of the composite level
/// * `frame` - The frame to merge
/// * `projected` - The frame's validated, projected footprint
pub fn merge_frame(
    source: &dyn TileStore,
    pyramid: &TilePyramid,
    index: usize,
    frame: &Frame,
    projected: &ProjectedFrame,
) -> Result<LevelOutcome, StoreError> {
    let level = pyramid.levels()[index];
    let Some(range) = pyramid.tile_range(index, &projected.envelope) else {
        debug!(zoom = level.level, "Frame lies outside the pyramid extent");
        return Ok(LevelOutcome::default());
    };

    let layer = Layer::from_image(&frame.pixels)?;
    let keys: Vec<TileKey> = range
        .iter()
        .map(|(col, row)| TileKey::new(level.level, col, row))
        .collect();

    process_level(&keys, Stage::Merge, |slot, key| {
        let quad = projected
            .corners
            .map(|(x, y)| pyramid.tile_pixel(index, key.col, key.row, x, y));

        let canvas = prepare_canvas(slot, &level)?;
        if let Some(existing) = source.get(key)? {
            canvas.load_tile(&existing)?;
        }
        if !canvas.draw_quad(&layer, quad) || !canvas.has_data() {
            return Ok(false);
        }
        source.set(key, &canvas.to_tile())?;
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{Envelope, GeoPoint, Projection};
    use crate::store::MemoryTileStore;
    use crate::tile::Tile;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    /// 64x64 degree extent, 8 px tiles, levels 0..=2 (tiles of 64, 32, 16 degrees).
    fn pyramid() -> Arc<TilePyramid> {
        Arc::new(
            TilePyramid::quadtree(
                Projection::Equirectangular,
                Envelope::new(0.0, 0.0, 64.0, 64.0),
                8,
                0,
                2,
            )
            .unwrap(),
        )
    }

    fn frame(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64, color: [u8; 4]) -> Frame {
        let corners = [
            GeoPoint::new(max_lat, min_lon),
            GeoPoint::new(max_lat, max_lon),
            GeoPoint::new(min_lat, max_lon),
            GeoPoint::new(min_lat, min_lon),
        ];
        Frame::new(corners, 2.0, RgbaImage::from_pixel(4, 4, Rgba(color)))
    }

    fn merge(store: &MemoryTileStore, pyramid: &TilePyramid, frame: &Frame) -> LevelOutcome {
        let projected = frame.validate(pyramid.projection()).unwrap();
        merge_frame(store, pyramid, 2, frame, &projected).unwrap()
    }

    #[test]
    fn test_merge_writes_every_overlapped_tile() {
        let pyramid = pyramid();
        let store = MemoryTileStore::new("source", Arc::clone(&pyramid));

        // Spans columns 0-1 of the top row at level 2
        let f = frame(8.0, 52.0, 24.0, 60.0, [255, 0, 0, 255]);
        let outcome = merge(&store, &pyramid, &f);

        assert_eq!(outcome.written, 2);
        assert!(outcome.failures.is_empty());
        assert!(store.contains(&TileKey::new(2, 0, 0)).unwrap());
        assert!(store.contains(&TileKey::new(2, 1, 0)).unwrap());
        assert!(!store.contains(&TileKey::new(2, 0, 1)).unwrap());
    }

    #[test]
    fn test_merge_preserves_existing_pixels_outside_frame() {
        let pyramid = pyramid();
        let store = MemoryTileStore::new("source", Arc::clone(&pyramid));
        let key = TileKey::new(2, 0, 0);
        store.set(&key, &Tile::solid(8, 8, [0, 0, 255, 255])).unwrap();

        // Left half of tile (0, 0): lon 0..8, lat 48..64
        let f = frame(0.0, 48.0, 8.0, 64.0, [255, 0, 0, 255]);
        merge(&store, &pyramid, &f);

        let tile = store.get(&key).unwrap().unwrap();
        assert_eq!(tile.pixel(1, 4), [255, 0, 0, 255]);
        assert_eq!(tile.pixel(6, 4), [0, 0, 255, 255]);
    }

    #[test]
    fn test_merge_transparent_frame_keeps_existing() {
        let pyramid = pyramid();
        let store = MemoryTileStore::new("source", Arc::clone(&pyramid));
        let key = TileKey::new(2, 0, 0);
        let original = Tile::solid(8, 8, [0, 0, 255, 255]);
        store.set(&key, &original).unwrap();

        let f = frame(0.0, 48.0, 16.0, 64.0, [0, 0, 0, 0]);
        merge(&store, &pyramid, &f);
        assert_eq!(store.get(&key).unwrap(), Some(original));
    }

    #[test]
    fn test_merge_transparent_frame_writes_nothing_new() {
        let pyramid = pyramid();
        let store = MemoryTileStore::new("source", Arc::clone(&pyramid));
        let f = frame(0.0, 48.0, 16.0, 64.0, [0, 0, 0, 0]);
        let outcome = merge(&store, &pyramid, &f);
        assert_eq!(outcome.written, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_outside_extent_is_noop() {
        let pyramid = pyramid();
        let store = MemoryTileStore::new("source", Arc::clone(&pyramid));
        let f = frame(100.0, 10.0, 110.0, 20.0, [255, 0, 0, 255]);
        let outcome = merge(&store, &pyramid, &f);
        assert_eq!(outcome, LevelOutcome::default());
    }
}
