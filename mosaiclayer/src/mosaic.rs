//! Mosaic controller
//!
//! [`Mosaic`] owns the stores of one mosaic and runs every update through
//! the compositor:
//!
//! ```text
//!  update_mosaic(frame)
//!        │
//!        ├── validate ──────────────► InvalidFrame (nothing written)
//!        ├── select composite level
//!        ├── merge_frame ───────────► source store
//!        ├── regenerate_foreground ─► foreground store, composite level
//!        ├── propagate_upward ──────► foreground store, coarser levels
//!        ├── bounds = bounds ∪ footprint
//!        └── version += 1
//! ```
//!
//! Updates are serialized by an internal mutex. Readers use the
//! [`CompositeView`] returned by [`Mosaic::tiles`], which never waits on an
//! update.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::background::{AncestorBackground, BackgroundTileSource};
use crate::compositor::{
    evict_tiles, merge_frame, propagate_upward, rebuild_region, regenerate_foreground,
    select_composite_zoom_level, EvictionReport, UpdateReport,
};
use crate::coord::Envelope;
use crate::error::MosaicError;
use crate::frame::Frame;
use crate::pyramid::TilePyramid;
use crate::store::{DiskTileStore, MemoryTileStore, TileStore, FOREGROUND_STORE, SOURCE_STORE};
use crate::view::CompositeView;

/// An incrementally updated multi-resolution mosaic.
pub struct Mosaic {
    pyramid: Arc<TilePyramid>,
    source: Arc<dyn TileStore>,
    foreground: Arc<dyn TileStore>,
    background: Arc<dyn BackgroundTileSource>,
    bounds: RwLock<Option<Envelope>>,
    version: Arc<AtomicU64>,
    write_lock: Mutex<()>,
}

impl Mosaic {
    /// Creates a mosaic over existing stores.
    ///
    /// # Errors
    ///
    /// Returns `MosaicError::PyramidMismatch` if the two stores were built
    /// for different pyramids.
    pub fn new(
        source: Arc<dyn TileStore>,
        foreground: Arc<dyn TileStore>,
        background: Arc<dyn BackgroundTileSource>,
    ) -> Result<Self, MosaicError> {
        if foreground.pyramid() != source.pyramid() {
            return Err(MosaicError::PyramidMismatch {
                store: foreground.name().to_string(),
            });
        }
        let pyramid = Arc::new(source.pyramid().clone());
        Ok(Self {
            pyramid,
            source,
            foreground,
            background,
            bounds: RwLock::new(None),
            version: Arc::new(AtomicU64::new(0)),
            write_lock: Mutex::new(()),
        })
    }

    /// Creates a mosaic held entirely in memory, with coarser source tiles
    /// as background.
    pub fn in_memory(pyramid: TilePyramid) -> Self {
        let pyramid = Arc::new(pyramid);
        let source: Arc<dyn TileStore> =
            Arc::new(MemoryTileStore::new(SOURCE_STORE, Arc::clone(&pyramid)));
        let foreground: Arc<dyn TileStore> =
            Arc::new(MemoryTileStore::new(FOREGROUND_STORE, Arc::clone(&pyramid)));
        let background = Arc::new(AncestorBackground::new(Arc::clone(&source)));
        Self {
            pyramid,
            source,
            foreground,
            background,
            bounds: RwLock::new(None),
            version: Arc::new(AtomicU64::new(0)),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a disk-backed mosaic under `directory`.
    ///
    /// Source tiles live in `<directory>/source`, composite tiles in
    /// `<directory>/foreground`. Tiles written by a previous session are
    /// served again; the bounding box starts empty.
    pub fn open(directory: impl AsRef<Path>, pyramid: TilePyramid) -> Result<Self, MosaicError> {
        let directory = directory.as_ref();
        let pyramid = Arc::new(pyramid);
        let source: Arc<dyn TileStore> = Arc::new(DiskTileStore::open(
            SOURCE_STORE,
            directory.join(SOURCE_STORE),
            Arc::clone(&pyramid),
        )?);
        let foreground: Arc<dyn TileStore> = Arc::new(DiskTileStore::open(
            FOREGROUND_STORE,
            directory.join(FOREGROUND_STORE),
            Arc::clone(&pyramid),
        )?);
        let background = Arc::new(AncestorBackground::new(Arc::clone(&source)));
        Self::new(source, foreground, background)
    }

    /// Replaces the background source.
    pub fn with_background(mut self, background: Arc<dyn BackgroundTileSource>) -> Self {
        self.background = background;
        self
    }

    /// Ingests one frame.
    ///
    /// Merges the frame into the source store at the level matching its
    /// ground sample distance, rebuilds the foreground tiles it touches at
    /// that level and every coarser level, then grows the bounding box and
    /// advances the version.
    ///
    /// # Errors
    ///
    /// - `MosaicError::InvalidFrame` if the frame is malformed; nothing is written
    /// - `MosaicError::Store` if a store fails outright; tiles written before
    ///   the failure remain but the version and bounds are unchanged
    ///
    /// Tiles that fail to encode do not abort the update; they are listed in
    /// [`UpdateReport::failed_tiles`].
    pub fn update_mosaic(&self, frame: &Frame) -> Result<UpdateReport, MosaicError> {
        let _writer = self.write_lock.lock();
        let start = Instant::now();

        let projected = frame.validate(self.pyramid.projection())?;
        let envelope = projected.envelope;
        let (index, level) = select_composite_zoom_level(&self.pyramid, frame.max_gsd);
        let zoom = level.level;
        debug!(
            zoom,
            resolution = level.resolution,
            max_gsd = frame.max_gsd,
            envelope = %envelope,
            "Selected composite level"
        );

        let merged = merge_frame(
            self.source.as_ref(),
            &self.pyramid,
            index,
            frame,
            &projected,
        )?;
        let merge_ms = start.elapsed().as_millis();

        let regenerated = regenerate_foreground(
            self.source.as_ref(),
            self.foreground.as_ref(),
            &self.pyramid,
            index,
            &envelope,
        )?;
        let propagated =
            propagate_upward(self.foreground.as_ref(), &self.pyramid, index, &envelope)?;

        {
            let mut bounds = self.bounds.write();
            *bounds = Some(match *bounds {
                Some(current) => current.union(&envelope),
                None => envelope,
            });
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        let mut failed_tiles = merged.failures;
        failed_tiles.extend(regenerated.failures);
        failed_tiles.extend(propagated.failures);
        let report = UpdateReport {
            version,
            envelope,
            zoom,
            tiles_merged: merged.written,
            tiles_regenerated: regenerated.written,
            tiles_propagated: propagated.written,
            levels_propagated: propagated.levels_visited,
            failed_tiles,
        };

        info!(
            zoom,
            version,
            merged = report.tiles_merged,
            regenerated = report.tiles_regenerated,
            propagated = report.tiles_propagated,
            failed = report.failed_tiles.len(),
            merge_ms,
            total_ms = start.elapsed().as_millis(),
            "Frame mosaicked"
        );
        Ok(report)
    }

    /// Removes the tiles lying entirely inside `envelope` and advances the
    /// version.
    ///
    /// Source tiles are deleted at every level when their footprint is
    /// inside the region; partly covered ones are kept. Every foreground
    /// tile touching the region is then rebuilt, finest level first, from
    /// its remaining source tile and children, so coarse ancestors keep the
    /// content of frames outside the region. The bounding box is left as is.
    ///
    /// # Errors
    ///
    /// Returns `MosaicError::Store` if a store fails outright; the version
    /// is unchanged in that case.
    pub fn evict_region(&self, envelope: &Envelope) -> Result<EvictionReport, MosaicError> {
        let _writer = self.write_lock.lock();
        let start = Instant::now();

        let mut removed = 0;
        for level in self.pyramid.levels() {
            removed += evict_tiles(self.source.as_ref(), level.level, envelope)?;
        }
        let rebuilt = rebuild_region(
            self.source.as_ref(),
            self.foreground.as_ref(),
            &self.pyramid,
            envelope,
        )?;
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        let report = EvictionReport {
            version,
            tiles_removed: removed + rebuilt.removed,
            tiles_rebuilt: rebuilt.rebuilt,
            failed_tiles: rebuilt.failures,
        };
        info!(
            envelope = %envelope,
            removed = report.tiles_removed,
            rebuilt = report.tiles_rebuilt,
            failed = report.failed_tiles.len(),
            version,
            total_ms = start.elapsed().as_millis(),
            "Region evicted"
        );
        Ok(report)
    }

    /// Read-only view of the composite, safe to share with renderers.
    pub fn tiles(&self) -> CompositeView {
        CompositeView::new(
            Arc::clone(&self.foreground),
            Arc::clone(&self.background),
            Arc::clone(&self.version),
        )
    }

    /// Union of every ingested footprint in projected coordinates, or
    /// `None` before the first successful update.
    pub fn bounds(&self) -> Option<Envelope> {
        *self.bounds.read()
    }

    /// Number of completed updates and evictions.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    pub fn source_store(&self) -> &Arc<dyn TileStore> {
        &self.source
    }

    pub fn foreground_store(&self) -> &Arc<dyn TileStore> {
        &self.foreground
    }

    pub fn background(&self) -> &Arc<dyn BackgroundTileSource> {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::EmptyBackground;
    use crate::compositor::Stage;
    use crate::coord::{GeoPoint, Projection, TileKey};
    use crate::store::StoreError;
    use crate::tile::{Tile, TileCodec, TileDecodeError, TileEncodeError};
    use image::{Rgba, RgbaImage};

    /// 64x64 degree extent, 8 px tiles, levels 0..=2 (tiles of 64, 32, 16 degrees).
    fn pyramid() -> TilePyramid {
        TilePyramid::quadtree(
            Projection::Equirectangular,
            Envelope::new(0.0, 0.0, 64.0, 64.0),
            8,
            0,
            2,
        )
        .unwrap()
    }

    fn frame(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64, max_gsd: f64) -> Frame {
        let corners = [
            GeoPoint::new(max_lat, min_lon),
            GeoPoint::new(max_lat, max_lon),
            GeoPoint::new(min_lat, max_lon),
            GeoPoint::new(min_lat, min_lon),
        ];
        Frame::new(
            corners,
            max_gsd,
            RgbaImage::from_pixel(4, 4, Rgba([200, 40, 40, 255])),
        )
    }

    struct RejectingCodec;

    impl TileCodec for RejectingCodec {
        fn encode(&self, _tile: &Tile) -> Result<Vec<u8>, TileEncodeError> {
            Err(TileEncodeError::EncodingFailed("rejected".to_string()))
        }

        fn decode(&self, _data: &[u8]) -> Result<Tile, TileDecodeError> {
            Err(TileDecodeError::Empty)
        }

        fn extension(&self) -> &str {
            "bin"
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    /// Store whose writes always fail with an I/O error.
    struct BrokenStore {
        inner: MemoryTileStore,
    }

    impl TileStore for BrokenStore {
        fn pyramid(&self) -> &TilePyramid {
            self.inner.pyramid()
        }

        fn get(&self, key: &TileKey) -> Result<Option<Tile>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, _key: &TileKey, _tile: &Tile) -> Result<(), StoreError> {
            Err(StoreError::io(
                "broken",
                std::io::Error::other("no space left on device"),
            ))
        }

        fn delete(&self, key: &TileKey) -> Result<bool, StoreError> {
            self.inner.delete(key)
        }

        fn contains(&self, key: &TileKey) -> Result<bool, StoreError> {
            self.inner.contains(key)
        }

        fn tile_count(&self, zoom: u8) -> Result<usize, StoreError> {
            self.inner.tile_count(zoom)
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.inner.clear()
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_single_frame_reaches_every_level() {
        let mosaic = Mosaic::in_memory(pyramid());
        let report = mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.envelope, Envelope::new(2.0, 50.0, 14.0, 62.0));
        assert_eq!(report.zoom, 2);
        assert_eq!(report.tiles_merged, 1);
        assert_eq!(report.tiles_regenerated, 1);
        assert_eq!(report.tiles_propagated, 2);
        assert_eq!(report.levels_propagated, 2);
        assert!(report.is_complete());

        let view = mosaic.tiles();
        assert!(view.has_foreground(2, 0, 0).unwrap());
        assert!(view.has_foreground(1, 0, 0).unwrap());
        assert!(view.has_foreground(0, 0, 0).unwrap());
        let parent = view.get_tile(1, 0, 0).unwrap().unwrap();
        assert!(parent.has_data());
        assert_ne!(parent, Tile::transparent(8, 8));
    }

    #[test]
    fn test_bounds_and_version_after_updates() {
        let mosaic = Mosaic::in_memory(pyramid());
        assert!(mosaic.bounds().is_none());
        assert_eq!(mosaic.version(), 0);

        mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();
        mosaic.update_mosaic(&frame(40.0, 4.0, 44.0, 10.0, 1.0)).unwrap();

        assert_eq!(mosaic.version(), 2);
        assert_eq!(mosaic.tiles().version(), 2);
        assert_eq!(mosaic.bounds(), Some(Envelope::new(2.0, 4.0, 44.0, 62.0)));
    }

    #[test]
    fn test_report_carries_assigned_version() {
        let mosaic = Mosaic::in_memory(pyramid());
        let first = mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();
        let eviction = mosaic
            .evict_region(&Envelope::new(48.0, 0.0, 64.0, 16.0))
            .unwrap();
        let second = mosaic.update_mosaic(&frame(40.0, 4.0, 44.0, 10.0, 1.0)).unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(eviction.version, 2);
        assert_eq!(second.version, 3);
        assert_eq!(second.envelope, Envelope::new(40.0, 4.0, 44.0, 10.0));
        assert_eq!(mosaic.version(), 3);
    }

    #[test]
    fn test_invalid_frame_changes_nothing() {
        let mosaic = Mosaic::in_memory(pyramid());
        let mut bad = frame(2.0, 50.0, 14.0, 62.0, 1.0);
        bad.pixels = RgbaImage::new(0, 0);

        let err = mosaic.update_mosaic(&bad).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(mosaic.version(), 0);
        assert!(mosaic.bounds().is_none());
        assert_eq!(mosaic.source_store().tile_count(2).unwrap(), 0);
    }

    #[test]
    fn test_store_failure_keeps_version() {
        let pyramid = Arc::new(pyramid());
        let source: Arc<dyn TileStore> = Arc::new(BrokenStore {
            inner: MemoryTileStore::new("source", Arc::clone(&pyramid)),
        });
        let foreground: Arc<dyn TileStore> =
            Arc::new(MemoryTileStore::new("foreground", Arc::clone(&pyramid)));
        let mosaic = Mosaic::new(source, foreground, Arc::new(EmptyBackground)).unwrap();

        let err = mosaic
            .update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, MosaicError::Store(StoreError::Io { .. })));
        assert_eq!(mosaic.version(), 0);
        assert!(mosaic.bounds().is_none());
    }

    #[test]
    fn test_encode_failures_are_reported() {
        let pyramid = Arc::new(pyramid());
        let source: Arc<dyn TileStore> =
            Arc::new(MemoryTileStore::new("source", Arc::clone(&pyramid)));
        let foreground: Arc<dyn TileStore> = Arc::new(MemoryTileStore::with_codec(
            "foreground",
            Arc::clone(&pyramid),
            Arc::new(RejectingCodec),
        ));
        let mosaic = Mosaic::new(source, foreground, Arc::new(EmptyBackground)).unwrap();

        let report = mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();
        assert_eq!(report.tiles_merged, 1);
        assert_eq!(report.tiles_regenerated, 0);
        assert_eq!(report.failed_keys(), vec![TileKey::new(2, 0, 0)]);
        assert_eq!(report.failed_tiles[0].stage, Stage::Regenerate);
        assert_eq!(mosaic.version(), 1);
    }

    #[test]
    fn test_mismatched_pyramids_rejected() {
        let coarse = Arc::new(pyramid());
        let fine = Arc::new(
            TilePyramid::quadtree(
                Projection::Equirectangular,
                Envelope::new(0.0, 0.0, 64.0, 64.0),
                8,
                0,
                3,
            )
            .unwrap(),
        );
        let result = Mosaic::new(
            Arc::new(MemoryTileStore::new("source", coarse)),
            Arc::new(MemoryTileStore::new("foreground", fine)),
            Arc::new(EmptyBackground),
        );
        assert!(matches!(result, Err(MosaicError::PyramidMismatch { .. })));
    }

    #[test]
    fn test_unwritten_tiles_are_absent() {
        let mosaic = Mosaic::in_memory(pyramid()).with_background(Arc::new(EmptyBackground));
        mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();

        let view = mosaic.tiles();
        assert!(view.get_tile(2, 3, 3).unwrap().is_none());
        assert!(view.get_tile(1, 1, 1).unwrap().is_none());
        // Outside the grid and unknown levels are absent too
        assert!(view.get_tile(2, 40, 0).unwrap().is_none());
        assert!(view.get_tile(9, 0, 0).unwrap().is_none());
    }

    #[test]
    fn test_ancestor_background_fills_gaps() {
        let mosaic = Mosaic::in_memory(pyramid());
        // Coarser than every level, so it lands on level 0
        mosaic
            .update_mosaic(&frame(0.0, 0.0, 64.0, 64.0, 1.0e9))
            .unwrap();

        let view = mosaic.tiles();
        assert!(!view.has_foreground(2, 3, 3).unwrap());
        let filled = view.get_tile(2, 3, 3).unwrap().unwrap();
        assert_eq!(filled.pixel(4, 4), [200, 40, 40, 255]);
    }

    #[test]
    fn test_evict_region_clears_all_levels() {
        let mosaic = Mosaic::in_memory(pyramid());
        mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();

        let report = mosaic
            .evict_region(&Envelope::new(0.0, 48.0, 16.0, 64.0))
            .unwrap();
        // Source tile at level 2 plus foreground tiles at levels 0..=2
        assert_eq!(report.tiles_removed, 4);
        assert_eq!(report.tiles_rebuilt, 0);
        assert_eq!(report.version, 2);
        assert_eq!(mosaic.version(), 2);
        assert!(!mosaic.tiles().has_foreground(0, 0, 0).unwrap());
        assert!(mosaic.bounds().is_some());
    }

    #[test]
    fn test_evict_region_keeps_content_outside_region() {
        let mosaic = Mosaic::in_memory(pyramid()).with_background(Arc::new(EmptyBackground));
        // One frame in the top-left level 2 tile, one in the bottom-right
        mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();
        mosaic.update_mosaic(&frame(50.0, 2.0, 62.0, 14.0, 1.0)).unwrap();
        let view = mosaic.tiles();
        let before = view.get_tile(0, 0, 0).unwrap().unwrap();
        assert!(before.pixel(0, 0)[3] > 0);
        assert!(before.pixel(7, 7)[3] > 0);

        let report = mosaic
            .evict_region(&Envelope::new(0.0, 48.0, 16.0, 64.0))
            .unwrap();
        assert!(report.failed_tiles.is_empty());
        assert_eq!(report.tiles_rebuilt, 1);

        assert!(!view.has_foreground(2, 0, 0).unwrap());
        assert!(!view.has_foreground(1, 0, 0).unwrap());
        assert!(view.has_foreground(2, 3, 3).unwrap());
        assert!(view.has_foreground(1, 1, 1).unwrap());

        let after = view.get_tile(0, 0, 0).unwrap().unwrap();
        assert_eq!(after.pixel(0, 0)[3], 0);
        assert_eq!(after.pixel(7, 7), before.pixel(7, 7));
    }

    #[test]
    fn test_evict_region_keeps_partly_covered_source() {
        let mosaic = Mosaic::in_memory(pyramid());
        mosaic.update_mosaic(&frame(2.0, 50.0, 14.0, 62.0, 1.0)).unwrap();

        // Only half of level 2 tile (0, 0) lies inside the region
        let report = mosaic
            .evict_region(&Envelope::new(0.0, 48.0, 8.0, 64.0))
            .unwrap();
        assert_eq!(report.tiles_removed, 0);
        assert!(mosaic.source_store().contains(&TileKey::new(2, 0, 0)).unwrap());
        let view = mosaic.tiles();
        assert!(view.has_foreground(2, 0, 0).unwrap());
        assert!(view.has_foreground(0, 0, 0).unwrap());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn footprint() -> impl Strategy<Value = (f64, f64, f64, f64)> {
            (0.0..60.0f64, 0.0..60.0f64, 1.0..20.0f64, 1.0..20.0f64)
                .prop_map(|(x, y, w, h)| (x, y, (x + w).min(64.0), (y + h).min(64.0)))
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn bounds_independent_of_order(
                footprints in prop::collection::vec(footprint(), 1..4)
            ) {
                let frames: Vec<Frame> = footprints
                    .iter()
                    .map(|&(x0, y0, x1, y1)| frame(x0, y0, x1, y1, 1.0))
                    .collect();

                let forward = Mosaic::in_memory(pyramid());
                for f in &frames {
                    forward.update_mosaic(f).unwrap();
                }
                let backward = Mosaic::in_memory(pyramid());
                for f in frames.iter().rev() {
                    backward.update_mosaic(f).unwrap();
                }

                let expected = footprints
                    .iter()
                    .map(|&(x0, y0, x1, y1)| Envelope::new(x0, y0, x1, y1))
                    .reduce(|a, b| a.union(&b));
                prop_assert_eq!(forward.bounds(), expected);
                prop_assert_eq!(backward.bounds(), expected);
                prop_assert_eq!(forward.version(), frames.len() as u64);
            }
        }
    }
}
