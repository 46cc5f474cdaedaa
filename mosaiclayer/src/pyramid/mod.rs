//! Tile pyramid descriptor
//!
//! A [`TilePyramid`] is an ordered list of [`ZoomLevel`]s over one projected
//! extent. Index 0 is the coarsest level; indices grow toward finer levels and
//! resolution strictly decreases along the way. Tile columns grow eastward
//! from the upper-left corner of the extent and rows grow southward.
//!
//! All grid math is geometric: a tile key exists at a level if its footprint
//! lies inside the pyramid extent, whether or not any store holds data for it.

mod level;

pub use level::{TileRange, ZoomLevel};

use thiserror::Error;

use crate::coord::{Envelope, Projection, TileKey};

/// Tolerance, in tile units, used when snapping envelope edges to the grid.
const GRID_EPSILON: f64 = 1e-9;

/// Highest level number accepted by the quadtree builders.
pub const MAX_QUADTREE_LEVEL: u8 = 24;

/// Errors raised while building a pyramid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PyramidError {
    #[error("Pyramid must have at least one level")]
    Empty,

    #[error("Level {level} has a zero tile dimension")]
    ZeroTileSize { level: u8 },

    #[error("Level {level} has a non-positive pixel size")]
    InvalidPixelSize { level: u8 },

    #[error("Level {level} resolution {resolution} is not finer than the previous level")]
    ResolutionNotDecreasing { level: u8, resolution: f64 },

    #[error("Level numbers must increase with resolution (level {level} out of order)")]
    LevelOrder { level: u8 },

    #[error("Invalid pyramid extent: {0}")]
    InvalidExtent(Envelope),

    #[error("Invalid level range {min}..={max} (levels above 24 are not supported)")]
    InvalidLevelRange { min: u8, max: u8 },
}

/// Ordered set of zoom levels over a fixed projected extent.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePyramid {
    projection: Projection,
    extent: Envelope,
    levels: Vec<ZoomLevel>,
}

impl TilePyramid {
    /// Creates a pyramid from explicit levels, ordered coarsest first.
    ///
    /// # Errors
    ///
    /// Returns `PyramidError` if the level list is empty, a level has a zero
    /// tile dimension or non-positive pixel size, level numbers do not
    /// increase, or resolution does not strictly decrease.
    pub fn new(
        projection: Projection,
        extent: Envelope,
        levels: Vec<ZoomLevel>,
    ) -> Result<Self, PyramidError> {
        if !(extent.width() > 0.0 && extent.height() > 0.0)
            || !extent.min_x.is_finite()
            || !extent.max_x.is_finite()
            || !extent.min_y.is_finite()
            || !extent.max_y.is_finite()
        {
            return Err(PyramidError::InvalidExtent(extent));
        }
        if levels.is_empty() {
            return Err(PyramidError::Empty);
        }

        let mut previous: Option<&ZoomLevel> = None;
        for level in &levels {
            if level.tile_width == 0 || level.tile_height == 0 {
                return Err(PyramidError::ZeroTileSize { level: level.level });
            }
            let valid_size = |v: f64| v.is_finite() && v > 0.0;
            if !valid_size(level.pixel_size_x)
                || !valid_size(level.pixel_size_y)
                || !valid_size(level.resolution)
            {
                return Err(PyramidError::InvalidPixelSize { level: level.level });
            }
            if let Some(prev) = previous {
                if level.level <= prev.level {
                    return Err(PyramidError::LevelOrder { level: level.level });
                }
                if level.resolution >= prev.resolution {
                    return Err(PyramidError::ResolutionNotDecreasing {
                        level: level.level,
                        resolution: level.resolution,
                    });
                }
            }
            previous = Some(level);
        }

        Ok(Self {
            projection,
            extent,
            levels,
        })
    }

    /// Power-of-two pyramid: level `n` splits the extent into `2^n × 2^n`
    /// tiles of `tile_size` pixels.
    pub fn quadtree(
        projection: Projection,
        extent: Envelope,
        tile_size: u32,
        min_level: u8,
        max_level: u8,
    ) -> Result<Self, PyramidError> {
        if min_level > max_level || max_level > MAX_QUADTREE_LEVEL {
            return Err(PyramidError::InvalidLevelRange {
                min: min_level,
                max: max_level,
            });
        }
        if tile_size == 0 {
            return Err(PyramidError::ZeroTileSize { level: min_level });
        }

        let metres = projection.metres_per_unit();
        let levels = (min_level..=max_level)
            .map(|level| {
                let pixels = tile_size as f64 * (1u64 << level) as f64;
                let pixel_size_x = extent.width() / pixels;
                let pixel_size_y = extent.height() / pixels;
                ZoomLevel {
                    level,
                    tile_width: tile_size,
                    tile_height: tile_size,
                    resolution: pixel_size_x * metres,
                    pixel_size_x,
                    pixel_size_y,
                }
            })
            .collect();

        Self::new(projection, extent, levels)
    }

    /// The OSM / EPSG:3857 grid: 256 pixel tiles over the Web Mercator square.
    pub fn web_mercator(min_level: u8, max_level: u8) -> Result<Self, PyramidError> {
        let projection = Projection::WebMercator;
        Self::quadtree(projection, projection.world_extent(), 256, min_level, max_level)
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn extent(&self) -> &Envelope {
        &self.extent
    }

    pub fn levels(&self) -> &[ZoomLevel] {
        &self.levels
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level at `index`, or `None` when out of range.
    pub fn level(&self, index: usize) -> Option<&ZoomLevel> {
        self.levels.get(index)
    }

    /// Index of the level carrying the given level number.
    pub fn find_level_index(&self, level: u8) -> Option<usize> {
        self.levels.binary_search_by_key(&level, |l| l.level).ok()
    }

    /// Index of the finest level whose resolution does not exceed `resolution`
    /// in detail, i.e. the finest level with `level.resolution >= resolution`.
    ///
    /// Equality qualifies. When every level is finer than `resolution` the
    /// coarsest level (index 0) is returned.
    pub fn select_composite_level_index(&self, max_gsd: f64) -> usize {
        self.levels
            .iter()
            .rposition(|level| level.resolution >= max_gsd)
            .unwrap_or(0)
    }

    /// Number of columns and rows in the grid at `index`.
    pub fn grid_size(&self, index: usize) -> (u32, u32) {
        let level = &self.levels[index];
        let cols = (self.extent.width() / level.tile_span_x() - GRID_EPSILON).ceil();
        let rows = (self.extent.height() / level.tile_span_y() - GRID_EPSILON).ceil();
        (cols.max(1.0) as u32, rows.max(1.0) as u32)
    }

    /// Projected footprint of a tile.
    pub fn tile_bounds(&self, index: usize, col: u32, row: u32) -> Envelope {
        let level = &self.levels[index];
        let min_x = self.extent.min_x + col as f64 * level.tile_span_x();
        let max_y = self.extent.max_y - row as f64 * level.tile_span_y();
        Envelope::new(
            min_x,
            max_y - level.tile_span_y(),
            min_x + level.tile_span_x(),
            max_y,
        )
    }

    /// Footprint of a key, or `None` if its level is not in the pyramid.
    pub fn key_bounds(&self, key: &TileKey) -> Option<Envelope> {
        let index = self.find_level_index(key.zoom)?;
        Some(self.tile_bounds(index, key.col, key.row))
    }

    /// Position of a projected point in the pixel space of tile `(col, row)`.
    ///
    /// The result may lie outside `0..tile_width` when the point is outside
    /// the tile.
    pub fn tile_pixel(&self, index: usize, col: u32, row: u32, x: f64, y: f64) -> (f64, f64) {
        let level = &self.levels[index];
        let bounds = self.tile_bounds(index, col, row);
        (
            (x - bounds.min_x) / level.pixel_size_x,
            (bounds.max_y - y) / level.pixel_size_y,
        )
    }

    /// Tile containing a projected point, or `None` outside the extent.
    pub fn tile_index(&self, index: usize, x: f64, y: f64) -> Option<(u32, u32)> {
        if !self.extent.contains_point(x, y) {
            return None;
        }
        let level = &self.levels[index];
        let (cols, rows) = self.grid_size(index);
        let col = ((x - self.extent.min_x) / level.tile_span_x()).floor() as u32;
        let row = ((self.extent.max_y - y) / level.tile_span_y()).floor() as u32;
        Some((col.min(cols - 1), row.min(rows - 1)))
    }

    /// Keys at `index` whose footprint intersects `envelope`.
    ///
    /// The envelope's max edges are half-open: an edge lying exactly on a
    /// tile boundary does not pull in the neighbouring tile. Returns `None`
    /// when the envelope is entirely outside the extent.
    pub fn tile_range(&self, index: usize, envelope: &Envelope) -> Option<TileRange> {
        let level = self.levels.get(index)?;
        let (cols, rows) = self.grid_size(index);

        let c0 = (envelope.min_x - self.extent.min_x) / level.tile_span_x();
        let c1 = (envelope.max_x - self.extent.min_x) / level.tile_span_x();
        let r0 = (self.extent.max_y - envelope.max_y) / level.tile_span_y();
        let r1 = (self.extent.max_y - envelope.min_y) / level.tile_span_y();

        let (min_col, max_col) = snap_span(c0, c1, cols)?;
        let (min_row, max_row) = snap_span(r0, r1, rows)?;

        Some(TileRange {
            min_col,
            max_col,
            min_row,
            max_row,
        })
    }

    /// Tile width of level `index` subsampled from the composite level
    /// `composite`: `floor(width × res[composite] / res[index])`, and the
    /// same for height.
    pub fn subsampled_size(&self, composite: usize, index: usize) -> (u32, u32) {
        let ratio = self.levels[composite].resolution / self.levels[index].resolution;
        let level = &self.levels[index];
        (
            (level.tile_width as f64 * ratio + GRID_EPSILON).floor() as u32,
            (level.tile_height as f64 * ratio + GRID_EPSILON).floor() as u32,
        )
    }
}

/// Maps a continuous span in tile units onto an inclusive index range within
/// `0..count`.
fn snap_span(start: f64, end: f64, count: u32) -> Option<(u32, u32)> {
    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let first = (start + GRID_EPSILON).floor();
    let last = ((end - GRID_EPSILON).ceil() - 1.0).max(first);
    if last < 0.0 || first >= count as f64 {
        return None;
    }
    let first = first.max(0.0) as u32;
    let last = (last.min(count as f64 - 1.0)) as u32;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Levels with resolution 100, 10 and 1 metres per pixel, 256 px tiles,
    /// over a square extent in metre units.
    fn decimal_pyramid() -> TilePyramid {
        let extent = Envelope::new(0.0, 0.0, 256_000.0, 256_000.0);
        let levels = [100.0, 10.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &res)| ZoomLevel {
                level: i as u8,
                tile_width: 256,
                tile_height: 256,
                resolution: res,
                pixel_size_x: res,
                pixel_size_y: res,
            })
            .collect();
        TilePyramid::new(Projection::WebMercator, extent, levels).unwrap()
    }

    #[test]
    fn test_selects_finest_level_not_finer_than_data() {
        let pyramid = decimal_pyramid();
        let idx = pyramid.select_composite_level_index(8.0);
        assert_eq!(pyramid.level(idx).unwrap().resolution, 10.0);
    }

    #[test]
    fn test_selection_equality_qualifies() {
        let pyramid = decimal_pyramid();
        assert_eq!(pyramid.select_composite_level_index(10.0), 1);
        assert_eq!(pyramid.select_composite_level_index(1.0), 2);
        assert_eq!(pyramid.select_composite_level_index(0.25), 2);
    }

    #[test]
    fn test_selection_falls_back_to_coarsest() {
        let pyramid = decimal_pyramid();
        assert_eq!(pyramid.select_composite_level_index(500.0), 0);
    }

    #[test]
    fn test_rejects_non_decreasing_resolution() {
        let mut levels = decimal_pyramid().levels().to_vec();
        levels[2].resolution = 10.0;
        let result = TilePyramid::new(
            Projection::WebMercator,
            Envelope::new(0.0, 0.0, 1.0, 1.0),
            levels,
        );
        assert!(matches!(
            result,
            Err(PyramidError::ResolutionNotDecreasing { level: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_zero_tile_size() {
        let mut levels = decimal_pyramid().levels().to_vec();
        levels[0].tile_height = 0;
        let result = TilePyramid::new(
            Projection::WebMercator,
            Envelope::new(0.0, 0.0, 1.0, 1.0),
            levels,
        );
        assert_eq!(result, Err(PyramidError::ZeroTileSize { level: 0 }));
    }

    #[test]
    fn test_rejects_empty() {
        let result = TilePyramid::new(
            Projection::WebMercator,
            Envelope::new(0.0, 0.0, 1.0, 1.0),
            Vec::new(),
        );
        assert_eq!(result, Err(PyramidError::Empty));
    }

    #[test]
    fn test_web_mercator_grid() {
        let pyramid = TilePyramid::web_mercator(0, 3).unwrap();
        assert_eq!(pyramid.len(), 4);
        assert_eq!(pyramid.grid_size(0), (1, 1));
        assert_eq!(pyramid.grid_size(3), (8, 8));
        let res0 = pyramid.level(0).unwrap().resolution;
        assert!((res0 - 156_543.033_928).abs() < 1e-3);
    }

    #[test]
    fn test_find_level_index_with_offset_levels() {
        let pyramid = TilePyramid::web_mercator(5, 8).unwrap();
        assert_eq!(pyramid.find_level_index(5), Some(0));
        assert_eq!(pyramid.find_level_index(8), Some(3));
        assert_eq!(pyramid.find_level_index(4), None);
    }

    #[test]
    fn test_tile_bounds_rows_grow_south() {
        let pyramid = decimal_pyramid();
        let top = pyramid.tile_bounds(2, 0, 0);
        let below = pyramid.tile_bounds(2, 0, 1);
        assert_eq!(top.max_y, 256_000.0);
        assert_eq!(below.max_y, top.min_y);
        assert_eq!(top.width(), 256.0);
    }

    #[test]
    fn test_tile_range_half_open_edges() {
        let pyramid = decimal_pyramid();
        let tile = pyramid.tile_bounds(2, 2, 4);
        let range = pyramid.tile_range(2, &tile).unwrap();
        assert_eq!(
            range,
            TileRange {
                min_col: 2,
                max_col: 2,
                min_row: 4,
                max_row: 4
            }
        );
    }

    #[test]
    fn test_tile_range_outside_extent() {
        let pyramid = decimal_pyramid();
        let outside = Envelope::new(-500.0, -500.0, -100.0, -100.0);
        assert!(pyramid.tile_range(2, &outside).is_none());
    }

    #[test]
    fn test_tile_range_clamped_to_extent() {
        let pyramid = decimal_pyramid();
        let huge = Envelope::new(-1e9, -1e9, 1e9, 1e9);
        let range = pyramid.tile_range(0, &huge).unwrap();
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn test_tile_range_iter_row_major() {
        let range = TileRange {
            min_col: 1,
            max_col: 2,
            min_row: 5,
            max_row: 6,
        };
        let keys: Vec<_> = range.iter().collect();
        assert_eq!(keys, vec![(1, 5), (2, 5), (1, 6), (2, 6)]);
    }

    #[test]
    fn test_tile_pixel_and_index() {
        let pyramid = decimal_pyramid();
        let bounds = pyramid.tile_bounds(2, 3, 7);
        let (px, py) = pyramid.tile_pixel(2, 3, 7, bounds.min_x + 10.0, bounds.max_y - 20.0);
        assert_eq!((px, py), (10.0, 20.0));
        assert_eq!(
            pyramid.tile_index(2, bounds.min_x + 1.0, bounds.max_y - 1.0),
            Some((3, 7))
        );
    }

    #[test]
    fn test_subsampled_size_decimal() {
        let pyramid = decimal_pyramid();
        assert_eq!(pyramid.subsampled_size(2, 1), (25, 25));
        assert_eq!(pyramid.subsampled_size(2, 0), (2, 2));
    }

    #[test]
    fn test_subsampled_size_quadtree_matches_shift() {
        let pyramid = TilePyramid::web_mercator(0, 10).unwrap();
        for i in 0..10 {
            let (w, _) = pyramid.subsampled_size(10, i);
            assert_eq!(w, 256 >> (10 - i).min(31));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn selection_is_monotonic(a in 0.01f64..1000.0, b in 0.01f64..1000.0) {
                let pyramid = TilePyramid::web_mercator(0, 20).unwrap();
                let (fine, coarse) = if a < b { (a, b) } else { (b, a) };
                let fine_idx = pyramid.select_composite_level_index(fine);
                let coarse_idx = pyramid.select_composite_level_index(coarse);
                // A smaller GSD never lands on a coarser level.
                prop_assert!(fine_idx >= coarse_idx);
            }

            #[test]
            fn selected_level_does_not_fabricate_detail(gsd in 0.5f64..100_000.0) {
                let pyramid = TilePyramid::web_mercator(0, 18).unwrap();
                let idx = pyramid.select_composite_level_index(gsd);
                let level = pyramid.level(idx).unwrap();
                if level.resolution < gsd {
                    prop_assert_eq!(idx, 0);
                }
                if let Some(finer) = pyramid.level(idx + 1) {
                    prop_assert!(finer.resolution < gsd);
                }
            }
        }
    }
}
