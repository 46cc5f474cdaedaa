//! Per-level metadata and tile index ranges.

/// Metadata for one level of a tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLevel {
    /// Level number, stored in [`TileKey::zoom`](crate::coord::TileKey)
    pub level: u8,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Nominal ground resolution in metres per pixel
    pub resolution: f64,
    /// Projected units per pixel along x
    pub pixel_size_x: f64,
    /// Projected units per pixel along y
    pub pixel_size_y: f64,
}

impl ZoomLevel {
    /// Projected width of one tile.
    #[inline]
    pub fn tile_span_x(&self) -> f64 {
        self.tile_width as f64 * self.pixel_size_x
    }

    /// Projected height of one tile.
    #[inline]
    pub fn tile_span_y(&self) -> f64 {
        self.tile_height as f64 * self.pixel_size_y
    }
}

/// Inclusive rectangle of tile indices at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl TileRange {
    /// Number of tiles covered.
    pub fn len(&self) -> usize {
        (self.max_col - self.min_col + 1) as usize * (self.max_row - self.min_row + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.min_col..=self.max_col).contains(&col) && (self.min_row..=self.max_row).contains(&row)
    }

    /// Iterates `(col, row)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let (min_col, max_col) = (self.min_col, self.max_col);
        (self.min_row..=self.max_row)
            .flat_map(move |row| (min_col..=max_col).map(move |col| (col, row)))
    }
}
