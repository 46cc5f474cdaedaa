//! Raster tiles and their byte encoding.
//!
//! A [`Tile`] is the decoded RGBA raster of one [`TileKey`](crate::coord::TileKey).
//! Stores keep tiles encoded through a [`TileCodec`]; fully transparent
//! pixels mean "no data".

mod codec;

pub use codec::{PngCodec, TileCodec, TileDecodeError, TileEncodeError};

use image::{Rgba, RgbaImage};

/// One decoded raster tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    image: RgbaImage,
}

impl Tile {
    /// Fully transparent tile.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Tile filled with a single colour.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Pixel at `(x, y)` as `[r, g, b, a]`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// True when at least one pixel has non-zero alpha.
    pub fn has_data(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] != 0)
    }

    /// Number of pixels with non-zero alpha.
    pub fn coverage(&self) -> usize {
        self.image.pixels().filter(|p| p.0[3] != 0).count()
    }
}

impl From<RgbaImage> for Tile {
    fn from(image: RgbaImage) -> Self {
        Self::from_image(image)
    }
}
