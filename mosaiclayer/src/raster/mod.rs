//! Drawing surface used by the compositor.
//!
//! A [`Canvas`] wraps a premultiplied `tiny_skia::Pixmap` sized to one tile.
//! Everything drawn onto it is a [`Layer`] (a premultiplied copy of a frame or
//! tile) mapped either through a quadrilateral warp or a rectangle-to-rectangle
//! scale. All drawing uses source-over blending, so transparent source pixels
//! leave what is underneath untouched.
//!
//! Canvases are meant to be reused: [`Canvas::reset`] clears the surface and
//! only reallocates when the requested size changes.

use image::{Rgba, RgbaImage};
use thiserror::Error;
use tiny_skia::{
    BlendMode, ColorU8, FillRule, FilterQuality, Paint, PathBuilder, Pattern, Pixmap, Rect,
    SpreadMode, Transform,
};

use crate::tile::Tile;

/// Errors raised by the drawing surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("Cannot allocate a {width}x{height} raster")]
    InvalidSize { width: u32, height: u32 },
}

/// Axis-aligned rectangle in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A premultiplied raster ready to be drawn onto a [`Canvas`].
pub struct Layer {
    pixmap: Pixmap,
}

impl Layer {
    /// Premultiplies a straight-alpha image.
    pub fn from_image(image: &RgbaImage) -> Result<Self, RasterError> {
        let mut pixmap = allocate(image.width(), image.height())?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(Self { pixmap })
    }

    pub fn from_tile(tile: &Tile) -> Result<Self, RasterError> {
        Self::from_image(tile.image())
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }
}

/// Reusable tile-sized drawing surface.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Creates a transparent canvas.
    ///
    /// # Errors
    ///
    /// Returns `RasterError::InvalidSize` for a zero or oversized dimension.
    pub fn new(width: u32, height: u32) -> Result<Self, RasterError> {
        Ok(Self {
            pixmap: allocate(width, height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Clears to transparent, reallocating only if the size changed.
    pub fn reset(&mut self, width: u32, height: u32) -> Result<(), RasterError> {
        if self.pixmap.width() == width && self.pixmap.height() == height {
            self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
        } else {
            self.pixmap = allocate(width, height)?;
        }
        Ok(())
    }

    /// Replaces the canvas contents with a tile.
    ///
    /// Same-sized tiles are copied pixel for pixel; other sizes are
    /// stretched over a cleared canvas.
    pub fn load_tile(&mut self, tile: &Tile) -> Result<(), RasterError> {
        if tile.width() != self.width() || tile.height() != self.height() {
            self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
            return self.draw_tile(tile);
        }
        for (dst, src) in self.pixmap.pixels_mut().iter_mut().zip(tile.image().pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(())
    }

    /// Draws a whole tile stretched over the whole canvas.
    pub fn draw_tile(&mut self, tile: &Tile) -> Result<(), RasterError> {
        let layer = Layer::from_tile(tile)?;
        let src = PixelRect::new(0.0, 0.0, layer.width() as f64, layer.height() as f64);
        let dst = PixelRect::new(0.0, 0.0, self.width() as f64, self.height() as f64);
        self.draw_region(&layer, src, dst);
        Ok(())
    }

    /// Maps the `src` region of `layer` onto the `dst` region of the canvas.
    ///
    /// Returns `false` when nothing could be drawn (empty or off-canvas
    /// destination).
    pub fn draw_region(&mut self, layer: &Layer, src: PixelRect, dst: PixelRect) -> bool {
        if src.is_empty() || dst.is_empty() {
            return false;
        }
        let sx = dst.width / src.width;
        let sy = dst.height / src.height;
        let transform = Transform::from_row(
            sx as f32,
            0.0,
            0.0,
            sy as f32,
            (dst.x - src.x * sx) as f32,
            (dst.y - src.y * sy) as f32,
        );

        let left = dst.x.max(0.0);
        let top = dst.y.max(0.0);
        let right = (dst.x + dst.width).min(self.width() as f64);
        let bottom = (dst.y + dst.height).min(self.height() as f64);
        let Some(rect) = Rect::from_ltrb(left as f32, top as f32, right as f32, bottom as f32)
        else {
            return false;
        };

        let paint = pattern_paint(layer, transform);
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
        true
    }

    /// Warps a layer onto a quadrilateral given in canvas pixels, in the
    /// order upper-left, upper-right, lower-right, lower-left.
    ///
    /// Parallelograms are drawn with a single affine transform; general
    /// quadrilaterals are split along the upper-right/lower-left diagonal
    /// into two affine triangles.
    pub fn draw_quad(&mut self, layer: &Layer, quad: [(f64, f64); 4]) -> bool {
        if !self.quad_touches_canvas(&quad) {
            return false;
        }
        let w = layer.width() as f64;
        let h = layer.height() as f64;
        let [ul, ur, lr, ll] = quad;

        let upper = Transform::from_row(
            ((ur.0 - ul.0) / w) as f32,
            ((ur.1 - ul.1) / w) as f32,
            ((ll.0 - ul.0) / h) as f32,
            ((ll.1 - ul.1) / h) as f32,
            ul.0 as f32,
            ul.1 as f32,
        );

        let is_parallelogram = {
            let dx = (ul.0 + lr.0) - (ur.0 + ll.0);
            let dy = (ul.1 + lr.1) - (ur.1 + ll.1);
            dx.abs() < 1e-6 && dy.abs() < 1e-6
        };
        if is_parallelogram {
            return self.fill_polygon(layer, &[ul, ur, lr, ll], upper);
        }

        let lower = Transform::from_row(
            ((lr.0 - ll.0) / w) as f32,
            ((lr.1 - ll.1) / w) as f32,
            ((lr.0 - ur.0) / h) as f32,
            ((lr.1 - ur.1) / h) as f32,
            (ll.0 + ur.0 - lr.0) as f32,
            (ll.1 + ur.1 - lr.1) as f32,
        );
        let drew_upper = self.fill_polygon(layer, &[ul, ur, ll], upper);
        let drew_lower = self.fill_polygon(layer, &[ur, lr, ll], lower);
        drew_upper || drew_lower
    }

    /// True when at least one pixel has non-zero alpha.
    pub fn has_data(&self) -> bool {
        self.pixmap.pixels().iter().any(|p| p.alpha() != 0)
    }

    /// Copies the canvas out as a straight-alpha tile.
    pub fn to_tile(&self) -> Tile {
        let mut image = RgbaImage::new(self.width(), self.height());
        for (dst, src) in image.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Tile::from_image(image)
    }

    fn fill_polygon(
        &mut self,
        layer: &Layer,
        points: &[(f64, f64)],
        transform: Transform,
    ) -> bool {
        let mut builder = PathBuilder::new();
        let mut iter = points.iter();
        if let Some(&(x, y)) = iter.next() {
            builder.move_to(x as f32, y as f32);
        }
        for &(x, y) in iter {
            builder.line_to(x as f32, y as f32);
        }
        builder.close();

        // Degenerate polygons produce no path
        let Some(path) = builder.finish() else {
            return false;
        };
        let paint = pattern_paint(layer, transform);
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        true
    }

    fn quad_touches_canvas(&self, quad: &[(f64, f64); 4]) -> bool {
        let (w, h) = (self.width() as f64, self.height() as f64);
        let min_x = quad.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = quad.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let min_y = quad.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = quad.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        max_x > 0.0 && min_x < w && max_y > 0.0 && min_y < h
    }
}

fn allocate(width: u32, height: u32) -> Result<Pixmap, RasterError> {
    Pixmap::new(width, height).ok_or(RasterError::InvalidSize { width, height })
}

fn pattern_paint(layer: &Layer, transform: Transform) -> Paint<'_> {
    Paint {
        shader: Pattern::new(
            layer.pixmap.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Bilinear,
            1.0,
            transform,
        ),
        blend_mode: BlendMode::SourceOver,
        anti_alias: false,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_layer(width: u32, height: u32, color: [u8; 4]) -> Layer {
        Layer::from_image(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    #[test]
    fn test_zero_sized_canvas_rejected() {
        assert!(matches!(
            Canvas::new(0, 16),
            Err(RasterError::InvalidSize {
                width: 0,
                height: 16
            })
        ));
    }

    #[test]
    fn test_new_canvas_is_transparent() {
        let canvas = Canvas::new(8, 8).unwrap();
        assert!(!canvas.has_data());
        assert!(!canvas.to_tile().has_data());
    }

    #[test]
    fn test_draw_quad_axis_aligned_covers_region() {
        let mut canvas = Canvas::new(16, 16).unwrap();
        let layer = solid_layer(4, 4, [255, 0, 0, 255]);
        let quad = [(4.0, 4.0), (12.0, 4.0), (12.0, 12.0), (4.0, 12.0)];
        assert!(canvas.draw_quad(&layer, quad));

        let tile = canvas.to_tile();
        assert_eq!(tile.pixel(8, 8), [255, 0, 0, 255]);
        assert_eq!(tile.pixel(4, 4), [255, 0, 0, 255]);
        assert_eq!(tile.pixel(2, 2)[3], 0);
        assert_eq!(tile.pixel(13, 13)[3], 0);
        assert_eq!(tile.coverage(), 64);
    }

    #[test]
    fn test_draw_quad_skewed_covers_center() {
        let mut canvas = Canvas::new(32, 32).unwrap();
        let layer = solid_layer(8, 8, [0, 255, 0, 255]);
        // Diamond, not a parallelogram
        let quad = [(16.0, 2.0), (30.0, 16.0), (16.0, 28.0), (2.0, 16.0)];
        assert!(canvas.draw_quad(&layer, quad));
        let tile = canvas.to_tile();
        assert_eq!(tile.pixel(16, 16), [0, 255, 0, 255]);
        assert_eq!(tile.pixel(1, 1)[3], 0);
        assert_eq!(tile.pixel(30, 30)[3], 0);
    }

    #[test]
    fn test_draw_quad_off_canvas() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        let layer = solid_layer(2, 2, [0, 0, 255, 255]);
        let quad = [(20.0, 20.0), (30.0, 20.0), (30.0, 30.0), (20.0, 30.0)];
        assert!(!canvas.draw_quad(&layer, quad));
        assert!(!canvas.has_data());
    }

    #[test]
    fn test_transparent_source_preserves_existing() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        canvas.draw_tile(&Tile::solid(8, 8, [10, 20, 30, 255])).unwrap();

        let mut holey = RgbaImage::from_pixel(8, 8, Rgba([200, 0, 0, 255]));
        for y in 0..8 {
            for x in 0..4 {
                holey.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        canvas.draw_tile(&Tile::from_image(holey)).unwrap();

        let tile = canvas.to_tile();
        assert_eq!(tile.pixel(1, 3), [10, 20, 30, 255]);
        assert_eq!(tile.pixel(6, 3), [200, 0, 0, 255]);
    }

    #[test]
    fn test_draw_region_downsamples_into_quadrant() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        let layer = solid_layer(8, 8, [0, 0, 255, 255]);
        let src = PixelRect::new(0.0, 0.0, 8.0, 8.0);
        let dst = PixelRect::new(4.0, 0.0, 4.0, 4.0);
        assert!(canvas.draw_region(&layer, src, dst));

        let tile = canvas.to_tile();
        assert_eq!(tile.pixel(5, 1), [0, 0, 255, 255]);
        assert_eq!(tile.pixel(1, 1)[3], 0);
        assert_eq!(tile.pixel(5, 5)[3], 0);
        assert_eq!(tile.coverage(), 16);
    }

    #[test]
    fn test_draw_region_upsamples_sub_region() {
        let mut source = RgbaImage::from_pixel(4, 4, Rgba([50, 50, 50, 255]));
        for y in 0..4 {
            source.put_pixel(3, y, Rgba([9, 9, 9, 255]));
        }
        let layer = Layer::from_image(&source).unwrap();

        let mut canvas = Canvas::new(8, 8).unwrap();
        let src = PixelRect::new(3.0, 1.0, 1.0, 2.0);
        let dst = PixelRect::new(0.0, 0.0, 8.0, 8.0);
        canvas.draw_region(&layer, src, dst);
        assert_eq!(canvas.to_tile().pixel(4, 4), [9, 9, 9, 255]);
    }

    #[test]
    fn test_load_tile_copies_exactly() {
        let mut image = RgbaImage::new(4, 4);
        image.put_pixel(0, 0, Rgba([10, 200, 30, 255]));
        image.put_pixel(3, 3, Rgba([255, 255, 255, 255]));
        let tile = Tile::from_image(image);

        let mut canvas = Canvas::new(4, 4).unwrap();
        canvas.draw_tile(&Tile::solid(4, 4, [1, 1, 1, 255])).unwrap();
        canvas.load_tile(&tile).unwrap();
        assert_eq!(canvas.to_tile(), tile);
    }

    #[test]
    fn test_reset_clears_and_resizes() {
        let mut canvas = Canvas::new(4, 4).unwrap();
        canvas.draw_tile(&Tile::solid(4, 4, [1, 2, 3, 255])).unwrap();
        canvas.reset(4, 4).unwrap();
        assert!(!canvas.has_data());
        canvas.reset(6, 2).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (6, 2));
    }
}
