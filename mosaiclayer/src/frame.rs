//! Geo-referenced raster frames, the unit of ingestion.

use image::RgbaImage;
use thiserror::Error;

use crate::coord::{project_corners, CoordError, Envelope, GeoPoint, Projection};

/// Index of each corner within [`Frame::corners`].
pub const UPPER_LEFT: usize = 0;
pub const UPPER_RIGHT: usize = 1;
pub const LOWER_RIGHT: usize = 2;
pub const LOWER_LEFT: usize = 3;

/// Reasons a frame is rejected before any store is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("Frame has no pixels ({width}x{height})")]
    EmptyPixels { width: u32, height: u32 },

    #[error("Frame corner {index} is not a finite coordinate: {point}")]
    NonFiniteCorner { index: usize, point: GeoPoint },

    #[error("Frame corner cannot be projected: {0}")]
    Projection(#[from] CoordError),

    #[error("Frame footprint is degenerate (area {area})")]
    DegenerateFootprint { area: f64 },

    #[error("Invalid ground sample distance: {0}")]
    InvalidGsd(f64),
}

/// One raster frame with its footprint on the ground.
///
/// Corners may describe any convex quadrilateral; rotated or skewed frames
/// are warped onto the tile grid when merged.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Upper-left, upper-right, lower-right, lower-left
    pub corners: [GeoPoint; 4],
    /// Coarsest ground sample distance (metres per pixel) the frame is
    /// still useful at
    pub max_gsd: f64,
    /// Pixel data; fully transparent pixels carry no data
    pub pixels: RgbaImage,
}

impl Frame {
    pub fn new(corners: [GeoPoint; 4], max_gsd: f64, pixels: RgbaImage) -> Self {
        Self {
            corners,
            max_gsd,
            pixels,
        }
    }

    /// Builds a frame whose `max_gsd` is derived from its footprint.
    ///
    /// The estimate is the mean length of the two projected diagonals divided
    /// by the pixel diagonal, expressed in the projection's nominal metres.
    ///
    /// # Errors
    ///
    /// Returns `FrameError` if the corners cannot be projected or the image is
    /// empty.
    pub fn with_estimated_gsd(
        corners: [GeoPoint; 4],
        pixels: RgbaImage,
        projection: Projection,
    ) -> Result<Self, FrameError> {
        check_pixels(&pixels)?;
        let projected = project_all(projection, &corners)?;
        let gsd = estimate_gsd(&projected, pixels.width(), pixels.height())
            * projection.metres_per_unit();
        Ok(Self::new(corners, gsd, pixels))
    }

    pub fn upper_left(&self) -> GeoPoint {
        self.corners[UPPER_LEFT]
    }

    pub fn upper_right(&self) -> GeoPoint {
        self.corners[UPPER_RIGHT]
    }

    pub fn lower_right(&self) -> GeoPoint {
        self.corners[LOWER_RIGHT]
    }

    pub fn lower_left(&self) -> GeoPoint {
        self.corners[LOWER_LEFT]
    }

    /// Validates the frame and returns its projected corners and envelope.
    ///
    /// # Errors
    ///
    /// Returns `FrameError` for an empty image, a non-finite or unprojectable
    /// corner, a zero-area footprint, or a non-positive `max_gsd`.
    pub fn validate(&self, projection: Projection) -> Result<ProjectedFrame, FrameError> {
        check_pixels(&self.pixels)?;
        if !self.max_gsd.is_finite() || self.max_gsd <= 0.0 {
            return Err(FrameError::InvalidGsd(self.max_gsd));
        }
        let corners = project_all(projection, &self.corners)?;

        let area = shoelace_area(&corners);
        let envelope =
            Envelope::from_points(corners).unwrap_or(Envelope::new(0.0, 0.0, 0.0, 0.0));
        if area == 0.0
            || !area.is_finite()
            || envelope.width() <= 0.0
            || envelope.height() <= 0.0
        {
            return Err(FrameError::DegenerateFootprint { area });
        }

        Ok(ProjectedFrame { corners, envelope })
    }
}

/// Frame corners in the pyramid's projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedFrame {
    /// Same order as [`Frame::corners`]
    pub corners: [(f64, f64); 4],
    /// Minimum bounding box of the corners
    pub envelope: Envelope,
}

fn check_pixels(pixels: &RgbaImage) -> Result<(), FrameError> {
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(FrameError::EmptyPixels {
            width: pixels.width(),
            height: pixels.height(),
        });
    }
    Ok(())
}

fn project_all(
    projection: Projection,
    corners: &[GeoPoint; 4],
) -> Result<[(f64, f64); 4], FrameError> {
    if let Some((index, point)) = corners.iter().enumerate().find(|(_, p)| !p.is_finite()) {
        return Err(FrameError::NonFiniteCorner {
            index,
            point: *point,
        });
    }
    Ok(project_corners(projection, corners)?)
}

/// Signed area of the quadrilateral (positive when counter-clockwise).
fn shoelace_area(corners: &[(f64, f64); 4]) -> f64 {
    let mut sum = 0.0;
    for i in 0..4 {
        let (x0, y0) = corners[i];
        let (x1, y1) = corners[(i + 1) % 4];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

fn estimate_gsd(corners: &[(f64, f64); 4], width: u32, height: u32) -> f64 {
    let dist = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let diag_a = dist(corners[UPPER_LEFT], corners[LOWER_RIGHT]);
    let diag_b = dist(corners[UPPER_RIGHT], corners[LOWER_LEFT]);
    let pixel_diag = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    (diag_a + diag_b) / 2.0 / pixel_diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn square_corners(size: f64) -> [GeoPoint; 4] {
        [
            GeoPoint::new(size, 0.0),
            GeoPoint::new(size, size),
            GeoPoint::new(0.0, size),
            GeoPoint::new(0.0, 0.0),
        ]
    }

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
    }

    #[test]
    fn test_validate_accepts_square() {
        let frame = Frame::new(square_corners(1.0), 1.0, opaque(4, 4));
        let projected = frame.validate(Projection::Equirectangular).unwrap();
        assert_eq!(projected.envelope, Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(projected.corners[UPPER_LEFT], (0.0, 1.0));
    }

    #[test]
    fn test_validate_rejects_empty_pixels() {
        let frame = Frame::new(square_corners(1.0), 1.0, RgbaImage::new(0, 3));
        assert_eq!(
            frame.validate(Projection::Equirectangular).unwrap_err(),
            FrameError::EmptyPixels {
                width: 0,
                height: 3
            }
        );
    }

    #[test]
    fn test_validate_rejects_collinear_corners() {
        let corners = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(3.0, 3.0),
        ];
        let frame = Frame::new(corners, 1.0, opaque(2, 2));
        assert!(matches!(
            frame.validate(Projection::Equirectangular),
            Err(FrameError::DegenerateFootprint { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_coincident_corners() {
        let corners = [GeoPoint::new(5.0, 5.0); 4];
        let frame = Frame::new(corners, 1.0, opaque(2, 2));
        assert!(matches!(
            frame.validate(Projection::Equirectangular),
            Err(FrameError::DegenerateFootprint { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_nan_corner() {
        let mut corners = square_corners(1.0);
        corners[2] = GeoPoint::new(f64::NAN, 0.0);
        let frame = Frame::new(corners, 1.0, opaque(2, 2));
        assert!(matches!(
            frame.validate(Projection::Equirectangular),
            Err(FrameError::NonFiniteCorner { index: 2, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_gsd() {
        let frame = Frame::new(square_corners(1.0), 0.0, opaque(2, 2));
        assert_eq!(
            frame.validate(Projection::Equirectangular).unwrap_err(),
            FrameError::InvalidGsd(0.0)
        );
    }

    #[test]
    fn test_validate_rejects_out_of_domain() {
        let mut corners = square_corners(1.0);
        corners[0] = GeoPoint::new(88.0, 0.0);
        let frame = Frame::new(corners, 1.0, opaque(2, 2));
        assert!(matches!(
            frame.validate(Projection::WebMercator),
            Err(FrameError::Projection(CoordError::InvalidLatitude(_)))
        ));
    }

    #[test]
    fn test_estimated_gsd() {
        // 1 degree square over 100x100 pixels
        let frame = Frame::with_estimated_gsd(
            square_corners(1.0),
            opaque(100, 100),
            Projection::Equirectangular,
        )
        .unwrap();
        let expected = 0.01 * Projection::Equirectangular.metres_per_unit();
        assert!((frame.max_gsd - expected).abs() < 1e-6);
    }

    #[test]
    fn test_corner_accessors() {
        let frame = Frame::new(square_corners(2.0), 1.0, opaque(1, 1));
        assert_eq!(frame.upper_left(), GeoPoint::new(2.0, 0.0));
        assert_eq!(frame.upper_right(), GeoPoint::new(2.0, 2.0));
        assert_eq!(frame.lower_right(), GeoPoint::new(0.0, 2.0));
        assert_eq!(frame.lower_left(), GeoPoint::new(0.0, 0.0));
    }
}
