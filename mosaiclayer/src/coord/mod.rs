//! Coordinate types and projections
//!
//! Frames arrive with geographic corners; the tile pyramid lives in a single
//! projected spatial reference. This module holds the value types shared by
//! both sides ([`GeoPoint`], [`Envelope`], [`TileKey`]) and the [`Projection`]
//! that maps one onto the other.

mod projection;
mod types;

pub use projection::{Projection, EARTH_RADIUS_M, WEB_MERCATOR_HALF_EXTENT};
pub use types::{
    CoordError, Envelope, GeoPoint, TileKey, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
};

/// Projects every corner and returns the projected points in input order.
///
/// # Errors
///
/// Returns the first `CoordError` produced by the projection.
pub fn project_corners(
    projection: Projection,
    corners: &[GeoPoint; 4],
) -> Result<[(f64, f64); 4], CoordError> {
    let mut out = [(0.0, 0.0); 4];
    for (slot, corner) in out.iter_mut().zip(corners.iter()) {
        *slot = projection.forward(corner)?;
    }
    Ok(out)
}

/// Bounding envelope of a quadrilateral footprint in projected coordinates.
pub fn footprint_envelope(
    projection: Projection,
    corners: &[GeoPoint; 4],
) -> Result<Envelope, CoordError> {
    let projected = project_corners(projection, corners)?;
    // Four points always yield an envelope
    Ok(Envelope::from_points(projected).unwrap_or(Envelope::new(0.0, 0.0, 0.0, 0.0)))
}
