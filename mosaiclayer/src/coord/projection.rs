//! Projections from geographic corners into a pyramid's spatial reference.

use std::f64::consts::PI;

use super::types::{CoordError, Envelope, GeoPoint, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Semi-major axis of the WGS84 ellipsoid, as used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the width of the Web Mercator square, in metres.
pub const WEB_MERCATOR_HALF_EXTENT: f64 = PI * EARTH_RADIUS_M;

/// Spatial reference of a tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Plate carrée: x = longitude, y = latitude (EPSG:4326 axis order swapped).
    #[default]
    Equirectangular,
    /// Spherical Mercator in metres (EPSG:3857).
    WebMercator,
}

impl Projection {
    /// EPSG code of the projected reference.
    pub fn srid(&self) -> u32 {
        match self {
            Projection::Equirectangular => 4326,
            Projection::WebMercator => 3857,
        }
    }

    /// Metres represented by one projected unit at the equator.
    pub fn metres_per_unit(&self) -> f64 {
        match self {
            Projection::Equirectangular => 2.0 * PI * EARTH_RADIUS_M / 360.0,
            Projection::WebMercator => 1.0,
        }
    }

    /// Full projected extent of the reference.
    pub fn world_extent(&self) -> Envelope {
        match self {
            Projection::Equirectangular => Envelope::new(-180.0, -90.0, 180.0, 90.0),
            Projection::WebMercator => Envelope::new(
                -WEB_MERCATOR_HALF_EXTENT,
                -WEB_MERCATOR_HALF_EXTENT,
                WEB_MERCATOR_HALF_EXTENT,
                WEB_MERCATOR_HALF_EXTENT,
            ),
        }
    }

    /// Projects a geographic point to `(x, y)`.
    pub fn forward(&self, point: &GeoPoint) -> Result<(f64, f64), CoordError> {
        if !point.is_finite() {
            return Err(CoordError::NonFinite(*point));
        }
        match self {
            Projection::Equirectangular => Ok((point.lon, point.lat)),
            Projection::WebMercator => {
                if !(MIN_LAT..=MAX_LAT).contains(&point.lat) {
                    return Err(CoordError::InvalidLatitude(point.lat));
                }
                if !(MIN_LON..=MAX_LON).contains(&point.lon) {
                    return Err(CoordError::InvalidLongitude(point.lon));
                }
                let x = point.lon.to_radians() * EARTH_RADIUS_M;
                let lat_rad = point.lat.to_radians();
                let y = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() * EARTH_RADIUS_M;
                Ok((x, y))
            }
        }
    }

    /// Inverse of [`Projection::forward`].
    pub fn inverse(&self, x: f64, y: f64) -> GeoPoint {
        match self {
            Projection::Equirectangular => GeoPoint::new(y, x),
            Projection::WebMercator => {
                let lon = (x / EARTH_RADIUS_M).to_degrees();
                let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
                GeoPoint::new(lat, lon)
            }
        }
    }
}
