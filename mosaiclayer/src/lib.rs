//! MosaicLayer - incremental multi-resolution mosaicking of geo-referenced
//! imagery frames.
//!
//! Frames (a raster plus four ground corners) are merged into a tile pyramid
//! at the level matching their ground sample distance. Every coarser level
//! touched by the frame is then rebuilt, so renderers reading the
//! [`CompositeView`] always see a consistent pyramid.
//!
//! # Example
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use mosaiclayer::coord::{Envelope, GeoPoint, Projection};
//! use mosaiclayer::{Frame, Mosaic, TilePyramid};
//!
//! let pyramid = TilePyramid::quadtree(
//!     Projection::Equirectangular,
//!     Envelope::new(0.0, 0.0, 64.0, 64.0),
//!     8,
//!     0,
//!     2,
//! )
//! .unwrap();
//! let mosaic = Mosaic::in_memory(pyramid);
//!
//! let corners = [
//!     GeoPoint::new(62.0, 2.0),
//!     GeoPoint::new(62.0, 14.0),
//!     GeoPoint::new(50.0, 14.0),
//!     GeoPoint::new(50.0, 2.0),
//! ];
//! let frame = Frame::new(corners, 1.0, RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
//! let report = mosaic.update_mosaic(&frame).unwrap();
//!
//! assert_eq!(report.zoom, 2);
//! assert_eq!(mosaic.version(), 1);
//! assert!(mosaic.tiles().get_tile(0, 0, 0).unwrap().is_some());
//! ```

pub mod background;
pub mod compositor;
pub mod config;
pub mod coord;
pub mod error;
pub mod frame;
pub mod logging;
pub mod mosaic;
pub mod pyramid;
pub mod raster;
pub mod service;
pub mod store;
pub mod tile;
pub mod view;

pub use background::{
    AncestorBackground, BackgroundTileSource, EmptyBackground, PlaceholderBackground,
};
pub use compositor::{EvictionReport, TileFailure, UpdateReport};
pub use coord::{Envelope, GeoPoint, Projection, TileKey};
pub use error::MosaicError;
pub use frame::{Frame, FrameError};
pub use mosaic::Mosaic;
pub use pyramid::{TilePyramid, ZoomLevel};
pub use store::{DiskTileStore, MemoryTileStore, StoreError, TileStore};
pub use tile::Tile;
pub use view::CompositeView;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
