//! Configuration for MosaicLayer.
//!
//! Settings are read from `~/.mosaiclayer/config.ini`. Every key is optional;
//! missing keys keep their defaults.
//!
//! ```ini
//! [pyramid]
//! projection = web_mercator
//! min_level = 0
//! max_level = 18
//! tile_size = 256
//!
//! [store]
//! backend = disk
//! directory = ~/.mosaiclayer/tiles
//!
//! [background]
//! kind = ancestors
//!
//! [ingest]
//! mode = queued
//! queue_capacity = 16
//! ```
//!
//! [`MosaicConfig`] turns a loaded [`ConfigFile`] into a pyramid and opens
//! the mosaic it describes.

mod builder;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use builder::MosaicConfig;
pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BackgroundKind, BackgroundSettings, ConfigFile, IngestSettings, LoggingSettings,
    PyramidSettings, StoreBackend, StoreSettings,
};
