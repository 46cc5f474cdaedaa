//! Default values for every configuration setting.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::background::DEFAULT_PLACEHOLDER_COLOR;
use crate::coord::Projection;
use crate::service::IngestMode;

/// Projection of the default pyramid.
pub const DEFAULT_PROJECTION: Projection = Projection::WebMercator;

/// Coarsest level of the default pyramid.
pub const DEFAULT_MIN_LEVEL: u8 = 0;

/// Finest level of the default pyramid.
pub const DEFAULT_MAX_LEVEL: u8 = 18;

/// Tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Frames the ingestion service buffers in queued mode.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default tile directory (~/.mosaiclayer/tiles).
pub fn default_store_directory() -> PathBuf {
    config_directory().join("tiles")
}

/// Default log file (~/.mosaiclayer/mosaiclayer.log).
pub fn default_log_file() -> PathBuf {
    config_directory().join("mosaiclayer.log")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            pyramid: PyramidSettings {
                projection: DEFAULT_PROJECTION,
                min_level: DEFAULT_MIN_LEVEL,
                max_level: DEFAULT_MAX_LEVEL,
                tile_size: DEFAULT_TILE_SIZE,
                extent: None,
            },
            store: StoreSettings {
                backend: StoreBackend::Disk,
                directory: default_store_directory(),
            },
            background: BackgroundSettings {
                kind: BackgroundKind::Ancestors,
                placeholder_color: DEFAULT_PLACEHOLDER_COLOR,
            },
            ingest: IngestSettings {
                mode: IngestMode::Queued,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
