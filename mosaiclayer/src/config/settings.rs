//! Settings structs, one per `[section]` of the INI file.

use std::fmt;
use std::path::PathBuf;

use crate::coord::{Envelope, Projection};
use crate::service::IngestMode;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub pyramid: PyramidSettings,
    pub store: StoreSettings,
    pub background: BackgroundSettings,
    pub ingest: IngestSettings,
    pub logging: LoggingSettings,
}

/// Tile grid of the mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidSettings {
    pub projection: Projection,
    pub min_level: u8,
    pub max_level: u8,
    /// Tile edge length in pixels
    pub tile_size: u32,
    /// Projected extent; the projection's whole world when `None`
    pub extent: Option<Envelope>,
}

/// Where tiles are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Disk,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Disk => "disk",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Root of the disk store; ignored for the memory backend
    pub directory: PathBuf,
}

/// Fallback shown where the foreground has no tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Empty,
    Ancestors,
    Placeholder,
}

impl BackgroundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundKind::Empty => "empty",
            BackgroundKind::Ancestors => "ancestors",
            BackgroundKind::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for BackgroundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSettings {
    pub kind: BackgroundKind,
    /// RGBA colour used by the placeholder background
    pub placeholder_color: [u8; 4],
}

/// Ingestion service behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub mode: IngestMode,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}
