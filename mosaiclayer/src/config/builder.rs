//! Turning settings into a running mosaic.

use std::sync::Arc;

use tracing::info;

use super::settings::{BackgroundKind, BackgroundSettings, ConfigFile, StoreBackend, StoreSettings};
use crate::background::{EmptyBackground, PlaceholderBackground};
use crate::error::MosaicError;
use crate::mosaic::Mosaic;
use crate::pyramid::{PyramidError, TilePyramid};

/// Validated mosaic settings: a concrete pyramid plus where its tiles live.
#[derive(Debug, Clone)]
pub struct MosaicConfig {
    pub pyramid: TilePyramid,
    pub store: StoreSettings,
    pub background: BackgroundSettings,
}

impl MosaicConfig {
    /// Builds the pyramid described by `config`.
    pub fn from_config_file(config: &ConfigFile) -> Result<Self, PyramidError> {
        let settings = &config.pyramid;
        let extent = settings
            .extent
            .unwrap_or_else(|| settings.projection.world_extent());
        let pyramid = TilePyramid::quadtree(
            settings.projection,
            extent,
            settings.tile_size,
            settings.min_level,
            settings.max_level,
        )?;
        Ok(Self {
            pyramid,
            store: config.store.clone(),
            background: config.background.clone(),
        })
    }

    /// Opens the mosaic on the configured backend with the configured
    /// background.
    pub fn open(&self) -> Result<Mosaic, MosaicError> {
        let mosaic = match self.store.backend {
            StoreBackend::Memory => Mosaic::in_memory(self.pyramid.clone()),
            StoreBackend::Disk => Mosaic::open(&self.store.directory, self.pyramid.clone())?,
        };
        let mosaic = match self.background.kind {
            BackgroundKind::Ancestors => mosaic,
            BackgroundKind::Empty => mosaic.with_background(Arc::new(EmptyBackground)),
            BackgroundKind::Placeholder => {
                mosaic.with_background(Arc::new(PlaceholderBackground::new(
                    Arc::new(self.pyramid.clone()),
                    self.background.placeholder_color,
                )))
            }
        };
        info!(
            backend = %self.store.backend,
            background = %self.background.kind,
            levels = self.pyramid.len(),
            "Mosaic opened"
        );
        Ok(mosaic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{Envelope, Projection};
    use tempfile::TempDir;

    #[test]
    fn test_default_config_builds_web_mercator_grid() {
        let config = MosaicConfig::from_config_file(&ConfigFile::default()).unwrap();
        assert_eq!(config.pyramid.projection(), Projection::WebMercator);
        assert_eq!(config.pyramid.len(), 19);
        assert_eq!(config.pyramid.levels()[0].tile_width, 256);
    }

    #[test]
    fn test_invalid_level_range_is_rejected() {
        let mut file = ConfigFile::default();
        file.pyramid.min_level = 5;
        file.pyramid.max_level = 2;
        assert!(matches!(
            MosaicConfig::from_config_file(&file),
            Err(PyramidError::InvalidLevelRange { min: 5, max: 2 })
        ));
    }

    #[test]
    fn test_open_memory_mosaic_with_placeholder() {
        let mut file = ConfigFile::default();
        file.pyramid.projection = Projection::Equirectangular;
        file.pyramid.extent = Some(Envelope::new(0.0, 0.0, 64.0, 64.0));
        file.pyramid.max_level = 2;
        file.pyramid.tile_size = 8;
        file.store.backend = StoreBackend::Memory;
        file.background.kind = BackgroundKind::Placeholder;
        file.background.placeholder_color = [1, 2, 3, 255];

        let mosaic = MosaicConfig::from_config_file(&file).unwrap().open().unwrap();
        let tile = mosaic.tiles().get_tile(2, 1, 1).unwrap().unwrap();
        assert_eq!(tile.pixel(0, 0), [1, 2, 3, 255]);
        assert_eq!(mosaic.background().name(), "placeholder");
    }

    #[test]
    fn test_open_disk_mosaic_creates_store_directories() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = ConfigFile::default();
        file.pyramid.max_level = 3;
        file.store.directory = temp_dir.path().join("tiles");

        let mosaic = MosaicConfig::from_config_file(&file).unwrap().open().unwrap();
        assert_eq!(mosaic.source_store().name(), "source");
        assert!(temp_dir.path().join("tiles").join("source").exists());
        assert!(temp_dir.path().join("tiles").join("foreground").exists());
    }
}
