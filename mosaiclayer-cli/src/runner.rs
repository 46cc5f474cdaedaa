//! CLI runner for common setup.
//!
//! Loads the configuration, initializes logging and opens the mosaic the
//! configuration describes.

use std::path::Path;

use tracing::info;

use mosaiclayer::config::{ConfigFile, MosaicConfig};
use mosaiclayer::logging::{init_logging, LoggingGuard};
use mosaiclayer::Mosaic;

use crate::error::CliError;

/// Runner that manages the CLI lifecycle.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads `config_path` (or the default config) and initializes logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("MosaicLayer v{}", mosaiclayer::VERSION);
        info!("MosaicLayer CLI: {} command", command);
    }

    /// Opens the configured mosaic.
    pub fn open_mosaic(&self) -> Result<Mosaic, CliError> {
        let mosaic_config = MosaicConfig::from_config_file(&self.config)?;
        Ok(mosaic_config.open()?)
    }
}
