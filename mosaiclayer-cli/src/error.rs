//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use mosaiclayer::config::ConfigFileError;
use mosaiclayer::pyramid::PyramidError;
use mosaiclayer::{MosaicError, StoreError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Configured pyramid is invalid
    Pyramid(PyramidError),
    /// Mosaic could not be opened or updated
    Mosaic(MosaicError),
    /// Tile store failure outside an update
    Store(StoreError),
    /// Frame manifest is malformed
    Manifest { path: PathBuf, reason: String },
    /// Frame image could not be read
    ImageRead {
        path: PathBuf,
        error: image::ImageError,
    },
    /// Failed to write output file
    FileWrite {
        path: PathBuf,
        error: image::ImageError,
    },
    /// Neither foreground nor background has the tile
    TileNotFound { zoom: u8, col: u32, row: u32 },
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Run 'mosaiclayer init --force' to write a fresh default config.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Pyramid(e) => write!(f, "Invalid pyramid configuration: {}", e),
            CliError::Mosaic(e) => write!(f, "Mosaic error: {}", e),
            CliError::Store(e) => write!(f, "Tile store error: {}", e),
            CliError::Manifest { path, reason } => {
                write!(f, "Invalid manifest '{}': {}", path.display(), reason)
            }
            CliError::ImageRead { path, error } => {
                write!(f, "Failed to read image '{}': {}", path.display(), error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
            CliError::TileNotFound { zoom, col, row } => {
                write!(f, "No tile at {}/{}/{}", zoom, col, row)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Pyramid(e) => Some(e),
            CliError::Mosaic(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::ImageRead { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<PyramidError> for CliError {
    fn from(e: PyramidError) -> Self {
        CliError::Pyramid(e)
    }
}

impl From<MosaicError> for CliError {
    fn from(e: MosaicError) -> Self {
        CliError::Mosaic(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}
