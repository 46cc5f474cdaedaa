//! CLI command implementations.
//!
//! - [`export`] - Write a single tile to disk
//! - [`info`] - Pyramid and tile count summary
//! - [`ingest`] - Mosaic the frames of a manifest
//! - [`init`] - Configuration initialization

pub mod export;
pub mod info;
pub mod ingest;
pub mod init;
