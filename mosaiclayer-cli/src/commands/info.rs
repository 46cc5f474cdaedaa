//! Info command - show the configured pyramid and what the mosaic holds.

use std::path::Path;

use mosaiclayer::{Mosaic, StoreError};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Tile counts for one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub level: u8,
    pub resolution: f64,
    pub grid: (u32, u32),
    pub source_tiles: usize,
    pub foreground_tiles: usize,
}

/// Run the info command.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("info");
    let config = runner.config();
    let mosaic = runner.open_mosaic()?;
    let pyramid = mosaic.pyramid();

    println!("MosaicLayer v{}", mosaiclayer::VERSION);
    println!();
    let projection = pyramid.projection();
    println!("Projection:  {:?} (EPSG:{})", projection, projection.srid());
    let extent = pyramid.extent();
    println!(
        "Extent:      {:.3},{:.3} .. {:.3},{:.3}",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    println!("Store:       {}", config.store.backend);
    println!("Background:  {}", mosaic.background().name());
    println!();
    println!(
        "{:>5}  {:>14}  {:>13}  {:>10}  {:>10}",
        "level", "m/pixel", "grid", "source", "foreground"
    );
    for level in level_summaries(&mosaic)? {
        println!(
            "{:>5}  {:>14.3}  {:>13}  {:>10}  {:>10}",
            level.level,
            level.resolution,
            format!("{}x{}", level.grid.0, level.grid.1),
            level.source_tiles,
            level.foreground_tiles
        );
    }
    Ok(())
}

/// Per-level tile counts of both stores, coarsest first.
pub fn level_summaries(mosaic: &Mosaic) -> Result<Vec<LevelSummary>, StoreError> {
    let pyramid = mosaic.pyramid();
    let source = mosaic.source_store();
    let foreground = mosaic.foreground_store();

    pyramid
        .levels()
        .iter()
        .enumerate()
        .map(|(index, level)| {
            Ok(LevelSummary {
                level: level.level,
                resolution: level.resolution,
                grid: pyramid.grid_size(index),
                source_tiles: source.tile_count(level.level)?,
                foreground_tiles: foreground.tile_count(level.level)?,
            })
        })
        .collect()
}
