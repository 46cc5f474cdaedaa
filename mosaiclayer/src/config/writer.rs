//! INI serialization: `ConfigFile` → commented INI string.

use std::path::Path;

use super::settings::ConfigFile;
use crate::coord::Projection;
use crate::service::IngestMode;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let projection = match config.pyramid.projection {
        Projection::Equirectangular => "equirectangular",
        Projection::WebMercator => "web_mercator",
    };
    let extent = config
        .pyramid
        .extent
        .map(|e| format!("{},{},{},{}", e.min_x, e.min_y, e.max_x, e.max_y))
        .unwrap_or_default();
    let [r, g, b, a] = config.background.placeholder_color;
    let mode = match config.ingest.mode {
        IngestMode::Queued => "queued",
        IngestMode::LatestOnly => "latest",
    };

    format!(
        r#"[pyramid]
; Projection of the tile grid: equirectangular (EPSG:4326) or web_mercator (EPSG:3857)
projection = {projection}
; Coarsest and finest zoom level numbers (0-24)
min_level = {min_level}
max_level = {max_level}
; Tile edge length in pixels
tile_size = {tile_size}
; Projected extent as min_x,min_y,max_x,max_y (empty = whole world)
extent = {extent}

[store]
; memory - tiles are lost on exit
; disk   - one PNG file per tile under directory
backend = {backend}
directory = {directory}

[background]
; What is shown where no frame has been ingested:
;   empty       - nothing
;   ancestors   - coarser ingested imagery, upsampled
;   placeholder - solid placeholder_color tiles
kind = {kind}
placeholder_color = {r},{g},{b},{a}

[ingest]
; queued - every submitted frame is mosaicked, in order
; latest - a newer frame replaces one still waiting
mode = {mode}
queue_capacity = {queue_capacity}

[logging]
file = {log_file}
"#,
        min_level = config.pyramid.min_level,
        max_level = config.pyramid.max_level,
        tile_size = config.pyramid.tile_size,
        backend = config.store.backend,
        directory = path_to_string(&config.store.directory),
        kind = config.background.kind,
        queue_capacity = config.ingest.queue_capacity,
        log_file = path_to_string(&config.logging.file),
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
