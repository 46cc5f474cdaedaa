//! Ingest command - mosaic the frames listed in a manifest.

use std::path::Path;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use mosaiclayer::{Mosaic, TileFailure};

use crate::error::CliError;
use crate::manifest::{parse_manifest, ManifestEntry};
use crate::runner::CliRunner;

/// Result of ingesting a manifest.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub mosaicked: usize,
    /// Frames skipped with the reason they were rejected
    pub skipped: Vec<(String, String)>,
    /// Tiles that failed within otherwise successful updates
    pub failed_tiles: Vec<TileFailure>,
}

/// Run the ingest command.
pub fn run(config_path: Option<&Path>, manifest: &Path) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("ingest");

    let entries = parse_manifest(manifest)?;
    let mosaic = runner.open_mosaic()?;

    println!("Ingesting {} frames from {}", entries.len(), manifest.display());
    let start = Instant::now();

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let summary = ingest_entries(&mosaic, &entries, &progress);
    progress.finish_and_clear();
    let summary = summary?;

    println!(
        "Mosaicked {} frames in {:.2}s (version {})",
        summary.mosaicked,
        start.elapsed().as_secs_f64(),
        mosaic.version()
    );
    for (name, reason) in &summary.skipped {
        println!("  skipped {}: {}", name, reason);
    }
    if !summary.failed_tiles.is_empty() {
        println!("{} tiles could not be written:", summary.failed_tiles.len());
        for failure in &summary.failed_tiles {
            println!(
                "  {}/{}/{} ({}): {}",
                failure.key.zoom, failure.key.col, failure.key.row, failure.stage, failure.reason
            );
        }
    }
    Ok(())
}

/// Mosaics `entries` in order.
///
/// Frames that cannot be read or fail validation are skipped. Any other
/// failure stops the ingest.
pub fn ingest_entries(
    mosaic: &Mosaic,
    entries: &[ManifestEntry],
    progress: &ProgressBar,
) -> Result<IngestSummary, CliError> {
    let projection = mosaic.pyramid().projection();
    let mut summary = IngestSummary::default();

    for entry in entries {
        progress.set_message(entry.name.clone());

        let frame = match entry.load_frame(projection) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(frame = %entry.name, error = %e, "Skipping frame");
                summary.skipped.push((entry.name.clone(), e.to_string()));
                progress.inc(1);
                continue;
            }
        };

        match mosaic.update_mosaic(&frame) {
            Ok(report) => {
                info!(
                    frame = %entry.name,
                    zoom = report.zoom,
                    merged = report.tiles_merged,
                    "Frame ingested"
                );
                summary.mosaicked += 1;
                summary.failed_tiles.extend(report.failed_tiles);
            }
            Err(e) if e.is_invalid_input() => {
                warn!(frame = %entry.name, error = %e, "Skipping frame");
                summary.skipped.push((entry.name.clone(), e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        progress.inc(1);
    }

    Ok(summary)
}
