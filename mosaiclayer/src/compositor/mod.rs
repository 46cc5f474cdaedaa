//! Tile compositor
//!
//! Stateless operations over a source store and a foreground store that
//! together implement one mosaic update:
//!
//! ```text
//!  Frame ──► select level ──► merge_frame ──► regenerate_foreground ──► propagate_upward
//!                 │              (source)        (foreground, level c)    (foreground, c-1 .. 0)
//!                 ▼
//!          finest level with resolution >= max_gsd
//! ```
//!
//! Every pass over a level runs its tiles in parallel on rayon. Each worker
//! owns one [`Canvas`] that is reset before every tile. Per-tile encode
//! failures are collected into the pass outcome; any other store error
//! aborts the pass.

mod foreground;
mod merge;
mod report;

pub use foreground::{composite_children, propagate_upward, rebuild_region, regenerate_foreground};
pub use merge::merge_frame;
pub use report::{
    EvictionReport, LevelOutcome, PropagationOutcome, RebuildOutcome, Stage, TileFailure,
    UpdateReport,
};

use rayon::prelude::*;
use tracing::warn;

use crate::coord::{Envelope, TileKey};
use crate::pyramid::{TilePyramid, ZoomLevel};
use crate::raster::{Canvas, RasterError};
use crate::store::{StoreError, TileStore};

/// Picks the level a frame with the given `max_gsd` is merged at.
///
/// Walks from the finest level toward the coarsest and returns the first
/// level whose resolution is at least `max_gsd`; equality qualifies. Falls
/// back to the coarsest level when the frame is coarser than every level.
///
/// Returns the level index together with the level.
pub fn select_composite_zoom_level(pyramid: &TilePyramid, max_gsd: f64) -> (usize, &ZoomLevel) {
    let index = pyramid.select_composite_level_index(max_gsd);
    (index, &pyramid.levels()[index])
}

/// Deletes every tile at `zoom` whose footprint lies entirely inside
/// `envelope`.
///
/// Tiles the envelope only partly covers are kept. Returns the number of
/// tiles removed.
pub fn evict_tiles(
    store: &dyn TileStore,
    zoom: u8,
    envelope: &Envelope,
) -> Result<usize, StoreError> {
    let pyramid = store.pyramid();
    let keys = stored_keys(store, zoom, envelope)?;
    let mut removed = 0;
    for key in keys {
        let inside = pyramid
            .key_bounds(&key)
            .is_some_and(|bounds| envelope.contains(&bounds));
        if inside && store.delete(&key)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Keys present in `store` at `zoom` intersecting `envelope`.
fn stored_keys(
    store: &dyn TileStore,
    zoom: u8,
    envelope: &Envelope,
) -> Result<Vec<TileKey>, StoreError> {
    let mut keys = Vec::new();
    store.for_each_tile(zoom, envelope, &mut |key| {
        keys.push(key);
        true
    })?;
    Ok(keys)
}

/// Runs `work` over `keys` in parallel and folds the per-tile results.
///
/// `work` returns `Ok(true)` when it wrote a tile and `Ok(false)` when there
/// was nothing to write. Recoverable errors are recorded against `stage`;
/// the first fatal error is returned.
fn process_level<F>(keys: &[TileKey], stage: Stage, work: F) -> Result<LevelOutcome, StoreError>
where
    F: Fn(&mut Option<Canvas>, &TileKey) -> Result<bool, StoreError> + Sync + Send,
{
    let results: Vec<(TileKey, Result<bool, StoreError>)> = keys
        .par_iter()
        .map_init(|| None, |canvas, key| (*key, work(canvas, key)))
        .collect();

    let mut outcome = LevelOutcome::default();
    for (key, result) in results {
        match result {
            Ok(true) => outcome.written += 1,
            Ok(false) => {}
            Err(e) if e.is_recoverable() => {
                warn!(tile = %key, stage = %stage, error = %e, "Tile skipped");
                outcome.failures.push(TileFailure {
                    key,
                    stage,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcome)
}

/// Clears the worker's canvas to the level's tile size, allocating it on
/// first use.
fn prepare_canvas<'a>(
    slot: &'a mut Option<Canvas>,
    level: &ZoomLevel,
) -> Result<&'a mut Canvas, StoreError> {
    let (width, height) = (level.tile_width, level.tile_height);
    if let Some(canvas) = slot.as_mut() {
        canvas.reset(width, height)?;
    } else {
        *slot = Some(Canvas::new(width, height)?);
    }
    slot.as_mut()
        .ok_or(StoreError::Raster(RasterError::InvalidSize { width, height }))
}
