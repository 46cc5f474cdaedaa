//! Foreground regeneration and upward propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::debug;

use super::{
    prepare_canvas, process_level, stored_keys, LevelOutcome, PropagationOutcome, RebuildOutcome,
    Stage,
};
use crate::background::copy_intersecting_region;
use crate::coord::{Envelope, TileKey};
use crate::pyramid::TilePyramid;
use crate::raster::{Canvas, Layer};
use crate::store::{StoreError, TileStore};

/// Draws the next-finer foreground tiles that subdivide `(col, row)` at
/// level `index` onto `canvas`, each scaled into its sub-region.
///
/// Missing children contribute nothing. Returns the number of children drawn.
pub fn composite_children(
    foreground: &dyn TileStore,
    pyramid: &TilePyramid,
    index: usize,
    col: u32,
    row: u32,
    canvas: &mut Canvas,
) -> Result<usize, StoreError> {
    let child_index = index + 1;
    let Some(child_level) = pyramid.level(child_index).copied() else {
        return Ok(0);
    };

    let bounds = pyramid.tile_bounds(index, col, row);
    // Shrink by half a child pixel so children that only touch an edge are excluded
    let search = bounds.inset(child_level.pixel_size_x / 2.0, child_level.pixel_size_y / 2.0);
    let Some(range) = pyramid.tile_range(child_index, &search) else {
        return Ok(0);
    };

    let (width, height) = (canvas.width(), canvas.height());
    let mut drawn = 0;
    for (child_col, child_row) in range.iter() {
        let key = TileKey::new(child_level.level, child_col, child_row);
        let Some(child) = foreground.get(&key)? else {
            continue;
        };
        let layer = Layer::from_tile(&child)?;
        let child_bounds = pyramid.tile_bounds(child_index, child_col, child_row);
        if copy_intersecting_region(canvas, &layer, &child_bounds, &bounds, width, height) {
            drawn += 1;
        }
    }
    Ok(drawn)
}

/// Rebuilds every foreground tile at level `index` whose source tile
/// intersects `envelope`.
///
/// Each tile is the source tile with the existing next-finer foreground
/// composited on top. Keys without a source tile are skipped.
pub fn regenerate_foreground(
    source: &dyn TileStore,
    foreground: &dyn TileStore,
    pyramid: &TilePyramid,
    index: usize,
    envelope: &Envelope,
) -> Result<LevelOutcome, StoreError> {
    let level = pyramid.levels()[index];
    let keys = stored_keys(source, level.level, envelope)?;

    process_level(&keys, Stage::Regenerate, |slot, key| {
        let Some(base) = source.get(key)? else {
            return Ok(false);
        };
        let canvas = prepare_canvas(slot, &level)?;
        canvas.load_tile(&base)?;
        composite_children(foreground, pyramid, index, key.col, key.row, canvas)?;
        foreground.set(key, &canvas.to_tile())?;
        Ok(true)
    })
}

/// Walks from `composite_index - 1` toward level 0, rebuilding every
/// foreground tile that intersects `envelope` from its existing content and
/// its children.
///
/// Stops as soon as the composite level's tile size, subsampled to the
/// current level, reaches zero in either dimension: the update has no pixel
/// left to contribute there or at any coarser level.
pub fn propagate_upward(
    foreground: &dyn TileStore,
    pyramid: &TilePyramid,
    composite_index: usize,
    envelope: &Envelope,
) -> Result<PropagationOutcome, StoreError> {
    let mut outcome = PropagationOutcome::default();

    for index in (0..composite_index).rev() {
        let level = pyramid.levels()[index];
        let (sub_width, sub_height) = pyramid.subsampled_size(composite_index, index);
        if sub_width == 0 || sub_height == 0 {
            debug!(
                zoom = level.level,
                sub_width, sub_height, "Propagation reached sub-pixel contribution, stopping"
            );
            break;
        }

        let Some(range) = pyramid.tile_range(index, envelope) else {
            break;
        };
        let keys: Vec<TileKey> = range
            .iter()
            .map(|(col, row)| TileKey::new(level.level, col, row))
            .collect();

        let start = Instant::now();
        let pass = process_level(&keys, Stage::Propagate, |slot, key| {
            let existing = foreground.get(key)?;
            let canvas = prepare_canvas(slot, &level)?;
            if let Some(existing) = &existing {
                canvas.load_tile(existing)?;
            }
            let children = composite_children(foreground, pyramid, index, key.col, key.row, canvas)?;
            if existing.is_none() && children == 0 {
                return Ok(false);
            }
            foreground.set(key, &canvas.to_tile())?;
            Ok(true)
        })?;

        debug!(
            zoom = level.level,
            tiles = pass.written,
            failed = pass.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Propagated level"
        );
        outcome.levels_visited += 1;
        outcome.written += pass.written;
        outcome.failures.extend(pass.failures);
    }

    Ok(outcome)
}

/// Rebuilds every foreground tile intersecting `envelope`, finest level
/// first, from its source tile and its next-finer foreground children.
///
/// The existing foreground tile is not used as a base, so content that is
/// no longer backed by a source tile or a child disappears. Tiles left with
/// nothing to show are deleted.
pub fn rebuild_region(
    source: &dyn TileStore,
    foreground: &dyn TileStore,
    pyramid: &TilePyramid,
    envelope: &Envelope,
) -> Result<RebuildOutcome, StoreError> {
    let mut outcome = RebuildOutcome::default();

    for index in (0..pyramid.len()).rev() {
        let level = pyramid.levels()[index];
        let keys = stored_keys(foreground, level.level, envelope)?;
        let removed = AtomicUsize::new(0);

        let pass = process_level(&keys, Stage::Rebuild, |slot, key| {
            let base = source.get(key)?;
            let canvas = prepare_canvas(slot, &level)?;
            if let Some(base) = &base {
                canvas.load_tile(base)?;
            }
            let children = composite_children(foreground, pyramid, index, key.col, key.row, canvas)?;
            if base.is_none() && children == 0 {
                if foreground.delete(key)? {
                    removed.fetch_add(1, Ordering::Relaxed);
                }
                return Ok(false);
            }
            foreground.set(key, &canvas.to_tile())?;
            Ok(true)
        })?;

        let removed = removed.into_inner();
        debug!(
            zoom = level.level,
            rebuilt = pass.written,
            removed,
            failed = pass.failures.len(),
            "Rebuilt level"
        );
        outcome.rebuilt += pass.written;
        outcome.removed += removed;
        outcome.failures.extend(pass.failures);
    }

    Ok(outcome)
}
