//! Outcome bookkeeping for one mosaic update.

use std::fmt;

use crate::coord::{Envelope, TileKey};

/// Phase of an update in which a tile was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Merge,
    Regenerate,
    Propagate,
    Rebuild,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Merge => write!(f, "merge"),
            Stage::Regenerate => write!(f, "regenerate"),
            Stage::Propagate => write!(f, "propagate"),
            Stage::Rebuild => write!(f, "rebuild"),
        }
    }
}

/// A tile that could not be written and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    pub key: TileKey,
    pub stage: Stage,
    pub reason: String,
}

impl fmt::Display for TileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} during {}: {}", self.key, self.stage, self.reason)
    }
}

/// Written tile count and skipped tiles for one pass over a level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelOutcome {
    pub written: usize,
    pub failures: Vec<TileFailure>,
}

/// Result of propagating an update toward coarser levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Levels actually visited, finest first
    pub levels_visited: usize,
    pub written: usize,
    pub failures: Vec<TileFailure>,
}

/// Result of rebuilding foreground tiles from their source tile and
/// children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// Tiles rewritten from the content that remains
    pub rebuilt: usize,
    /// Tiles deleted because nothing remains under them
    pub removed: usize,
    pub failures: Vec<TileFailure>,
}

/// Summary of one successful `update_mosaic` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// Mosaic version assigned to this update
    pub version: u64,
    /// Projected footprint of the frame
    pub envelope: Envelope,
    /// Level number the frame was merged at
    pub zoom: u8,
    /// Source tiles written by the merge
    pub tiles_merged: usize,
    /// Foreground tiles rebuilt at the composite level
    pub tiles_regenerated: usize,
    /// Foreground tiles rebuilt at coarser levels
    pub tiles_propagated: usize,
    /// Coarser levels visited before propagation stopped
    pub levels_propagated: usize,
    /// Tiles skipped because they could not be encoded or stored
    pub failed_tiles: Vec<TileFailure>,
}

impl UpdateReport {
    /// True when every tile was written.
    pub fn is_complete(&self) -> bool {
        self.failed_tiles.is_empty()
    }

    /// Keys of the tiles that were skipped.
    pub fn failed_keys(&self) -> Vec<TileKey> {
        self.failed_tiles.iter().map(|f| f.key).collect()
    }
}

/// Summary of one `evict_region` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Mosaic version assigned to this eviction
    pub version: u64,
    /// Source and foreground tiles deleted
    pub tiles_removed: usize,
    /// Foreground tiles rebuilt from what remains outside the region
    pub tiles_rebuilt: usize,
    pub failed_tiles: Vec<TileFailure>,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} at zoom {}: merged {}, regenerated {}, propagated {} over {} levels, {} failed",
            self.version,
            self.zoom,
            self.tiles_merged,
            self.tiles_regenerated,
            self.tiles_propagated,
            self.levels_propagated,
            self.failed_tiles.len()
        )
    }
}
