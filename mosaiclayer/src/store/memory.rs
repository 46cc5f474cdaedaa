//! In-memory tile store using dashmap.
//!
//! Tiles are kept encoded, so memory use tracks the codec's output size
//! rather than raw RGBA. `DashMap` shards its locks, letting rayon workers
//! write different tiles of the same update concurrently while readers
//! query the composite view.

use std::sync::Arc;

use dashmap::DashMap;

use crate::coord::{Envelope, TileKey};
use crate::pyramid::TilePyramid;
use crate::store::traits::{check_dimensions, StoreError, TileStore};
use crate::tile::{PngCodec, Tile, TileCodec};

/// Tile store backed by a concurrent hash map.
pub struct MemoryTileStore {
    name: String,
    pyramid: Arc<TilePyramid>,
    codec: Arc<dyn TileCodec>,
    tiles: DashMap<TileKey, Arc<Vec<u8>>>,
}

impl MemoryTileStore {
    /// Create an empty store using the PNG codec.
    pub fn new(name: impl Into<String>, pyramid: Arc<TilePyramid>) -> Self {
        Self::with_codec(name, pyramid, Arc::new(PngCodec))
    }

    pub fn with_codec(
        name: impl Into<String>,
        pyramid: Arc<TilePyramid>,
        codec: Arc<dyn TileCodec>,
    ) -> Self {
        Self {
            name: name.into(),
            pyramid,
            codec,
            tiles: DashMap::new(),
        }
    }

    /// Total number of tiles across all levels.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Total encoded size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.tiles.iter().map(|entry| entry.value().len() as u64).sum()
    }
}

impl TileStore for MemoryTileStore {
    fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    fn get(&self, key: &TileKey) -> Result<Option<Tile>, StoreError> {
        // Clone the Arc so decoding happens outside the shard lock
        let Some(bytes) = self.tiles.get(key).map(|entry| Arc::clone(entry.value())) else {
            return Ok(None);
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode { key: *key, source })
    }

    fn set(&self, key: &TileKey, tile: &Tile) -> Result<(), StoreError> {
        check_dimensions(&self.pyramid, key, tile)?;
        let bytes = self
            .codec
            .encode(tile)
            .map_err(|source| StoreError::Encode { key: *key, source })?;
        self.tiles.insert(*key, Arc::new(bytes));
        Ok(())
    }

    fn delete(&self, key: &TileKey) -> Result<bool, StoreError> {
        Ok(self.tiles.remove(key).is_some())
    }

    fn contains(&self, key: &TileKey) -> Result<bool, StoreError> {
        Ok(self.tiles.contains_key(key))
    }

    fn tile_count(&self, zoom: u8) -> Result<usize, StoreError> {
        Ok(self.tiles.iter().filter(|entry| entry.key().zoom == zoom).count())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.tiles.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn for_each_tile(
        &self,
        zoom: u8,
        envelope: &Envelope,
        visit: &mut dyn FnMut(TileKey) -> bool,
    ) -> Result<bool, StoreError> {
        let Some(index) = self.pyramid.find_level_index(zoom) else {
            return Ok(true);
        };
        let Some(range) = self.pyramid.tile_range(index, envelope) else {
            return Ok(true);
        };

        // Probe the grid when the range is small, otherwise filter the map
        let keys: Vec<TileKey> = if range.len() <= self.tiles.len() {
            range
                .iter()
                .map(|(col, row)| TileKey::new(zoom, col, row))
                .filter(|key| self.tiles.contains_key(key))
                .collect()
        } else {
            let mut keys: Vec<TileKey> = self
                .tiles
                .iter()
                .map(|entry| *entry.key())
                .filter(|key| key.zoom == zoom && range.contains(key.col, key.row))
                .collect();
            keys.sort_by_key(|key| (key.row, key.col));
            keys
        };

        for key in keys {
            if !visit(key) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
