//! Directory-of-files tile store.
//!
//! Layout: `<root>/<zoom>/<col>/<row>.<ext>`, with the extension taken from
//! the codec. Writes go to a temp file next to the target and are renamed
//! into place, so a concurrent reader sees either the old tile or the new
//! one. Re-opening a store on the same directory reproduces every tile
//! previously written.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::coord::{Envelope, TileKey};
use crate::pyramid::TilePyramid;
use crate::store::traits::{check_dimensions, key_in_grid, StoreError, TileStore};
use crate::tile::{PngCodec, Tile, TileCodec};

/// Suffix appended to in-flight writes.
const TEMP_SUFFIX: &str = "tmp";

/// Ranges larger than this are enumerated by listing directories instead of
/// probing every key.
const PROBE_LIMIT: usize = 4096;

/// Tile store persisted as one file per tile.
pub struct DiskTileStore {
    name: String,
    root: PathBuf,
    pyramid: Arc<TilePyramid>,
    codec: Arc<dyn TileCodec>,
}

impl DiskTileStore {
    /// Open (creating if necessary) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        pyramid: Arc<TilePyramid>,
    ) -> Result<Self, StoreError> {
        Self::open_with_codec(name, root, pyramid, Arc::new(PngCodec))
    }

    pub fn open_with_codec(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        pyramid: Arc<TilePyramid>,
        codec: Arc<dyn TileCodec>,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        let name = name.into();
        debug!(store = %name, root = %root.display(), codec = codec.name(), "Opened disk tile store");
        Ok(Self {
            name,
            root,
            pyramid,
            codec,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(key.col.to_string())
            .join(format!("{}.{}", key.row, self.codec.extension()))
    }

    /// Row number encoded in a tile file name, ignoring temp files.
    fn parse_row(&self, path: &Path) -> Option<u32> {
        if path.extension()?.to_str()? != self.codec.extension() {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }

    /// Numeric sub-directory names of `dir`, e.g. the columns of a level.
    fn numeric_entries(dir: &Path) -> Result<Vec<(u32, PathBuf)>, StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let path = entry.path();
            if let Some(n) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            {
                out.push((n, path));
            }
        }
        Ok(out)
    }

    /// Every stored key at `zoom`, found by listing the level directory.
    fn list_level(&self, zoom: u8) -> Result<Vec<TileKey>, StoreError> {
        let level_dir = self.root.join(zoom.to_string());
        let mut keys = Vec::new();
        for (col, col_dir) in Self::numeric_entries(&level_dir)? {
            let entries = match fs::read_dir(&col_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&col_dir, e)),
            };
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::io(&col_dir, e))?;
                if let Some(row) = self.parse_row(&entry.path()) {
                    keys.push(TileKey::new(zoom, col, row));
                }
            }
        }
        Ok(keys)
    }
}

impl TileStore for DiskTileStore {
    fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    fn get(&self, key: &TileKey) -> Result<Option<Tile>, StoreError> {
        if !key_in_grid(&self.pyramid, key) {
            return Ok(None);
        }
        let path = self.tile_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
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

        let path = self.tile_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        // Write atomically via temp file
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".");
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, &bytes).map_err(|e| StoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    fn delete(&self, key: &TileKey) -> Result<bool, StoreError> {
        let path = self.tile_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn contains(&self, key: &TileKey) -> Result<bool, StoreError> {
        if !key_in_grid(&self.pyramid, key) {
            return Ok(false);
        }
        Ok(self.tile_path(key).is_file())
    }

    fn tile_count(&self, zoom: u8) -> Result<usize, StoreError> {
        Ok(self.list_level(zoom)?.len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        for (_, level_dir) in Self::numeric_entries(&self.root)? {
            fs::remove_dir_all(&level_dir).map_err(|e| StoreError::io(&level_dir, e))?;
        }
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

        if range.len() <= PROBE_LIMIT {
            for (col, row) in range.iter() {
                let key = TileKey::new(zoom, col, row);
                if self.tile_path(&key).is_file() && !visit(key) {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        let mut keys: Vec<TileKey> = self
            .list_level(zoom)?
            .into_iter()
            .filter(|key| range.contains(key.col, key.row))
            .collect();
        keys.sort_by_key(|key| (key.row, key.col));
        for key in keys {
            if !visit(key) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
