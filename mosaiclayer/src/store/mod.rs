//! Tile storage
//!
//! Two independent [`TileStore`] instances back every mosaic: one for the
//! raw merged frames ("source") and one for the derived composite
//! ("foreground").
//!
//! - [`MemoryTileStore`]: concurrent in-memory map, lost on drop
//! - [`DiskTileStore`]: one file per tile under a root directory

mod disk;
mod memory;
mod traits;

pub use disk::DiskTileStore;
pub use memory::MemoryTileStore;
pub use traits::{StoreError, TileStore};

/// Name of the store holding merged frames.
pub const SOURCE_STORE: &str = "source";

/// Name of the store holding the composite pyramid.
pub const FOREGROUND_STORE: &str = "foreground";
