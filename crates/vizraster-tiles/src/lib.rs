//! # vizraster-tiles
//!
//! Tile matrix sets, tile coordinates and the deterministic path scheme used
//! by every stage of the raster pyramid.
//!
//! ## Overview
//!
//! Two quadtree tiling schemes are supported:
//! - `WGS1984Quad` - geographic, 2 x 1 tiles at zoom 0, bounds in degrees
//! - `WebMercatorQuad` - spherical Mercator, 1 x 1 tile at zoom 0, bounds in meters
//!
//! Paths look like `{base}/{style}/{tms}/{z}/{x}/{y}{ext}` by default. The
//! layout is configurable through [`PathStructure`], but `z`, `x` and `y` are
//! always the last three segments so a path can be decoded back into a tile.
//!
//! ## Example
//!
//! ```
//! use vizraster_tiles::{DirSpec, TileCoord, TileDir, TilePathManager, Tms};
//!
//! let manager = TilePathManager::new(Tms::WebMercatorQuad)
//!     .with_dir(TileDir::WebTiles, DirSpec::new("web_tiles", ".png"));
//!
//! let tile = TileCoord::new(Tms::WebMercatorQuad, 12, 655, 1407)?;
//! let path = manager.path_from_tile(&tile, TileDir::WebTiles, Some("coverage"))?;
//! assert!(path.ends_with("coverage/WebMercatorQuad/12/655/1407.png"));
//!
//! let parent = tile.parent().unwrap();
//! assert_eq!((parent.z, parent.x, parent.y), (11, 327, 703));
//! # Ok::<(), vizraster_tiles::TilesError>(())
//! ```

mod coord;
mod error;
mod paths;
mod tms;

pub use coord::{BoundingBox, TileCoord};
pub use error::TilesError;
pub use paths::{remove_nonexistent_paths, DirSpec, PathPart, PathStructure, TileDir, TilePathManager};
pub use tms::Tms;

/// Deepest zoom level a [`TileCoord`] can address.
pub const MAX_ZOOM: u8 = 30;

/// Result type for tile operations.
pub type Result<T> = std::result::Result<T, TilesError>;
