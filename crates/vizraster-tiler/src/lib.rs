//! # vizraster-tiler
//!
//! Builds a raster tile pyramid from staged vector tiles and renders it as
//! web tiles.
//!
//! ## Overview
//!
//! A build runs in four steps:
//! 1. Leaf GeoTIFFs are rasterized from staged vector tiles at the maximum zoom.
//! 2. Parent GeoTIFFs are composited bottom-up, one zoom level at a time, down
//!    to the minimum zoom.
//! 3. Value ranges missing from the configuration are filled from the
//!    summary statistics of every raster written.
//! 4. Each GeoTIFF band is encoded as a PNG web tile using its statistic's
//!    palette and value range.
//!
//! Every unit of work is appended to an event ledger and every raster to a
//! summary ledger. Failures are isolated to the tile (or web tile band) they
//! occur in and can be listed afterwards with [`RasterTiler::errors`].
//!
//! ## Example
//!
//! ```no_run
//! use vizraster_tiler::{init_logging, RasterTiler};
//!
//! init_logging("info");
//! let mut tiler = RasterTiler::from_config_file("config.json")?;
//! let report = tiler.rasterize_all(false)?;
//! println!("{} leaves written", report.leaves.report.written);
//! # Ok::<(), vizraster_tiler::TilerError>(())
//! ```

pub mod config;
mod dedup;
mod error;
mod ledger;
pub mod logging;
mod ranges;
mod report;
mod tiler;

pub use config::TilerConfig;
pub use dedup::{remove_duplicates, ColumnDeduplicator, Deduplicator};
pub use error::{LedgerError, RangeError, TileError, TilerError};
pub use ledger::{EventKind, EventRecord, Ledger, Produced};
pub use logging::init_logging;
pub use ranges::{Bound, ObservedRanges, ValueRange, ValueRangeStore};
pub use report::{LevelReport, ParentReport, PyramidReport, RunReport, TileOutcome, WebTileReport};
pub use tiler::RasterTiler;

/// Result type for tiler operations.
pub type Result<T> = std::result::Result<T, TilerError>;
