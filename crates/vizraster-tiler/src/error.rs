//! Error types for the tiler crate.

use std::path::PathBuf;
use thiserror::Error;
use vizraster_raster::RasterError;
use vizraster_tiles::TilesError;

/// Errors that stop a tiler call.
#[derive(Debug, Error)]
pub enum TilerError {
    /// Inputs or settings do not match the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The event or summary ledger could not be written or read.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Tile path resolution failed outside of a per-tile unit.
    #[error("Tiles error: {0}")]
    Tiles(#[from] TilesError),

    /// Value range lookup or update failed.
    #[error("Value range error: {0}")]
    Ranges(#[from] RangeError),

    /// A palette or method in the configuration is invalid.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Config file could not be read or written.
    #[error("Config file {path}: {source}")]
    ConfigIo {
        /// The config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON config could not be parsed or serialized.
    #[error("JSON config error: {0}")]
    ConfigJson(#[from] serde_json::Error),

    /// YAML config could not be parsed or serialized.
    #[error("YAML config error: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),
}

/// A failure confined to one tile (or one band of a web tile).
///
/// These are recorded in the event ledger and never abort a batch.
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Tiles(#[from] TilesError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable value range for a statistic at a zoom level.
    #[error("Missing value range for '{stat}' at z={z}: {bound} is not set")]
    MissingRange {
        /// Statistic name.
        stat: String,
        /// Zoom level.
        z: u8,
        /// Which bound is missing (`min` or `max`).
        bound: &'static str,
    },

    /// The raster has fewer bands than there are statistics.
    #[error("Raster has no band {band} for statistic '{stat}'")]
    MissingBand {
        /// Statistic name.
        stat: String,
        /// Expected band index.
        band: usize,
    },

    #[error(transparent)]
    Ranges(#[from] RangeError),
}

/// Errors from the event and summary ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Errors from the value-range store.
#[derive(Debug, Error)]
pub enum RangeError {
    /// The statistic is not configured.
    #[error("Unknown statistic: {0}")]
    UnknownStatistic(String),
}
