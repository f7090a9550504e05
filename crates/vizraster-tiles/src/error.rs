//! Error types for the tiles crate.

use thiserror::Error;

/// Errors that can occur when resolving tiles and tile paths.
#[derive(Debug, Error)]
pub enum TilesError {
    /// I/O error while listing a tile directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The tile matrix set id is not one of the supported schemes.
    #[error("Unknown tile matrix set: {0}")]
    UnknownTms(String),

    /// Zoom level beyond what the coordinate types can address.
    #[error("Invalid zoom level {0} (must be 0-30)")]
    InvalidZoomLevel(u8),

    /// Column or row outside the tile matrix for the zoom level.
    #[error("Tile x={x} y={y} is outside the {tms} matrix at zoom {z}")]
    OutOfRange {
        /// Tile matrix set id.
        tms: &'static str,
        /// Zoom level.
        z: u8,
        /// Column.
        x: u32,
        /// Row.
        y: u32,
    },

    /// A path could not be decoded into a tile coordinate.
    #[error("Cannot decode tile from path {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The configured path structure is unusable.
    #[error("Invalid tile path structure: {0}")]
    InvalidPathStructure(String),

    /// No base directory registered for the requested kind.
    #[error("No base directory configured for '{0}'")]
    UnknownDir(String),
}
