//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when building, reading, writing or encoding rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF encoding or decoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Raster shape or band layout is inconsistent.
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    /// Image encoding error.
    #[error("Image encode error: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// JSON parsing error while reading vector data.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Vector data is not in the expected shape.
    #[error("Invalid vector data: {0}")]
    InvalidVector(String),

    /// A method name did not match any supported variant.
    #[error("Unknown {kind} method: {name}")]
    UnknownMethod {
        /// Which method family (aggregation, resampling, ...).
        kind: &'static str,
        /// The rejected name.
        name: String,
    },

    /// A statistic spec combines options that cannot work together.
    #[error("Invalid statistic '{stat}': {reason}")]
    InvalidSpec {
        /// Statistic name.
        stat: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A color string could not be parsed.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// A palette named a colormap that is not in the registry.
    #[error("Unknown colormap '{name}'. Supported: {supported}")]
    UnknownColormap {
        /// The rejected name.
        name: String,
        /// Comma-separated registry names.
        supported: String,
    },

    /// A feature lacks a property the rasterizer needs.
    #[error("Feature {index} has no numeric '{property}' property")]
    MissingProperty {
        /// Feature index in the table.
        index: usize,
        /// Property name.
        property: String,
    },
}
