//! # vizraster-raster
//!
//! Multi-band raster tiles and the pieces that produce and consume them.
//!
//! ## Overview
//!
//! A [`Raster`] holds one `f32` band per statistic over a tile's bounds.
//! Rasters are produced by a [`Rasterizer`] from a [`VectorTable`] (leaf
//! tiles) or by a [`Compositor`] from up to four child GeoTIFFs (parent
//! tiles), stored as multi-page GeoTIFFs, and finally rendered band by band
//! through a [`TileEncoder`] with a [`Palette`].
//!
//! The traits are the seams; the crate ships one implementation of each:
//! [`GeoJsonReader`], [`CentroidRasterizer`], [`MosaicCompositor`] and
//! [`PngEncoder`].
//!
//! ## Example
//!
//! ```no_run
//! use vizraster_raster::{
//!     Aggregation, CentroidRasterizer, GeoJsonReader, RasterSpec, Rasterizer, StatSpec,
//!     VectorReader, WeightBy,
//! };
//! use vizraster_tiles::BoundingBox;
//!
//! let table = GeoJsonReader.read("staged/WGS1984Quad/3/4/2.geojson".as_ref())?;
//! let spec = RasterSpec {
//!     centroid_properties: ("staging_centroid_x".into(), "staging_centroid_y".into()),
//!     area_property: "staging_area".into(),
//!     shape: (256, 256),
//!     epsg: Some(4326),
//!     stats: vec![StatSpec {
//!         name: "polygon_count".into(),
//!         weight_by: WeightBy::Count,
//!         property: "centroids_per_pixel".into(),
//!         aggregation: Aggregation::Sum,
//!         nodata: Some(0.0),
//!     }],
//! };
//! let bounds = BoundingBox::new(-90.0, 22.5, -67.5, 45.0);
//! let raster = CentroidRasterizer.rasterize(&table, bounds, &spec)?;
//! raster.write_geotiff("geotiff/WGS1984Quad/3/4/2.tif")?;
//! # Ok::<(), vizraster_raster::RasterError>(())
//! ```

mod atomic;
pub mod colormap;
mod composite;
mod encode;
mod error;
pub mod geotiff;
mod methods;
mod palette;
mod raster;
mod rasterize;
mod summary;
mod vector;

pub use atomic::{persist_with, write_file_atomic};
pub use composite::{Compositor, MosaicCompositor};
pub use encode::{PngEncoder, TileEncoder};
pub use error::RasterError;
pub use methods::{Aggregation, Resampling, WeightBy};
pub use palette::{Palette, Rgba};
pub use raster::{Band, Raster};
pub use rasterize::{CentroidRasterizer, RasterSpec, Rasterizer, StatProperty, StatSpec};
pub use summary::BandSummary;
pub use vector::{GeoJsonReader, Properties, Value, VectorReader, VectorTable};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
