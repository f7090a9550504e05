//! In-memory multi-band raster.

use crate::summary::BandSummary;
use crate::{geotiff, RasterError, Result};
use std::path::Path;
use vizraster_tiles::BoundingBox;

/// One band of a raster: a named statistic stored row-major, north to south.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Statistic name, stored as the page description in GeoTIFFs.
    pub name: String,
    /// Pixel values, `width * height` long.
    pub data: Vec<f32>,
    /// Value marking pixels without data.
    pub nodata: Option<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f32>, nodata: Option<f32>) -> Self {
        Self {
            name: name.into(),
            data,
            nodata,
        }
    }

    /// True when a value is NaN or equal to the nodata value.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || Some(value) == self.nodata
    }
}

/// A georeferenced raster with one band per statistic.
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    bounds: BoundingBox,
    epsg: Option<u16>,
    bands: Vec<Band>,
}

impl Raster {
    /// Create an empty raster covering `bounds`.
    pub fn new(width: u32, height: u32, bounds: BoundingBox, epsg: Option<u16>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidRaster(format!(
                "raster has zero dimensions ({width}x{height})"
            )));
        }
        Ok(Self {
            width,
            height,
            bounds,
            epsg,
            bands: Vec::new(),
        })
    }

    /// Append a band. Its length must match the raster shape.
    pub fn push_band(&mut self, band: Band) -> Result<()> {
        let expected = self.width as usize * self.height as usize;
        if band.data.len() != expected {
            return Err(RasterError::InvalidRaster(format!(
                "band '{}' has {} pixels, expected {}",
                band.name,
                band.data.len(),
                expected
            )));
        }
        self.bands.push(band);
        Ok(())
    }

    /// Builder form of [`Raster::push_band`].
    pub fn with_band(mut self, band: Band) -> Result<Self> {
        self.push_band(band)?;
        Ok(self)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// (width, height) in pixels.
    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn epsg(&self) -> Option<u16> {
        self.epsg
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Option<&Band> {
        self.bands.get(index)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Size of one pixel in CRS units (x, y).
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.width as f64,
            self.bounds.height() / self.height as f64,
        )
    }

    /// Value at pixel (col, row), or `None` outside the raster.
    pub fn value(&self, band: usize, col: u32, row: u32) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let idx = row as usize * self.width as usize + col as usize;
        self.bands.get(band).map(|b| b.data[idx])
    }

    /// Summary statistics for every band, in band order.
    pub fn summary(&self) -> Vec<BandSummary> {
        self.bands
            .iter()
            .enumerate()
            .map(|(i, b)| BandSummary::compute(&b.name, i, &b.data, b.nodata))
            .collect()
    }

    /// Write as a GeoTIFF, creating parent directories as needed.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        geotiff::write(self, path)
    }

    /// Load a raster written by [`Raster::write_geotiff`].
    pub fn from_geotiff<P: AsRef<Path>>(path: P) -> Result<Self> {
        geotiff::read(path.as_ref())
    }
}
