//! Turning a vector tile into a multi-band raster.

use crate::methods::{Aggregation, WeightBy};
use crate::raster::{Band, Raster};
use crate::vector::VectorTable;
use crate::{RasterError, Result};
use std::collections::HashMap;
use std::fmt;
use vizraster_tiles::BoundingBox;

/// What a statistic measures in each pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatProperty {
    /// Number of features whose centroid falls in the pixel.
    CentroidsPerPixel,
    /// Feature area attributed to the pixel, in CRS units.
    AreaWithinPixel,
    /// Feature area attributed to the pixel divided by the pixel area.
    AreaPerPixelArea,
    /// A numeric property of the features.
    Column(String),
}

impl StatProperty {
    pub fn name(&self) -> &str {
        match self {
            StatProperty::CentroidsPerPixel => "centroids_per_pixel",
            StatProperty::AreaWithinPixel => "area_within_pixel",
            StatProperty::AreaPerPixelArea => "area_per_pixel_area",
            StatProperty::Column(name) => name,
        }
    }
}

impl From<&str> for StatProperty {
    fn from(s: &str) -> Self {
        match s {
            "centroids_per_pixel" => StatProperty::CentroidsPerPixel,
            "area_within_pixel" => StatProperty::AreaWithinPixel,
            "area_per_pixel_area" => StatProperty::AreaPerPixelArea,
            other => StatProperty::Column(other.to_string()),
        }
    }
}

impl fmt::Display for StatProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one band is computed.
#[derive(Debug, Clone, PartialEq)]
pub struct StatSpec {
    pub name: String,
    pub weight_by: WeightBy,
    pub property: StatProperty,
    pub aggregation: Aggregation,
    /// Value written to pixels with no features; 0 when unset.
    pub nodata: Option<f32>,
}

impl StatSpec {
    /// Reject keyword properties used with the wrong weighting.
    pub fn validate(&self) -> Result<()> {
        let ok = match self.property {
            StatProperty::CentroidsPerPixel => self.weight_by == WeightBy::Count,
            StatProperty::AreaWithinPixel | StatProperty::AreaPerPixelArea => {
                self.weight_by == WeightBy::Area
            }
            StatProperty::Column(_) => true,
        };
        if ok {
            Ok(())
        } else {
            Err(RasterError::InvalidSpec {
                stat: self.name.clone(),
                reason: format!("'{}' cannot be weighted by {}", self.property, self.weight_by),
            })
        }
    }

    fn fill(&self) -> f32 {
        self.nodata.unwrap_or(0.0)
    }
}

/// Everything a rasterizer needs besides the features and the tile bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSpec {
    /// Properties holding each feature's centroid (x, y).
    pub centroid_properties: (String, String),
    /// Property holding each feature's area.
    pub area_property: String,
    /// Output (width, height) in pixels.
    pub shape: (u32, u32),
    /// CRS of the bounds, written into the GeoTIFF.
    pub epsg: Option<u16>,
    /// One band per statistic, in this order.
    pub stats: Vec<StatSpec>,
}

/// Rasterizes a vector table into a raster covering `bounds`.
pub trait Rasterizer {
    fn rasterize(&self, table: &VectorTable, bounds: BoundingBox, spec: &RasterSpec) -> Result<Raster>;
}

/// Assigns every feature to the single pixel that contains its centroid.
///
/// Features whose centroid lies outside the bounds are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidRasterizer;

impl CentroidRasterizer {
    fn pixel_of(bounds: &BoundingBox, shape: (u32, u32), x: f64, y: f64) -> Option<usize> {
        if !bounds.contains(x, y) {
            return None;
        }
        let (w, h) = shape;
        let col = ((x - bounds.left) / bounds.width() * w as f64).floor() as u32;
        let row = ((bounds.top - y) / bounds.height() * h as f64).floor() as u32;
        Some(row.min(h - 1) as usize * w as usize + col.min(w - 1) as usize)
    }
}

impl Rasterizer for CentroidRasterizer {
    fn rasterize(&self, table: &VectorTable, bounds: BoundingBox, spec: &RasterSpec) -> Result<Raster> {
        for stat in &spec.stats {
            stat.validate()?;
        }
        let (w, h) = spec.shape;
        let mut raster = Raster::new(w, h, bounds, spec.epsg)?;
        let pixel_area = raster.pixel_size().0 * raster.pixel_size().1;

        let (cx_prop, cy_prop) = &spec.centroid_properties;
        let xs = table.column_f64(cx_prop);
        let ys = table.column_f64(cy_prop);

        let mut pixels = Vec::with_capacity(table.len());
        for (i, (x, y)) in xs.iter().zip(&ys).enumerate() {
            let (x, y) = match (x, y) {
                (Some(x), Some(y)) => (*x, *y),
                (None, _) => {
                    return Err(RasterError::MissingProperty {
                        index: i,
                        property: cx_prop.clone(),
                    })
                }
                (_, None) => {
                    return Err(RasterError::MissingProperty {
                        index: i,
                        property: cy_prop.clone(),
                    })
                }
            };
            pixels.push(Self::pixel_of(&bounds, spec.shape, x, y));
        }

        let areas = table.column_f64(&spec.area_property);
        for stat in &spec.stats {
            let mut per_pixel: HashMap<usize, Vec<f64>> = HashMap::new();
            for (i, pixel) in pixels.iter().enumerate() {
                let Some(pixel) = pixel else { continue };
                let value = match &stat.property {
                    StatProperty::CentroidsPerPixel => Some(1.0),
                    StatProperty::AreaWithinPixel | StatProperty::AreaPerPixelArea => {
                        let area = areas[i].ok_or_else(|| RasterError::MissingProperty {
                            index: i,
                            property: spec.area_property.clone(),
                        })?;
                        if stat.property == StatProperty::AreaPerPixelArea {
                            Some(area / pixel_area)
                        } else {
                            Some(area)
                        }
                    }
                    StatProperty::Column(name) => table.get(i, name).as_f64(),
                };
                if let Some(v) = value {
                    per_pixel.entry(*pixel).or_default().push(v);
                }
            }

            let mut data = vec![stat.fill(); w as usize * h as usize];
            for (pixel, values) in per_pixel {
                if let Some(v) = stat.aggregation.apply(&values) {
                    data[pixel] = v as f32;
                }
            }
            raster.push_band(Band::new(stat.name.clone(), data, stat.nodata))?;
        }

        Ok(raster)
    }
}
