//! Building a parent raster from its child rasters.

use crate::methods::Resampling;
use crate::raster::{Band, Raster};
use crate::{RasterError, Result};
use std::path::PathBuf;
use tracing::debug;
use vizraster_tiles::BoundingBox;

/// Merges up to four child rasters into one parent raster.
pub trait Compositor {
    /// `resampling` has one entry per band; `shape` and `bounds` describe the
    /// parent.
    fn composite(
        &self,
        child_paths: &[PathBuf],
        resampling: &[Resampling],
        shape: (u32, u32),
        bounds: BoundingBox,
    ) -> Result<Raster>;
}

/// Mosaics the children into a raster twice the parent size, then reduces
/// each 2 x 2 block with the band's resampling method.
///
/// Nodata pixels are left out of every reduction. Quadrants with no child
/// stay nodata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MosaicCompositor;

impl MosaicCompositor {
    /// Quadrant (col, row) of the parent that a child's bounds fall in.
    fn quadrant(parent: &BoundingBox, child: &BoundingBox) -> (usize, usize) {
        let cx = (child.left + child.right) / 2.0;
        let cy = (child.bottom + child.top) / 2.0;
        let col = usize::from(cx > parent.left + parent.width() / 2.0);
        let row = usize::from(cy < parent.top - parent.height() / 2.0);
        (col, row)
    }
}

impl Compositor for MosaicCompositor {
    fn composite(
        &self,
        child_paths: &[PathBuf],
        resampling: &[Resampling],
        shape: (u32, u32),
        bounds: BoundingBox,
    ) -> Result<Raster> {
        if child_paths.is_empty() {
            return Err(RasterError::InvalidRaster("no child rasters to composite".to_string()));
        }
        let (w, h) = (shape.0 as usize, shape.1 as usize);
        let (mw, mh) = (w * 2, h * 2);

        let children = child_paths
            .iter()
            .map(Raster::from_geotiff)
            .collect::<Result<Vec<_>>>()?;
        let first = &children[0];

        let mut mosaics: Vec<Vec<f32>> = vec![vec![f32::NAN; mw * mh]; resampling.len()];
        for (child, path) in children.iter().zip(child_paths) {
            if child.band_count() < resampling.len() {
                return Err(RasterError::InvalidRaster(format!(
                    "{} has {} bands, expected {}",
                    path.display(),
                    child.band_count(),
                    resampling.len()
                )));
            }
            let (qc, qr) = Self::quadrant(&bounds, &child.bounds());
            debug!(child = %path.display(), qc, qr, "placing child in mosaic");
            let (cw, ch) = (child.width() as usize, child.height() as usize);

            for (b, mosaic) in mosaics.iter_mut().enumerate() {
                let band = &child.bands()[b];
                for py in 0..h {
                    let sy = py * ch / h;
                    for px in 0..w {
                        let sx = px * cw / w;
                        let v = band.data[sy * cw + sx];
                        if !band.is_nodata(v) {
                            mosaic[(qr * h + py) * mw + qc * w + px] = v;
                        }
                    }
                }
            }
        }

        let mut raster = Raster::new(shape.0, shape.1, bounds, first.epsg())?;
        for (b, (mosaic, method)) in mosaics.iter().zip(resampling).enumerate() {
            let template = &first.bands()[b];
            let fill = template.nodata.unwrap_or(f32::NAN);
            let mut data = vec![fill; w * h];
            let mut block = Vec::with_capacity(4);
            for oy in 0..h {
                for ox in 0..w {
                    block.clear();
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let v = mosaic[(oy * 2 + dy) * mw + ox * 2 + dx];
                        if !v.is_nan() {
                            block.push(v);
                        }
                    }
                    if let Some(v) = method.apply(&block) {
                        data[oy * w + ox] = v;
                    }
                }
            }
            raster.push_band(Band::new(template.name.clone(), data, template.nodata))?;
        }

        Ok(raster)
    }
}
