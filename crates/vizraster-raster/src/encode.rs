//! Encoding a single raster band as a web tile image.

use crate::palette::Palette;
use crate::{RasterError, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Renders one band to image bytes.
pub trait TileEncoder {
    /// `band` is row-major with `shape.0 * shape.1` pixels. Values are mapped
    /// linearly from `[min, max]` onto the palette.
    fn encode(
        &self,
        band: &[f32],
        shape: (u32, u32),
        palette: &Palette,
        min: f64,
        max: f64,
        nodata: Option<f32>,
    ) -> Result<Vec<u8>>;
}

/// RGBA PNG encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl TileEncoder for PngEncoder {
    fn encode(
        &self,
        band: &[f32],
        shape: (u32, u32),
        palette: &Palette,
        min: f64,
        max: f64,
        nodata: Option<f32>,
    ) -> Result<Vec<u8>> {
        let (w, h) = shape;
        if band.len() != w as usize * h as usize {
            return Err(RasterError::InvalidRaster(format!(
                "band has {} pixels, shape is {}x{}",
                band.len(),
                w,
                h
            )));
        }
        let span = max - min;

        let img = RgbaImage::from_fn(w, h, |x, y| {
            let v = band[y as usize * w as usize + x as usize];
            if v.is_nan() || Some(v) == nodata {
                return image::Rgba(palette.nodata().0);
            }
            let t = if span > 0.0 { (v as f64 - min) / span } else { 0.0 };
            image::Rgba(palette.color_at(t).0)
        });

        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn test_ramp_and_nodata() {
        let palette = Palette::from_strs(&["#000000", "#ffffff"], "#ffffff00").unwrap();
        let band = [0.0, 5.0, 10.0, 20.0];
        let bytes = PngEncoder
            .encode(&band, (2, 2), &palette, 0.0, 10.0, Some(0.0))
            .unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let img = decode(&bytes);
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [128, 128, 128, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 255, 255, 255]);
        // Clamped above max
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_flat_range() {
        let palette = Palette::from_strs(&["red", "blue"], "transparent").unwrap();
        let bytes = PngEncoder
            .encode(&[3.0], (1, 1), &palette, 3.0, 3.0, None)
            .unwrap();
        assert_eq!(decode(&bytes).get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_shape_mismatch() {
        let palette = Palette::from_strs(&["red"], "transparent").unwrap();
        assert!(PngEncoder
            .encode(&[1.0, 2.0], (2, 2), &palette, 0.0, 1.0, None)
            .is_err());
    }
}
