//! Multi-band GeoTIFF reading and writing.
//!
//! Each band is stored as its own 32-bit float page. Every page carries the
//! georeferencing tags, the GDAL nodata tag and the band's statistic name in
//! `ImageDescription`, so pages can be read back independently.

use crate::atomic::persist_with;
use crate::raster::{Band, Raster};
use crate::{RasterError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use vizraster_tiles::BoundingBox;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const EPSG_WGS84: u16 = 4326;

/// Write every band of `raster` to `path`. The file appears only once complete.
pub fn write(raster: &Raster, path: &Path) -> Result<()> {
    if raster.band_count() == 0 {
        return Err(RasterError::InvalidRaster("raster has no bands".to_string()));
    }
    persist_with(path, |file| -> Result<()> {
        let mut writer = BufWriter::new(file);
        {
            let mut encoder = TiffEncoder::new(&mut writer)?;
            let (width, height) = raster.shape();
            for band in raster.bands() {
                let mut image = encoder.new_image::<Gray32Float>(width, height)?;
                write_band_tags(image.encoder(), raster, band)?;
                image.write_data(&band.data)?;
            }
        }
        writer.flush()?;
        Ok(())
    })
}

fn write_band_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &Raster,
    band: &Band,
) -> Result<()> {
    let (scale_x, scale_y) = raster.pixel_size();
    let bounds = raster.bounds();

    let pixel_scale = [scale_x, scale_y, 0.0];
    dir.write_tag(Tag::ModelPixelScaleTag, pixel_scale.as_slice())?;

    // Pixel (0, 0) sits at the north-west corner
    let tiepoint = [0.0, 0.0, 0.0, bounds.left, bounds.top, 0.0];
    dir.write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())?;

    if let Some(epsg) = raster.epsg() {
        let geokeys = geokey_directory(epsg);
        dir.write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())?;
    }

    if let Some(nodata) = band.nodata {
        dir.write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }
    dir.write_tag(Tag::ImageDescription, band.name.as_str())?;
    Ok(())
}

fn geokey_directory(epsg: u16) -> Vec<u16> {
    let geographic = epsg == EPSG_WGS84;
    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, epsg]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, epsg]);
    }
    keys
}

/// Read a GeoTIFF written by [`write`]. Any page count is accepted; pages
/// without a description are named `band_<index>`.
pub fn read(path: &Path) -> Result<Raster> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;

    let (width, height) = decoder.dimensions()?;
    let bounds = read_bounds(&mut decoder, width, height)?;
    let epsg = read_epsg(&mut decoder);
    let mut raster = Raster::new(width, height, bounds, epsg)?;

    loop {
        let dims = decoder.dimensions()?;
        if dims != (width, height) {
            return Err(RasterError::InvalidGeoTiff(format!(
                "page {} is {}x{}, expected {}x{}",
                raster.band_count(),
                dims.0,
                dims.1,
                width,
                height
            )));
        }
        let name = decoder
            .get_tag_ascii_string(Tag::ImageDescription)
            .map(|s| s.trim_end_matches('\0').to_string())
            .unwrap_or_else(|_| format!("band_{}", raster.band_count()));
        let nodata = decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_end_matches('\0').trim().parse().ok());
        let data = decode_band(&mut decoder)?;
        raster.push_band(Band::new(name, data, nodata))?;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(raster)
}

fn read_bounds<R: Read + Seek>(decoder: &mut Decoder<R>, width: u32, height: u32) -> Result<BoundingBox> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    match (tiepoint, pixel_scale) {
        (Ok(tie), Ok(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            let left = tie[3];
            let top = tie[4];
            Ok(BoundingBox::new(
                left,
                top - height as f64 * scale[1],
                left + width as f64 * scale[0],
                top,
            ))
        }
        _ => Err(RasterError::InvalidGeoTiff(
            "missing ModelTiepoint or ModelPixelScale".to_string(),
        )),
    }
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u16> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    // Header is 4 entries, then (key, location, count, value) quads
    keys.get(4..)?
        .chunks_exact(4)
        .find(|k| k[0] == GEOGRAPHIC_TYPE_GEO_KEY || k[0] == PROJECTED_CS_TYPE_GEO_KEY)
        .map(|k| k[3])
}

fn decode_band<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn two_band_raster() -> Raster {
        let bounds = BoundingBox::new(-180.0, -90.0, 0.0, 90.0);
        Raster::new(4, 2, bounds, Some(4326))
            .unwrap()
            .with_band(Band::new("polygon_count", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], Some(0.0)))
            .unwrap()
            .with_band(Band::new("coverage", vec![0.5; 8], None))
            .unwrap()
    }

    #[test]
    fn test_bands_and_georeference_survive_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tile.tif");
        let raster = two_band_raster();
        write(&raster, &path).unwrap();

        let back = read(&path).unwrap();
        assert_eq!(back.shape(), (4, 2));
        assert_eq!(back.band_count(), 2);
        assert_eq!(back.epsg(), Some(4326));
        assert_relative_eq!(back.bounds().left, -180.0);
        assert_relative_eq!(back.bounds().bottom, -90.0);
        assert_relative_eq!(back.bounds().right, 0.0);
        assert_relative_eq!(back.bounds().top, 90.0);

        let count = back.band(0).unwrap();
        assert_eq!(count.name, "polygon_count");
        assert_eq!(count.nodata, Some(0.0));
        assert_eq!(count.data, raster.band(0).unwrap().data);

        let coverage = back.band(1).unwrap();
        assert_eq!(coverage.name, "coverage");
        assert_eq!(coverage.nodata, None);
    }

    #[test]
    fn test_geotiff_tags_use_standard_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tile.tif");
        write(&two_band_raster(), &path).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let tie = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_eq!(&tie[3..5], &[-180.0, 90.0]);
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(&scale[..2], &[45.0, 90.0]);
        assert!(decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).is_ok());
        assert_eq!(decoder.get_tag_ascii_string(Tag::GdalNodata).unwrap().trim_end_matches('\0'), "0");
    }

    #[test]
    fn test_overwrites_truncated_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tile.tif");
        std::fs::write(&path, b"II*\0").unwrap();
        assert!(read(&path).is_err());

        write(&two_band_raster(), &path).unwrap();
        assert_eq!(read(&path).unwrap().band_count(), 2);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_projected_geokeys() {
        let keys = geokey_directory(3857);
        assert_eq!(&keys[12..], &[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, 3857]);
        assert_eq!(keys[7], MODEL_TYPE_PROJECTED);
    }

    #[test]
    fn test_empty_raster_not_written() {
        let tmp = TempDir::new().unwrap();
        let raster = Raster::new(1, 1, BoundingBox::new(0.0, 0.0, 1.0, 1.0), None).unwrap();
        assert!(write(&raster, &tmp.path().join("x.tif")).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read(Path::new("/nonexistent/tile.tif")),
            Err(RasterError::Io(_))
        ));
    }
}
