//! Rasterize leaf tiles, composite them into a parent and render it.

use approx::assert_relative_eq;
use std::path::PathBuf;
use tempfile::TempDir;
use vizraster_raster::{
    Aggregation, CentroidRasterizer, Compositor, MosaicCompositor, Palette, PngEncoder, Properties,
    Raster, RasterSpec, Rasterizer, Resampling, StatSpec, TileEncoder, Value, VectorTable, WeightBy,
};
use vizraster_tiles::{TileCoord, Tms};

fn spec() -> RasterSpec {
    RasterSpec {
        centroid_properties: ("cx".to_string(), "cy".to_string()),
        area_property: "area".to_string(),
        shape: (4, 4),
        epsg: Some(Tms::Wgs1984Quad.epsg()),
        stats: vec![
            StatSpec {
                name: "polygon_count".to_string(),
                weight_by: WeightBy::Count,
                property: "centroids_per_pixel".into(),
                aggregation: Aggregation::Sum,
                nodata: Some(0.0),
            },
            StatSpec {
                name: "coverage".to_string(),
                weight_by: WeightBy::Area,
                property: "area_per_pixel_area".into(),
                aggregation: Aggregation::Sum,
                nodata: Some(0.0),
            },
        ],
    }
}

/// One feature centred in each pixel of the tile's north-west quarter.
fn features_for(tile: &TileCoord) -> VectorTable {
    let b = tile.bounds();
    let (pw, ph) = (b.width() / 4.0, b.height() / 4.0);
    let mut rows = Vec::new();
    for row in 0..2 {
        for col in 0..2 {
            let mut p = Properties::new();
            p.insert("cx".to_string(), Value::Number(b.left + (col as f64 + 0.5) * pw));
            p.insert("cy".to_string(), Value::Number(b.top - (row as f64 + 0.5) * ph));
            p.insert("area".to_string(), Value::Number(pw * ph * 0.5));
            rows.push(p);
        }
    }
    VectorTable::new(rows)
}

fn write_leaf(dir: &TempDir, tile: &TileCoord) -> PathBuf {
    let raster = CentroidRasterizer
        .rasterize(&features_for(tile), tile.bounds(), &spec())
        .unwrap();
    let path = dir
        .path()
        .join(format!("{}/{}/{}.tif", tile.z, tile.x, tile.y));
    raster.write_geotiff(&path).unwrap();
    path
}

#[test]
fn test_parent_from_two_of_four_children() {
    let tmp = TempDir::new().unwrap();
    let parent = TileCoord::new(Tms::Wgs1984Quad, 2, 3, 1).unwrap();
    let children = parent.children();

    // Only the NW and SE children exist
    let paths = vec![write_leaf(&tmp, &children[0]), write_leaf(&tmp, &children[3])];

    let merged = MosaicCompositor
        .composite(
            &paths,
            &[Resampling::Sum, Resampling::Average],
            (4, 4),
            parent.bounds(),
        )
        .unwrap();
    merged
        .write_geotiff(tmp.path().join("2/3/1.tif"))
        .unwrap();
    let merged = Raster::from_geotiff(tmp.path().join("2/3/1.tif")).unwrap();

    assert_eq!(merged.band_count(), 2);
    let summary = merged.summary();

    // Each child contributes one parent pixel holding its four features
    assert_eq!(summary[0].count, 2);
    assert_relative_eq!(summary[0].sum.unwrap(), 8.0);
    assert_eq!(merged.value(0, 0, 0), Some(4.0));
    assert_eq!(merged.value(0, 2, 2), Some(4.0));
    assert_eq!(merged.value(0, 3, 3), Some(0.0));

    assert_relative_eq!(summary[1].max.unwrap(), 0.5, epsilon = 1e-6);
    assert_eq!(summary[1].stat, "coverage");
}

#[test]
fn test_render_leaf_band() {
    let tmp = TempDir::new().unwrap();
    let tile = TileCoord::new(Tms::Wgs1984Quad, 3, 5, 2).unwrap();
    let path = write_leaf(&tmp, &tile);
    let raster = Raster::from_geotiff(&path).unwrap();

    let palette = Palette::from_strs(&["#ffffff", "#000000"], "#ffffff00").unwrap();
    let band = raster.band(0).unwrap();
    let png = PngEncoder
        .encode(&band.data, raster.shape(), &palette, 0.0, 1.0, band.nodata)
        .unwrap();
    assert!(!png.is_empty());
}
