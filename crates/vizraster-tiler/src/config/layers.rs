//! Viewer layer configs for publishing a built pyramid.
//!
//! Each statistic becomes a WMTS imagery layer whose URL template follows the
//! tile path structure and whose color stops spread the statistic's palette
//! over its value range at `max_z`. A 3D tileset layer can be listed ahead of
//! them. The output is the JSON layer list a Cesium-based map viewer reads.

use super::TilerConfig;
use crate::ranges::ValueRangeStore;
use crate::TilerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use vizraster_raster::{write_file_atomic, Rgba};
use vizraster_tiles::{BoundingBox, PathPart, Tms};

/// Kind of map layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    WebMapTileServiceImageryProvider,
    Cesium3DTileset,
}

/// How the viewer interprets the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteType {
    Continuous,
    Categorical,
}

/// One color, pinned to a value for continuous palettes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub palette_type: PaletteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub colors: Vec<ColorStop>,
}

/// Options handed to the imagery provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageryOptions {
    pub url: String,
    pub tiling_scheme: String,
    /// `[west, south, east, north]` in degrees; `None` means the whole world.
    pub rectangle: Option<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilesetOptions {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CesiumOptions {
    Imagery(ImageryOptions),
    Tileset(TilesetOptions),
}

/// A single entry of the viewer's layer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub label: String,
    pub cesium_options: CesiumOptions,
    pub color_palette: ColorPalette,
}

/// Cesium tiling scheme matching a tile matrix set.
pub fn tiling_scheme_name(tms: Tms) -> &'static str {
    match tms {
        Tms::Wgs1984Quad => "GeographicTilingScheme",
        Tms::WebMercatorQuad => "WebMercatorTilingScheme",
    }
}

/// `base_url` and `relative` joined with a single `/`; `relative` alone when
/// there is no base.
pub fn join_url(base_url: &str, relative: &str) -> String {
    if base_url.is_empty() {
        return relative.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

impl TilerConfig {
    /// WMTS URL template of one statistic's web tiles.
    pub fn web_tile_url_template(&self, base_url: &str, stat: &str) -> String {
        let mut parts: Vec<String> = self
            .tile_path_structure
            .iter()
            .map(|part| match part {
                PathPart::Style => stat.to_string(),
                PathPart::Tms => self.tms_id.id().to_string(),
                PathPart::Z => "{TileMatrix}".to_string(),
                PathPart::X => "{TileCol}".to_string(),
                PathPart::Y => "{TileRow}".to_string(),
            })
            .collect();
        if let Some(last) = parts.last_mut() {
            last.push_str(&self.ext_web_tiles);
        }
        join_url(base_url, &parts.join("/"))
    }

    /// One imagery layer per statistic, in band order.
    ///
    /// Color stops use the statistic's range at `max_z`, falling back to its
    /// global range per bound; a statistic whose range is still incomplete is
    /// a configuration error. `rectangle` is in degrees.
    pub fn raster_layer_configs(
        &self,
        base_url: &str,
        rectangle: Option<BoundingBox>,
    ) -> Result<Vec<LayerConfig>, TilerError> {
        let ranges = ValueRangeStore::from_config(self);
        let max_z = self.max_z();
        let tiling_scheme = tiling_scheme_name(self.tms_id).to_string();
        let rectangle = rectangle.map(|b| [b.left, b.bottom, b.right, b.top]);

        let mut layers = Vec::with_capacity(self.statistics.len());
        for stat in &self.statistics {
            let range = ranges.get(&stat.name, Some(max_z), true)?;
            let (Some(min), Some(max)) = (range.min, range.max) else {
                return Err(TilerError::Configuration(format!(
                    "statistic '{}' has no complete value range at z={}; update ranges first",
                    stat.name, max_z
                )));
            };

            let colors = stat.palette()?.colors().to_vec();
            let steps = colors.len().saturating_sub(1).max(1) as f64;
            let stops = colors
                .iter()
                .enumerate()
                .map(|(i, color)| ColorStop {
                    color: color.to_rgb_hex(),
                    value: Some(min + (max - min) * (i as f64 / steps)),
                })
                .collect();

            layers.push(LayerConfig {
                kind: LayerKind::WebMapTileServiceImageryProvider,
                label: stat.name.clone(),
                cesium_options: CesiumOptions::Imagery(ImageryOptions {
                    url: self.web_tile_url_template(base_url, &stat.name),
                    tiling_scheme: tiling_scheme.clone(),
                    rectangle,
                }),
                color_palette: ColorPalette {
                    palette_type: PaletteType::Continuous,
                    property: Some(stat.name.clone()),
                    colors: stops,
                },
            });
        }
        Ok(layers)
    }

    /// A 3D tileset layer in a single color.
    ///
    /// Without `color`, the last palette color of the first statistic is
    /// used, or white when there are no statistics.
    pub fn tileset_layer_config(&self, tileset_url: &str, color: Option<&str>) -> Result<LayerConfig, TilerError> {
        let color = match color {
            Some(color) => Rgba::parse(color)?,
            None => match self.statistics.first() {
                Some(stat) => stat.palette()?.colors().last().copied().unwrap_or(Rgba([255, 255, 255, 255])),
                None => Rgba([255, 255, 255, 255]),
            },
        };
        Ok(LayerConfig {
            kind: LayerKind::Cesium3DTileset,
            label: "3D Tiles".to_string(),
            cesium_options: CesiumOptions::Tileset(TilesetOptions {
                url: tileset_url.to_string(),
            }),
            color_palette: ColorPalette {
                palette_type: PaletteType::Categorical,
                property: None,
                colors: vec![ColorStop {
                    color: color.to_rgb_hex(),
                    value: None,
                }],
            },
        })
    }
}

/// Write a layer list as pretty JSON.
pub fn write_layer_configs(layers: &[LayerConfig], path: &Path) -> Result<(), TilerError> {
    let text = serde_json::to_string_pretty(layers)?;
    let io_err = |source| TilerError::ConfigIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    write_file_atomic(path, text.as_bytes()).map_err(io_err)?;
    info!(path = %path.display(), layers = layers.len(), "Wrote layer configs");
    Ok(())
}
