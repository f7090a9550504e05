//! Per-statistic settings.

use crate::TilerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vizraster_raster::{Aggregation, Palette, Resampling, StatSpec, WeightBy};

/// (min, max); either bound may be unset.
pub type RangeBounds = (Option<f64>, Option<f64>);

/// Palette colors: an explicit list of CSS colors or hex codes, or the
/// name of a registered colormap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaletteSpec {
    Colors(Vec<String>),
    Named(String),
}

/// Settings that apply to one zoom level only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZConfig {
    #[serde(default)]
    pub val_range: Option<RangeBounds>,
}

/// One statistic: a GeoTIFF band and a web tile layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticConfig {
    /// Unique name; also the web tile style directory.
    pub name: String,
    pub weight_by: WeightBy,
    /// Feature property, or one of `centroids_per_pixel`,
    /// `area_within_pixel`, `area_per_pixel_area`.
    pub property: String,
    pub aggregation_method: Aggregation,
    pub resampling_method: Resampling,
    /// Range used for every zoom level without its own.
    #[serde(default)]
    pub val_range: Option<RangeBounds>,
    #[serde(default = "default_palette")]
    pub palette: PaletteSpec,
    #[serde(default)]
    pub nodata_val: Option<f32>,
    #[serde(default = "default_nodata_color")]
    pub nodata_color: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub z_config: BTreeMap<u8, ZConfig>,
}

fn default_palette() -> PaletteSpec {
    PaletteSpec::Colors(vec!["#ffffff".to_string(), "#000000".to_string()])
}

fn default_nodata_color() -> String {
    "#ffffff00".to_string()
}

impl StatisticConfig {
    /// Number of polygons whose centroid falls in each pixel.
    pub fn polygon_count() -> Self {
        Self {
            name: "polygon_count".to_string(),
            weight_by: WeightBy::Count,
            property: "centroids_per_pixel".to_string(),
            aggregation_method: Aggregation::Sum,
            resampling_method: Resampling::Sum,
            val_range: Some((Some(0.0), None)),
            palette: default_palette(),
            nodata_val: Some(0.0),
            nodata_color: default_nodata_color(),
            z_config: BTreeMap::new(),
        }
    }

    /// Fraction of each pixel covered by polygons.
    pub fn coverage() -> Self {
        Self {
            name: "coverage".to_string(),
            weight_by: WeightBy::Area,
            property: "area_per_pixel_area".to_string(),
            aggregation_method: Aggregation::Sum,
            resampling_method: Resampling::Average,
            val_range: Some((Some(0.0), Some(1.0))),
            palette: default_palette(),
            nodata_val: Some(0.0),
            nodata_color: default_nodata_color(),
            z_config: BTreeMap::new(),
        }
    }

    /// Band spec handed to the rasterizer.
    pub fn stat_spec(&self) -> StatSpec {
        StatSpec {
            name: self.name.clone(),
            weight_by: self.weight_by,
            property: self.property.as_str().into(),
            aggregation: self.aggregation_method,
            nodata: self.nodata_val,
        }
    }

    /// Parsed palette with its nodata color.
    pub fn palette(&self) -> Result<Palette, TilerError> {
        match &self.palette {
            PaletteSpec::Colors(colors) => Ok(Palette::from_strs(colors.as_slice(), &self.nodata_color)?),
            PaletteSpec::Named(name) => Ok(Palette::from_colormap(name, &self.nodata_color)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizraster_raster::StatProperty;

    #[test]
    fn test_parse_with_defaults() {
        let json = r##"{
            "name": "height",
            "weight_by": "count",
            "property": "max_height",
            "aggregation_method": "max",
            "resampling_method": "max",
            "z_config": {"10": {"val_range": [null, 40]}}
        }"##;
        let stat: StatisticConfig = serde_json::from_str(json).unwrap();
        assert_eq!(stat.nodata_color, "#ffffff00");
        assert_eq!(stat.val_range, None);
        assert_eq!(stat.z_config[&10].val_range, Some((None, Some(40.0))));
        assert_eq!(stat.stat_spec().property, StatProperty::Column("max_height".to_string()));
        assert!(stat.palette().is_ok());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let json = r#"{"name": "n", "weight_by": "count", "property": "p",
                       "aggregation_method": "avg", "resampling_method": "sum"}"#;
        assert!(serde_json::from_str::<StatisticConfig>(json).is_err());
    }

    #[test]
    fn test_named_palette_resolves() {
        let mut stat: StatisticConfig = serde_json::from_str(
            r#"{"name": "n", "weight_by": "count", "property": "p",
                "aggregation_method": "sum", "resampling_method": "sum", "palette": "viridis"}"#,
        )
        .unwrap();
        assert_eq!(stat.palette, PaletteSpec::Named("viridis".to_string()));
        assert_eq!(stat.palette().unwrap().colors().len(), 10);

        stat.palette = PaletteSpec::Colors(vec!["darkred".to_string(), "gold".to_string()]);
        assert!(stat.palette().is_ok());

        stat.palette = PaletteSpec::Named("no_such_map".to_string());
        assert!(matches!(stat.palette(), Err(TilerError::Raster(_))));
    }
}
