//! Tiler configuration.
//!
//! [`TilerConfig`] is read once from a JSON or YAML file (chosen by file
//! extension) and never mutated afterwards. Every key is optional and falls
//! back to the defaults below. Value ranges discovered while building are
//! kept in a separate [`ValueRangeStore`](crate::ValueRangeStore) and can be
//! written back into an `_updated` copy of the file with
//! [`TilerConfig::with_ranges`] and [`TilerConfig::write_updated`]. The same
//! ranges drive the viewer layer list built by
//! [`TilerConfig::raster_layer_configs`].
//!
//! ```json
//! {
//!     "dir_staged": "staged",
//!     "ext_staged": ".geojson",
//!     "z_range": [0, 11],
//!     "statistics": [
//!         {
//!             "name": "coverage",
//!             "weight_by": "area",
//!             "property": "area_per_pixel_area",
//!             "aggregation_method": "sum",
//!             "resampling_method": "average",
//!             "val_range": [0, 1],
//!             "palette": ["#ffffff", "#1d4e89"],
//!             "z_config": {"0": {"val_range": [0, 0.5]}}
//!         }
//!     ]
//! }
//! ```

mod dedup;
mod layers;
mod statistic;

pub use dedup::{DedupConfig, DedupMethod, DedupStage, KeepOrder, KeepRule};
pub use layers::{
    join_url, tiling_scheme_name, write_layer_configs, CesiumOptions, ColorPalette, ColorStop, ImageryOptions,
    LayerConfig, LayerKind, PaletteType, TilesetOptions,
};
pub use statistic::{PaletteSpec, RangeBounds, StatisticConfig, ZConfig};

use crate::ranges::ValueRangeStore;
use crate::TilerError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vizraster_raster::{Palette, RasterSpec, Resampling, VectorTable};
use vizraster_tiles::{DirSpec, PathPart, PathStructure, TileDir, TilePathManager, Tms, MAX_ZOOM};

const DEFAULT_CONFIG_FILENAME: &str = "config.json";

/// Settings for one pyramid build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilerConfig {
    pub dir_input: PathBuf,
    pub dir_staged: PathBuf,
    pub dir_geotiff: PathBuf,
    pub dir_web_tiles: PathBuf,
    pub dir_3dtiles: PathBuf,
    pub dir_footprints: PathBuf,

    /// Event ledger CSV.
    pub filename_rasterization_events: PathBuf,
    /// Raster summary ledger CSV.
    pub filename_rasters_summary: PathBuf,
    /// Where this config lives; set to the loaded file when absent.
    pub filename_config: Option<PathBuf>,

    pub ext_input: String,
    pub ext_staged: String,
    pub ext_web_tiles: String,
    pub ext_footprints: String,

    pub prop_centroid_x: String,
    pub prop_centroid_y: String,
    pub prop_area: String,
    pub prop_tile: String,
    pub prop_centroid_tile: String,
    pub prop_filename: String,
    pub prop_identifier: String,
    pub prop_centroid_within_tile: String,
    pub prop_duplicated: String,

    pub tms_id: Tms,
    pub tile_path_structure: Vec<PathPart>,
    /// (min_z, max_z), both inclusive. Leaves are rasterized at `max_z`.
    pub z_range: (u8, u8),
    /// Raster (width, height) in pixels.
    pub tile_size: (u32, u32),
    /// Band order of every GeoTIFF.
    pub statistics: Vec<StatisticConfig>,

    pub deduplicate_at: Option<Vec<DedupStage>>,
    pub deduplicate_method: Option<DedupMethod>,
    pub deduplicate_keep_rules: Vec<KeepRule>,
    pub deduplicate_overlap_tolerance: Option<f64>,
    pub deduplicate_overlap_both: bool,
    pub deduplicate_centroid_tolerance: Option<f64>,
    pub deduplicate_distance_crs: Option<String>,
    pub deduplicate_clip_to_footprint: bool,
    pub deduplicate_clip_method: String,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            dir_input: PathBuf::from("input"),
            dir_staged: PathBuf::from("staged"),
            dir_geotiff: PathBuf::from("geotiff"),
            dir_web_tiles: PathBuf::from("web_tiles"),
            dir_3dtiles: PathBuf::from("3dtiles"),
            dir_footprints: PathBuf::from("footprints"),
            filename_rasterization_events: PathBuf::from("rasterization_events.csv"),
            filename_rasters_summary: PathBuf::from("rasters_summary.csv"),
            filename_config: None,
            ext_input: ".shp".to_string(),
            ext_staged: ".gpkg".to_string(),
            ext_web_tiles: ".png".to_string(),
            ext_footprints: ".gpkg".to_string(),
            prop_centroid_x: "staging_centroid_x".to_string(),
            prop_centroid_y: "staging_centroid_y".to_string(),
            prop_area: "staging_area".to_string(),
            prop_tile: "staging_tile".to_string(),
            prop_centroid_tile: "staging_centroid_tile".to_string(),
            prop_filename: "staging_filename".to_string(),
            prop_identifier: "staging_identifier".to_string(),
            prop_centroid_within_tile: "staging_centroid_within_tile".to_string(),
            prop_duplicated: "staging_duplicated".to_string(),
            tms_id: Tms::Wgs1984Quad,
            tile_path_structure: PathStructure::default().parts().to_vec(),
            z_range: (0, 13),
            tile_size: (256, 256),
            statistics: vec![StatisticConfig::polygon_count(), StatisticConfig::coverage()],
            deduplicate_at: None,
            deduplicate_method: None,
            deduplicate_keep_rules: Vec::new(),
            deduplicate_overlap_tolerance: Some(0.5),
            deduplicate_overlap_both: true,
            deduplicate_centroid_tolerance: None,
            deduplicate_distance_crs: Some("EPSG:3857".to_string()),
            deduplicate_clip_to_footprint: true,
            deduplicate_clip_method: "intersects".to_string(),
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl TilerConfig {
    /// Load and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TilerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TilerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: TilerConfig = if is_yaml(path) {
            serde_yaml::from_str(&text)?
        } else {
            serde_json::from_str(&text)?
        };
        if config.filename_config.is_none() {
            config.filename_config = Some(path.to_path_buf());
        }
        config.validate()?;
        info!(path = %path.display(), stats = config.statistics.len(), "Loaded tiler config");
        Ok(config)
    }

    /// Check the settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), TilerError> {
        if self.statistics.is_empty() {
            return Err(TilerError::Configuration("at least one statistic is required".to_string()));
        }
        let mut seen = HashSet::new();
        for stat in &self.statistics {
            if stat.name.trim().is_empty() {
                return Err(TilerError::Configuration("statistic names must not be empty".to_string()));
            }
            if !seen.insert(stat.name.as_str()) {
                return Err(TilerError::Configuration(format!(
                    "duplicate statistic name '{}'",
                    stat.name
                )));
            }
            stat.stat_spec().validate()?;
            stat.palette()?;
        }
        let (min_z, max_z) = self.z_range;
        if min_z > max_z {
            return Err(TilerError::Configuration(format!(
                "z_range [{min_z}, {max_z}] is reversed"
            )));
        }
        if max_z > MAX_ZOOM {
            return Err(TilerError::Configuration(format!(
                "max zoom {max_z} exceeds {MAX_ZOOM}"
            )));
        }
        if self.tile_size.0 == 0 || self.tile_size.1 == 0 {
            return Err(TilerError::Configuration("tile_size must be positive".to_string()));
        }
        PathStructure::new(self.tile_path_structure.clone())?;
        Ok(())
    }

    /// Lowest-resolution zoom level built.
    pub fn min_z(&self) -> u8 {
        self.z_range.0
    }

    /// Zoom level of the staged vector tiles.
    pub fn max_z(&self) -> u8 {
        self.z_range.1
    }

    pub fn tms(&self) -> Tms {
        self.tms_id
    }

    pub fn stat_names(&self) -> Vec<&str> {
        self.statistics.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn stat(&self, name: &str) -> Option<&StatisticConfig> {
        self.statistics.iter().find(|s| s.name == name)
    }

    /// One palette per statistic, in band order.
    pub fn palettes(&self) -> Result<Vec<Palette>, TilerError> {
        self.statistics.iter().map(StatisticConfig::palette).collect()
    }

    pub fn nodata_vals(&self) -> Vec<Option<f32>> {
        self.statistics.iter().map(|s| s.nodata_val).collect()
    }

    pub fn resampling_methods(&self) -> Vec<Resampling> {
        self.statistics.iter().map(|s| s.resampling_method).collect()
    }

    /// Rasterizer settings for leaf tiles.
    pub fn raster_spec(&self) -> RasterSpec {
        RasterSpec {
            centroid_properties: (self.prop_centroid_x.clone(), self.prop_centroid_y.clone()),
            area_property: self.prop_area.clone(),
            shape: self.tile_size,
            epsg: Some(self.tms_id.epsg()),
            stats: self.statistics.iter().map(StatisticConfig::stat_spec).collect(),
        }
    }

    /// Path resolver with every tile directory registered.
    pub fn path_manager(&self) -> Result<TilePathManager, TilerError> {
        let structure = PathStructure::new(self.tile_path_structure.clone())?;
        Ok(TilePathManager::new(self.tms_id)
            .with_structure(structure)
            .with_dir(TileDir::Input, DirSpec::new(&self.dir_input, &self.ext_input))
            .with_dir(TileDir::Footprints, DirSpec::new(&self.dir_footprints, &self.ext_footprints))
            .with_dir(TileDir::Staged, DirSpec::new(&self.dir_staged, &self.ext_staged))
            .with_dir(TileDir::Geotiff, DirSpec::new(&self.dir_geotiff, ".tif"))
            .with_dir(TileDir::WebTiles, DirSpec::new(&self.dir_web_tiles, &self.ext_web_tiles))
            .with_dir(TileDir::Tiles3d, DirSpec::new(&self.dir_3dtiles, ".json")))
    }

    /// Whether duplicates are dropped at `stage`.
    pub fn deduplicate_at(&self, stage: DedupStage) -> bool {
        self.deduplicate_at
            .as_ref()
            .is_some_and(|stages| stages.contains(&stage))
    }

    pub fn deduplication_method(&self) -> Option<DedupMethod> {
        self.deduplicate_method
    }

    /// Deduplication options for `stage`, or `None` when nothing should be
    /// removed there. For the footprint method, `table` supplies the input
    /// file names whose footprints are looked up.
    pub fn dedup_config_for(&self, stage: DedupStage, table: &VectorTable) -> Option<DedupConfig> {
        if !self.deduplicate_at(stage) {
            return None;
        }
        match self.deduplication_method()? {
            DedupMethod::Neighbor => Some(DedupConfig::Neighbor {
                split_by: self.prop_filename.clone(),
                prop_area: self.prop_area.clone(),
                prop_centroid_x: self.prop_centroid_x.clone(),
                prop_centroid_y: self.prop_centroid_y.clone(),
                keep_rules: self.deduplicate_keep_rules.clone(),
                overlap_tolerance: self.deduplicate_overlap_tolerance,
                overlap_both: self.deduplicate_overlap_both,
                centroid_tolerance: self.deduplicate_centroid_tolerance,
                distance_crs: self.deduplicate_distance_crs.clone(),
                prop_duplicated: self.prop_duplicated.clone(),
            }),
            DedupMethod::Footprints => {
                let files: BTreeSet<&str> = table
                    .rows()
                    .iter()
                    .filter_map(|r| match r.get(&self.prop_filename) {
                        Some(vizraster_raster::Value::Text(name)) => Some(name.as_str()),
                        _ => None,
                    })
                    .collect();
                let mut footprints = BTreeMap::new();
                for file in files {
                    match self.footprint_path_from_input(Path::new(file), true) {
                        Ok(fp) => {
                            footprints.insert(file.to_string(), fp);
                        }
                        Err(_) => warn!(
                            file,
                            "No footprint file found, deduplication will not be performed for this file"
                        ),
                    }
                }
                Some(DedupConfig::Footprints {
                    split_by: self.prop_filename.clone(),
                    footprints,
                    keep_rules: self.deduplicate_keep_rules.clone(),
                    clip_to_footprint: self.deduplicate_clip_to_footprint,
                    clip_method: self.deduplicate_clip_method.clone(),
                    prop_duplicated: self.prop_duplicated.clone(),
                })
            }
        }
    }

    /// Footprint file for an input file: same relative path under
    /// `dir_footprints`, with the footprint extension.
    pub fn footprint_path_from_input(&self, path: &Path, check_exists: bool) -> Result<PathBuf, TilerError> {
        let rel = path.strip_prefix(&self.dir_input).unwrap_or(path);
        let rel = rel.strip_prefix("/").unwrap_or(rel);
        let mut footprint = self.dir_footprints.join(rel);
        footprint.set_extension(self.ext_footprints.trim_start_matches('.'));

        if check_exists && !footprint.is_file() {
            info!(path = %footprint.display(), "Failed to find footprint file");
            return Err(TilerError::Configuration(format!(
                "footprint file not found: {}",
                footprint.display()
            )));
        }
        Ok(footprint)
    }

    /// Path this config is written back to.
    pub fn config_path(&self) -> PathBuf {
        self.filename_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
    }

    /// `<stem>_updated.<ext>` next to [`Self::config_path`].
    pub fn updated_config_path(&self) -> PathBuf {
        let path = self.config_path();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config");
        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_updated.{ext}"),
            None => format!("{stem}_updated"),
        };
        path.with_file_name(name)
    }

    /// A copy whose `val_range` and `z_config` entries hold the store's ranges.
    pub fn with_ranges(&self, ranges: &ValueRangeStore) -> TilerConfig {
        let mut config = self.clone();
        for stat in &mut config.statistics {
            let Ok(global) = ranges.global(&stat.name) else { continue };
            if stat.val_range.is_some() || !global.is_unset() {
                stat.val_range = Some(global.to_bounds());
            }
            if let Ok(per_zoom) = ranges.zoom_ranges(&stat.name) {
                for (z, range) in per_zoom {
                    stat.z_config.entry(*z).or_default().val_range = Some(range.to_bounds());
                }
            }
        }
        config
    }

    /// Serialize to `path`, as YAML for `.yaml`/`.yml` and pretty JSON otherwise.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), TilerError> {
        let path = path.as_ref();
        let text = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TilerError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| TilerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write to [`Self::updated_config_path`] and return that path.
    pub fn write_updated(&self) -> Result<PathBuf, TilerError> {
        let path = self.updated_config_path();
        self.write(&path)?;
        info!(path = %path.display(), "Wrote updated config");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::ValueRange;
    use tempfile::TempDir;
    use vizraster_raster::{Properties, Value};

    #[test]
    fn test_defaults() {
        let config: TilerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TilerConfig::default());
        assert_eq!(config.stat_names(), vec!["polygon_count", "coverage"]);
        assert_eq!((config.min_z(), config.max_z()), (0, 13));
        assert_eq!(config.tms(), Tms::Wgs1984Quad);
        assert_eq!(
            config.resampling_methods(),
            vec![Resampling::Sum, Resampling::Average]
        );
        assert_eq!(config.nodata_vals(), vec![Some(0.0), Some(0.0)]);
        assert_eq!(config.config_path(), PathBuf::from("config.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json_and_yaml() {
        let tmp = TempDir::new().unwrap();
        let json = tmp.path().join("config.json");
        std::fs::write(
            &json,
            r#"{"tms_id": "WorldCRS84Quad", "z_range": [2, 5]}"#,
        )
        .unwrap();
        let config = TilerConfig::load(&json).unwrap();
        assert_eq!(config.tms(), Tms::Wgs1984Quad);
        assert_eq!(config.z_range, (2, 5));
        assert_eq!(config.filename_config.as_deref(), Some(json.as_path()));

        let yaml = tmp.path().join("tiler.yaml");
        std::fs::write(
            &yaml,
            "tms_id: WebMercatorQuad\nstatistics:\n  - name: n\n    weight_by: count\n    property: centroids_per_pixel\n    aggregation_method: sum\n    resampling_method: sum\n    z_config:\n      3:\n        val_range: [0, 10]\n",
        )
        .unwrap();
        let config = TilerConfig::load(&yaml).unwrap();
        assert_eq!(config.tms(), Tms::WebMercatorQuad);
        assert_eq!(config.statistics[0].z_config[&3].val_range, Some((Some(0.0), Some(10.0))));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = TilerConfig::default();
        config.statistics[1].name = "polygon_count".to_string();
        assert!(matches!(config.validate(), Err(TilerError::Configuration(_))));

        let mut config = TilerConfig::default();
        config.z_range = (5, 3);
        assert!(config.validate().is_err());

        let mut config = TilerConfig::default();
        config.tile_path_structure = vec![PathPart::Z, PathPart::Style, PathPart::X, PathPart::Y];
        assert!(config.validate().is_err());

        let mut config = TilerConfig::default();
        config.statistics.clear();
        assert!(config.validate().is_err());

        assert!(serde_json::from_str::<TilerConfig>(r#"{"tms_id": "UTM31WGS84Quad"}"#).is_err());
    }

    #[test]
    fn test_updated_path() {
        let mut config = TilerConfig::default();
        assert_eq!(config.updated_config_path(), PathBuf::from("config_updated.json"));
        config.filename_config = Some(PathBuf::from("runs/a/tiler.yaml"));
        assert_eq!(config.updated_config_path(), PathBuf::from("runs/a/tiler_updated.yaml"));
    }

    #[test]
    fn test_with_ranges_writes_back() {
        let tmp = TempDir::new().unwrap();
        let mut config = TilerConfig::default();
        config.filename_config = Some(tmp.path().join("config.json"));

        let mut ranges = ValueRangeStore::from_config(&config);
        ranges.set_max("polygon_count", Some(10), 9.0, false).unwrap();
        let updated = config.with_ranges(&ranges);
        assert_eq!(
            updated.statistics[0].z_config[&10].val_range,
            Some((None, Some(9.0)))
        );
        assert_eq!(updated.statistics[0].val_range, Some((Some(0.0), None)));
        // The loaded config itself is untouched
        assert!(config.statistics[0].z_config.is_empty());

        let path = updated.write_updated().unwrap();
        assert_eq!(path, tmp.path().join("config_updated.json"));
        let reread = TilerConfig::load(&path).unwrap();
        assert_eq!(reread.statistics[0].z_config[&10].val_range, Some((None, Some(9.0))));
        assert_eq!(
            ValueRangeStore::from_config(&reread).get("polygon_count", Some(10), true).unwrap(),
            ValueRange::new(Some(0.0), Some(9.0))
        );
    }

    #[test]
    fn test_dedup_only_at_enabled_stages() {
        let mut config = TilerConfig::default();
        let table = VectorTable::default();
        config.deduplicate_at = Some(vec![DedupStage::Raster]);
        assert!(config.dedup_config_for(DedupStage::Raster, &table).is_none());

        config.deduplicate_method = Some(DedupMethod::Neighbor);
        let dedup = config.dedup_config_for(DedupStage::Raster, &table).unwrap();
        assert_eq!(dedup.method(), DedupMethod::Neighbor);
        assert_eq!(dedup.prop_duplicated(), "staging_duplicated");
        assert!(config.dedup_config_for(DedupStage::Tiles3d, &table).is_none());
    }

    #[test]
    fn test_footprint_lookup() {
        let tmp = TempDir::new().unwrap();
        let mut config = TilerConfig::default();
        config.dir_input = tmp.path().join("input");
        config.dir_footprints = tmp.path().join("footprints");
        config.deduplicate_at = Some(vec![DedupStage::Raster]);
        config.deduplicate_method = Some(DedupMethod::Footprints);

        let expected = tmp.path().join("footprints/site_a/file1.gpkg");
        assert_eq!(
            config
                .footprint_path_from_input(&tmp.path().join("input/site_a/file1.shp"), false)
                .unwrap(),
            expected
        );
        assert!(config
            .footprint_path_from_input(Path::new("site_a/file1.shp"), true)
            .is_err());

        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"").unwrap();

        let mut row = Properties::new();
        row.insert("staging_filename".to_string(), Value::Text("site_a/file1.shp".to_string()));
        let mut other = Properties::new();
        other.insert("staging_filename".to_string(), Value::Text("site_b/file2.shp".to_string()));
        let table = VectorTable::new(vec![row, other]);

        match config.dedup_config_for(DedupStage::Raster, &table).unwrap() {
            DedupConfig::Footprints { footprints, .. } => {
                assert_eq!(footprints.len(), 1);
                assert_eq!(footprints["site_a/file1.shp"], expected);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }
}
