//! Deduplication settings.
//!
//! Duplicates are polygons that appear in more than one input file. They
//! are marked during staging; these settings decide at which stages the
//! marked rows are dropped and how the marking was configured.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage at which duplicates may be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupStage {
    Staging,
    Raster,
    #[serde(rename = "3dtiles")]
    Tiles3d,
}

impl fmt::Display for DedupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DedupStage::Staging => "staging",
            DedupStage::Raster => "raster",
            DedupStage::Tiles3d => "3dtiles",
        })
    }
}

/// How duplicates are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMethod {
    /// Nearby or overlapping polygons from different files.
    Neighbor,
    /// Polygons inside overlapping file footprints.
    Footprints,
}

/// Which polygon of a duplicate pair survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepOrder {
    Larger,
    Smaller,
}

/// `(property, order)`: keep the polygon with the larger or smaller value.
/// Rules are applied in order; ties fall through to the next rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepRule(pub String, pub KeepOrder);

/// Resolved options for one deduplication method.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupConfig {
    Neighbor {
        split_by: String,
        prop_area: String,
        prop_centroid_x: String,
        prop_centroid_y: String,
        keep_rules: Vec<KeepRule>,
        overlap_tolerance: Option<f64>,
        overlap_both: bool,
        centroid_tolerance: Option<f64>,
        distance_crs: Option<String>,
        prop_duplicated: String,
    },
    Footprints {
        split_by: String,
        /// Input file name to its footprint file. Files without a footprint
        /// on disk are left out.
        footprints: BTreeMap<String, PathBuf>,
        keep_rules: Vec<KeepRule>,
        clip_to_footprint: bool,
        clip_method: String,
        prop_duplicated: String,
    },
}

impl DedupConfig {
    pub fn method(&self) -> DedupMethod {
        match self {
            DedupConfig::Neighbor { .. } => DedupMethod::Neighbor,
            DedupConfig::Footprints { .. } => DedupMethod::Footprints,
        }
    }

    /// Boolean column that marks duplicate rows.
    pub fn prop_duplicated(&self) -> &str {
        match self {
            DedupConfig::Neighbor { prop_duplicated, .. }
            | DedupConfig::Footprints { prop_duplicated, .. } => prop_duplicated,
        }
    }
}
