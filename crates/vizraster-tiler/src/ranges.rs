//! Value ranges used to map raster values onto palettes.
//!
//! Each statistic has a global range and optional per-zoom ranges. A lookup
//! at a zoom level resolves each bound on its own: the per-zoom bound if set,
//! otherwise (only when fallback is requested) the global bound. Bounds
//! observed in raster summaries only ever fill bounds that are still unset,
//! so ranges fixed by the user or an earlier run are never replaced.

use crate::config::{RangeBounds, TilerConfig};
use crate::RangeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// A (min, max) pair; either bound may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unset(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    pub fn to_bounds(self) -> RangeBounds {
        (self.min, self.max)
    }

    fn bound(&self, bound: Bound) -> Option<f64> {
        match bound {
            Bound::Min => self.min,
            Bound::Max => self.max,
        }
    }

    fn bound_mut(&mut self, bound: Bound) -> &mut Option<f64> {
        match bound {
            Bound::Min => &mut self.min,
            Bound::Max => &mut self.max,
        }
    }
}

impl From<RangeBounds> for ValueRange {
    fn from((min, max): RangeBounds) -> Self {
        Self { min, max }
    }
}

/// One end of a [`ValueRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Min,
    Max,
}

impl Bound {
    pub fn name(&self) -> &'static str {
        match self {
            Bound::Min => "min",
            Bound::Max => "max",
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ranges observed in raster summaries: `stat -> z -> (min of mins, max of maxes)`.
pub type ObservedRanges = BTreeMap<String, BTreeMap<u8, ValueRange>>;

#[derive(Debug, Clone, Default, PartialEq)]
struct StatRanges {
    global: ValueRange,
    per_zoom: BTreeMap<u8, ValueRange>,
}

/// Mutable value ranges for every configured statistic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRangeStore {
    stats: BTreeMap<String, StatRanges>,
    changes: Vec<String>,
}

impl ValueRangeStore {
    /// An empty store; statistics are added with [`Self::insert_statistic`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `val_range` and `z_config` entries of each statistic.
    pub fn from_config(config: &TilerConfig) -> Self {
        let mut store = Self::new();
        for stat in &config.statistics {
            let entry = store.add_statistic(&stat.name, stat.val_range.map(ValueRange::from).unwrap_or_default());
            for (z, zc) in &stat.z_config {
                if let Some(bounds) = zc.val_range {
                    entry.per_zoom.insert(*z, bounds.into());
                }
            }
        }
        store
    }

    fn add_statistic(&mut self, name: &str, global: ValueRange) -> &mut StatRanges {
        let entry = self.stats.entry(name.to_string()).or_default();
        entry.global = global;
        entry
    }

    /// Register a statistic with a global range, replacing any previous entry.
    pub fn insert_statistic(&mut self, name: &str, global: ValueRange) {
        self.stats.insert(
            name.to_string(),
            StatRanges {
                global,
                per_zoom: BTreeMap::new(),
            },
        );
    }

    pub fn stat_names(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    fn entry(&self, stat: &str) -> Result<&StatRanges, RangeError> {
        self.stats
            .get(stat)
            .ok_or_else(|| RangeError::UnknownStatistic(stat.to_string()))
    }

    fn entry_mut(&mut self, stat: &str) -> Result<&mut StatRanges, RangeError> {
        self.stats
            .get_mut(stat)
            .ok_or_else(|| RangeError::UnknownStatistic(stat.to_string()))
    }

    /// The global range of `stat`.
    pub fn global(&self, stat: &str) -> Result<ValueRange, RangeError> {
        Ok(self.entry(stat)?.global)
    }

    /// Every per-zoom range of `stat`.
    pub fn zoom_ranges(&self, stat: &str) -> Result<&BTreeMap<u8, ValueRange>, RangeError> {
        Ok(&self.entry(stat)?.per_zoom)
    }

    /// Range of `stat` at zoom `z` (or the global range for `None`).
    ///
    /// With `allow_fallback`, each bound missing at the zoom level is taken
    /// from the global range. Without it only the per-zoom range is returned.
    pub fn get(&self, stat: &str, z: Option<u8>, allow_fallback: bool) -> Result<ValueRange, RangeError> {
        let entry = self.entry(stat)?;
        let Some(z) = z else {
            return Ok(entry.global);
        };
        let local = entry.per_zoom.get(&z).copied().unwrap_or_default();
        if !allow_fallback {
            return Ok(local);
        }
        Ok(ValueRange {
            min: local.min.or(entry.global.min),
            max: local.max.or(entry.global.max),
        })
    }

    /// Whether `bound` resolves to nothing under the given fallback policy.
    pub fn is_missing(&self, stat: &str, z: Option<u8>, bound: Bound, allow_fallback: bool) -> Result<bool, RangeError> {
        Ok(self.get(stat, z, allow_fallback)?.bound(bound).is_none())
    }

    pub fn min_missing(&self, stat: &str, z: Option<u8>, allow_fallback: bool) -> Result<bool, RangeError> {
        self.is_missing(stat, z, Bound::Min, allow_fallback)
    }

    pub fn max_missing(&self, stat: &str, z: Option<u8>, allow_fallback: bool) -> Result<bool, RangeError> {
        self.is_missing(stat, z, Bound::Max, allow_fallback)
    }

    /// Set the min bound, creating the per-zoom range if needed.
    ///
    /// An existing value is kept unless `overwrite` is true. Returns whether
    /// the stored value changed.
    pub fn set_min(&mut self, stat: &str, z: Option<u8>, value: f64, overwrite: bool) -> Result<bool, RangeError> {
        self.set(stat, z, Bound::Min, value, overwrite)
    }

    /// Set the max bound; see [`Self::set_min`].
    pub fn set_max(&mut self, stat: &str, z: Option<u8>, value: f64, overwrite: bool) -> Result<bool, RangeError> {
        self.set(stat, z, Bound::Max, value, overwrite)
    }

    fn set(&mut self, stat: &str, z: Option<u8>, bound: Bound, value: f64, overwrite: bool) -> Result<bool, RangeError> {
        let entry = self.entry_mut(stat)?;
        let range = match z {
            Some(z) => entry.per_zoom.entry(z).or_default(),
            None => &mut entry.global,
        };
        let slot = range.bound_mut(bound);
        if slot.is_some() && !overwrite {
            return Ok(false);
        }
        if *slot == Some(value) {
            return Ok(false);
        }
        *slot = Some(value);

        let change = match z {
            Some(z) => format!("{stat} z={z} {bound} set to {value}"),
            None => format!("{stat} {bound} set to {value}"),
        };
        debug!(change = %change, "Value range updated");
        self.changes.push(change);
        Ok(true)
    }

    /// Fill missing bounds from observed ranges.
    ///
    /// A bound is filled only when it resolves to nothing at that zoom level
    /// even after falling back to the global range. Returns how many bounds
    /// were filled.
    pub fn merge_observed_ranges(&mut self, observed: &ObservedRanges) -> Result<usize, RangeError> {
        let mut filled = 0;
        for (stat, zooms) in observed {
            for (z, range) in zooms {
                for bound in [Bound::Min, Bound::Max] {
                    let Some(value) = range.bound(bound) else { continue };
                    if self.is_missing(stat, Some(*z), bound, true)?
                        && self.set(stat, Some(*z), bound, value, false)?
                    {
                        filled += 1;
                    }
                }
            }
        }
        if filled > 0 {
            info!(filled, "Filled missing value ranges from raster summaries");
        }
        Ok(filled)
    }

    /// Descriptions of every bound set since the store was seeded.
    pub fn changes(&self) -> &[String] {
        &self.changes
    }
}
