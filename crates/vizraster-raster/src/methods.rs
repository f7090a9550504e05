//! Method names used by statistics: how features are weighted, how values
//! in a pixel are aggregated, and how four child pixels become one parent
//! pixel.
//!
//! Every enum parses from its lowercase name and rejects anything else.

use crate::{RasterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a feature contributes to the pixel it falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightBy {
    /// Each feature counts once.
    Count,
    /// Features contribute their area.
    Area,
}

/// Reduction applied to all feature values that land in one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Count,
    Mean,
    Min,
    Max,
    Median,
}

/// Reduction applied to a 2 x 2 block of child pixels when building a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Nearest,
    Average,
    Sum,
    Min,
    Max,
    Median,
    Mode,
}

impl WeightBy {
    pub fn name(&self) -> &'static str {
        match self {
            WeightBy::Count => "count",
            WeightBy::Area => "area",
        }
    }
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Mean => "mean",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
        }
    }

    /// Reduce the values collected for one pixel. `None` when there are none.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let v = match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Count => values.len() as f64,
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Median => median(values),
        };
        Some(v)
    }
}

impl Resampling {
    pub fn name(&self) -> &'static str {
        match self {
            Resampling::Nearest => "nearest",
            Resampling::Average => "average",
            Resampling::Sum => "sum",
            Resampling::Min => "min",
            Resampling::Max => "max",
            Resampling::Median => "median",
            Resampling::Mode => "mode",
        }
    }

    /// Reduce the valid pixels of a 2 x 2 block, given in NW, NE, SW, SE order.
    ///
    /// `Nearest` keeps the first valid pixel in that order. `Mode` breaks ties
    /// toward the smaller value.
    pub fn apply(&self, values: &[f32]) -> Option<f32> {
        let first = *values.first()?;
        let v = match self {
            Resampling::Nearest => first,
            Resampling::Average => values.iter().sum::<f32>() / values.len() as f32,
            Resampling::Sum => values.iter().sum(),
            Resampling::Min => values.iter().copied().fold(f32::INFINITY, f32::min),
            Resampling::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Resampling::Median => {
                let wide: Vec<f64> = values.iter().map(|&v| v as f64).collect();
                median(&wide) as f32
            }
            Resampling::Mode => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mut best = (sorted[0], 0usize);
                let mut run = (sorted[0], 0usize);
                for v in sorted {
                    if v == run.0 {
                        run.1 += 1;
                    } else {
                        run = (v, 1);
                    }
                    if run.1 > best.1 {
                        best = run;
                    }
                }
                best.0
            }
        };
        Some(v)
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

macro_rules! parse_method {
    ($ty:ty, $kind:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = RasterError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(RasterError::UnknownMethod {
                        kind: $kind,
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

parse_method!(WeightBy, "weight_by", {
    "count" => WeightBy::Count,
    "area" => WeightBy::Area,
});

parse_method!(Aggregation, "aggregation", {
    "sum" => Aggregation::Sum,
    "count" => Aggregation::Count,
    "mean" => Aggregation::Mean,
    "min" => Aggregation::Min,
    "max" => Aggregation::Max,
    "median" => Aggregation::Median,
});

parse_method!(Resampling, "resampling", {
    "nearest" => Resampling::Nearest,
    "average" => Resampling::Average,
    "sum" => Resampling::Sum,
    "min" => Resampling::Min,
    "max" => Resampling::Max,
    "median" => Resampling::Median,
    "mode" => Resampling::Mode,
});

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("Average".parse::<Resampling>().unwrap(), Resampling::Average);
        assert_eq!("area".parse::<WeightBy>().unwrap(), WeightBy::Area);
        assert!(matches!(
            "bilinear".parse::<Resampling>(),
            Err(RasterError::UnknownMethod { kind: "resampling", .. })
        ));
        assert!("mode".parse::<Aggregation>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let r: Resampling = serde_json::from_str("\"mode\"").unwrap();
        assert_eq!(r, Resampling::Mode);
        assert!(serde_json::from_str::<Aggregation>("\"avg\"").is_err());
        assert_eq!(serde_json::to_string(&WeightBy::Count).unwrap(), "\"count\"");
    }

    #[test]
    fn test_aggregation() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(Aggregation::Sum.apply(&values).unwrap(), 10.0);
        assert_relative_eq!(Aggregation::Count.apply(&values).unwrap(), 4.0);
        assert_relative_eq!(Aggregation::Mean.apply(&values).unwrap(), 2.5);
        assert_relative_eq!(Aggregation::Median.apply(&values).unwrap(), 2.5);
        assert_relative_eq!(Aggregation::Min.apply(&values).unwrap(), 1.0);
        assert_relative_eq!(Aggregation::Max.apply(&values).unwrap(), 4.0);
        assert!(Aggregation::Sum.apply(&[]).is_none());
    }

    #[test]
    fn test_resampling_block() {
        let block = [2.0, 5.0, 2.0, 7.0];
        assert_relative_eq!(Resampling::Nearest.apply(&block).unwrap(), 2.0);
        assert_relative_eq!(Resampling::Average.apply(&block).unwrap(), 4.0);
        assert_relative_eq!(Resampling::Sum.apply(&block).unwrap(), 16.0);
        assert_relative_eq!(Resampling::Median.apply(&block).unwrap(), 3.5);
        assert_relative_eq!(Resampling::Mode.apply(&block).unwrap(), 2.0);
        assert_relative_eq!(Resampling::Mode.apply(&[3.0, 1.0]).unwrap(), 1.0);
        assert!(Resampling::Max.apply(&[]).is_none());
    }
}
