//! Per-band summary statistics.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Aggregate statistics of one raster band.
///
/// Numeric fields are `None` when the band has no valid pixels. A pixel is
/// valid when it is finite and not equal to the band's nodata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    /// Name of the statistic stored in the band.
    pub stat: String,
    /// Band index within the raster.
    pub band: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Population standard deviation.
    pub std: Option<f64>,
    pub sum: Option<f64>,
    /// Number of valid pixels.
    pub count: u64,
}

impl BandSummary {
    /// Summarize a band's pixels.
    pub fn compute(stat: &str, band: usize, data: &[f32], nodata: Option<f32>) -> Self {
        let values: Vec<f64> = data
            .iter()
            .filter(|v| v.is_finite() && Some(**v) != nodata)
            .map(|&v| v as f64)
            .collect();

        if values.is_empty() {
            return Self {
                stat: stat.to_string(),
                band,
                min: None,
                max: None,
                mean: None,
                median: None,
                std: None,
                sum: None,
                count: 0,
            };
        }

        let count = values.len() as u64;
        let sum: f64 = values.iter().sum();
        let min = Statistics::min(values.iter());
        let max = Statistics::max(values.iter());
        let mean = values.iter().mean();
        let std = values.iter().population_std_dev();
        let median = Data::new(values).median();

        Self {
            stat: stat.to_string(),
            band,
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            median: Some(median),
            std: Some(std),
            sum: Some(sum),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_summary_skips_nodata() {
        let data = [0.0, 2.0, 4.0, f32::NAN, 6.0, 0.0];
        let s = BandSummary::compute("count", 0, &data, Some(0.0));
        assert_eq!(s.count, 3);
        assert_relative_eq!(s.min.unwrap(), 2.0);
        assert_relative_eq!(s.max.unwrap(), 6.0);
        assert_relative_eq!(s.mean.unwrap(), 4.0);
        assert_relative_eq!(s.median.unwrap(), 4.0);
        assert_relative_eq!(s.sum.unwrap(), 12.0);
        assert_relative_eq!(s.std.unwrap(), (8.0f64 / 3.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_summary_of_empty_band() {
        let s = BandSummary::compute("coverage", 1, &[0.0; 4], Some(0.0));
        assert_eq!(s.count, 0);
        assert!(s.min.is_none());
        assert!(s.max.is_none());
        assert!(s.median.is_none());
        assert_eq!(s.stat, "coverage");
        assert_eq!(s.band, 1);
    }
}
