//! Append-only event and raster summary ledgers.
//!
//! Both ledgers are CSV files written through polars. The first append
//! creates the file with a header; later appends add rows only. A build can
//! be resumed at any time because finished outputs are detected on disk, not
//! through the ledger. [`Ledger::export_parquet`] mirrors both files into
//! Snappy-compressed Parquet for analysis.
//!
//! Event columns: `id, type, start_time, total_time, end_time, error, path, tile, z`.
//! Summary columns: `path, tile, z, stat, band, min, max, mean, median, std, sum, count`.

use crate::config::TilerConfig;
use crate::ranges::{ObservedRanges, ValueRange};
use crate::{LedgerError, TileError};
use chrono::Utc;
use polars::io::{SerReader, SerWriter};
use polars::prelude::*;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vizraster_raster::BandSummary;
use vizraster_tiles::TileCoord;

/// Unit of work recorded in the event ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Leaf GeoTIFF rasterized from a staged vector tile.
    GeotiffsFromVectors,
    /// Parent GeoTIFF composited from its children.
    ParentGeotiffsFromChildren,
    /// One web tile band encoded from a GeoTIFF.
    WebtilesFromGeotiffs,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GeotiffsFromVectors => "geotiffs_from_vectors",
            EventKind::ParentGeotiffsFromChildren => "parent_geotiffs_from_children",
            EventKind::WebtilesFromGeotiffs => "webtiles_from_geotiffs",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the event ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub kind: EventKind,
    /// Unix epoch seconds.
    pub start_time: f64,
    /// Unix epoch seconds.
    pub end_time: f64,
    pub error: Option<String>,
    pub path: Option<PathBuf>,
    pub tile: Option<TileCoord>,
}

impl EventRecord {
    pub fn total_time(&self) -> f64 {
        self.end_time - self.start_time
    }

    fn to_frame(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("id".into(), vec![self.id.to_string()]),
            Column::new("type".into(), vec![self.kind.as_str()]),
            Column::new("start_time".into(), vec![self.start_time]),
            Column::new("total_time".into(), vec![self.total_time()]),
            Column::new("end_time".into(), vec![self.end_time]),
            Column::new("error".into(), vec![self.error.clone()]),
            Column::new("path".into(), vec![self.path.as_deref().map(path_string)]),
            Column::new("tile".into(), vec![self.tile.map(|t| t.to_string())]),
            Column::new("z".into(), vec![self.tile.map(|t| i64::from(t.z))]),
        ])
    }
}

/// What a successful unit of work produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub path: PathBuf,
    /// Per-band summary; empty for outputs that are not rasters.
    pub summary: Vec<BandSummary>,
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

fn summary_frame(path: &Path, tile: Option<&TileCoord>, summary: &[BandSummary]) -> PolarsResult<DataFrame> {
    let n = summary.len();
    let floats = |f: fn(&BandSummary) -> Option<f64>| summary.iter().map(f).collect::<Vec<_>>();
    DataFrame::new(vec![
        Column::new("path".into(), vec![path_string(path); n]),
        Column::new("tile".into(), vec![tile.map(|t| t.to_string()); n]),
        Column::new("z".into(), vec![tile.map(|t| i64::from(t.z)); n]),
        Column::new("stat".into(), summary.iter().map(|s| s.stat.clone()).collect::<Vec<_>>()),
        Column::new("band".into(), summary.iter().map(|s| s.band as i64).collect::<Vec<_>>()),
        Column::new("min".into(), floats(|s| s.min)),
        Column::new("max".into(), floats(|s| s.max)),
        Column::new("mean".into(), floats(|s| s.mean)),
        Column::new("median".into(), floats(|s| s.median)),
        Column::new("std".into(), floats(|s| s.std)),
        Column::new("sum".into(), floats(|s| s.sum)),
        Column::new("count".into(), summary.iter().map(|s| s.count as i64).collect::<Vec<_>>()),
    ])
}

fn append_csv(path: &Path, df: &mut DataFrame) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let first_write = !path.is_file();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    CsvWriter::new(file).include_header(first_write).finish(df)?;
    Ok(())
}

fn read_csv(path: &Path) -> Result<Option<DataFrame>, LedgerError> {
    if !path.is_file() {
        return Ok(None);
    }
    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(Some(df))
}

/// Event and summary ledger files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    events_path: PathBuf,
    summary_path: PathBuf,
}

impl Ledger {
    pub fn new(events_path: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        Self {
            events_path: events_path.into(),
            summary_path: summary_path.into(),
        }
    }

    pub fn from_config(config: &TilerConfig) -> Self {
        Self::new(
            &config.filename_rasterization_events,
            &config.filename_rasters_summary,
        )
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    pub fn append_event(&self, event: &EventRecord) -> Result<(), LedgerError> {
        append_csv(&self.events_path, &mut event.to_frame()?)
    }

    /// Append one row per band of the raster written to `path`.
    pub fn append_summary(
        &self,
        path: &Path,
        tile: Option<&TileCoord>,
        summary: &[BandSummary],
    ) -> Result<(), LedgerError> {
        if summary.is_empty() {
            return Ok(());
        }
        append_csv(&self.summary_path, &mut summary_frame(path, tile, summary)?)
    }

    /// Run one unit of work and record it.
    ///
    /// The event id and start time are taken before `work` runs and the end
    /// time after it returns. A successful result appends its summary rows
    /// first, then the event. A failed unit appends only the event, with the
    /// error message. The unit's own result is returned untouched; the outer
    /// error is reserved for ledger failures.
    pub fn track<F>(
        &self,
        kind: EventKind,
        tile: Option<TileCoord>,
        work: F,
    ) -> Result<Result<Produced, TileError>, LedgerError>
    where
        F: FnOnce() -> Result<Produced, TileError>,
    {
        let id = Uuid::new_v4();
        let start_time = epoch_seconds();
        let result = work();
        let end_time = epoch_seconds();

        let mut event = EventRecord {
            id,
            kind,
            start_time,
            end_time,
            error: None,
            path: None,
            tile,
        };
        match &result {
            Ok(produced) => {
                self.append_summary(&produced.path, tile.as_ref(), &produced.summary)?;
                event.path = Some(produced.path.clone());
            }
            Err(e) => event.error = Some(e.to_string()),
        }
        self.append_event(&event)?;
        debug!(%id, %kind, ok = event.error.is_none(), seconds = event.total_time(), "Event recorded");
        Ok(result)
    }

    /// All events, or `None` before the first append.
    pub fn events(&self) -> Result<Option<DataFrame>, LedgerError> {
        read_csv(&self.events_path)
    }

    /// All summary rows, or `None` before the first append.
    pub fn rasters_summary(&self) -> Result<Option<DataFrame>, LedgerError> {
        read_csv(&self.summary_path)
    }

    /// Events whose `error` is set.
    pub fn errors(&self) -> Result<Option<DataFrame>, LedgerError> {
        let Some(events) = self.events()? else {
            return Ok(None);
        };
        let errors = events.lazy().filter(col("error").is_not_null()).collect()?;
        Ok(Some(errors))
    }

    /// Observed range per statistic and zoom: min of band minimums and max
    /// of band maximums over every summary row.
    pub fn z_ranges(&self) -> Result<ObservedRanges, LedgerError> {
        let mut observed = ObservedRanges::new();
        let Some(summary) = self.rasters_summary()? else {
            return Ok(observed);
        };

        let mut df = summary.select(["stat", "z", "min", "max"])?;
        for (name, dtype) in [
            ("stat", DataType::String),
            ("z", DataType::Int64),
            ("min", DataType::Float64),
            ("max", DataType::Float64),
        ] {
            let cast = df.column(name)?.cast(&dtype)?;
            df.with_column(cast)?;
        }

        let ranges = df
            .lazy()
            .group_by([col("stat"), col("z")])
            .agg([col("min").min(), col("max").max()])
            .collect()?;

        let stats = ranges.column("stat")?.str()?;
        let zs = ranges.column("z")?.i64()?;
        let mins = ranges.column("min")?.f64()?;
        let maxs = ranges.column("max")?.f64()?;
        for i in 0..ranges.height() {
            let (Some(stat), Some(z)) = (stats.get(i), zs.get(i)) else {
                continue;
            };
            let Ok(z) = u8::try_from(z) else {
                warn!(stat, z, "Ignoring summary rows with an invalid zoom level");
                continue;
            };
            observed
                .entry(stat.to_string())
                .or_default()
                .insert(z, ValueRange::new(mins.get(i), maxs.get(i)));
        }
        Ok(observed)
    }

    /// Mirror both ledgers to `<stem>.parquet` next to each CSV.
    ///
    /// A ledger that has not been written yet is skipped with a warning.
    /// Returns the Parquet files written.
    pub fn export_parquet(&self) -> Result<Vec<PathBuf>, LedgerError> {
        let mut written = Vec::new();
        for csv in [&self.events_path, &self.summary_path] {
            let Some(mut df) = read_csv(csv)? else {
                warn!(path = %csv.display(), "Ledger not found, skipping Parquet export");
                continue;
            };
            let parquet = csv.with_extension("parquet");
            let writer = BufWriter::new(File::create(&parquet)?);
            ParquetWriter::new(writer)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)?;
            info!(path = %parquet.display(), rows = df.height(), "Exported ledger to Parquet");
            written.push(parquet);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vizraster_tiles::Tms;

    fn ledger(tmp: &TempDir) -> Ledger {
        Ledger::new(
            tmp.path().join("logs/rasterization_events.csv"),
            tmp.path().join("logs/rasters_summary.csv"),
        )
    }

    fn band(stat: &str, band: usize, min: Option<f64>, max: Option<f64>) -> BandSummary {
        BandSummary {
            stat: stat.to_string(),
            band,
            min,
            max,
            mean: None,
            median: None,
            std: None,
            sum: None,
            count: 4,
        }
    }

    #[test]
    fn test_empty_ledger() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        assert!(ledger.events().unwrap().is_none());
        assert!(ledger.errors().unwrap().is_none());
        assert!(ledger.z_ranges().unwrap().is_empty());
        assert!(ledger.export_parquet().unwrap().is_empty());
    }

    #[test]
    fn test_track_success_and_failure() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        let tile = TileCoord::new(Tms::Wgs1984Quad, 3, 4, 2).unwrap();
        let out = tmp.path().join("geotiff/3/4/2.tif");

        let ok = ledger
            .track(EventKind::GeotiffsFromVectors, Some(tile), || {
                Ok(Produced {
                    path: out.clone(),
                    summary: vec![
                        band("polygon_count", 0, Some(1.0), Some(3.0)),
                        band("coverage", 1, Some(0.1), Some(0.4)),
                    ],
                })
            })
            .unwrap();
        assert!(ok.is_ok());

        let failed = ledger
            .track(EventKind::GeotiffsFromVectors, Some(tile), || {
                Err(TileError::MissingBand {
                    stat: "coverage".to_string(),
                    band: 1,
                })
            })
            .unwrap();
        assert!(matches!(failed, Err(TileError::MissingBand { .. })));

        let events = ledger.events().unwrap().unwrap();
        assert_eq!(events.height(), 2);
        assert_eq!(
            events
                .get_column_names()
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
            vec!["id", "type", "start_time", "total_time", "end_time", "error", "path", "tile", "z"]
        );
        let tiles = events.column("tile").unwrap().str().unwrap();
        assert_eq!(tiles.get(0), Some("Tile(x=4, y=2, z=3)"));
        let ids = events.column("id").unwrap().str().unwrap();
        assert_ne!(ids.get(0), ids.get(1));

        let errors = ledger.errors().unwrap().unwrap();
        assert_eq!(errors.height(), 1);

        let summary = ledger.rasters_summary().unwrap().unwrap();
        assert_eq!(summary.height(), 2);
        assert_eq!(summary.width(), 12);
    }

    #[test]
    fn test_z_ranges_aggregate_rows() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        let a = TileCoord::new(Tms::Wgs1984Quad, 10, 1, 1).unwrap();
        let b = TileCoord::new(Tms::Wgs1984Quad, 10, 2, 1).unwrap();
        let p = TileCoord::new(Tms::Wgs1984Quad, 9, 0, 0).unwrap();
        ledger
            .append_summary(Path::new("a.tif"), Some(&a), &[band("count", 0, Some(2.0), Some(8.0))])
            .unwrap();
        ledger
            .append_summary(Path::new("b.tif"), Some(&b), &[band("count", 0, Some(1.0), Some(9.0))])
            .unwrap();
        ledger
            .append_summary(Path::new("p.tif"), Some(&p), &[band("count", 0, None, None)])
            .unwrap();

        let observed = ledger.z_ranges().unwrap();
        assert_eq!(observed["count"][&10], ValueRange::new(Some(1.0), Some(9.0)));
        assert_eq!(observed["count"][&9], ValueRange::default());
    }

    #[test]
    fn test_export_parquet() {
        let tmp = TempDir::new().unwrap();
        let ledger = ledger(&tmp);
        ledger
            .track(EventKind::WebtilesFromGeotiffs, None, || {
                Ok(Produced {
                    path: PathBuf::from("x.png"),
                    summary: Vec::new(),
                })
            })
            .unwrap()
            .unwrap();

        let written = ledger.export_parquet().unwrap();
        assert_eq!(written, vec![tmp.path().join("logs/rasterization_events.parquet")]);
        assert!(written[0].is_file());
        assert!(ledger.rasters_summary().unwrap().is_none());
    }
}
