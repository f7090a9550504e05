//! Per-tile outcomes and batch reports.

use std::collections::BTreeSet;
use std::path::PathBuf;
use vizraster_tiles::TileCoord;

/// Result of one per-tile unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    /// The output was produced and recorded in the ledger.
    Written { tile: TileCoord, path: PathBuf },
    /// The output already existed and `overwrite` was off.
    Skipped { tile: TileCoord, path: PathBuf },
    /// The unit failed; the error is in the event ledger. `tile` is `None`
    /// when the input path could not be decoded.
    Failed { tile: Option<TileCoord>, error: String },
}

impl TileOutcome {
    pub fn tile(&self) -> Option<TileCoord> {
        match self {
            TileOutcome::Written { tile, .. } | TileOutcome::Skipped { tile, .. } => Some(*tile),
            TileOutcome::Failed { tile, .. } => *tile,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, TileOutcome::Written { .. })
    }
}

/// Counts of outcomes in one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn record(&mut self, outcome: &TileOutcome) {
        match outcome {
            TileOutcome::Written { .. } => self.written += 1,
            TileOutcome::Skipped { .. } => self.skipped += 1,
            TileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.skipped + self.failed
    }

    pub fn merge(&mut self, other: &RunReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Leaf rasterization of one zoom level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelReport {
    pub report: RunReport,
    /// Parents of the leaves that exist after this batch.
    pub frontier: BTreeSet<TileCoord>,
}

/// Parent building, one entry per zoom level processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentReport {
    /// `(z, counts)` from the finest level up.
    pub levels: Vec<(u8, RunReport)>,
    /// Parents of the last level's existing tiles. Empty after a full
    /// recursive build down to the minimum zoom.
    pub frontier: BTreeSet<TileCoord>,
}

impl ParentReport {
    pub fn totals(&self) -> RunReport {
        let mut total = RunReport::default();
        for (_, level) in &self.levels {
            total.merge(level);
        }
        total
    }
}

/// Web tile encoding; counts are per statistic band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebTileReport {
    pub report: RunReport,
    /// Failed bands that had no usable value range.
    pub missing_range: usize,
}

/// A whole pyramid build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PyramidReport {
    pub leaves: LevelReport,
    pub parents: Option<ParentReport>,
    pub web_tiles: Option<WebTileReport>,
    /// Parquet mirrors written at the end of the build.
    pub parquet: Vec<PathBuf>,
    /// Config copy holding the final value ranges.
    pub updated_config: Option<PathBuf>,
}
