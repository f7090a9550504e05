//! Duplicate removal before rasterization.

use crate::config::DedupConfig;
use crate::TileError;
use tracing::debug;
use vizraster_raster::{Value, VectorTable};

/// Marks rows of a vector table as duplicates.
pub trait Deduplicator {
    /// One flag per row; `true` rows are dropped.
    fn mark_duplicates(&self, table: &VectorTable, config: &DedupConfig) -> Result<Vec<bool>, TileError>;
}

/// Reads the duplicate flags written during staging.
///
/// Rows without the `prop_duplicated` column, or with a null value there,
/// are kept. Numeric flags count as set when non-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnDeduplicator;

impl Deduplicator for ColumnDeduplicator {
    fn mark_duplicates(&self, table: &VectorTable, config: &DedupConfig) -> Result<Vec<bool>, TileError> {
        let prop = config.prop_duplicated();
        Ok((0..table.len())
            .map(|i| match table.get(i, prop) {
                Value::Bool(b) => *b,
                Value::Number(n) => *n != 0.0,
                _ => false,
            })
            .collect())
    }
}

/// Drop the rows `dedup` marks as duplicates.
pub fn remove_duplicates(
    table: VectorTable,
    dedup: &dyn Deduplicator,
    config: &DedupConfig,
) -> Result<VectorTable, TileError> {
    let duplicated = dedup.mark_duplicates(&table, config)?;
    if !duplicated.contains(&true) {
        return Ok(table);
    }
    let keep: Vec<bool> = duplicated.iter().map(|d| !d).collect();
    let filtered = table.filter(&keep)?;
    debug!(
        method = ?config.method(),
        removed = table.len() - filtered.len(),
        kept = filtered.len(),
        "Removed duplicate polygons"
    );
    Ok(filtered)
}
