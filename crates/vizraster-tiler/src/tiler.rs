//! Pyramid orchestration: leaves, parents, value ranges and web tiles.

use crate::config::{join_url, write_layer_configs, DedupStage, LayerConfig, StatisticConfig, TilerConfig};
use crate::dedup::{remove_duplicates, ColumnDeduplicator, Deduplicator};
use crate::ledger::{EventKind, Ledger, Produced};
use crate::ranges::{ObservedRanges, ValueRangeStore};
use crate::report::{LevelReport, ParentReport, PyramidReport, RunReport, TileOutcome, WebTileReport};
use crate::{TileError, TilerError};
use polars::prelude::DataFrame;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use vizraster_raster::{
    CentroidRasterizer, Compositor, GeoJsonReader, MosaicCompositor, Palette, PngEncoder, Raster,
    RasterSpec, Rasterizer, Resampling, TileEncoder, VectorReader, VectorTable, write_file_atomic,
};
use vizraster_tiles::{remove_nonexistent_paths, BoundingBox, TileCoord, TileDir, TilePathManager};

/// Builds a raster tile pyramid from staged vector tiles.
///
/// The configuration is fixed at construction. Value ranges live in a
/// separate store that is filled from raster summaries before web tiles are
/// encoded and written back with [`RasterTiler::save_ranges`].
///
/// Every per-tile step is exposed on its own and is idempotent when
/// `overwrite` is false, so an external driver can run tiles of one zoom
/// level in any order.
pub struct RasterTiler {
    config: TilerConfig,
    tiles: TilePathManager,
    raster_spec: RasterSpec,
    palettes: Vec<Palette>,
    resampling: Vec<Resampling>,
    ranges: ValueRangeStore,
    ledger: Ledger,
    reader: Box<dyn VectorReader>,
    rasterizer: Box<dyn Rasterizer>,
    compositor: Box<dyn Compositor>,
    encoder: Box<dyn TileEncoder>,
    deduplicator: Box<dyn Deduplicator>,
}

impl RasterTiler {
    /// Create a tiler with the bundled collaborators: GeoJSON input,
    /// centroid rasterization, mosaic compositing and PNG output.
    pub fn new(config: TilerConfig) -> Result<Self, TilerError> {
        config.validate()?;
        let tiles = config.path_manager()?;
        let palettes = config.palettes()?;
        Ok(Self {
            raster_spec: config.raster_spec(),
            resampling: config.resampling_methods(),
            ranges: ValueRangeStore::from_config(&config),
            ledger: Ledger::from_config(&config),
            tiles,
            palettes,
            config,
            reader: Box::new(GeoJsonReader),
            rasterizer: Box::new(CentroidRasterizer),
            compositor: Box::new(MosaicCompositor),
            encoder: Box::new(PngEncoder),
            deduplicator: Box::new(ColumnDeduplicator),
        })
    }

    /// Load a JSON or YAML config file and create a tiler from it.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, TilerError> {
        Self::new(TilerConfig::load(path)?)
    }

    /// Replace the vector tile reader.
    pub fn with_reader(mut self, reader: impl VectorReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Replace the rasterizer used for leaf tiles.
    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    /// Replace the compositor used for parent tiles.
    pub fn with_compositor(mut self, compositor: impl Compositor + 'static) -> Self {
        self.compositor = Box::new(compositor);
        self
    }

    /// Replace the web tile encoder.
    pub fn with_encoder(mut self, encoder: impl TileEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    /// Replace the duplicate marker applied before rasterizing.
    pub fn with_deduplicator(mut self, deduplicator: impl Deduplicator + 'static) -> Self {
        self.deduplicator = Box::new(deduplicator);
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    /// Path resolver for every tile directory.
    pub fn tiles(&self) -> &TilePathManager {
        &self.tiles
    }

    /// Event and summary ledgers.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Current value ranges, including any filled from summaries.
    pub fn ranges(&self) -> &ValueRangeStore {
        &self.ranges
    }

    /// Mutable value ranges, for setting bounds by hand.
    pub fn ranges_mut(&mut self) -> &mut ValueRangeStore {
        &mut self.ranges
    }

    // ---- batch drivers ----

    /// Rasterize every staged vector tile, build all parents, encode web
    /// tiles with refreshed value ranges, mirror the ledgers to Parquet and
    /// write the updated config.
    pub fn rasterize_all(&mut self, overwrite: bool) -> Result<PyramidReport, TilerError> {
        let paths = self.tiles.list_paths(TileDir::Staged)?;
        let mut report = self.rasterize_vectors(&paths, true, overwrite)?;
        report.web_tiles = Some(self.webtiles_from_all_geotiffs(true, overwrite)?);
        report.parquet = self.export_parquet()?;
        report.updated_config = Some(self.save_ranges()?);
        info!("Finished rasterizing all staged tiles");
        Ok(report)
    }

    /// Rasterize leaves and, with `make_parents`, every level above them.
    pub fn rasterize_vectors(
        &self,
        paths: &[PathBuf],
        make_parents: bool,
        overwrite: bool,
    ) -> Result<PyramidReport, TilerError> {
        let leaves = self.rasterize_leaves(paths, overwrite)?;
        let parents = if make_parents {
            Some(self.build_parents(leaves.frontier.iter().copied(), true, overwrite)?)
        } else {
            None
        };
        Ok(PyramidReport {
            leaves,
            parents,
            ..PyramidReport::default()
        })
    }

    /// Encode web tiles for every GeoTIFF on disk.
    pub fn webtiles_from_all_geotiffs(
        &mut self,
        update_ranges: bool,
        overwrite: bool,
    ) -> Result<WebTileReport, TilerError> {
        let paths = self.tiles.list_paths(TileDir::Geotiff)?;
        self.encode_web_tiles(&paths, update_ranges, overwrite)
    }

    // ---- leaves ----

    /// Rasterize staged vector tiles at the maximum zoom level.
    ///
    /// Paths that do not exist are dropped. The first remaining path must
    /// decode to a tile at `max_z` in the configured tiling scheme; anything
    /// else aborts the call. Later failures are per tile and are recorded in
    /// the event ledger.
    ///
    /// The returned frontier holds the parents of every leaf whose GeoTIFF
    /// exists after this call.
    pub fn rasterize_leaves(&self, paths: &[PathBuf], overwrite: bool) -> Result<LevelReport, TilerError> {
        let paths = remove_nonexistent_paths(paths.iter().cloned());
        let Some(first) = paths.first() else {
            return Err(TilerError::Configuration("No vector files found".to_string()));
        };
        self.check_leaf_input(first)?;

        info!(count = paths.len(), z = self.config.max_z(), "Rasterizing vector tiles");
        let mut report = LevelReport::default();
        for path in &paths {
            let outcome = self.rasterize_vector(path, overwrite)?;
            report.report.record(&outcome);
            if let Some(parent) = completed_parent(&outcome) {
                report.frontier.insert(parent);
            }
        }
        log_batch("Finished rasterizing vector tiles", &report.report);
        Ok(report)
    }

    fn check_leaf_input(&self, path: &Path) -> Result<(), TilerError> {
        let tile = self.tiles.tile_from_path(path)?;
        let (max_z, tms) = (self.config.max_z(), self.config.tms());
        if tile.z != max_z || tile.tms != tms {
            return Err(TilerError::Configuration(format!(
                "{} is {} in {}, expected z={} in {}",
                path.display(),
                tile,
                tile.tms,
                max_z,
                tms
            )));
        }
        Ok(())
    }

    /// Rasterize one staged vector tile into a leaf GeoTIFF.
    pub fn rasterize_vector(&self, path: &Path, overwrite: bool) -> Result<TileOutcome, TilerError> {
        let kind = EventKind::GeotiffsFromVectors;
        let tile = match self.tiles.tile_from_path(path) {
            Ok(tile) => tile,
            Err(e) => return self.record_unresolved(kind, path, e.into()),
        };
        let out_path = self.tiles.path_from_tile(&tile, TileDir::Geotiff, None)?;
        if !overwrite && reusable_geotiff(&out_path) {
            debug!(tile = %tile, path = %out_path.display(), "GeoTIFF exists, skipping");
            return Ok(TileOutcome::Skipped { tile, path: out_path });
        }

        let result = self.ledger.track(kind, Some(tile), || {
            let table = self.reader.read(path)?;
            let table = self.filter_duplicates(table)?;
            let raster = self
                .rasterizer
                .rasterize(&table, self.tiles.bounding_box(&tile), &self.raster_spec)?;
            raster.write_geotiff(&out_path)?;
            Ok(Produced {
                path: out_path.clone(),
                summary: raster.summary(),
            })
        })?;
        Ok(self.outcome(kind, tile, result))
    }

    fn filter_duplicates(&self, table: VectorTable) -> Result<VectorTable, TileError> {
        match self.config.dedup_config_for(DedupStage::Raster, &table) {
            Some(dedup) => remove_duplicates(table, self.deduplicator.as_ref(), &dedup),
            None => Ok(table),
        }
    }

    // ---- parents ----

    /// Composite parents for a set of tiles at one zoom level.
    ///
    /// `tiles` are the parents to build. With `recursive`, the parents of
    /// each level's completed tiles are built next, until the level drops
    /// below `min_z`. A set mixing zoom levels is a configuration error.
    pub fn build_parents(
        &self,
        tiles: impl IntoIterator<Item = TileCoord>,
        recursive: bool,
        overwrite: bool,
    ) -> Result<ParentReport, TilerError> {
        let mut frontier: BTreeSet<TileCoord> = tiles.into_iter().collect();
        let mut report = ParentReport::default();

        while let Some(z) = zoom_of(&frontier)? {
            if z < self.config.min_z() {
                debug!(z, min_z = self.config.min_z(), "Reached minimum zoom");
                frontier.clear();
                break;
            }

            info!(z, count = frontier.len(), "Creating parent GeoTIFFs");
            let mut level = RunReport::default();
            let mut next = BTreeSet::new();
            for tile in &frontier {
                let outcome = self.parent_geotiff_from_children(tile, overwrite)?;
                level.record(&outcome);
                if let Some(parent) = completed_parent(&outcome) {
                    next.insert(parent);
                }
            }
            log_batch("Finished parent level", &level);
            report.levels.push((z, level));
            frontier = next;

            if !recursive {
                break;
            }
        }

        report.frontier = frontier;
        Ok(report)
    }

    /// Composite one parent GeoTIFF from whichever children exist.
    pub fn parent_geotiff_from_children(&self, tile: &TileCoord, overwrite: bool) -> Result<TileOutcome, TilerError> {
        let kind = EventKind::ParentGeotiffsFromChildren;
        let tile = *tile;
        let out_path = self.tiles.path_from_tile(&tile, TileDir::Geotiff, None)?;
        if !overwrite && reusable_geotiff(&out_path) {
            debug!(tile = %tile, path = %out_path.display(), "Parent GeoTIFF exists, skipping");
            return Ok(TileOutcome::Skipped { tile, path: out_path });
        }

        let result = self.ledger.track(kind, Some(tile), || {
            let children = remove_nonexistent_paths(self.tiles.child_paths(&tile, TileDir::Geotiff)?);
            debug!(tile = %tile, children = children.len(), "Compositing parent");
            let raster = self.compositor.composite(
                &children,
                &self.resampling,
                self.config.tile_size,
                self.tiles.bounding_box(&tile),
            )?;
            raster.write_geotiff(&out_path)?;
            Ok(Produced {
                path: out_path.clone(),
                summary: raster.summary(),
            })
        })?;
        Ok(self.outcome(kind, tile, result))
    }

    // ---- web tiles ----

    /// Encode one web tile per statistic for each GeoTIFF.
    ///
    /// With `update_ranges`, missing value range bounds are first filled from
    /// the summary ledger. A band without a usable range fails on its own;
    /// the other bands of the same GeoTIFF are still encoded.
    pub fn encode_web_tiles(
        &mut self,
        paths: &[PathBuf],
        update_ranges: bool,
        overwrite: bool,
    ) -> Result<WebTileReport, TilerError> {
        if update_ranges {
            self.update_ranges()?;
        }

        info!(count = paths.len(), "Creating web tiles from GeoTIFFs");
        let mut report = WebTileReport::default();
        for path in paths {
            for outcome in self.encode_geotiff(path, overwrite, &mut report.missing_range)? {
                report.report.record(&outcome);
            }
        }
        log_batch("Finished creating web tiles", &report.report);
        if report.missing_range > 0 {
            warn!(bands = report.missing_range, "Some web tiles were not created because value ranges are missing");
        }
        Ok(report)
    }

    /// Encode the web tiles of one GeoTIFF, one outcome per statistic.
    pub fn webtile_from_geotiff(&self, path: &Path, overwrite: bool) -> Result<Vec<TileOutcome>, TilerError> {
        let mut missing = 0;
        self.encode_geotiff(path, overwrite, &mut missing)
    }

    fn encode_geotiff(&self, path: &Path, overwrite: bool, missing: &mut usize) -> Result<Vec<TileOutcome>, TilerError> {
        let kind = EventKind::WebtilesFromGeotiffs;
        let tile = match self.tiles.tile_from_path(path) {
            Ok(tile) => tile,
            Err(e) => return Ok(vec![self.record_unresolved(kind, path, e.into())?]),
        };

        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        for (band, stat) in self.config.statistics.iter().enumerate() {
            let out_path = self.tiles.path_from_tile(&tile, TileDir::WebTiles, Some(&stat.name))?;
            if !overwrite && out_path.is_file() {
                debug!(tile = %tile, stat = %stat.name, "Web tile exists, skipping");
                outcomes.push(TileOutcome::Skipped { tile, path: out_path });
            } else {
                pending.push((band, stat, out_path));
            }
        }
        if pending.is_empty() {
            return Ok(outcomes);
        }

        let raster = match Raster::from_geotiff(path) {
            Ok(raster) => raster,
            Err(e) => {
                let result = self.ledger.track(kind, Some(tile), move || Err(e.into()))?;
                outcomes.push(self.outcome(kind, tile, result));
                return Ok(outcomes);
            }
        };

        for (band, stat, out_path) in pending {
            let result = self.ledger.track(kind, Some(tile), || {
                self.encode_band(&raster, tile, band, stat, &out_path)
            })?;
            if matches!(result, Err(TileError::MissingRange { .. })) {
                *missing += 1;
            }
            outcomes.push(self.outcome(kind, tile, result));
        }
        Ok(outcomes)
    }

    fn encode_band(
        &self,
        raster: &Raster,
        tile: TileCoord,
        band: usize,
        stat: &StatisticConfig,
        out_path: &Path,
    ) -> Result<Produced, TileError> {
        let range = self.ranges.get(&stat.name, Some(tile.z), true)?;
        let missing = |bound| TileError::MissingRange {
            stat: stat.name.clone(),
            z: tile.z,
            bound,
        };
        let min = range.min.ok_or_else(|| missing("min"))?;
        let max = range.max.ok_or_else(|| missing("max"))?;

        let data = raster.band(band).ok_or_else(|| TileError::MissingBand {
            stat: stat.name.clone(),
            band,
        })?;
        let bytes = self.encoder.encode(
            &data.data,
            raster.shape(),
            &self.palettes[band],
            min,
            max,
            stat.nodata_val,
        )?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_file_atomic(out_path, &bytes)?;
        Ok(Produced {
            path: out_path.to_path_buf(),
            summary: Vec::new(),
        })
    }

    // ---- viewer layers ----

    /// Viewer layer list: the 3D tileset when one exists, then one imagery
    /// layer per statistic using the current value ranges.
    ///
    /// The imagery rectangle covers the web tiles at `max_z`, else the
    /// staged tiles, else the GeoTIFFs or 3D tiles at `max_z`. With none of
    /// them on disk the layers cover the whole world.
    pub fn layer_configs(&self, base_url: &str, tileset_color: Option<&str>) -> Result<Vec<LayerConfig>, TilerError> {
        let config = self.config.with_ranges(&self.ranges);
        let mut layers = Vec::new();
        if let Some(url) = self.tileset_url(base_url)? {
            layers.push(config.tileset_layer_config(&url, tileset_color)?);
        }
        layers.extend(config.raster_layer_configs(base_url, self.layer_extent()?)?);
        Ok(layers)
    }

    /// Write [`Self::layer_configs`] to `path` as JSON.
    pub fn write_layer_configs<P: AsRef<Path>>(
        &self,
        path: P,
        base_url: &str,
        tileset_color: Option<&str>,
    ) -> Result<PathBuf, TilerError> {
        let path = path.as_ref();
        write_layer_configs(&self.layer_configs(base_url, tileset_color)?, path)?;
        Ok(path.to_path_buf())
    }

    fn layer_extent(&self) -> Result<Option<BoundingBox>, TilerError> {
        let max_z = self.config.max_z();
        let sources = [
            (TileDir::WebTiles, Some(max_z)),
            (TileDir::Staged, None),
            (TileDir::Geotiff, Some(max_z)),
            (TileDir::Tiles3d, Some(max_z)),
        ];
        for (dir, z) in sources {
            if let Some(bounds) = self.tiles.total_bounding_box(dir, z)? {
                debug!(dir = %dir, "Layer extent from tiles");
                return Ok(Some(self.config.tms().to_geographic(&bounds)));
            }
        }
        warn!("No tiles found; layers will cover the whole world");
        Ok(None)
    }

    /// URL of the single tileset root at `min_z`, if there is exactly one.
    fn tileset_url(&self, base_url: &str) -> Result<Option<String>, TilerError> {
        let roots = self.tiles.list_paths_at_zoom(TileDir::Tiles3d, self.config.min_z())?;
        let [root] = roots.as_slice() else {
            debug!(count = roots.len(), "No single 3D tileset root, skipping tileset layer");
            return Ok(None);
        };
        let relative = root.strip_prefix(&self.config.dir_3dtiles).unwrap_or(root.as_path());
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(Some(join_url(base_url, &relative.join("/"))))
    }

    // ---- ranges and ledgers ----

    /// Observed `stat -> z -> (min, max)` from the summary ledger.
    pub fn get_z_ranges(&self) -> Result<ObservedRanges, TilerError> {
        Ok(self.ledger.z_ranges()?)
    }

    /// Fill missing value range bounds from the summary ledger. Returns the
    /// number of bounds filled.
    pub fn update_ranges(&mut self) -> Result<usize, TilerError> {
        let observed = self.get_z_ranges()?;
        Ok(self.ranges.merge_observed_ranges(&observed)?)
    }

    /// Write the config with the current value ranges to its `_updated` copy.
    pub fn save_ranges(&self) -> Result<PathBuf, TilerError> {
        for change in self.ranges.changes() {
            info!(change = %change, "Value range");
        }
        self.config.with_ranges(&self.ranges).write_updated()
    }

    pub fn events(&self) -> Result<Option<DataFrame>, TilerError> {
        Ok(self.ledger.events()?)
    }

    pub fn rasters_summary(&self) -> Result<Option<DataFrame>, TilerError> {
        Ok(self.ledger.rasters_summary()?)
    }

    /// Events that recorded an error.
    pub fn errors(&self) -> Result<Option<DataFrame>, TilerError> {
        Ok(self.ledger.errors()?)
    }

    pub fn export_parquet(&self) -> Result<Vec<PathBuf>, TilerError> {
        Ok(self.ledger.export_parquet()?)
    }

    // ---- helpers ----

    fn outcome(&self, kind: EventKind, tile: TileCoord, result: Result<Produced, TileError>) -> TileOutcome {
        match result {
            Ok(produced) => {
                debug!(%kind, tile = %tile, path = %produced.path.display(), "Wrote output");
                TileOutcome::Written {
                    tile,
                    path: produced.path,
                }
            }
            Err(e) => {
                error!(%kind, tile = %tile, error = %e, "Tile failed");
                TileOutcome::Failed {
                    tile: Some(tile),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Record a failure for an input whose tile could not be decoded.
    fn record_unresolved(&self, kind: EventKind, path: &Path, err: TileError) -> Result<TileOutcome, TilerError> {
        error!(%kind, path = %path.display(), error = %err, "Could not decode tile from path");
        let error = err.to_string();
        let _ = self.ledger.track(kind, None, move || Err(err))?;
        Ok(TileOutcome::Failed { tile: None, error })
    }
}

/// Parent of a tile whose output exists after the unit ran.
/// An existing GeoTIFF is reused only if it can be read back; anything else
/// is rebuilt.
fn reusable_geotiff(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match Raster::from_geotiff(path) {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing GeoTIFF is unreadable, rebuilding");
            false
        }
    }
}

fn completed_parent(outcome: &TileOutcome) -> Option<TileCoord> {
    match outcome {
        TileOutcome::Written { tile, .. } | TileOutcome::Skipped { tile, .. } => tile.parent(),
        TileOutcome::Failed { .. } => None,
    }
}

/// The single zoom level of a frontier, `None` when it is empty.
fn zoom_of(tiles: &BTreeSet<TileCoord>) -> Result<Option<u8>, TilerError> {
    let mut zooms = tiles.iter().map(|t| t.z);
    let Some(z) = zooms.next() else {
        return Ok(None);
    };
    if zooms.any(|other| other != z) {
        return Err(TilerError::Configuration(
            "parent tiles must all be at the same zoom level".to_string(),
        ));
    }
    Ok(Some(z))
}

fn log_batch(message: &str, report: &RunReport) {
    info!(
        written = report.written,
        skipped = report.skipped,
        failed = report.failed,
        "{message}"
    );
}
