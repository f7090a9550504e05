//! Deterministic mapping between tile coordinates and file paths.
//!
//! A path is `<base dir>/<part>/<part>/.../<last part><ext>` where the parts
//! follow a [`PathStructure`]. The mapping is a pure function of the tile,
//! the directory kind and (for web tiles) the style, so "does the output
//! already exist" can be answered from the filesystem alone.

use crate::{BoundingBox, Result, TileCoord, TilesError, Tms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// One segment of a tile path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPart {
    /// Layer / statistic name. Omitted when no style is given.
    Style,
    /// Tile matrix set id.
    Tms,
    /// Zoom level.
    Z,
    /// Column.
    X,
    /// Row.
    Y,
}

/// Ordered list of path segments. `z`, `x` and `y` must be the last three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStructure {
    parts: Vec<PathPart>,
}

impl PathStructure {
    /// Validate and build a path structure.
    pub fn new(parts: Vec<PathPart>) -> Result<Self> {
        if parts.len() < 3 {
            return Err(TilesError::InvalidPathStructure(format!(
                "expected at least z, x and y, got {:?}",
                parts
            )));
        }
        let (prefix, indices) = parts.split_at(parts.len() - 3);
        for required in [PathPart::Z, PathPart::X, PathPart::Y] {
            if indices.iter().filter(|p| **p == required).count() != 1 {
                return Err(TilesError::InvalidPathStructure(format!(
                    "z, x and y must each appear once as the last three parts, got {:?}",
                    parts
                )));
            }
        }
        for optional in [PathPart::Style, PathPart::Tms] {
            if prefix.iter().filter(|p| **p == optional).count() > 1 {
                return Err(TilesError::InvalidPathStructure(format!(
                    "{:?} appears more than once in {:?}",
                    optional, parts
                )));
            }
        }
        if prefix
            .iter()
            .any(|p| matches!(p, PathPart::Z | PathPart::X | PathPart::Y))
        {
            return Err(TilesError::InvalidPathStructure(format!(
                "z, x and y must be the last three parts, got {:?}",
                parts
            )));
        }
        Ok(Self { parts })
    }

    /// The parts in order.
    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }
}

impl Default for PathStructure {
    fn default() -> Self {
        Self {
            parts: vec![
                PathPart::Style,
                PathPart::Tms,
                PathPart::Z,
                PathPart::X,
                PathPart::Y,
            ],
        }
    }
}

/// Kinds of tile directories the pipeline reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileDir {
    /// Raw input vector files.
    Input,
    /// Footprint files used for deduplication.
    Footprints,
    /// Staged vector tiles.
    Staged,
    /// GeoTIFF raster tiles.
    Geotiff,
    /// Encoded web image tiles.
    WebTiles,
    /// 3D tiles.
    #[serde(rename = "3dtiles")]
    Tiles3d,
}

impl fmt::Display for TileDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileDir::Input => "input",
            TileDir::Footprints => "footprints",
            TileDir::Staged => "staged",
            TileDir::Geotiff => "geotiff",
            TileDir::WebTiles => "web_tiles",
            TileDir::Tiles3d => "3dtiles",
        };
        f.write_str(name)
    }
}

/// Base path and file extension of one tile directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSpec {
    /// Root directory.
    pub path: PathBuf,
    /// Extension including the leading dot (e.g. `.tif`), or empty.
    pub ext: String,
}

impl DirSpec {
    /// Create a directory spec.
    pub fn new(path: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ext: ext.into(),
        }
    }
}

/// Resolves tile coordinates to paths and back.
///
/// # Example
///
/// ```
/// use vizraster_tiles::{DirSpec, TileCoord, TileDir, TilePathManager, Tms};
///
/// let manager = TilePathManager::new(Tms::Wgs1984Quad)
///     .with_dir(TileDir::Geotiff, DirSpec::new("geotiff", ".tif"));
///
/// let tile = TileCoord::new(Tms::Wgs1984Quad, 3, 5, 2)?;
/// let path = manager.path_from_tile(&tile, TileDir::Geotiff, None)?;
/// assert_eq!(path, std::path::PathBuf::from("geotiff/WGS1984Quad/3/5/2.tif"));
/// assert_eq!(manager.tile_from_path(&path)?, tile);
/// # Ok::<(), vizraster_tiles::TilesError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TilePathManager {
    tms: Tms,
    structure: PathStructure,
    dirs: HashMap<TileDir, DirSpec>,
}

impl TilePathManager {
    /// Create a manager with the default path structure and no directories.
    pub fn new(tms: Tms) -> Self {
        Self {
            tms,
            structure: PathStructure::default(),
            dirs: HashMap::new(),
        }
    }

    /// Replace the path structure.
    pub fn with_structure(mut self, structure: PathStructure) -> Self {
        self.structure = structure;
        self
    }

    /// Register (or replace) a base directory.
    pub fn with_dir(mut self, dir: TileDir, spec: DirSpec) -> Self {
        self.dirs.insert(dir, spec);
        self
    }

    /// Register (or replace) a base directory in place.
    pub fn add_base_dir(&mut self, dir: TileDir, spec: DirSpec) {
        self.dirs.insert(dir, spec);
    }

    /// The tile matrix set new coordinates are resolved against.
    pub fn tms(&self) -> Tms {
        self.tms
    }

    /// The configured path structure.
    pub fn structure(&self) -> &PathStructure {
        &self.structure
    }

    /// Spec of a registered directory.
    pub fn dir(&self, dir: TileDir) -> Result<&DirSpec> {
        self.dirs
            .get(&dir)
            .ok_or_else(|| TilesError::UnknownDir(dir.to_string()))
    }

    /// Build the path for a tile in a directory.
    ///
    /// `style` fills the [`PathPart::Style`] segment; with `None` the segment
    /// is left out entirely.
    pub fn path_from_tile(&self, tile: &TileCoord, dir: TileDir, style: Option<&str>) -> Result<PathBuf> {
        let spec = self.dir(dir)?;
        let mut segments: Vec<String> = Vec::with_capacity(self.structure.parts.len());
        for part in &self.structure.parts {
            match part {
                PathPart::Style => {
                    if let Some(style) = style {
                        segments.push(style.to_string());
                    }
                }
                PathPart::Tms => segments.push(tile.tms.id().to_string()),
                PathPart::Z => segments.push(tile.z.to_string()),
                PathPart::X => segments.push(tile.x.to_string()),
                PathPart::Y => segments.push(tile.y.to_string()),
            }
        }
        if let Some(last) = segments.last_mut() {
            last.push_str(&spec.ext);
        }

        let mut path = spec.path.clone();
        path.extend(segments);
        Ok(path)
    }

    /// Decode the tile coordinate from a path produced by [`Self::path_from_tile`].
    ///
    /// z, x and y come from the last three components. The matrix set is taken
    /// from the nearest preceding component that names a known scheme, falling
    /// back to the manager's own scheme.
    pub fn tile_from_path(&self, path: &Path) -> Result<TileCoord> {
        let invalid = |reason: &str| TilesError::InvalidPath {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let components: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        if components.len() < 3 {
            return Err(invalid("fewer than three path components"));
        }

        let (leading, indices) = components.split_at(components.len() - 3);
        let index_parts = &self.structure.parts[self.structure.parts.len() - 3..];

        let (mut z, mut x, mut y) = (None, None, None);
        for (i, (part, raw)) in index_parts.iter().zip(indices).enumerate() {
            let raw = if i == 2 { strip_extension(raw) } else { raw };
            match part {
                PathPart::Z => z = Some(raw.parse::<u8>().map_err(|_| invalid("zoom is not a number"))?),
                PathPart::X => x = Some(raw.parse::<u32>().map_err(|_| invalid("column is not a number"))?),
                PathPart::Y => y = Some(raw.parse::<u32>().map_err(|_| invalid("row is not a number"))?),
                PathPart::Style | PathPart::Tms => {}
            }
        }
        let (Some(z), Some(x), Some(y)) = (z, x, y) else {
            return Err(invalid("missing z, x or y"));
        };

        let tms = if self.structure.parts.contains(&PathPart::Tms) {
            leading
                .iter()
                .rev()
                .find_map(|segment| Tms::from_id(segment).ok())
                .unwrap_or(self.tms)
        } else {
            self.tms
        };

        TileCoord::new(tms, z, x, y)
    }

    /// The parent tile, or `None` at zoom 0.
    pub fn parent(&self, tile: &TileCoord) -> Option<TileCoord> {
        tile.parent()
    }

    /// Paths of the four child tiles in a directory. The files may not exist.
    pub fn child_paths(&self, tile: &TileCoord, dir: TileDir) -> Result<Vec<PathBuf>> {
        tile.children()
            .iter()
            .map(|child| self.path_from_tile(child, dir, None))
            .collect()
    }

    /// Bounds of a tile in its matrix set's native CRS.
    pub fn bounding_box(&self, tile: &TileCoord) -> BoundingBox {
        tile.bounds()
    }

    /// All files under a directory with that directory's extension, sorted.
    ///
    /// A directory that does not exist yet yields an empty list.
    pub fn list_paths(&self, dir: TileDir) -> Result<Vec<PathBuf>> {
        let spec = self.dir(dir)?;
        if !spec.path.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&spec.path) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches_ext = entry
                .file_name()
                .to_str()
                .is_some_and(|name| spec.ext.is_empty() || name.ends_with(&spec.ext));
            if matches_ext {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Like [`Self::list_paths`], keeping only tiles at one zoom level.
    pub fn list_paths_at_zoom(&self, dir: TileDir, z: u8) -> Result<Vec<PathBuf>> {
        Ok(self
            .list_paths(dir)?
            .into_iter()
            .filter(|p| self.tile_from_path(p).is_ok_and(|t| t.z == z))
            .collect())
    }

    /// Bounds covering every decodable tile in a directory, optionally at one zoom.
    pub fn total_bounding_box(&self, dir: TileDir, z: Option<u8>) -> Result<Option<BoundingBox>> {
        let paths = match z {
            Some(z) => self.list_paths_at_zoom(dir, z)?,
            None => self.list_paths(dir)?,
        };
        Ok(paths
            .iter()
            .filter_map(|p| self.tile_from_path(p).ok())
            .map(|t| t.bounds())
            .reduce(|a, b| a.union(&b)))
    }
}

/// Drop paths that are not existing files.
pub fn remove_nonexistent_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().filter(|p| p.is_file()).collect()
}

fn strip_extension(segment: &str) -> &str {
    match segment.find('.') {
        Some(idx) => &segment[..idx],
        None => segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> TilePathManager {
        TilePathManager::new(Tms::Wgs1984Quad)
            .with_dir(TileDir::Staged, DirSpec::new("staged", ".gpkg"))
            .with_dir(TileDir::Geotiff, DirSpec::new("geotiff", ".tif"))
            .with_dir(TileDir::WebTiles, DirSpec::new("web_tiles", ".png"))
    }

    #[test]
    fn test_path_layout() {
        let m = manager();
        let tile = TileCoord::new(Tms::Wgs1984Quad, 11, 400, 300).unwrap();

        let geotiff = m.path_from_tile(&tile, TileDir::Geotiff, None).unwrap();
        assert_eq!(geotiff, PathBuf::from("geotiff/WGS1984Quad/11/400/300.tif"));

        let web = m.path_from_tile(&tile, TileDir::WebTiles, Some("coverage")).unwrap();
        assert_eq!(web, PathBuf::from("web_tiles/coverage/WGS1984Quad/11/400/300.png"));
    }

    #[test]
    fn test_roundtrip_every_tile_at_low_zoom() {
        let m = manager();
        for tms in [Tms::Wgs1984Quad, Tms::WebMercatorQuad] {
            for z in 0..4u8 {
                let (cols, rows) = tms.matrix_size(z);
                for x in 0..cols {
                    for y in 0..rows {
                        let tile = TileCoord::new(tms, z, x, y).unwrap();
                        let path = m.path_from_tile(&tile, TileDir::Geotiff, None).unwrap();
                        assert_eq!(m.tile_from_path(&path).unwrap(), tile);
                        let styled = m.path_from_tile(&tile, TileDir::WebTiles, Some("stat")).unwrap();
                        assert_eq!(m.tile_from_path(&styled).unwrap(), tile);
                    }
                }
            }
        }
    }

    #[test]
    fn test_custom_structure() {
        let structure = PathStructure::new(vec![PathPart::Tms, PathPart::Style, PathPart::Z, PathPart::Y, PathPart::X]).unwrap();
        let m = manager().with_structure(structure);
        let tile = TileCoord::new(Tms::WebMercatorQuad, 4, 9, 3).unwrap();
        let path = m.path_from_tile(&tile, TileDir::WebTiles, Some("count")).unwrap();
        assert_eq!(path, PathBuf::from("web_tiles/WebMercatorQuad/count/4/3/9.png"));
        assert_eq!(m.tile_from_path(&path).unwrap(), tile);
    }

    #[test]
    fn test_invalid_structures() {
        assert!(PathStructure::new(vec![PathPart::Z, PathPart::X]).is_err());
        assert!(PathStructure::new(vec![PathPart::Z, PathPart::Style, PathPart::X, PathPart::Y]).is_err());
        assert!(PathStructure::new(vec![PathPart::Style, PathPart::Style, PathPart::Z, PathPart::X, PathPart::Y]).is_err());
        assert!(PathStructure::new(vec![PathPart::X, PathPart::X, PathPart::Y]).is_err());
    }

    #[test]
    fn test_invalid_paths() {
        let m = manager();
        assert!(m.tile_from_path(Path::new("geotiff/WGS1984Quad/a/1/1.tif")).is_err());
        assert!(m.tile_from_path(Path::new("1.tif")).is_err());
        // Column 5 does not exist at zoom 1
        assert!(matches!(
            m.tile_from_path(Path::new("geotiff/WGS1984Quad/1/5/0.tif")),
            Err(TilesError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_child_paths() {
        let m = manager();
        let tile = TileCoord::new(Tms::Wgs1984Quad, 2, 1, 1).unwrap();
        let children = m.child_paths(&tile, TileDir::Geotiff).unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0], PathBuf::from("geotiff/WGS1984Quad/3/2/2.tif"));
        assert_eq!(children[3], PathBuf::from("geotiff/WGS1984Quad/3/3/3.tif"));
    }

    #[test]
    fn test_unknown_dir() {
        let m = TilePathManager::new(Tms::Wgs1984Quad);
        let tile = TileCoord::new(Tms::Wgs1984Quad, 0, 0, 0).unwrap();
        assert!(matches!(
            m.path_from_tile(&tile, TileDir::Geotiff, None),
            Err(TilesError::UnknownDir(_))
        ));
    }

    #[test]
    fn test_list_paths_and_total_bounds() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let m = TilePathManager::new(Tms::Wgs1984Quad)
            .with_dir(TileDir::Geotiff, DirSpec::new(temp.path().join("geotiff"), ".tif"));

        assert!(m.list_paths(TileDir::Geotiff).unwrap().is_empty());

        let tiles = [
            TileCoord::new(Tms::Wgs1984Quad, 1, 0, 0).unwrap(),
            TileCoord::new(Tms::Wgs1984Quad, 1, 1, 1).unwrap(),
            TileCoord::new(Tms::Wgs1984Quad, 2, 0, 0).unwrap(),
        ];
        for tile in &tiles {
            let path = m.path_from_tile(tile, TileDir::Geotiff, None).unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"").unwrap();
        }
        std::fs::write(temp.path().join("geotiff").join("notes.txt"), b"").unwrap();

        assert_eq!(m.list_paths(TileDir::Geotiff).unwrap().len(), 3);
        assert_eq!(m.list_paths_at_zoom(TileDir::Geotiff, 1).unwrap().len(), 2);

        let bounds = m.total_bounding_box(TileDir::Geotiff, Some(1)).unwrap().unwrap();
        assert_eq!(bounds, BoundingBox::new(-180.0, -90.0, 0.0, 90.0));
    }

    #[test]
    fn test_remove_nonexistent_paths() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let present = temp.path().join("a.tif");
        std::fs::write(&present, b"").unwrap();
        let kept = remove_nonexistent_paths(vec![present.clone(), temp.path().join("b.tif")]);
        assert_eq!(kept, vec![present]);
    }
}
