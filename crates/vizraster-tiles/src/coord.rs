//! Tile coordinates and bounding boxes.

use crate::{Result, TilesError, Tms, MAX_ZOOM};
use std::fmt;

/// Axis-aligned bounds in a tile matrix set's native CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge.
    pub left: f64,
    /// Southern edge.
    pub bottom: f64,
    /// Eastern edge.
    pub right: f64,
    /// Northern edge.
    pub top: f64,
}

impl BoundingBox {
    /// Create bounds from (left, bottom, right, top).
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Width in CRS units.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height in CRS units.
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Check if a point is within the bounds (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }

    /// Smallest bounds covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }
}

/// A tile in a tile matrix set: column `x`, row `y`, zoom `z`.
///
/// Coordinates are validated on construction, so every `TileCoord` addresses
/// a real cell of its matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Tile matrix set the coordinate belongs to.
    pub tms: Tms,
    /// Zoom level.
    pub z: u8,
    /// Column, increasing eastward.
    pub x: u32,
    /// Row, increasing southward.
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate, checking it lies within the matrix.
    pub fn new(tms: Tms, z: u8, x: u32, y: u32) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(TilesError::InvalidZoomLevel(z));
        }
        let (cols, rows) = tms.matrix_size(z);
        if x >= cols || y >= rows {
            return Err(TilesError::OutOfRange {
                tms: tms.id(),
                z,
                x,
                y,
            });
        }
        Ok(Self { tms, z, x, y })
    }

    /// The tile one zoom level up that contains this tile, or `None` at zoom 0.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            tms: self.tms,
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// The four tiles one zoom level down, in row-major order (NW, NE, SW, SE).
    ///
    /// Empty when this tile is already at the deepest addressable zoom.
    pub fn children(&self) -> Vec<TileCoord> {
        if self.z >= MAX_ZOOM {
            return Vec::new();
        }
        let (x, y) = (self.x * 2, self.y * 2);
        [(0, 0), (1, 0), (0, 1), (1, 1)]
            .into_iter()
            .map(|(dx, dy)| TileCoord {
                tms: self.tms,
                z: self.z + 1,
                x: x + dx,
                y: y + dy,
            })
            .collect()
    }

    /// Bounds of this tile in the matrix set's native CRS.
    pub fn bounds(&self) -> BoundingBox {
        self.tms.tile_bounds(self.z, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_range() {
        assert!(TileCoord::new(Tms::Wgs1984Quad, 0, 1, 0).is_ok());
        assert!(TileCoord::new(Tms::WebMercatorQuad, 0, 1, 0).is_err());
        assert!(TileCoord::new(Tms::Wgs1984Quad, 2, 8, 0).is_err());
        assert!(matches!(
            TileCoord::new(Tms::Wgs1984Quad, MAX_ZOOM + 1, 0, 0),
            Err(TilesError::InvalidZoomLevel(_))
        ));
    }

    #[test]
    fn test_parent_child_relationship() {
        let tile = TileCoord::new(Tms::Wgs1984Quad, 5, 21, 12).unwrap();
        let parent = tile.parent().unwrap();
        assert_eq!((parent.z, parent.x, parent.y), (4, 10, 6));
        assert!(parent.children().contains(&tile));

        for child in tile.children() {
            assert_eq!(child.parent(), Some(tile));
        }
        assert_eq!(tile.children().len(), 4);
    }

    #[test]
    fn test_root_has_no_parent() {
        let root = TileCoord::new(Tms::WebMercatorQuad, 0, 0, 0).unwrap();
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_children_tile_the_parent() {
        let tile = TileCoord::new(Tms::Wgs1984Quad, 3, 4, 2).unwrap();
        let bounds = tile.bounds();
        let covered = tile
            .children()
            .iter()
            .map(|c| c.bounds())
            .reduce(|a, b| a.union(&b))
            .unwrap();
        assert_eq!(bounds, covered);
    }

    #[test]
    fn test_display() {
        let tile = TileCoord::new(Tms::Wgs1984Quad, 10, 300, 200).unwrap();
        assert_eq!(tile.to_string(), "Tile(x=300, y=200, z=10)");
    }
}
