//! Supported tile matrix sets.
//!
//! Both schemes are quadtrees: every tile at zoom `z` splits into four tiles
//! at `z + 1`. They differ in the shape of the zoom-0 matrix and in the
//! native CRS that tile bounds are expressed in.

use crate::{BoundingBox, Result, TilesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Half the circumference of the WGS84 ellipsoid's equator in Web Mercator meters.
const MERCATOR_ORIGIN: f64 = 20_037_508.342_789_244;

/// A tile matrix set (tiling scheme).
///
/// Serializes as its canonical id; deserializing accepts the aliases too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tms {
    /// Geographic (plate carrée) quadtree: 2 x 1 tiles at zoom 0, bounds in degrees.
    Wgs1984Quad,
    /// Spherical Mercator quadtree: 1 x 1 tile at zoom 0, bounds in EPSG:3857 meters.
    WebMercatorQuad,
}

impl Tms {
    /// Canonical identifier, as written into tile paths.
    pub fn id(&self) -> &'static str {
        match self {
            Tms::Wgs1984Quad => "WGS1984Quad",
            Tms::WebMercatorQuad => "WebMercatorQuad",
        }
    }

    /// Parse a scheme id, accepting the common aliases.
    pub fn from_id(id: &str) -> Result<Self> {
        match id {
            "WGS1984Quad" | "WorldCRS84Quad" => Ok(Tms::Wgs1984Quad),
            "WebMercatorQuad" | "WorldMercatorWGS84Quad" => Ok(Tms::WebMercatorQuad),
            other => Err(TilesError::UnknownTms(other.to_string())),
        }
    }

    /// EPSG code of the native CRS.
    pub fn epsg(&self) -> u16 {
        match self {
            Tms::Wgs1984Quad => 4326,
            Tms::WebMercatorQuad => 3857,
        }
    }

    /// Number of (columns, rows) in the matrix at a zoom level.
    pub fn matrix_size(&self, z: u8) -> (u32, u32) {
        let n = 1u32 << z;
        match self {
            Tms::Wgs1984Quad => (n * 2, n),
            Tms::WebMercatorQuad => (n, n),
        }
    }

    /// Full extent of the scheme in its native CRS.
    pub fn extent(&self) -> BoundingBox {
        match self {
            Tms::Wgs1984Quad => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            Tms::WebMercatorQuad => BoundingBox::new(
                -MERCATOR_ORIGIN,
                -MERCATOR_ORIGIN,
                MERCATOR_ORIGIN,
                MERCATOR_ORIGIN,
            ),
        }
    }

    /// Bounds of the tile at (z, x, y). Row 0 is the northern edge.
    pub fn tile_bounds(&self, z: u8, x: u32, y: u32) -> BoundingBox {
        let extent = self.extent();
        let (cols, rows) = self.matrix_size(z);
        let tile_w = extent.width() / cols as f64;
        let tile_h = extent.height() / rows as f64;

        let left = extent.left + x as f64 * tile_w;
        let top = extent.top - y as f64 * tile_h;
        BoundingBox::new(left, top - tile_h, left + tile_w, top)
    }

    /// Bounds in the native CRS converted to longitude/latitude degrees.
    pub fn to_geographic(&self, bounds: &BoundingBox) -> BoundingBox {
        match self {
            Tms::Wgs1984Quad => *bounds,
            Tms::WebMercatorQuad => {
                let lon = |x: f64| x / MERCATOR_ORIGIN * 180.0;
                let lat = |y: f64| (y / MERCATOR_ORIGIN * std::f64::consts::PI).sinh().atan().to_degrees();
                BoundingBox::new(lon(bounds.left), lat(bounds.bottom), lon(bounds.right), lat(bounds.top))
            }
        }
    }
}

impl fmt::Display for Tms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl TryFrom<String> for Tms {
    type Error = TilesError;

    fn try_from(id: String) -> Result<Self> {
        Tms::from_id(&id)
    }
}

impl From<Tms> for String {
    fn from(tms: Tms) -> Self {
        tms.id().to_string()
    }
}

impl FromStr for Tms {
    type Err = TilesError;

    fn from_str(s: &str) -> Result<Self> {
        Tms::from_id(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Tms::from_id("WGS1984Quad").unwrap(), Tms::Wgs1984Quad);
        assert_eq!(Tms::from_id("WorldCRS84Quad").unwrap(), Tms::Wgs1984Quad);
        assert_eq!("WebMercatorQuad".parse::<Tms>().unwrap(), Tms::WebMercatorQuad);
        assert!(matches!(Tms::from_id("LINZAntarticaMapTilegrid"), Err(TilesError::UnknownTms(_))));
    }

    #[test]
    fn test_matrix_size() {
        assert_eq!(Tms::Wgs1984Quad.matrix_size(0), (2, 1));
        assert_eq!(Tms::Wgs1984Quad.matrix_size(3), (16, 8));
        assert_eq!(Tms::WebMercatorQuad.matrix_size(3), (8, 8));
    }

    #[test]
    fn test_geographic_tile_bounds() {
        // Zoom 0 splits the world into west and east hemispheres
        let west = Tms::Wgs1984Quad.tile_bounds(0, 0, 0);
        assert_relative_eq!(west.left, -180.0);
        assert_relative_eq!(west.right, 0.0);
        assert_relative_eq!(west.bottom, -90.0);
        assert_relative_eq!(west.top, 90.0);

        // Zoom 2 is 8 x 4 tiles of 45 degrees
        let tile = Tms::Wgs1984Quad.tile_bounds(2, 5, 1);
        assert_relative_eq!(tile.left, 45.0);
        assert_relative_eq!(tile.right, 90.0);
        assert_relative_eq!(tile.top, 45.0);
        assert_relative_eq!(tile.bottom, 0.0);
    }

    #[test]
    fn test_geographic_conversion() {
        let world = Tms::WebMercatorQuad.to_geographic(&Tms::WebMercatorQuad.extent());
        assert_relative_eq!(world.left, -180.0);
        assert_relative_eq!(world.right, 180.0);
        assert_relative_eq!(world.top, 85.051_128_779_806_59, epsilon = 1e-9);
        assert_relative_eq!(world.bottom, -85.051_128_779_806_59, epsilon = 1e-9);

        let tile = Tms::Wgs1984Quad.tile_bounds(2, 5, 1);
        assert_eq!(Tms::Wgs1984Quad.to_geographic(&tile), tile);
    }

    #[test]
    fn test_mercator_tile_bounds() {
        let nw = Tms::WebMercatorQuad.tile_bounds(1, 0, 0);
        assert_relative_eq!(nw.left, -MERCATOR_ORIGIN);
        assert_relative_eq!(nw.top, MERCATOR_ORIGIN);
        assert_relative_eq!(nw.right, 0.0, epsilon = 1e-6);
        assert_relative_eq!(nw.bottom, 0.0, epsilon = 1e-6);
    }
}
