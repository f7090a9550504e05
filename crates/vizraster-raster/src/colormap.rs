//! Named colormap registry.
//!
//! Each colormap is stored as evenly spaced stops and resolved to a short
//! discrete list, so a named palette renders the same way as one given as an
//! explicit color list. Names are case-insensitive; a `_r` suffix reverses.

use crate::palette::{Palette, Rgba};
use crate::{RasterError, Result};

/// Colors a named colormap resolves to.
pub const DISCRETE_COLORS: usize = 10;

const VIRIDIS: &[&str] = &[
    "#440154", "#482475", "#414487", "#355f8d", "#2a788e", "#21918c", "#22a884", "#44bf70", "#7ad151",
    "#bddf26", "#fde725",
];
const MAGMA: &[&str] = &[
    "#000004", "#140e36", "#3b0f70", "#641a80", "#8c2981", "#b73779", "#de4968", "#f7705c", "#fe9f6d",
    "#fecf92", "#fcfdbf",
];
const INFERNO: &[&str] = &[
    "#000004", "#160b39", "#420a68", "#6a176e", "#932667", "#bc3754", "#dd513a", "#f37819", "#fca50a",
    "#f6d746", "#fcffa4",
];
const PLASMA: &[&str] = &[
    "#0d0887", "#41049d", "#6a00a8", "#8f0da4", "#b12a90", "#cc4778", "#e16462", "#f2844b", "#fca636",
    "#fcce25", "#f0f921",
];
const GREYS: &[&str] = &[
    "#ffffff", "#f0f0f0", "#d9d9d9", "#bdbdbd", "#969696", "#737373", "#525252", "#252525", "#000000",
];
const BLUES: &[&str] = &[
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c", "#08306b",
];
const GREENS: &[&str] = &[
    "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45", "#006d2c", "#00441b",
];
const REDS: &[&str] = &[
    "#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d", "#a50f15", "#67000d",
];
const YLORRD: &[&str] = &[
    "#ffffcc", "#ffeda0", "#fed976", "#feb24c", "#fd8d3c", "#fc4e2a", "#e31a1c", "#bd0026", "#800026",
];
const RDBU: &[&str] = &[
    "#67001f", "#b2182b", "#d6604d", "#f4a582", "#fddbc7", "#f7f7f7", "#d1e5f0", "#92c5de", "#4393c3",
    "#2166ac", "#053061",
];
const SPECTRAL: &[&str] = &[
    "#9e0142", "#d53e4f", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#e6f598", "#abdda4", "#66c2a5",
    "#3288bd", "#5e4fa2",
];

/// Built-in colormap names.
pub const SUPPORTED: &[&str] = &[
    "viridis", "magma", "inferno", "plasma", "greys", "blues", "greens", "reds", "ylorrd", "rdbu",
    "spectral",
];

fn stops(name: &str) -> Option<&'static [&'static str]> {
    let stops = match name {
        "viridis" => VIRIDIS,
        "magma" => MAGMA,
        "inferno" => INFERNO,
        "plasma" => PLASMA,
        "greys" | "grays" => GREYS,
        "blues" => BLUES,
        "greens" => GREENS,
        "reds" => REDS,
        "ylorrd" => YLORRD,
        "rdbu" => RDBU,
        "spectral" => SPECTRAL,
        _ => return None,
    };
    Some(stops)
}

/// Resolve a colormap name to [`DISCRETE_COLORS`] evenly sampled colors.
pub fn resolve(name: &str) -> Result<Vec<Rgba>> {
    let lower = name.trim().to_ascii_lowercase();
    let (base, reversed) = match lower.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (lower.as_str(), false),
    };
    let stops = stops(base).ok_or_else(|| RasterError::UnknownColormap {
        name: name.to_string(),
        supported: SUPPORTED.join(", "),
    })?;
    let stops = stops.iter().map(|s| Rgba::parse(s)).collect::<Result<Vec<_>>>()?;
    let ramp = Palette::new(stops, Rgba::TRANSPARENT)?;

    let mut colors: Vec<Rgba> = (0..DISCRETE_COLORS)
        .map(|i| ramp.color_at(i as f64 / (DISCRETE_COLORS - 1) as f64))
        .collect();
    if reversed {
        colors.reverse();
    }
    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_name_resolves() {
        for name in SUPPORTED {
            let colors = resolve(name).unwrap();
            assert_eq!(colors.len(), DISCRETE_COLORS);
            assert!(colors.iter().all(|c| c.0[3] == 255));
        }
    }

    #[test]
    fn test_endpoints_and_reverse() {
        let viridis = resolve("Viridis").unwrap();
        assert_eq!(viridis[0].to_hex(), "#440154ff");
        assert_eq!(viridis[9].to_hex(), "#fde725ff");

        let reversed = resolve("viridis_r").unwrap();
        assert_eq!(reversed[0], viridis[9]);
        assert_eq!(reversed[9], viridis[0]);
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            resolve("not_a_map"),
            Err(RasterError::UnknownColormap { .. })
        ));
    }
}
