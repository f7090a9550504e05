//! Colors and linear color ramps.

use crate::colormap;
use crate::{RasterError, Result};
use std::str::FromStr;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([255, 255, 255, 0]);

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, a CSS color name or `transparent`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return Self::from_hex(hex).ok_or_else(|| RasterError::InvalidColor(s.to_string()));
        }
        Self::named(&trimmed.to_ascii_lowercase()).ok_or_else(|| RasterError::InvalidColor(s.to_string()))
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255]))
            }
            6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        if name == "transparent" {
            return Some(Rgba([0, 0, 0, 0]));
        }
        let i = CSS_COLORS.binary_search_by_key(&name, |(n, _)| *n).ok()?;
        let [r, g, b] = CSS_COLORS[i].1;
        Some(Rgba([r, g, b, 255]))
    }

    /// `#rrggbbaa` form.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }

    /// `#rrggbb` form, dropping alpha.
    pub fn to_rgb_hex(&self) -> String {
        let [r, g, b, _] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for Rgba {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        Rgba::parse(s)
    }
}

/// CSS named colors, sorted by name.
const CSS_COLORS: &[(&str, [u8; 3])] = &[
    ("aliceblue", [0xf0, 0xf8, 0xff]),
    ("antiquewhite", [0xfa, 0xeb, 0xd7]),
    ("aqua", [0x00, 0xff, 0xff]),
    ("aquamarine", [0x7f, 0xff, 0xd4]),
    ("azure", [0xf0, 0xff, 0xff]),
    ("beige", [0xf5, 0xf5, 0xdc]),
    ("bisque", [0xff, 0xe4, 0xc4]),
    ("black", [0x00, 0x00, 0x00]),
    ("blanchedalmond", [0xff, 0xeb, 0xcd]),
    ("blue", [0x00, 0x00, 0xff]),
    ("blueviolet", [0x8a, 0x2b, 0xe2]),
    ("brown", [0xa5, 0x2a, 0x2a]),
    ("burlywood", [0xde, 0xb8, 0x87]),
    ("cadetblue", [0x5f, 0x9e, 0xa0]),
    ("chartreuse", [0x7f, 0xff, 0x00]),
    ("chocolate", [0xd2, 0x69, 0x1e]),
    ("coral", [0xff, 0x7f, 0x50]),
    ("cornflowerblue", [0x64, 0x95, 0xed]),
    ("cornsilk", [0xff, 0xf8, 0xdc]),
    ("crimson", [0xdc, 0x14, 0x3c]),
    ("cyan", [0x00, 0xff, 0xff]),
    ("darkblue", [0x00, 0x00, 0x8b]),
    ("darkcyan", [0x00, 0x8b, 0x8b]),
    ("darkgoldenrod", [0xb8, 0x86, 0x0b]),
    ("darkgray", [0xa9, 0xa9, 0xa9]),
    ("darkgreen", [0x00, 0x64, 0x00]),
    ("darkgrey", [0xa9, 0xa9, 0xa9]),
    ("darkkhaki", [0xbd, 0xb7, 0x6b]),
    ("darkmagenta", [0x8b, 0x00, 0x8b]),
    ("darkolivegreen", [0x55, 0x6b, 0x2f]),
    ("darkorange", [0xff, 0x8c, 0x00]),
    ("darkorchid", [0x99, 0x32, 0xcc]),
    ("darkred", [0x8b, 0x00, 0x00]),
    ("darksalmon", [0xe9, 0x96, 0x7a]),
    ("darkseagreen", [0x8f, 0xbc, 0x8f]),
    ("darkslateblue", [0x48, 0x3d, 0x8b]),
    ("darkslategray", [0x2f, 0x4f, 0x4f]),
    ("darkslategrey", [0x2f, 0x4f, 0x4f]),
    ("darkturquoise", [0x00, 0xce, 0xd1]),
    ("darkviolet", [0x94, 0x00, 0xd3]),
    ("deeppink", [0xff, 0x14, 0x93]),
    ("deepskyblue", [0x00, 0xbf, 0xff]),
    ("dimgray", [0x69, 0x69, 0x69]),
    ("dimgrey", [0x69, 0x69, 0x69]),
    ("dodgerblue", [0x1e, 0x90, 0xff]),
    ("firebrick", [0xb2, 0x22, 0x22]),
    ("floralwhite", [0xff, 0xfa, 0xf0]),
    ("forestgreen", [0x22, 0x8b, 0x22]),
    ("fuchsia", [0xff, 0x00, 0xff]),
    ("gainsboro", [0xdc, 0xdc, 0xdc]),
    ("ghostwhite", [0xf8, 0xf8, 0xff]),
    ("gold", [0xff, 0xd7, 0x00]),
    ("goldenrod", [0xda, 0xa5, 0x20]),
    ("gray", [0x80, 0x80, 0x80]),
    ("green", [0x00, 0x80, 0x00]),
    ("greenyellow", [0xad, 0xff, 0x2f]),
    ("grey", [0x80, 0x80, 0x80]),
    ("honeydew", [0xf0, 0xff, 0xf0]),
    ("hotpink", [0xff, 0x69, 0xb4]),
    ("indianred", [0xcd, 0x5c, 0x5c]),
    ("indigo", [0x4b, 0x00, 0x82]),
    ("ivory", [0xff, 0xff, 0xf0]),
    ("khaki", [0xf0, 0xe6, 0x8c]),
    ("lavender", [0xe6, 0xe6, 0xfa]),
    ("lavenderblush", [0xff, 0xf0, 0xf5]),
    ("lawngreen", [0x7c, 0xfc, 0x00]),
    ("lemonchiffon", [0xff, 0xfa, 0xcd]),
    ("lightblue", [0xad, 0xd8, 0xe6]),
    ("lightcoral", [0xf0, 0x80, 0x80]),
    ("lightcyan", [0xe0, 0xff, 0xff]),
    ("lightgoldenrodyellow", [0xfa, 0xfa, 0xd2]),
    ("lightgray", [0xd3, 0xd3, 0xd3]),
    ("lightgreen", [0x90, 0xee, 0x90]),
    ("lightgrey", [0xd3, 0xd3, 0xd3]),
    ("lightpink", [0xff, 0xb6, 0xc1]),
    ("lightsalmon", [0xff, 0xa0, 0x7a]),
    ("lightseagreen", [0x20, 0xb2, 0xaa]),
    ("lightskyblue", [0x87, 0xce, 0xfa]),
    ("lightslategray", [0x77, 0x88, 0x99]),
    ("lightslategrey", [0x77, 0x88, 0x99]),
    ("lightsteelblue", [0xb0, 0xc4, 0xde]),
    ("lightyellow", [0xff, 0xff, 0xe0]),
    ("lime", [0x00, 0xff, 0x00]),
    ("limegreen", [0x32, 0xcd, 0x32]),
    ("linen", [0xfa, 0xf0, 0xe6]),
    ("magenta", [0xff, 0x00, 0xff]),
    ("maroon", [0x80, 0x00, 0x00]),
    ("mediumaquamarine", [0x66, 0xcd, 0xaa]),
    ("mediumblue", [0x00, 0x00, 0xcd]),
    ("mediumorchid", [0xba, 0x55, 0xd3]),
    ("mediumpurple", [0x93, 0x70, 0xdb]),
    ("mediumseagreen", [0x3c, 0xb3, 0x71]),
    ("mediumslateblue", [0x7b, 0x68, 0xee]),
    ("mediumspringgreen", [0x00, 0xfa, 0x9a]),
    ("mediumturquoise", [0x48, 0xd1, 0xcc]),
    ("mediumvioletred", [0xc7, 0x15, 0x85]),
    ("midnightblue", [0x19, 0x19, 0x70]),
    ("mintcream", [0xf5, 0xff, 0xfa]),
    ("mistyrose", [0xff, 0xe4, 0xe1]),
    ("moccasin", [0xff, 0xe4, 0xb5]),
    ("navajowhite", [0xff, 0xde, 0xad]),
    ("navy", [0x00, 0x00, 0x80]),
    ("oldlace", [0xfd, 0xf5, 0xe6]),
    ("olive", [0x80, 0x80, 0x00]),
    ("olivedrab", [0x6b, 0x8e, 0x23]),
    ("orange", [0xff, 0xa5, 0x00]),
    ("orangered", [0xff, 0x45, 0x00]),
    ("orchid", [0xda, 0x70, 0xd6]),
    ("palegoldenrod", [0xee, 0xe8, 0xaa]),
    ("palegreen", [0x98, 0xfb, 0x98]),
    ("paleturquoise", [0xaf, 0xee, 0xee]),
    ("palevioletred", [0xdb, 0x70, 0x93]),
    ("papayawhip", [0xff, 0xef, 0xd5]),
    ("peachpuff", [0xff, 0xda, 0xb9]),
    ("peru", [0xcd, 0x85, 0x3f]),
    ("pink", [0xff, 0xc0, 0xcb]),
    ("plum", [0xdd, 0xa0, 0xdd]),
    ("powderblue", [0xb0, 0xe0, 0xe6]),
    ("purple", [0x80, 0x00, 0x80]),
    ("rebeccapurple", [0x66, 0x33, 0x99]),
    ("red", [0xff, 0x00, 0x00]),
    ("rosybrown", [0xbc, 0x8f, 0x8f]),
    ("royalblue", [0x41, 0x69, 0xe1]),
    ("saddlebrown", [0x8b, 0x45, 0x13]),
    ("salmon", [0xfa, 0x80, 0x72]),
    ("sandybrown", [0xf4, 0xa4, 0x60]),
    ("seagreen", [0x2e, 0x8b, 0x57]),
    ("seashell", [0xff, 0xf5, 0xee]),
    ("sienna", [0xa0, 0x52, 0x2d]),
    ("silver", [0xc0, 0xc0, 0xc0]),
    ("skyblue", [0x87, 0xce, 0xeb]),
    ("slateblue", [0x6a, 0x5a, 0xcd]),
    ("slategray", [0x70, 0x80, 0x90]),
    ("slategrey", [0x70, 0x80, 0x90]),
    ("snow", [0xff, 0xfa, 0xfa]),
    ("springgreen", [0x00, 0xff, 0x7f]),
    ("steelblue", [0x46, 0x82, 0xb4]),
    ("tan", [0xd2, 0xb4, 0x8c]),
    ("teal", [0x00, 0x80, 0x80]),
    ("thistle", [0xd8, 0xbf, 0xd8]),
    ("tomato", [0xff, 0x63, 0x47]),
    ("turquoise", [0x40, 0xe0, 0xd0]),
    ("violet", [0xee, 0x82, 0xee]),
    ("wheat", [0xf5, 0xde, 0xb3]),
    ("white", [0xff, 0xff, 0xff]),
    ("whitesmoke", [0xf5, 0xf5, 0xf5]),
    ("yellow", [0xff, 0xff, 0x00]),
    ("yellowgreen", [0x9a, 0xcd, 0x32]),
];

/// Evenly spaced color stops mapped onto [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgba>,
    nodata: Rgba,
}

impl Palette {
    pub fn new(colors: Vec<Rgba>, nodata: Rgba) -> Result<Self> {
        if colors.is_empty() {
            return Err(RasterError::InvalidColor("palette has no colors".to_string()));
        }
        Ok(Self { colors, nodata })
    }

    /// Colors of a registered colormap; see [`crate::colormap`].
    pub fn from_colormap(name: &str, nodata: &str) -> Result<Self> {
        Self::new(colormap::resolve(name)?, Rgba::parse(nodata)?)
    }

    /// Parse every color string.
    pub fn from_strs<S: AsRef<str>>(colors: &[S], nodata: &str) -> Result<Self> {
        let colors = colors
            .iter()
            .map(|c| Rgba::parse(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(colors, Rgba::parse(nodata)?)
    }

    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    pub fn nodata(&self) -> Rgba {
        self.nodata
    }

    /// Interpolated color at `t`, clamped to [0, 1].
    pub fn color_at(&self, t: f64) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if self.colors.len() == 1 {
            return self.colors[0];
        }
        let pos = t * (self.colors.len() - 1) as f64;
        let i = (pos.floor() as usize).min(self.colors.len() - 2);
        let frac = pos - i as f64;
        let (a, b) = (self.colors[i].0, self.colors[i + 1].0);
        let mut out = [0u8; 4];
        for c in 0..4 {
            out[c] = (a[c] as f64 + (b[c] as f64 - a[c] as f64) * frac).round() as u8;
        }
        Rgba(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Rgba::parse("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(Rgba::parse("#ff8000").unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!(Rgba::parse("#ffffff00").unwrap(), Rgba::TRANSPARENT);
        assert_eq!(Rgba::parse("Red").unwrap(), Rgba([255, 0, 0, 255]));
        assert_eq!(Rgba::parse("#1d1d1d").unwrap().to_hex(), "#1d1d1dff");
        assert_eq!(Rgba::parse("#1d1d1d80").unwrap().to_rgb_hex(), "#1d1d1d");
    }

    #[test]
    fn test_extended_css_names() {
        assert_eq!(Rgba::parse("darkred").unwrap(), Rgba([139, 0, 0, 255]));
        assert_eq!(Rgba::parse("Gold").unwrap(), Rgba([255, 215, 0, 255]));
        assert_eq!(Rgba::parse("rebeccapurple").unwrap().to_hex(), "#663399ff");
        assert_eq!(Rgba::parse("lightslategrey").unwrap(), Rgba::parse("lightslategray").unwrap());
        let palette = Palette::from_strs(&["darkred", "gold"], "transparent").unwrap();
        assert_eq!(palette.colors().len(), 2);
    }

    #[test]
    fn test_colormap_palette() {
        let palette = Palette::from_colormap("viridis", "#ffffff00").unwrap();
        assert_eq!(palette.colors().len(), colormap::DISCRETE_COLORS);
        assert_eq!(palette.color_at(0.0).to_hex(), "#440154ff");
        assert_eq!(palette.nodata(), Rgba::TRANSPARENT);
        assert!(Palette::from_colormap("rainbowish", "transparent").is_err());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(Rgba::parse("#12345").is_err());
        assert!(Rgba::parse("#gggggg").is_err());
        assert!(Rgba::parse("viridis").is_err());
    }

    #[test]
    fn test_ramp() {
        let palette = Palette::from_strs(&["#000000", "#ffffff"], "transparent").unwrap();
        assert_eq!(palette.color_at(0.0), Rgba([0, 0, 0, 255]));
        assert_eq!(palette.color_at(1.0), Rgba([255, 255, 255, 255]));
        assert_eq!(palette.color_at(0.5), Rgba([128, 128, 128, 255]));
        assert_eq!(palette.color_at(7.0), Rgba([255, 255, 255, 255]));
        assert_eq!(palette.nodata(), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_single_color_and_empty() {
        let single = Palette::from_strs(&["blue"], "#ffffff00").unwrap();
        assert_eq!(single.color_at(0.7), Rgba([0, 0, 255, 255]));
        assert!(Palette::new(Vec::new(), Rgba::TRANSPARENT).is_err());
    }
}
