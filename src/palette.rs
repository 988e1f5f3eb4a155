// Color ramps and fixed palettes for classified map layers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Simple RGB color, formatted as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    const fn hex(value: u32) -> Self {
        Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ColorBrewer 9-class sequential schemes
const GREYS: &[Rgb] = &[
    Rgb::hex(0xffffff), Rgb::hex(0xf0f0f0), Rgb::hex(0xd9d9d9), Rgb::hex(0xbdbdbd), Rgb::hex(0x969696),
    Rgb::hex(0x737373), Rgb::hex(0x525252), Rgb::hex(0x252525), Rgb::hex(0x000000),
];
const REDS: &[Rgb] = &[
    Rgb::hex(0xfff5f0), Rgb::hex(0xfee0d2), Rgb::hex(0xfcbba1), Rgb::hex(0xfc9272), Rgb::hex(0xfb6a4a),
    Rgb::hex(0xef3b2c), Rgb::hex(0xcb181d), Rgb::hex(0xa50f15), Rgb::hex(0x67000d),
];
const BLUES: &[Rgb] = &[
    Rgb::hex(0xf7fbff), Rgb::hex(0xdeebf7), Rgb::hex(0xc6dbef), Rgb::hex(0x9ecae1), Rgb::hex(0x6baed6),
    Rgb::hex(0x4292c6), Rgb::hex(0x2171b5), Rgb::hex(0x08519c), Rgb::hex(0x08306b),
];
const GREENS: &[Rgb] = &[
    Rgb::hex(0xf7fcf5), Rgb::hex(0xe5f5e0), Rgb::hex(0xc7e9c0), Rgb::hex(0xa1d99b), Rgb::hex(0x74c476),
    Rgb::hex(0x41ab5d), Rgb::hex(0x238b45), Rgb::hex(0x006d2c), Rgb::hex(0x00441b),
];
const OR_RD: &[Rgb] = &[
    Rgb::hex(0xfff7ec), Rgb::hex(0xfee8c8), Rgb::hex(0xfdd49e), Rgb::hex(0xfdbb84), Rgb::hex(0xfc8d59),
    Rgb::hex(0xef6548), Rgb::hex(0xd7301f), Rgb::hex(0xb30000), Rgb::hex(0x7f0000),
];
const YL_OR_RD: &[Rgb] = &[
    Rgb::hex(0xffffcc), Rgb::hex(0xffeda0), Rgb::hex(0xfed976), Rgb::hex(0xfeb24c), Rgb::hex(0xfd8d3c),
    Rgb::hex(0xfc4e2a), Rgb::hex(0xe31a1c), Rgb::hex(0xbd0026), Rgb::hex(0x800026),
];
const RD_PU: &[Rgb] = &[
    Rgb::hex(0xfff7f3), Rgb::hex(0xfde0dd), Rgb::hex(0xfcc5c0), Rgb::hex(0xfa9fb5), Rgb::hex(0xf768a1),
    Rgb::hex(0xdd3497), Rgb::hex(0xae017e), Rgb::hex(0x7a0177), Rgb::hex(0x49006a),
];
const PU_RD: &[Rgb] = &[
    Rgb::hex(0xf7f4f9), Rgb::hex(0xe7e1ef), Rgb::hex(0xd4b9da), Rgb::hex(0xc994c7), Rgb::hex(0xdf65b0),
    Rgb::hex(0xe7298a), Rgb::hex(0xce1256), Rgb::hex(0x980043), Rgb::hex(0x67001f),
];
const PU_BU: &[Rgb] = &[
    Rgb::hex(0xfff7fb), Rgb::hex(0xece7f2), Rgb::hex(0xd0d1e6), Rgb::hex(0xa6bddb), Rgb::hex(0x74a9cf),
    Rgb::hex(0x3690c0), Rgb::hex(0x0570b0), Rgb::hex(0x045a8d), Rgb::hex(0x023858),
];
const YL_GN_BU: &[Rgb] = &[
    Rgb::hex(0xffffd9), Rgb::hex(0xedf8b1), Rgb::hex(0xc7e9b4), Rgb::hex(0x7fcdbb), Rgb::hex(0x41b6c4),
    Rgb::hex(0x1d91c0), Rgb::hex(0x225ea8), Rgb::hex(0x253494), Rgb::hex(0x081d58),
];

const SCHEMES: &[(&str, &[Rgb])] = &[
    ("Greys", GREYS),
    ("Reds", REDS),
    ("Blues", BLUES),
    ("Greens", GREENS),
    ("OrRd", OR_RD),
    ("YlOrRd", YL_OR_RD),
    ("RdPu", RD_PU),
    ("PuRd", PU_RD),
    ("PuBu", PU_BU),
    ("YlGnBu", YL_GN_BU),
];

/// A named sequential color ramp
#[derive(Debug, Clone, Copy)]
pub struct ColorRamp {
    name: &'static str,
    stops: &'static [Rgb],
}

impl ColorRamp {
    /// Look up a scheme by name (case-insensitive)
    pub fn named(name: &str) -> Result<Self> {
        SCHEMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(name, stops)| ColorRamp { name, stops })
            .ok_or_else(|| MapError::UnknownScheme(name.to_string()))
    }

    /// Names of every available scheme, in menu order
    pub fn names() -> impl Iterator<Item = &'static str> {
        SCHEMES.iter().map(|(n, _)| *n)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Color at position `t` in [0, 1] (clamped), interpolated in RGB
    pub fn at(&self, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (self.stops.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.stops.len() - 1);
        let frac = pos - lo as f64;
        let (a, b) = (self.stops[lo], self.stops[hi]);
        let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        Rgb::new(lerp(a.r, b.r), lerp(a.g, b.g), lerp(a.b, b.b))
    }

    /// Sample `count` evenly spaced colors from the start to the end of the ramp
    pub fn colors(&self, count: usize) -> Vec<String> {
        match count {
            0 => Vec::new(),
            1 => vec![self.at(0.0).to_string()],
            n => (0..n)
                .map(|i| self.at(i as f64 / (n - 1) as f64).to_string())
                .collect(),
        }
    }
}

/// Fixed slice colors for chart symbols
pub struct ChartPalette {
    colors: Vec<String>,
}

impl ChartPalette {
    pub fn standard() -> Self {
        ChartPalette {
            colors: [
                "#6bbc60", "#e2e236", "#e28c36", "#36a6e2", "#e25636", "#36e2c9",
                "#364de2", "#e236c9", "#51400e", "#511f0e", "#40510e",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> String {
        self.colors[index % self.colors.len()].clone()
    }

    /// Assign colors to chart fields, in field order
    pub fn assign_colors(&self, fields: &[String]) -> Vec<(String, String)> {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.clone(), self.get_color(i)))
            .collect()
    }
}

/// Marker outline used by icon symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconShape {
    #[default]
    Circle,
    Square,
    Star,
    Penta,
}

/// A marker icon: outline shape plus a font-awesome glyph class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub shape: IconShape,
    pub fa: String,
}

impl Default for Icon {
    fn default() -> Self {
        Icon {
            shape: IconShape::Circle,
            fa: "fa-anchor".to_string(),
        }
    }
}
