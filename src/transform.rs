use serde::Serialize;
use tracing::trace;

use crate::classify::class_index;
use crate::kind::handler_for;
use crate::model::{Feature, FeatureCollection, FeatureRef, Layer};
use crate::options::{ChartType, ColorOptions, SymbolOptions};
use crate::palette::{ChartPalette, Icon};
use crate::scale::{block_count, DEFAULT_SYMBOL_SIZE};

/// Side length of one square in a block symbol
pub const BLOCK_SIDE: f64 = DEFAULT_SYMBOL_SIZE;

/// Visual attributes of one rendered object. `feature` doubles as the object id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStyle {
    pub feature: FeatureRef,
    pub fill_color: String,
    pub border_color: String,
    pub opacity: f64,
    pub fill_opacity: f64,
    pub class_index: Option<usize>,
    pub mark: Mark,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    Area,
    Circle { radius: f64 },
    Rectangle { width: f64, height: f64 },
    Icon { index: usize, icon: Icon },
    Chart { chart_type: ChartType, radius: f64, slices: Vec<ChartSlice> },
    Blocks { count: u32, side: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSlice {
    pub field: String,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub intensity: Option<f64>,
}

/// What the rendering surface receives for one layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum RenderedLayer {
    Features(Vec<FeatureStyle>),
    Heat(Vec<HeatPoint>),
}

impl RenderedLayer {
    pub fn len(&self) -> usize {
        match self {
            RenderedLayer::Features(items) => items.len(),
            RenderedLayer::Heat(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Main entry point: turn a layer into renderable styles through its kind's handler
pub fn render_layer(layer: &Layer) -> RenderedLayer {
    handler_for(layer.kind()).render(layer)
}

/// Style every feature of `layer`, letting `mark` pick the shape.
pub(crate) fn style_features<F>(layer: &Layer, mut mark: F) -> RenderedLayer
where
    F: FnMut(&Feature) -> Mark,
{
    let color = layer.config().color();
    let styles = layer
        .features()
        .iter()
        .enumerate()
        .map(|(feature, f)| {
            let (fill_color, class_index) = fill_color_for(color, f);
            FeatureStyle {
                feature,
                fill_color,
                border_color: color.border_color.clone(),
                opacity: color.opacity,
                fill_opacity: color.fill_opacity,
                class_index,
                mark: mark(f),
            }
        })
        .collect();
    RenderedLayer::Features(styles)
}

/// Class color of a feature, or the plain fill color when it has no class.
pub fn fill_color_for(color: &ColorOptions, feature: &Feature) -> (String, Option<usize>) {
    let value = color
        .choropleth_field
        .as_deref()
        .and_then(|field| feature.number(field));
    let class = match (color.classification(), value) {
        (Some(c), Some(v)) => c.class_of(v),
        _ => None,
    };
    if value.is_none() && color.classification().is_some() {
        trace!("feature without a numeric color value, using fill color");
    }
    (color.fill_for(value).to_string(), class)
}

fn axis_size(symbol: &SymbolOptions, field: Option<&str>, feature: &Feature) -> f64 {
    let value = field.and_then(|field| feature.number(field));
    symbol.size_scale().size_or_default(value)
}

pub(crate) fn circle_mark(symbol: &SymbolOptions, feature: &Feature) -> Mark {
    Mark::Circle {
        radius: axis_size(symbol, symbol.size_field.as_deref(), feature),
    }
}

pub(crate) fn rectangle_mark(symbol: &SymbolOptions, feature: &Feature) -> Mark {
    Mark::Rectangle {
        width: axis_size(symbol, symbol.size_field.as_deref(), feature),
        height: axis_size(symbol, symbol.size_y_field.as_deref(), feature),
    }
}

/// Icon of the class the feature's icon value falls in; the first icon otherwise.
pub(crate) fn icon_mark(symbol: &SymbolOptions, feature: &Feature) -> Mark {
    let class = symbol
        .icon_field
        .as_deref()
        .and_then(|field| feature.number(field))
        .and_then(|v| class_index(v, symbol.icon_limits()))
        .unwrap_or(0);
    let index = class.min(symbol.icons.len().saturating_sub(1));
    Mark::Icon {
        index,
        icon: symbol.icons.get(index).cloned().unwrap_or_default(),
    }
}

pub(crate) fn chart_mark(symbol: &SymbolOptions, feature: &Feature) -> Mark {
    let palette = ChartPalette::standard();
    let slices = palette
        .assign_colors(&symbol.chart_fields)
        .into_iter()
        .filter_map(|(field, color)| {
            let value = feature.number(&field)?;
            (value > 0.0).then_some(ChartSlice { field, value, color })
        })
        .collect();
    Mark::Chart {
        chart_type: symbol.chart_type,
        radius: axis_size(symbol, symbol.size_field.as_deref(), feature),
        slices,
    }
}

pub(crate) fn blocks_mark(symbol: &SymbolOptions, feature: &Feature) -> Mark {
    let count = symbol
        .size_field
        .as_deref()
        .and_then(|field| feature.number(field))
        .map_or(0, |v| block_count(v, symbol.block_value));
    Mark::Blocks { count, side: BLOCK_SIDE }
}

/// Heat points for the features accepted by `keep`.
///
/// Intensity is the feature's value over the largest value of the whole
/// layer, so filtering never rescales the remaining points.
pub fn heat_points<K>(features: &FeatureCollection, field: Option<&str>, mut keep: K) -> Vec<HeatPoint>
where
    K: FnMut(FeatureRef, &Feature) -> bool,
{
    let max = field
        .and_then(|f| features.max_value(f))
        .filter(|m| *m > 0.0);
    features
        .iter()
        .enumerate()
        .filter(|(r, f)| keep(*r, *f))
        .map(|(_, f)| {
            let coord = f.geometry();
            let intensity = match (field, max) {
                (Some(field), Some(max)) => f.number(field).map(|v| v / max),
                _ => None,
            };
            HeatPoint {
                lat: coord.lat,
                lon: coord.lon,
                intensity,
            }
        })
        .collect()
}
