// One handler per visualization kind, picked once by `handler_for`

use crate::filter::BucketSource;
use crate::legend::{self, LegendOptions, LegendSection};
use crate::model::{Layer, LayerKind, SymbolType};
use crate::transform::{self, Mark, RenderedLayer};

/// Everything that differs between visualization kinds
pub trait VisualizationHandler {
    /// Display name used in messages
    fn name(&self) -> &'static str;

    fn render(&self, layer: &Layer) -> RenderedLayer;

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection>;

    /// Where a filter on this kind gets its buckets from
    fn bucket_source(&self) -> BucketSource {
        BucketSource::RenderedObjects
    }

    /// Whether filters may dim instead of remove
    fn supports_dimming(&self) -> bool {
        true
    }
}

pub fn handler_for(kind: LayerKind) -> &'static dyn VisualizationHandler {
    match kind {
        LayerKind::Choropleth => &ChoroplethHandler,
        LayerKind::Symbol(SymbolType::Circle) => &CircleHandler,
        LayerKind::Symbol(SymbolType::Rectangle) => &RectangleHandler,
        LayerKind::Symbol(SymbolType::Icon) => &IconHandler,
        LayerKind::Symbol(SymbolType::Chart) => &ChartHandler,
        LayerKind::Symbol(SymbolType::Blocks) => &BlocksHandler,
        LayerKind::Heat => &HeatHandler,
    }
}

struct ChoroplethHandler;
impl VisualizationHandler for ChoroplethHandler {
    fn name(&self) -> &'static str {
        "choropleth"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        transform::style_features(layer, |_| Mark::Area)
    }

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection> {
        legend::choropleth_section(layer, options).into_iter().collect()
    }
}

struct CircleHandler;
impl VisualizationHandler for CircleHandler {
    fn name(&self) -> &'static str {
        "circle"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        let symbol = layer.config().symbol();
        transform::style_features(layer, |f| transform::circle_mark(symbol, f))
    }

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection> {
        legend::choropleth_section(layer, options)
            .into_iter()
            .chain(legend::circle_size_section(layer))
            .collect()
    }
}

struct RectangleHandler;
impl VisualizationHandler for RectangleHandler {
    fn name(&self) -> &'static str {
        "rectangle"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        let symbol = layer.config().symbol();
        transform::style_features(layer, |f| transform::rectangle_mark(symbol, f))
    }

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection> {
        legend::choropleth_section(layer, options)
            .into_iter()
            .chain(legend::rectangle_size_section(layer))
            .collect()
    }
}

struct IconHandler;
impl VisualizationHandler for IconHandler {
    fn name(&self) -> &'static str {
        "icon"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        let symbol = layer.config().symbol();
        transform::style_features(layer, |f| transform::icon_mark(symbol, f))
    }

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection> {
        let mut sections = Vec::new();
        if !legend::icons_carry_colors(layer) {
            sections.extend(legend::choropleth_section(layer, options));
        }
        sections.push(legend::icon_section(layer, options));
        sections
    }

    fn supports_dimming(&self) -> bool {
        false
    }
}

struct ChartHandler;
impl VisualizationHandler for ChartHandler {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        let symbol = layer.config().symbol();
        transform::style_features(layer, |f| transform::chart_mark(symbol, f))
    }

    fn legend_sections(&self, layer: &Layer, _options: &LegendOptions) -> Vec<LegendSection> {
        legend::chart_section(layer).into_iter().collect()
    }

    fn supports_dimming(&self) -> bool {
        false
    }
}

struct BlocksHandler;
impl VisualizationHandler for BlocksHandler {
    fn name(&self) -> &'static str {
        "blocks"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        let symbol = layer.config().symbol();
        transform::style_features(layer, |f| transform::blocks_mark(symbol, f))
    }

    fn legend_sections(&self, layer: &Layer, options: &LegendOptions) -> Vec<LegendSection> {
        let mut sections: Vec<LegendSection> = legend::choropleth_section(layer, options).into_iter().collect();
        sections.push(legend::block_section(layer));
        sections
    }
}

struct HeatHandler;
impl VisualizationHandler for HeatHandler {
    fn name(&self) -> &'static str {
        "heat"
    }

    fn render(&self, layer: &Layer) -> RenderedLayer {
        RenderedLayer::Heat(transform::heat_points(
            layer.features(),
            layer.config().heat_field(),
            |_, _| true,
        ))
    }

    fn legend_sections(&self, _layer: &Layer, _options: &LegendOptions) -> Vec<LegendSection> {
        Vec::new()
    }

    fn bucket_source(&self) -> BucketSource {
        BucketSource::RawFeatures
    }

    fn supports_dimming(&self) -> bool {
        false
    }
}
