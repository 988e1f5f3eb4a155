// Legend descriptors, rebuilt from layer state on every request

use serde::{Deserialize, Serialize};

use crate::classify::class_counts;
use crate::kind::handler_for;
use crate::model::{FeatureCollection, Layer, LayerId};
use crate::options::ChartType;
use crate::palette::{ChartPalette, Icon};
use crate::scale::ScaleExtent;

/// Exemplars shown per scaled axis
pub const SIZE_LEGEND_CLASSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendOptions {
    pub title: String,
    pub meta: String,
    pub horizontal: bool,
    pub visible: bool,
    pub show_percentages: bool,
}

impl Default for LegendOptions {
    fn default() -> Self {
        LegendOptions {
            title: String::new(),
            meta: String::new(),
            horizontal: false,
            visible: true,
            show_percentages: false,
        }
    }
}

/// Whole-map legend, one entry per layer in drawing order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub meta: String,
    pub horizontal: bool,
    pub visible: bool,
    pub layers: Vec<LayerLegend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerLegend {
    pub layer: LayerId,
    pub title: String,
    pub sections: Vec<LegendSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegendSection {
    Choropleth(ClassLegend),
    ScaledSize(SizeLegend),
    Chart(ChartLegend),
    Icon(IconLegend),
    Blocks(BlockLegend),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassLegend {
    pub field: String,
    pub swatches: Vec<ClassSwatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSwatch {
    pub lower: f64,
    pub upper: f64,
    pub label: String,
    pub color: String,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeLegend {
    pub tracks: Vec<SizeTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeAxis {
    Radius,
    Square,
    Width,
    Height,
}

/// Exemplars for one scaled axis. `cross_size` is the fixed size of the
/// other rectangle axis, when there is one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeTrack {
    pub axis: SizeAxis,
    pub field: String,
    pub cross_size: Option<f64>,
    pub exemplars: Vec<SizeExemplar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeExemplar {
    pub value: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLegend {
    pub chart_type: ChartType,
    pub entries: Vec<ChartEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEntry {
    pub field: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconLegend {
    pub field: Option<String>,
    pub text_color: String,
    pub entries: Vec<IconEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconEntry {
    pub icon: Icon,
    pub color: String,
    pub label: String,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockLegend {
    pub color: String,
    pub block_value: f64,
    pub label: String,
}

/// Legend of one layer
pub fn generate(layer: &Layer, options: &LegendOptions) -> LayerLegend {
    LayerLegend {
        layer: layer.id(),
        title: layer.name().to_string(),
        sections: handler_for(layer.kind()).legend_sections(layer, options),
    }
}

/// Legend of the whole map
pub fn generate_map_legend<'a, I>(layers: I, options: &LegendOptions) -> Legend
where
    I: IntoIterator<Item = &'a Layer>,
{
    Legend {
        title: options.title.clone(),
        meta: options.meta.clone(),
        horizontal: options.horizontal,
        visible: options.visible,
        layers: layers.into_iter().map(|l| generate(l, options)).collect(),
    }
}

/// Share of all features (in percent, 2 decimals) that falls in each class.
///
/// Features without a numeric value still count toward the total.
pub fn step_percentages(features: &FeatureCollection, field: &str, boundaries: &[f64]) -> Vec<f64> {
    let total = features.len();
    let counts = class_counts(features.iter().filter_map(|f| f.number(field)), boundaries);
    counts
        .into_iter()
        .map(|count| {
            if total == 0 {
                0.0
            } else {
                round2(count as f64 / total as f64 * 100.0)
            }
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `"{lower}-{upper}"` at integer precision
pub fn class_label(lower: f64, upper: f64) -> String {
    format!("{}-{}", lower.round() as i64, upper.round() as i64)
}

fn percentages_for(
    layer: &Layer,
    field: &str,
    boundaries: &[f64],
    options: &LegendOptions,
) -> Vec<Option<f64>> {
    let classes = boundaries.len().saturating_sub(1);
    if options.show_percentages {
        step_percentages(layer.features(), field, boundaries)
            .into_iter()
            .map(Some)
            .collect()
    } else {
        vec![None; classes]
    }
}

pub(crate) fn choropleth_section(layer: &Layer, options: &LegendOptions) -> Option<LegendSection> {
    let color = layer.config().color();
    let field = color.choropleth_field.as_deref()?;
    color.classification()?;

    let boundaries = color.boundaries();
    let percentages = percentages_for(layer, field, boundaries, options);
    let swatches = boundaries
        .windows(2)
        .zip(color.colors())
        .zip(percentages)
        .map(|((b, color), percentage)| ClassSwatch {
            lower: b[0],
            upper: b[1],
            label: class_label(b[0], b[1]),
            color: color.clone(),
            percentage,
        })
        .collect();

    Some(LegendSection::Choropleth(ClassLegend {
        field: field.to_string(),
        swatches,
    }))
}

fn size_track(axis: SizeAxis, field: &str, extent: &ScaleExtent, cross_size: Option<f64>) -> SizeTrack {
    let last = (SIZE_LEGEND_CLASSES - 1) as f64;
    let exemplars = (0..SIZE_LEGEND_CLASSES)
        .map(|i| {
            let t = i as f64 / last;
            SizeExemplar {
                value: extent.min_value + t * (extent.max_value - extent.min_value),
                size: extent.min_size + t * (extent.max_size - extent.min_size),
            }
        })
        .collect();
    SizeTrack {
        axis,
        field: field.to_string(),
        cross_size,
        exemplars,
    }
}

pub(crate) fn circle_size_section(layer: &Layer) -> Option<LegendSection> {
    let symbol = layer.config().symbol();
    let field = symbol.size_field.as_deref()?;
    let extent = symbol.extent_x()?;
    Some(LegendSection::ScaledSize(SizeLegend {
        tracks: vec![size_track(SizeAxis::Radius, field, extent, None)],
    }))
}

pub(crate) fn rectangle_size_section(layer: &Layer) -> Option<LegendSection> {
    let symbol = layer.config().symbol();
    let mut tracks = Vec::new();

    if symbol.is_square() {
        if let (Some(field), Some(extent)) = (symbol.size_field.as_deref(), symbol.extent_x()) {
            tracks.push(size_track(SizeAxis::Square, field, extent, None));
        }
    } else {
        let cross = symbol.size_scale().size_or_default(None);
        if let (Some(field), Some(extent)) = (symbol.size_field.as_deref(), symbol.extent_x()) {
            tracks.push(size_track(SizeAxis::Width, field, extent, Some(cross)));
        }
        if let (Some(field), Some(extent)) = (symbol.size_y_field.as_deref(), symbol.extent_y()) {
            tracks.push(size_track(SizeAxis::Height, field, extent, Some(cross)));
        }
    }

    if tracks.is_empty() {
        None
    } else {
        Some(LegendSection::ScaledSize(SizeLegend { tracks }))
    }
}

pub(crate) fn chart_section(layer: &Layer) -> Option<LegendSection> {
    let symbol = layer.config().symbol();
    if symbol.chart_fields.is_empty() {
        return None;
    }
    let entries = ChartPalette::standard()
        .assign_colors(&symbol.chart_fields)
        .into_iter()
        .map(|(field, color)| ChartEntry { field, color })
        .collect();
    Some(LegendSection::Chart(ChartLegend {
        chart_type: symbol.chart_type,
        entries,
    }))
}

/// Icons share the color classes when both follow the same field
pub(crate) fn icons_carry_colors(layer: &Layer) -> bool {
    let config = layer.config();
    config.color().classification().is_some()
        && config.symbol().icon_field.is_some()
        && config.symbol().icon_field == config.color().choropleth_field
}

pub(crate) fn icon_section(layer: &Layer, options: &LegendOptions) -> LegendSection {
    let color = layer.config().color();
    let symbol = layer.config().symbol();
    let limits = symbol.icon_limits();
    let first_icon = symbol.icons.first().cloned().unwrap_or_default();

    let entries = match symbol.icon_field.as_deref() {
        Some(field) if limits.len() >= 2 => {
            let shared = icons_carry_colors(layer);
            let percentages = percentages_for(layer, field, limits, options);
            limits
                .windows(2)
                .zip(percentages)
                .enumerate()
                .map(|(i, (b, percentage))| {
                    let icon_index = i.min(symbol.icons.len().saturating_sub(1));
                    let fill = if shared {
                        color.colors().get(i).unwrap_or(&color.fill_color).clone()
                    } else {
                        color.fill_color.clone()
                    };
                    IconEntry {
                        icon: symbol.icons.get(icon_index).cloned().unwrap_or_default(),
                        color: fill,
                        label: class_label(b[0], b[1]),
                        percentage,
                    }
                })
                .collect()
        }
        _ => vec![IconEntry {
            icon: first_icon,
            color: color.fill_color.clone(),
            label: layer.name().to_string(),
            percentage: None,
        }],
    };

    LegendSection::Icon(IconLegend {
        field: symbol.icon_field.clone(),
        text_color: color.icon_text_color.clone(),
        entries,
    })
}

pub(crate) fn block_section(layer: &Layer) -> LegendSection {
    let block_value = layer.config().symbol().block_value;
    LegendSection::Blocks(BlockLegend {
        color: layer.config().color().fill_color.clone(),
        block_value,
        label: format!("= {}", block_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::BinningMode;
    use crate::model::tests::make_layer;
    use crate::model::{LayerKind, SymbolType};
    use crate::options::{ColorUpdate, SymbolUpdate};
    use crate::palette::IconShape;
    use crate::scale::DEFAULT_SYMBOL_SIZE;

    fn with_percentages() -> LegendOptions {
        LegendOptions {
            show_percentages: true,
            ..Default::default()
        }
    }

    fn choropleth(values: &[f64], update: ColorUpdate) -> Layer {
        let mut layer = make_layer(LayerKind::Choropleth, "v", values);
        layer
            .update_color(&ColorUpdate {
                choropleth_field: Some("v".to_string()),
                ..update
            })
            .unwrap();
        layer
    }

    fn class_legend(legend: &LayerLegend) -> &ClassLegend {
        legend
            .sections
            .iter()
            .find_map(|s| match s {
                LegendSection::Choropleth(c) => Some(c),
                _ => None,
            })
            .expect("choropleth section")
    }

    fn size_legend(legend: &LayerLegend) -> &SizeLegend {
        legend
            .sections
            .iter()
            .find_map(|s| match s {
                LegendSection::ScaledSize(s) => Some(s),
                _ => None,
            })
            .expect("size section")
    }

    #[test]
    fn test_percentages_scenario() {
        // 4 of 10 features in the first class, nothing in the middle one
        let values = [0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 9.0, 10.0, 10.0, 12.0];
        let layer = choropleth(
            &values,
            ColorUpdate {
                mode: Some(BinningMode::Custom),
                custom_boundaries: Some(vec![0.0, 3.0, 6.0, 12.0]),
                ..Default::default()
            },
        );
        let legend = generate(&layer, &with_percentages());
        let swatches = &class_legend(&legend).swatches;
        assert_eq!(swatches.len(), 3);
        assert_eq!(swatches[0].percentage, Some(40.0));
        assert_eq!(swatches[1].percentage, Some(0.0));
        assert_eq!(swatches[2].percentage, Some(60.0));
        assert_eq!(swatches[0].label, "0-3");
    }

    #[test]
    fn test_percentages_hidden_by_default() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let layer = choropleth(&values, ColorUpdate::default());
        let legend = generate(&layer, &LegendOptions::default());
        assert!(class_legend(&legend).swatches.iter().all(|s| s.percentage.is_none()));
    }

    #[test]
    fn test_labels_and_colors_match_classification() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let layer = choropleth(
            &values,
            ColorUpdate {
                mode: Some(BinningMode::Equidistant),
                class_count: Some(5),
                ..Default::default()
            },
        );
        let legend = generate(&layer, &LegendOptions::default());
        let swatches = &class_legend(&legend).swatches;
        let labels: Vec<&str> = swatches.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1-3", "3-5", "5-6", "6-8", "8-10"]);
        let colors: Vec<&str> = swatches.iter().map(|s| s.color.as_str()).collect();
        let expected: Vec<&str> = layer.config().color().colors().iter().map(|c| c.as_str()).collect();
        assert_eq!(colors, expected);
    }

    #[test]
    fn test_percentages_agree_with_rendered_classes() {
        let values = [1.0, 1.0, 2.0, 5.0, 5.0, 5.0, 7.0, 9.0, 9.0, 9.0, 9.0];
        let layer = choropleth(&values, ColorUpdate { class_count: Some(4), ..Default::default() });
        let boundaries = layer.config().color().boundaries();
        let percentages = step_percentages(layer.features(), "v", boundaries);

        let classification = layer.config().color().classification().unwrap();
        let mut counts = vec![0usize; classification.class_count()];
        for v in values {
            counts[classification.class_of(v).unwrap()] += 1;
        }
        let expected: Vec<f64> = counts
            .iter()
            .map(|c| round2(*c as f64 / values.len() as f64 * 100.0))
            .collect();
        assert_eq!(percentages, expected);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let layer = choropleth(&values, ColorUpdate::default());
        let options = with_percentages();
        let first = serde_json::to_string(&generate(&layer, &options)).unwrap();
        let second = serde_json::to_string(&generate(&layer, &options)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_value_single_class() {
        let layer = choropleth(&[4.0, 4.0, 4.0], ColorUpdate::default());
        let legend = generate(&layer, &with_percentages());
        let swatches = &class_legend(&legend).swatches;
        assert_eq!(swatches.len(), 1);
        assert_eq!(swatches[0].percentage, Some(100.0));
    }

    #[test]
    fn test_circle_size_track() {
        let mut layer = make_layer(LayerKind::Symbol(SymbolType::Circle), "pop", &[0.0, 100.0, 400.0]);
        layer
            .update_symbol(&SymbolUpdate {
                size_field: Some("pop".into()),
                size_lower_limit: Some(2.0),
                ..Default::default()
            })
            .unwrap();
        let legend = generate(&layer, &LegendOptions::default());
        let tracks = &size_legend(&legend).tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].axis, SizeAxis::Radius);
        let exemplars = &tracks[0].exemplars;
        assert_eq!(exemplars.len(), SIZE_LEGEND_CLASSES);
        assert_eq!(exemplars[0].value, 0.0);
        assert_eq!(exemplars[0].size, 2.0);
        assert_eq!(exemplars[2].value, 200.0);
        assert_eq!(exemplars[4].value, 400.0);
        assert!((exemplars[4].size - (400.0 / std::f64::consts::PI).sqrt() * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_rectangle_tracks() {
        let mut layer = make_layer(LayerKind::Symbol(SymbolType::Rectangle), "a", &[1.0, 50.0]);
        layer
            .update_symbol(&SymbolUpdate { size_field: Some("a".into()), ..Default::default() })
            .unwrap();
        let legend = generate(&layer, &LegendOptions::default());
        let tracks = &size_legend(&legend).tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].axis, SizeAxis::Width);
        assert_eq!(tracks[0].cross_size, Some(DEFAULT_SYMBOL_SIZE));

        layer
            .update_symbol(&SymbolUpdate { size_y_field: Some("a".into()), ..Default::default() })
            .unwrap();
        let legend = generate(&layer, &LegendOptions::default());
        let tracks = &size_legend(&legend).tracks;
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].axis, SizeAxis::Square);
        assert_eq!(tracks[0].cross_size, None);
    }

    #[test]
    fn test_icon_section_shares_color_classes() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let mut layer = make_layer(LayerKind::Symbol(SymbolType::Icon), "v", &values);
        let icons = vec![
            Icon { shape: IconShape::Circle, fa: "fa-a".into() },
            Icon { shape: IconShape::Square, fa: "fa-b".into() },
        ];
        layer
            .update_symbol(&SymbolUpdate {
                icons: Some(icons),
                icon_field: Some("v".into()),
                ..Default::default()
            })
            .unwrap();
        layer
            .update_color(&ColorUpdate {
                choropleth_field: Some("v".into()),
                class_count: Some(3),
                mode: Some(BinningMode::Equidistant),
                ..Default::default()
            })
            .unwrap();

        let legend = generate(&layer, &with_percentages());
        assert!(!legend.sections.iter().any(|s| matches!(s, LegendSection::Choropleth(_))));
        let icon = legend
            .sections
            .iter()
            .find_map(|s| match s {
                LegendSection::Icon(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(icon.entries.len(), 3);
        assert_eq!(icon.entries[2].icon.fa, "fa-b");
        assert_eq!(icon.entries[2].color, layer.config().color().colors()[2]);
        assert_eq!(icon.entries[0].percentage, Some(40.0));
    }

    #[test]
    fn test_icon_section_without_classes() {
        let layer = make_layer(LayerKind::Symbol(SymbolType::Icon), "v", &[1.0]);
        let legend = generate(&layer, &LegendOptions::default());
        match &legend.sections[..] {
            [LegendSection::Icon(icon)] => {
                assert_eq!(icon.entries.len(), 1);
                assert_eq!(icon.entries[0].label, "test");
                assert_eq!(icon.entries[0].icon, Icon::default());
            }
            other => panic!("Unexpected sections {:?}", other),
        }
    }

    #[test]
    fn test_chart_and_block_sections() {
        let mut chart = make_layer(LayerKind::Symbol(SymbolType::Chart), "a", &[1.0]);
        chart
            .update_symbol(&SymbolUpdate { chart_fields: Some(vec!["a".into()]), ..Default::default() })
            .unwrap();
        match &generate(&chart, &LegendOptions::default()).sections[..] {
            [LegendSection::Chart(c)] => assert_eq!(c.entries[0].color, "#6bbc60"),
            other => panic!("Unexpected sections {:?}", other),
        }

        let blocks = make_layer(LayerKind::Symbol(SymbolType::Blocks), "a", &[1.0]);
        match &generate(&blocks, &LegendOptions::default()).sections[..] {
            [LegendSection::Blocks(b)] => assert_eq!(b.label, "= 10"),
            other => panic!("Unexpected sections {:?}", other),
        }
    }

    #[test]
    fn test_map_legend_keeps_layer_order() {
        let a = make_layer(LayerKind::Heat, "v", &[1.0]);
        let mut b = make_layer(LayerKind::Choropleth, "v", &[1.0, 2.0]);
        b.update_color(&ColorUpdate { choropleth_field: Some("v".into()), ..Default::default() })
            .unwrap();
        let options = LegendOptions {
            title: "Population".into(),
            horizontal: true,
            ..Default::default()
        };
        let legend = generate_map_legend([&b, &a], &options);
        assert_eq!(legend.title, "Population");
        assert!(legend.horizontal);
        assert_eq!(legend.layers.len(), 2);
        assert!(legend.layers[1].sections.is_empty());
        assert!(!legend.layers[0].sections.is_empty());
    }
}
