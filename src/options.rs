// Per-layer visualization settings and their derived state

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{classify, BinningMode, Classification, MAX_BUILTIN_CLASSES, MIN_CLASSES};
use crate::error::{MapError, Result};
use crate::model::{FeatureCollection, SymbolType};
use crate::palette::{ColorRamp, Icon};
use crate::scale::{ScaleExtent, SizeScale};

// =============================================================================
// Color
// =============================================================================

/// Fill, border and choropleth settings of a layer.
///
/// Only readable from outside; changes go through [`LayerConfig::update_color`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorOptions {
    pub fill_color: String,
    pub border_color: String,
    pub opacity: f64,
    pub fill_opacity: f64,
    /// Field to classify by. `None` means single-color mode.
    pub choropleth_field: Option<String>,
    pub color_scheme: String,
    pub class_count: usize,
    pub mode: BinningMode,
    pub reversed: bool,
    pub custom_boundaries: Option<Vec<f64>>,
    /// Glyph color of icon symbols
    pub icon_text_color: String,
    #[serde(skip)]
    classification: Option<Classification>,
}

impl Default for ColorOptions {
    fn default() -> Self {
        ColorOptions {
            fill_color: "#E0E62D".to_string(),
            border_color: "#000".to_string(),
            opacity: 0.8,
            fill_opacity: 0.8,
            choropleth_field: None,
            color_scheme: "Greys".to_string(),
            class_count: 7,
            mode: BinningMode::Quantile,
            reversed: false,
            custom_boundaries: None,
            icon_text_color: "#FFF".to_string(),
            classification: None,
        }
    }
}

impl ColorOptions {
    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    /// Resulting class colors; empty in single-color mode.
    pub fn colors(&self) -> &[String] {
        self.classification.as_ref().map_or(&[], |c| c.colors())
    }

    /// Resulting class boundaries; empty in single-color mode.
    pub fn boundaries(&self) -> &[f64] {
        self.classification.as_ref().map_or(&[], |c| c.boundaries())
    }

    /// Fill color for a feature value: its class color, or the plain fill color.
    pub fn fill_for(&self, value: Option<f64>) -> &str {
        match (&self.classification, value) {
            (Some(c), Some(v)) => c.color_of(v).unwrap_or(&self.fill_color),
            _ => &self.fill_color,
        }
    }

    fn apply(&self, update: &ColorUpdate) -> Self {
        let mut next = self.clone();
        if let Some(v) = &update.fill_color {
            next.fill_color = v.clone();
        }
        if let Some(v) = &update.border_color {
            next.border_color = v.clone();
        }
        if let Some(v) = update.opacity {
            next.opacity = v;
        }
        if let Some(v) = update.fill_opacity {
            next.fill_opacity = v;
        }
        if let Some(v) = &update.choropleth_field {
            next.choropleth_field = non_empty(v);
        }
        if let Some(v) = &update.color_scheme {
            next.color_scheme = v.clone();
        }
        if let Some(v) = update.class_count {
            next.class_count = v;
        }
        if let Some(v) = update.mode {
            next.mode = v;
        }
        if let Some(v) = update.reversed {
            next.reversed = v;
        }
        if let Some(v) = &update.custom_boundaries {
            next.custom_boundaries = Some(v.clone());
        }
        if let Some(v) = &update.icon_text_color {
            next.icon_text_color = v.clone();
        }
        next
    }

    fn reclassify(&mut self, features: &FeatureCollection) -> Result<()> {
        for (name, v) in [("opacity", self.opacity), ("fill opacity", self.fill_opacity)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(MapError::InvalidColorOptions(format!(
                    "{} must be between 0 and 1 (got {})",
                    name, v
                )));
            }
        }
        ColorRamp::named(&self.color_scheme)?;
        if self.mode != BinningMode::Custom
            && !(MIN_CLASSES..=MAX_BUILTIN_CLASSES).contains(&self.class_count)
        {
            return Err(MapError::ClassCount {
                got: self.class_count,
                min: MIN_CLASSES,
                max: MAX_BUILTIN_CLASSES,
            });
        }

        self.classification = match &self.choropleth_field {
            None => None,
            Some(field) => {
                let values = features.numeric_values(field);
                if values.is_empty() {
                    return Err(MapError::EmptyValues(field.clone()));
                }
                Some(Classification::compute(
                    &values,
                    self.mode,
                    self.class_count,
                    self.custom_boundaries.as_deref(),
                    &self.color_scheme,
                    self.reversed,
                )?)
            }
        };
        Ok(())
    }
}

/// Partial color update. `None` leaves a setting untouched; an empty
/// `choropleth_field` switches back to single-color mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorUpdate {
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
    pub opacity: Option<f64>,
    pub fill_opacity: Option<f64>,
    pub choropleth_field: Option<String>,
    pub color_scheme: Option<String>,
    pub class_count: Option<usize>,
    pub mode: Option<BinningMode>,
    pub reversed: Option<bool>,
    pub custom_boundaries: Option<Vec<f64>>,
    pub icon_text_color: Option<String>,
}

// =============================================================================
// Symbol
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Pie,
    Donut,
}

/// Symbol settings of a point layer, plus the extents observed while scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolOptions {
    pub symbol_type: SymbolType,
    /// Scales circle radius, rectangle width, chart radius and block count
    pub size_field: Option<String>,
    /// Scales rectangle height
    pub size_y_field: Option<String>,
    pub size_multiplier: f64,
    pub size_lower_limit: f64,
    pub size_upper_limit: f64,
    pub icons: Vec<Icon>,
    pub icon_field: Option<String>,
    pub chart_fields: Vec<String>,
    pub chart_type: ChartType,
    /// Data units represented by one block
    pub block_value: f64,
    #[serde(skip)]
    extent_x: Option<ScaleExtent>,
    #[serde(skip)]
    extent_y: Option<ScaleExtent>,
    #[serde(skip)]
    icon_limits: Vec<f64>,
}

impl Default for SymbolOptions {
    fn default() -> Self {
        SymbolOptions {
            symbol_type: SymbolType::Circle,
            size_field: None,
            size_y_field: None,
            size_multiplier: 1.0,
            size_lower_limit: 1.0,
            size_upper_limit: 50.0,
            icons: vec![Icon::default()],
            icon_field: None,
            chart_fields: Vec::new(),
            chart_type: ChartType::Pie,
            block_value: 10.0,
            extent_x: None,
            extent_y: None,
            icon_limits: Vec::new(),
        }
    }
}

impl SymbolOptions {
    pub fn size_scale(&self) -> SizeScale {
        SizeScale {
            multiplier: self.size_multiplier,
            min_size: self.size_lower_limit,
            max_size: self.size_upper_limit,
        }
    }

    /// Observed extremes of `size_field`
    pub fn extent_x(&self) -> Option<&ScaleExtent> {
        self.extent_x.as_ref()
    }

    /// Observed extremes of `size_y_field`
    pub fn extent_y(&self) -> Option<&ScaleExtent> {
        self.extent_y.as_ref()
    }

    /// Class boundaries used to pick an icon; empty when icons are unclassed.
    pub fn icon_limits(&self) -> &[f64] {
        &self.icon_limits
    }

    /// Both rectangle axes scale by the same field.
    pub fn is_square(&self) -> bool {
        matches!((&self.size_field, &self.size_y_field), (Some(x), Some(y)) if x == y)
    }

    fn apply(&self, update: &SymbolUpdate) -> Self {
        let mut next = self.clone();
        if let Some(v) = &update.size_field {
            next.size_field = non_empty(v);
        }
        if let Some(v) = &update.size_y_field {
            next.size_y_field = non_empty(v);
        }
        if let Some(v) = update.size_multiplier {
            next.size_multiplier = v;
        }
        if let Some(v) = update.size_lower_limit {
            next.size_lower_limit = v;
        }
        if let Some(v) = update.size_upper_limit {
            next.size_upper_limit = v;
        }
        if let Some(v) = &update.icons {
            next.icons = v.clone();
        }
        if let Some(v) = &update.icon_field {
            next.icon_field = non_empty(v);
        }
        if let Some(v) = &update.chart_fields {
            next.chart_fields = v.clone();
        }
        if let Some(v) = update.chart_type {
            next.chart_type = v;
        }
        if let Some(v) = update.block_value {
            next.block_value = v;
        }
        next
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MapError::InvalidSymbolOptions(msg));
        if !(self.size_multiplier.is_finite() && self.size_multiplier > 0.0) {
            return invalid(format!("size multiplier must be positive (got {})", self.size_multiplier));
        }
        if !(self.size_lower_limit.is_finite() && self.size_upper_limit.is_finite())
            || self.size_lower_limit < 0.0
            || self.size_lower_limit > self.size_upper_limit
        {
            return invalid(format!(
                "size limits must satisfy 0 <= lower <= upper (got {}..{})",
                self.size_lower_limit, self.size_upper_limit
            ));
        }
        if !(self.block_value.is_finite() && self.block_value > 0.0) {
            return invalid(format!("block value must be positive (got {})", self.block_value));
        }
        if self.icons.is_empty() {
            return invalid("at least one icon is required".to_string());
        }
        Ok(())
    }

    /// Recompute extents and icon limits from scratch.
    fn refresh(&mut self, features: &FeatureCollection, color: &ColorOptions) -> Result<()> {
        self.validate()?;
        let scale = self.size_scale();
        self.extent_x = self.size_field.as_ref().and_then(|f| scale.extent(features, f));
        self.extent_y = self.size_y_field.as_ref().and_then(|f| scale.extent(features, f));

        self.icon_limits = match &self.icon_field {
            None => Vec::new(),
            // Icons share the color classes when both follow the same field
            Some(field) if color.choropleth_field.as_ref() == Some(field) => {
                color.boundaries().to_vec()
            }
            Some(_) if self.icons.len() < MIN_CLASSES => Vec::new(),
            Some(field) => {
                let values = features.numeric_values(field);
                if values.is_empty() {
                    Vec::new()
                } else {
                    classify(&values, BinningMode::Quantile, self.icons.len())?
                }
            }
        };
        Ok(())
    }
}

/// Partial symbol update; same conventions as [`ColorUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SymbolUpdate {
    pub size_field: Option<String>,
    pub size_y_field: Option<String>,
    pub size_multiplier: Option<f64>,
    pub size_lower_limit: Option<f64>,
    pub size_upper_limit: Option<f64>,
    pub icons: Option<Vec<Icon>>,
    pub icon_field: Option<String>,
    pub chart_fields: Option<Vec<String>>,
    pub chart_type: Option<ChartType>,
    pub block_value: Option<f64>,
}

// =============================================================================
// Layer configuration aggregate
// =============================================================================

/// Everything that controls how one layer is drawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    color: ColorOptions,
    symbol: SymbolOptions,
    heat_field: Option<String>,
}

impl LayerConfig {
    pub fn color(&self) -> &ColorOptions {
        &self.color
    }

    pub fn symbol(&self) -> &SymbolOptions {
        &self.symbol
    }

    /// Field whose value weights heat points
    pub fn heat_field(&self) -> Option<&str> {
        self.heat_field.as_deref()
    }

    pub(crate) fn set_symbol_type(&mut self, symbol_type: SymbolType) {
        self.symbol.symbol_type = symbol_type;
    }

    pub(crate) fn set_heat_field(&mut self, field: Option<&str>) {
        self.heat_field = field.and_then(non_empty);
    }

    /// Apply `update`, reclassify, and commit only if everything succeeded.
    pub fn update_color(&mut self, update: &ColorUpdate, features: &FeatureCollection) -> Result<()> {
        let mut color = self.color.apply(update);
        color.reclassify(features)?;
        let mut symbol = self.symbol.clone();
        symbol.refresh(features, &color)?;

        debug!(
            field = ?color.choropleth_field,
            classes = color.colors().len(),
            "color options updated"
        );
        self.color = color;
        self.symbol = symbol;
        Ok(())
    }

    /// Apply `update`, rescale, and commit only if everything succeeded.
    pub fn update_symbol(&mut self, update: &SymbolUpdate, features: &FeatureCollection) -> Result<()> {
        let mut symbol = self.symbol.apply(update);
        symbol.refresh(features, &self.color)?;

        debug!(
            size_field = ?symbol.size_field,
            extent = ?symbol.extent_x,
            "symbol options updated"
        );
        self.symbol = symbol;
        Ok(())
    }

    /// Recompute all derived state against `features`.
    pub fn refresh(&mut self, features: &FeatureCollection) -> Result<()> {
        self.update_color(&ColorUpdate::default(), features)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
