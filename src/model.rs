use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::{ColorUpdate, LayerConfig, SymbolUpdate};

// =============================================================================
// Identifiers
// =============================================================================

/// Session-unique layer id. Assigned monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

/// Session-unique filter id. Assigned monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a feature inside its collection. Rendered objects share it.
pub type FeatureRef = usize;

// =============================================================================
// Features
// =============================================================================

/// A property value, tagged once at import time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Tag a raw cell: anything that parses as a number is a number.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) => PropertyValue::Number(n),
            Err(_) => PropertyValue::Text(raw.to_string()),
        }
    }

    /// The numeric value, if this is a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Point geometry in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    geometry: Coordinate,
    properties: BTreeMap<String, PropertyValue>,
}

impl Feature {
    pub fn new(geometry: Coordinate, properties: BTreeMap<String, PropertyValue>) -> Self {
        Feature { geometry, properties }
    }

    pub fn geometry(&self) -> Coordinate {
        self.geometry
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, field: &str) -> Option<&PropertyValue> {
        self.properties.get(field)
    }

    /// Finite numeric value of `field`; `None` for missing or text values.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.property(field).and_then(PropertyValue::as_number)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: FeatureRef) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// All finite numeric values of `field`, in feature order.
    pub fn numeric_values(&self, field: &str) -> Vec<f64> {
        self.features.iter().filter_map(|f| f.number(field)).collect()
    }

    /// Largest finite value of `field`, if any.
    pub fn max_value(&self, field: &str) -> Option<f64> {
        self.features
            .iter()
            .filter_map(|f| f.number(field))
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}

// =============================================================================
// Headers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderKind {
    Number,
    Text,
}

/// A data column / property name with its inferred type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub kind: HeaderKind,
}

impl Header {
    pub fn number(name: &str) -> Self {
        Header { name: name.to_string(), kind: HeaderKind::Number }
    }

    pub fn text(name: &str) -> Self {
        Header { name: name.to_string(), kind: HeaderKind::Text }
    }
}

// =============================================================================
// Layers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    /// Circle marker, radius scaled by one field.
    #[default]
    Circle,
    /// Rectangle whose width and height can be scaled independently.
    Rectangle,
    /// Marker icon chosen by value class.
    Icon,
    /// Pie or donut chart over several fields.
    Chart,
    /// Stack of squares, one per `block_value` units.
    Blocks,
}

/// The visualization a layer is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "symbol")]
pub enum LayerKind {
    Choropleth,
    Symbol(SymbolType),
    Heat,
}

/// One imported dataset and its visualization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    id: LayerId,
    name: String,
    kind: LayerKind,
    headers: Vec<Header>,
    features: FeatureCollection,
    config: LayerConfig,
}

impl Layer {
    pub fn new(
        id: LayerId,
        name: &str,
        kind: LayerKind,
        features: FeatureCollection,
        headers: Vec<Header>,
    ) -> Self {
        let mut config = LayerConfig::default();
        if let LayerKind::Symbol(symbol_type) = kind {
            config.set_symbol_type(symbol_type);
        }
        Layer {
            id,
            name: name.to_string(),
            kind,
            headers,
            features,
            config,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Names of the numeric columns, in header order.
    pub fn number_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.kind == HeaderKind::Number)
            .map(|h| h.name.as_str())
            .collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.headers.iter().any(|h| h.name == field)
    }

    pub fn features(&self) -> &FeatureCollection {
        &self.features
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Apply a color update. All-or-nothing: on error nothing changes.
    pub fn update_color(&mut self, update: &ColorUpdate) -> Result<()> {
        self.check_field(update.choropleth_field.as_deref())?;
        self.config.update_color(update, &self.features)
    }

    /// Apply a symbol update. All-or-nothing: on error nothing changes.
    pub fn update_symbol(&mut self, update: &SymbolUpdate) -> Result<()> {
        self.check_field(update.size_field.as_deref())?;
        self.check_field(update.size_y_field.as_deref())?;
        self.check_field(update.icon_field.as_deref())?;
        if let Some(fields) = &update.chart_fields {
            for field in fields {
                self.check_field(Some(field))?;
            }
        }
        self.config.update_symbol(update, &self.features)
    }

    pub fn set_heat_field(&mut self, field: Option<&str>) -> Result<()> {
        self.check_field(field)?;
        self.config.set_heat_field(field);
        Ok(())
    }

    /// Recompute every derived value (classification, extents, icon limits).
    pub fn refresh(&mut self) -> Result<()> {
        self.config.refresh(&self.features)
    }

    fn check_field(&self, field: Option<&str>) -> Result<()> {
        match field {
            Some(f) if !f.is_empty() && !self.has_field(f) => {
                Err(crate::error::MapError::UnknownField(f.to_string()))
            }
            _ => Ok(()),
        }
    }
}
