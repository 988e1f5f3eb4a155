use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::csv_reader;
use crate::filter::{FilterMode, FilterOutcome, StepMode};
use crate::legend::LegendOptions;
use crate::model::{LayerId, LayerKind, SymbolType};
use crate::options::{ColorUpdate, SymbolUpdate};
use crate::session::MapState;

/// A map described in TOML: one point layer, its styling, legend and filters.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub layer: LayerConfigSection,
    #[serde(default)]
    pub color: ColorUpdate,
    #[serde(default)]
    pub symbol: SymbolUpdate,
    #[serde(default)]
    pub legend: LegendOptions,
    #[serde(default, rename = "filter")]
    pub filters: Vec<FilterConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    /// Point CSV, relative to the config file. Read from stdin when absent.
    pub csv: Option<PathBuf>,
    pub lat_column: Option<String>,
    pub lon_column: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KindName {
    #[default]
    Choropleth,
    Circle,
    Rectangle,
    Icon,
    Chart,
    Blocks,
    Heat,
}

impl From<KindName> for LayerKind {
    fn from(name: KindName) -> Self {
        match name {
            KindName::Choropleth => LayerKind::Choropleth,
            KindName::Circle => LayerKind::Symbol(SymbolType::Circle),
            KindName::Rectangle => LayerKind::Symbol(SymbolType::Rectangle),
            KindName::Icon => LayerKind::Symbol(SymbolType::Icon),
            KindName::Chart => LayerKind::Symbol(SymbolType::Chart),
            KindName::Blocks => LayerKind::Symbol(SymbolType::Blocks),
            KindName::Heat => LayerKind::Heat,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LayerConfigSection {
    pub name: Option<String>,
    #[serde(default)]
    pub kind: KindName,
    pub heat_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    #[serde(default)]
    pub title: String,
    pub field: String,
    #[serde(default)]
    pub mode: FilterMode,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub steps: Option<StepMode>,
    /// Index into `steps` to apply instead of `lower`/`upper`
    pub step: Option<usize>,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Load the input data and build a map with one configured layer.
    pub fn build_state(&self, base_dir: &Path) -> Result<(MapState, LayerId)> {
        // 1. Read input
        let csv_data = match &self.input.csv {
            Some(path) => csv_reader::read_csv_file(&base_dir.join(path))?,
            None => csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?,
        };
        let points = csv_reader::to_point_data(
            &csv_data,
            self.input.lat_column.as_deref(),
            self.input.lon_column.as_deref(),
        )
        .context("Failed to build point features")?;

        // 2. Create the layer
        let mut state = MapState::new();
        let name = self.layer.name.as_deref().unwrap_or("layer");
        let id = state
            .add_layer(name, self.layer.kind.into(), points.features, points.headers)
            .context("Failed to add layer")?;

        // 3. Apply styling
        state
            .update_color(id, &self.color)
            .map_err(|e| rejected("color", e))?;
        state
            .update_symbol(id, &self.symbol)
            .map_err(|e| rejected("symbol", e))?;
        if let Some(field) = &self.layer.heat_field {
            state
                .set_heat_field(id, Some(field))
                .map_err(|e| rejected("heat", e))?;
        }
        state.set_legend_options(self.legend.clone());

        info!(layer = %id, "map configured");
        Ok((state, id))
    }

    /// Create every configured filter and apply its range or step.
    pub fn apply_filters(&self, state: &mut MapState, layer: LayerId) -> Result<Vec<FilterOutcome>> {
        let mut outcomes = Vec::with_capacity(self.filters.len());
        for config in &self.filters {
            let id = state
                .create_filter(layer, &config.title, &config.field, config.mode)
                .with_context(|| format!("Failed to create filter on '{}'", config.field))?;
            if let Some(mode) = config.steps {
                state.set_filter_steps(id, mode)?;
            }

            let outcome = match (config.step, config.lower, config.upper) {
                (Some(step), _, _) => state.apply_filter_step(id, step)?,
                (None, lower, upper) => {
                    let total = state.filter(id)?.total_range();
                    let lower = lower.or(total.map(|r| r.min)).unwrap_or(f64::NEG_INFINITY);
                    let upper = upper.or(total.map(|r| r.max)).unwrap_or(f64::INFINITY);
                    state.apply_filter(id, lower, upper)?
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn rejected(section: &str, err: crate::error::MapError) -> anyhow::Error {
    warn!(section, error = %err, "configuration rejected");
    anyhow!("Invalid [{}] section: {}", section, err)
}
