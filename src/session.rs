use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MapError, Result};
use crate::filter::{Filter, FilterMode, FilterOutcome, Step, StepMode};
use crate::legend::{generate_map_legend, Legend, LegendOptions};
use crate::model::{FeatureCollection, FilterId, Header, Layer, LayerId, LayerKind};
use crate::options::{ColorUpdate, SymbolUpdate};
use crate::transform::{render_layer, RenderedLayer};

/// All layers, filters and legend settings of one map.
#[derive(Debug, Clone, Default)]
pub struct MapState {
    next_layer_id: u32,
    next_filter_id: u32,
    layers: Vec<Layer>,
    filters: Vec<Filter>,
    legend: LegendOptions,
}

/// Saved map: everything needed to rebuild a [`MapState`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    pub layers: Vec<Layer>,
    pub legend: LegendOptions,
    pub filters: Vec<Filter>,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset as a new layer and return its id.
    ///
    /// Choropleth layers start out classified by their last numeric column.
    pub fn add_layer(
        &mut self,
        name: &str,
        kind: LayerKind,
        features: FeatureCollection,
        headers: Vec<Header>,
    ) -> Result<LayerId> {
        let id = LayerId(self.next_layer_id);
        let mut layer = Layer::new(id, name, kind, features, headers);
        let last_number = layer.number_headers().last().map(|f| f.to_string());
        if let (LayerKind::Choropleth, Some(field)) = (kind, last_number) {
            layer.update_color(&ColorUpdate {
                choropleth_field: Some(field),
                ..Default::default()
            })?;
        }
        self.next_layer_id += 1;
        info!(layer = %id, layer_name = name, features = layer.features().len(), "layer added");
        self.layers.push(layer);
        Ok(id)
    }

    /// Remove a layer together with every filter that refers to it.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer> {
        let index = self.layer_index(id)?;
        let layer = self.layers.remove(index);
        let before = self.filters.len();
        self.filters.retain(|f| f.layer() != id);
        debug!(layer = %id, filters_removed = before - self.filters.len(), "layer removed");
        Ok(layer)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Result<&Layer> {
        self.layers
            .iter()
            .find(|l| l.id() == id)
            .ok_or(MapError::UnknownLayer(id))
    }

    fn layer_index(&self, id: LayerId) -> Result<usize> {
        self.layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or(MapError::UnknownLayer(id))
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.id() == id)
            .ok_or(MapError::UnknownLayer(id))
    }

    pub fn update_color(&mut self, id: LayerId, update: &ColorUpdate) -> Result<()> {
        self.layer_mut(id)?.update_color(update)
    }

    pub fn update_symbol(&mut self, id: LayerId, update: &SymbolUpdate) -> Result<()> {
        self.layer_mut(id)?.update_symbol(update)
    }

    pub fn set_heat_field(&mut self, id: LayerId, field: Option<&str>) -> Result<()> {
        self.layer_mut(id)?.set_heat_field(field)
    }

    /// Move the listed layers to the front, in the given order.
    /// Unlisted layers keep their relative order behind them.
    pub fn reorder_layers(&mut self, order: &[LayerId]) -> Result<()> {
        for id in order {
            self.layer_index(*id)?;
        }
        let mut remaining = std::mem::take(&mut self.layers);
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in order {
            if let Some(pos) = remaining.iter().position(|l| l.id() == *id) {
                reordered.push(remaining.remove(pos));
            }
        }
        reordered.extend(remaining);
        self.layers = reordered;
        Ok(())
    }

    pub fn render(&self, id: LayerId) -> Result<RenderedLayer> {
        Ok(render_layer(self.layer(id)?))
    }

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------

    pub fn create_filter(
        &mut self,
        layer: LayerId,
        title: &str,
        field: &str,
        mode: FilterMode,
    ) -> Result<FilterId> {
        let id = FilterId(self.next_filter_id);
        let filter = Filter::new(id, self.layer(layer)?, title, field, mode)?;
        self.next_filter_id += 1;
        debug!(filter = %id, layer = %layer, field = field, "filter created");
        self.filters.push(filter);
        Ok(id)
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter(&self, id: FilterId) -> Result<&Filter> {
        self.filters
            .iter()
            .find(|f| f.id() == id)
            .ok_or(MapError::UnknownFilter(id))
    }

    /// The filter and the layer it points at, both checked.
    fn filter_with_layer(&mut self, id: FilterId) -> Result<(&mut Filter, &Layer)> {
        let filter = self
            .filters
            .iter_mut()
            .find(|f| f.id() == id)
            .ok_or(MapError::UnknownFilter(id))?;
        let layer = self
            .layers
            .iter()
            .find(|l| l.id() == filter.layer())
            .ok_or(MapError::UnknownLayer(filter.layer()))?;
        Ok((filter, layer))
    }

    pub fn apply_filter(&mut self, id: FilterId, lower: f64, upper: f64) -> Result<FilterOutcome> {
        let (filter, layer) = self.filter_with_layer(id)?;
        filter.apply(layer, lower, upper)
    }

    pub fn set_filter_steps(&mut self, id: FilterId, mode: StepMode) -> Result<Vec<Step>> {
        let (filter, _) = self.filter_with_layer(id)?;
        Ok(filter.set_steps(mode)?.to_vec())
    }

    pub fn apply_filter_step(&mut self, id: FilterId, index: usize) -> Result<FilterOutcome> {
        let (filter, layer) = self.filter_with_layer(id)?;
        filter.apply_step(layer, index)
    }

    pub fn delete_filter(&mut self, id: FilterId) -> Result<Filter> {
        let index = self
            .filters
            .iter()
            .position(|f| f.id() == id)
            .ok_or(MapError::UnknownFilter(id))?;
        Ok(self.filters.remove(index))
    }

    // -------------------------------------------------------------------------
    // Legend
    // -------------------------------------------------------------------------

    pub fn legend_options(&self) -> &LegendOptions {
        &self.legend
    }

    pub fn set_legend_options(&mut self, options: LegendOptions) {
        self.legend = options;
    }

    pub fn legend(&self) -> Legend {
        generate_map_legend(&self.layers, &self.legend)
    }

    // -------------------------------------------------------------------------
    // Save / load
    // -------------------------------------------------------------------------

    pub fn to_save_data(&self) -> SaveData {
        SaveData {
            layers: self.layers.clone(),
            legend: self.legend.clone(),
            filters: self.filters.clone(),
        }
    }

    /// Rebuild a map from saved data, recomputing all derived state.
    pub fn from_save_data(data: SaveData) -> Result<Self> {
        let SaveData { mut layers, legend, mut filters } = data;
        for layer in &mut layers {
            layer.refresh()?;
        }
        for filter in &mut filters {
            let layer = layers
                .iter()
                .find(|l| l.id() == filter.layer())
                .ok_or(MapError::UnknownLayer(filter.layer()))?;
            filter.rebuild(layer)?;
        }

        let next_layer_id = layers.iter().map(|l| l.id().0 + 1).max().unwrap_or(0);
        let next_filter_id = filters.iter().map(|f| f.id().0 + 1).max().unwrap_or(0);
        debug!(layers = layers.len(), filters = filters.len(), "map loaded");
        Ok(MapState {
            next_layer_id,
            next_filter_id,
            layers,
            filters,
            legend,
        })
    }

    pub fn save_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_save_data()).map_err(|e| MapError::Bundle(e.to_string()))
    }

    pub fn load_json(json: &str) -> Result<Self> {
        let data: SaveData = serde_json::from_str(json).map_err(|e| MapError::Bundle(e.to_string()))?;
        Self::from_save_data(data)
    }
}
