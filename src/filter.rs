// Value-range filters over rendered objects or raw features

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::MAX_CUSTOM_CLASSES;
use crate::error::{MapError, Result};
use crate::kind::handler_for;
use crate::model::{FeatureCollection, FeatureRef, FilterId, Layer, LayerId};
use crate::scale::{RangeAccumulator, ValueRange};
use crate::transform::{heat_points, HeatPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Objects outside the range are taken off the map
    #[default]
    Remove,
    /// Objects outside the range stay, drawn dimmed
    Dim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketSource {
    #[default]
    RenderedObjects,
    /// Heat layers: filtering rebuilds the point list
    RawFeatures,
}

/// All objects sharing one field value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub value: f64,
    pub refs: Vec<FeatureRef>,
}

/// Buckets sorted by value, plus the objects that have no numeric value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketTable {
    buckets: Vec<Bucket>,
    unvalued: Vec<FeatureRef>,
    range: Option<ValueRange>,
}

impl BucketTable {
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn bucket(&self, value: f64) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.value == value)
    }

    /// Total value range; `None` when the field has no numeric values.
    pub fn range(&self) -> Option<ValueRange> {
        self.range
    }
}

/// Group features by their value of `field`.
pub fn build_buckets(features: &FeatureCollection, field: &str) -> BucketTable {
    let mut acc = RangeAccumulator::default();
    let mut valued = Vec::new();
    let mut unvalued = Vec::new();

    for (r, feature) in features.iter().enumerate() {
        match feature.number(field) {
            Some(v) => {
                acc.push(v);
                valued.push((v, r));
            }
            None => unvalued.push(r),
        }
    }

    // Stable: refs keep feature order inside a bucket
    valued.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut buckets: Vec<Bucket> = Vec::new();
    for (value, r) in valued {
        match buckets.last_mut() {
            Some(last) if last.value == value => last.refs.push(r),
            _ => buckets.push(Bucket { value, refs: vec![r] }),
        }
    }

    BucketTable {
        buckets,
        unvalued,
        range: acc.finish(),
    }
}

/// How to cut the total range into selectable steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "count", rename_all = "lowercase")]
pub enum StepMode {
    Even(usize),
    Distinct,
}

/// One selectable interval. Every step but the last excludes its upper
/// bound, so the steps of a filter never share a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub lower: f64,
    pub upper: f64,
    #[serde(default)]
    pub upper_inclusive: bool,
}

impl Step {
    fn new(lower: f64, upper: f64, last: bool) -> Self {
        Step { lower, upper, upper_inclusive: last }
    }

    pub fn contains(&self, value: f64) -> bool {
        within(value, self.lower, self.upper, self.upper_inclusive)
    }
}

fn within(value: f64, lower: f64, upper: f64, upper_inclusive: bool) -> bool {
    lower <= value && (value < upper || (upper_inclusive && value == upper))
}

/// Steps for `table`: `Even(n)` splits the total range into `n` equal
/// intervals, `Distinct` makes one step per adjacent pair of distinct values.
/// Together the steps partition the total range.
pub fn custom_steps(table: &BucketTable, mode: StepMode) -> Result<Vec<Step>> {
    let Some(range) = table.range() else {
        return Ok(Vec::new());
    };
    match mode {
        StepMode::Even(count) => {
            if !(1..=MAX_CUSTOM_CLASSES).contains(&count) {
                return Err(MapError::ClassCount { got: count, min: 1, max: MAX_CUSTOM_CLASSES });
            }
            let width = range.span() / count as f64;
            Ok((0..count)
                .map(|i| {
                    let last = i + 1 == count;
                    let upper = if last { range.max } else { range.min + (i + 1) as f64 * width };
                    Step::new(range.min + i as f64 * width, upper, last)
                })
                .collect())
        }
        StepMode::Distinct => {
            let count = table.buckets().len().saturating_sub(1);
            Ok(table
                .buckets()
                .windows(2)
                .enumerate()
                .map(|(i, w)| Step::new(w[0].value, w[1].value, i + 1 == count))
                .collect())
        }
    }
}

/// Result of applying a filter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterOutcome {
    /// The field has no numeric values; everything stays visible
    NoOp,
    Objects {
        shown: Vec<FeatureRef>,
        hidden: Vec<FeatureRef>,
        mode: FilterMode,
    },
    /// Rebuilt point list of a heat layer
    Heat { points: Vec<HeatPoint> },
}

/// A range filter on one field of one layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    id: FilterId,
    layer: LayerId,
    title: String,
    field: String,
    mode: FilterMode,
    current: Option<ValueRange>,
    steps: Vec<Step>,
    #[serde(skip)]
    source: BucketSource,
    #[serde(skip)]
    table: BucketTable,
}

impl Filter {
    pub fn new(id: FilterId, layer: &Layer, title: &str, field: &str, mode: FilterMode) -> Result<Self> {
        let mut filter = Filter {
            id,
            layer: layer.id(),
            title: title.to_string(),
            field: field.to_string(),
            mode,
            current: None,
            steps: Vec::new(),
            source: BucketSource::default(),
            table: BucketTable::default(),
        };
        filter.rebuild(layer)?;
        Ok(filter)
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn source(&self) -> BucketSource {
        self.source
    }

    pub fn table(&self) -> &BucketTable {
        &self.table
    }

    pub fn total_range(&self) -> Option<ValueRange> {
        self.table.range()
    }

    pub fn current_range(&self) -> Option<ValueRange> {
        self.current
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Recompute buckets and the total range from `layer`.
    ///
    /// The current range is kept, clamped into the new total.
    pub fn rebuild(&mut self, layer: &Layer) -> Result<()> {
        if !layer.has_field(&self.field) {
            return Err(MapError::UnknownField(self.field.clone()));
        }
        let handler = handler_for(layer.kind());
        if self.mode == FilterMode::Dim && !handler.supports_dimming() {
            return Err(MapError::UnsupportedFilterMode(format!(
                "{} layers can only be filtered by removing features",
                handler.name()
            )));
        }
        self.layer = layer.id();
        self.source = handler.bucket_source();
        self.table = build_buckets(layer.features(), &self.field);
        self.current = match (self.current, self.table.range()) {
            (Some(current), Some(total)) => Some(clamp_range(current.min, current.max, total)),
            (_, total) => total,
        };
        debug!(
            filter = %self.id,
            field = %self.field,
            buckets = self.table.buckets.len(),
            "filter buckets built"
        );
        Ok(())
    }

    pub fn set_steps(&mut self, mode: StepMode) -> Result<&[Step]> {
        self.steps = custom_steps(&self.table, mode)?;
        Ok(self.steps.as_slice())
    }

    /// Show objects with values in `[lower, upper]`; limits are clamped to the total range.
    pub fn apply(&mut self, layer: &Layer, lower: f64, upper: f64) -> Result<FilterOutcome> {
        self.select(layer, lower, upper, true)
    }

    pub fn apply_step(&mut self, layer: &Layer, index: usize) -> Result<FilterOutcome> {
        let step = *self.steps.get(index).ok_or(MapError::UnknownStep {
            index,
            count: self.steps.len(),
        })?;
        self.select(layer, step.lower, step.upper, step.upper_inclusive)
    }

    fn select(&mut self, layer: &Layer, lower: f64, upper: f64, upper_inclusive: bool) -> Result<FilterOutcome> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(MapError::InvalidRange { lower, upper });
        }
        let Some(total) = self.table.range() else {
            return Ok(FilterOutcome::NoOp);
        };
        let range = clamp_range(lower, upper, total);
        self.current = Some(range);
        let keep = |v: f64| within(v, range.min, range.max, upper_inclusive);

        if self.source == BucketSource::RawFeatures {
            let field = self.field.as_str();
            let points = heat_points(layer.features(), layer.config().heat_field(), |_, f| {
                f.number(field).map_or(true, keep)
            });
            debug!(filter = %self.id, points = points.len(), "heat list rebuilt");
            return Ok(FilterOutcome::Heat { points });
        }

        let mut shown = self.table.unvalued.clone();
        let mut hidden = Vec::new();
        for bucket in &self.table.buckets {
            if keep(bucket.value) {
                shown.extend_from_slice(&bucket.refs);
            } else {
                hidden.extend_from_slice(&bucket.refs);
            }
        }
        shown.sort_unstable();
        hidden.sort_unstable();
        debug!(filter = %self.id, shown = shown.len(), hidden = hidden.len(), "filter applied");
        Ok(FilterOutcome::Objects { shown, hidden, mode: self.mode })
    }
}

/// Both limits end up inside `total`, so the result is never inverted.
fn clamp_range(lower: f64, upper: f64, total: ValueRange) -> ValueRange {
    let clamp = |v: f64| v.max(total.min).min(total.max);
    ValueRange {
        min: clamp(lower),
        max: clamp(upper),
    }
}
