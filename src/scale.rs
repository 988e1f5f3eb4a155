use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::model::FeatureCollection;

/// Size given to symbols whose field value is missing or not numeric
pub const DEFAULT_SYMBOL_SIZE: f64 = 10.0;

/// Area-proportional symbol size: `clamp(sqrt(value * multiplier / PI) * 2, min, max)`.
///
/// Negative and non-finite products count as zero, so the result is always
/// inside `[min_size, max_size]`.
pub fn symbol_size(value: f64, multiplier: f64, min_size: f64, max_size: f64) -> f64 {
    let area = value * multiplier;
    let area = if area.is_finite() && area > 0.0 { area } else { 0.0 };
    let size = (area / PI).sqrt() * 2.0;
    size.max(min_size).min(max_size)
}

/// Number of stacked squares drawn for a block symbol.
pub fn block_count(value: f64, block_value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 || block_value <= 0.0 {
        return 0;
    }
    (value / block_value).ceil().min(u32::MAX as f64) as u32
}

/// Observed data range of a field, seeded by its first value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangeAccumulator {
    range: Option<ValueRange>,
}

impl RangeAccumulator {
    pub fn push(&mut self, value: f64) {
        match &mut self.range {
            None => self.range = Some(ValueRange { min: value, max: value }),
            Some(r) => {
                r.min = r.min.min(value);
                r.max = r.max.max(value);
            }
        }
    }

    pub fn finish(self) -> Option<ValueRange> {
        self.range
    }
}

/// The extreme `(value, size)` pairs seen while scaling a field.
///
/// Values are the raw data values; sizes are the clamped visual sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleExtent {
    pub min_value: f64,
    pub max_value: f64,
    pub min_size: f64,
    pub max_size: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ExtentAccumulator {
    extent: Option<ScaleExtent>,
}

impl ExtentAccumulator {
    pub fn push(&mut self, value: f64, size: f64) {
        match &mut self.extent {
            None => {
                self.extent = Some(ScaleExtent {
                    min_value: value,
                    max_value: value,
                    min_size: size,
                    max_size: size,
                })
            }
            Some(e) => {
                if value < e.min_value {
                    e.min_value = value;
                    e.min_size = size;
                }
                if value > e.max_value {
                    e.max_value = value;
                    e.max_size = size;
                }
            }
        }
    }

    pub fn finish(self) -> Option<ScaleExtent> {
        self.extent
    }
}

/// Sizing parameters shared by every scaled symbol of a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeScale {
    pub multiplier: f64,
    pub min_size: f64,
    pub max_size: f64,
}

impl SizeScale {
    pub fn size(&self, value: f64) -> f64 {
        symbol_size(value, self.multiplier, self.min_size, self.max_size)
    }

    /// Size for an optional value; missing values get the default size.
    pub fn size_or_default(&self, value: Option<f64>) -> f64 {
        match value {
            Some(v) => self.size(v),
            None => DEFAULT_SYMBOL_SIZE.max(self.min_size).min(self.max_size),
        }
    }

    /// Scale every numeric value of `field` and return the observed extremes.
    pub fn extent(&self, features: &FeatureCollection, field: &str) -> Option<ScaleExtent> {
        let mut acc = ExtentAccumulator::default();
        for value in features.iter().filter_map(|f| f.number(field)) {
            acc.push(value, self.size(value));
        }
        acc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::make_features;

    #[test]
    fn test_symbol_size_formula() {
        // sqrt(100 / PI) = 5.64 is the area-equivalent radius, doubled by the formula
        let size = symbol_size(100.0, 1.0, 5.0, 30.0);
        assert!((size - 11.2838).abs() < 1e-3, "got {}", size);
        assert!(((100.0 / PI).sqrt() - 5.6419).abs() < 1e-3);
    }

    #[test]
    fn test_symbol_size_clamps() {
        assert_eq!(symbol_size(1.0, 1.0, 5.0, 30.0), 5.0);
        assert_eq!(symbol_size(1e6, 1.0, 5.0, 30.0), 30.0);
        assert_eq!(symbol_size(-50.0, 1.0, 5.0, 30.0), 5.0);
        assert_eq!(symbol_size(f64::NAN, 1.0, 5.0, 30.0), 5.0);
    }

    #[test]
    fn test_symbol_size_monotonic_and_bounded() {
        let mut prev = f64::NEG_INFINITY;
        for i in -20..400 {
            let v = i as f64 * 2.5;
            let s = symbol_size(v, 3.0, 2.0, 40.0);
            assert!(s >= prev, "not monotonic at {}", v);
            assert!((2.0..=40.0).contains(&s));
            prev = s;
        }
    }

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(25.0, 10.0), 3);
        assert_eq!(block_count(20.0, 10.0), 2);
        assert_eq!(block_count(0.0, 10.0), 0);
        assert_eq!(block_count(-4.0, 10.0), 0);
        assert_eq!(block_count(5.0, 0.0), 0);
    }

    #[test]
    fn test_range_accumulator_first_value_seeds() {
        let mut acc = RangeAccumulator::default();
        assert_eq!(acc.clone().finish(), None);
        acc.push(0.0);
        assert_eq!(acc.clone().finish(), Some(ValueRange { min: 0.0, max: 0.0 }));
        acc.push(-3.0);
        acc.push(7.0);
        acc.push(2.0);
        assert_eq!(acc.finish(), Some(ValueRange { min: -3.0, max: 7.0 }));
    }

    #[test]
    fn test_extent_keeps_unclamped_values() {
        let scale = SizeScale { multiplier: 1.0, min_size: 5.0, max_size: 30.0 };
        let features = make_features("pop", &[1.0, 100.0, 1e6]);
        let extent = scale.extent(&features, "pop").unwrap();
        assert_eq!(extent.min_value, 1.0);
        assert_eq!(extent.min_size, 5.0);
        assert_eq!(extent.max_value, 1e6);
        assert_eq!(extent.max_size, 30.0);
    }

    #[test]
    fn test_extent_missing_field() {
        let scale = SizeScale { multiplier: 1.0, min_size: 5.0, max_size: 30.0 };
        let features = make_features("pop", &[1.0]);
        assert_eq!(scale.extent(&features, "other"), None);
    }

    #[test]
    fn test_default_size_respects_limits() {
        let scale = SizeScale { multiplier: 1.0, min_size: 12.0, max_size: 30.0 };
        assert_eq!(scale.size_or_default(None), 12.0);
        let scale = SizeScale { multiplier: 1.0, min_size: 1.0, max_size: 30.0 };
        assert_eq!(scale.size_or_default(None), DEFAULT_SYMBOL_SIZE);
    }
}
