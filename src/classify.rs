use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MapError, Result};
use crate::palette::ColorRamp;

pub const MIN_CLASSES: usize = 2;
pub const MAX_BUILTIN_CLASSES: usize = 10;
pub const MAX_CUSTOM_CLASSES: usize = 100;
pub const KMEANS_MAX_ITERATIONS: usize = 200;

/// How class boundaries are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinningMode {
    #[default]
    #[serde(alias = "q")]
    Quantile,
    #[serde(alias = "k", alias = "k-means")]
    KMeans,
    #[serde(alias = "e")]
    Equidistant,
    #[serde(alias = "c")]
    Custom,
}

/// Class boundaries plus one color per class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    boundaries: Vec<f64>,
    colors: Vec<String>,
}

impl Classification {
    /// Classify `values` and color the classes from `scheme`.
    ///
    /// `custom` is only consulted in [`BinningMode::Custom`].
    pub fn compute(
        values: &[f64],
        mode: BinningMode,
        class_count: usize,
        custom: Option<&[f64]>,
        scheme: &str,
        reversed: bool,
    ) -> Result<Self> {
        let ramp = ColorRamp::named(scheme)?;
        let boundaries = match mode {
            BinningMode::Custom => {
                let custom = custom.ok_or(MapError::MissingBoundaries)?;
                validate_custom_boundaries(values, custom)?;
                custom.to_vec()
            }
            _ => classify(values, mode, class_count)?,
        };

        let mut colors = ramp.colors(boundaries.len() - 1);
        if reversed {
            colors.reverse();
        }
        debug!(?mode, classes = colors.len(), scheme = ramp.name(), "classified values");
        Ok(Classification { boundaries, colors })
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn class_count(&self) -> usize {
        self.colors.len()
    }

    pub fn class_of(&self, value: f64) -> Option<usize> {
        class_index(value, &self.boundaries)
    }

    pub fn color_of(&self, value: f64) -> Option<&str> {
        self.class_of(value).map(|i| self.colors[i].as_str())
    }
}

/// Compute `class_count + 1` boundaries for a built-in binning mode.
///
/// Identical values collapse to the single pair `[v, v]`.
pub fn classify(values: &[f64], mode: BinningMode, class_count: usize) -> Result<Vec<f64>> {
    if mode == BinningMode::Custom {
        return Err(MapError::MissingBoundaries);
    }
    check_class_count(class_count, MAX_BUILTIN_CLASSES)?;

    let sorted = sorted_finite(values);
    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return Err(MapError::EmptyValues(String::new())),
    };
    if min == max {
        return Ok(vec![min, max]);
    }

    let mut boundaries = match mode {
        BinningMode::Quantile => quantile_limits(&sorted, class_count),
        BinningMode::Equidistant => equidistant_limits(min, max, class_count),
        BinningMode::KMeans => kmeans_limits(&sorted, class_count),
        BinningMode::Custom => return Err(MapError::MissingBoundaries),
    };
    // Pin the outer bounds exactly; interpolation can drift by an ulp
    boundaries[0] = min;
    boundaries[class_count] = max;
    Ok(boundaries)
}

/// Class of `value`: the smallest `i` with `b[i] <= value <= b[i + 1]`.
///
/// The top boundary always lands in the last class. Values outside the
/// boundaries have no class.
pub fn class_index(value: f64, boundaries: &[f64]) -> Option<usize> {
    let n = boundaries.len();
    if n < 2 || !value.is_finite() {
        return None;
    }
    if value == boundaries[n - 1] {
        return Some(n - 2);
    }
    (0..n - 1).find(|&i| boundaries[i] <= value && value <= boundaries[i + 1])
}

/// Number of values falling into each class, using [`class_index`].
pub fn class_counts<I>(values: I, boundaries: &[f64]) -> Vec<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts = vec![0; boundaries.len().saturating_sub(1)];
    for v in values {
        if let Some(i) = class_index(v, boundaries) {
            counts[i] += 1;
        }
    }
    counts
}

/// Reject custom boundaries that would produce overlapping, inverted or
/// partial classes.
pub fn validate_custom_boundaries(values: &[f64], boundaries: &[f64]) -> Result<()> {
    if boundaries.len() < 2 {
        return Err(MapError::InvalidBoundaries(
            "at least two boundaries are required".to_string(),
        ));
    }
    check_class_count(boundaries.len() - 1, MAX_CUSTOM_CLASSES)?;
    if boundaries.iter().any(|b| !b.is_finite()) {
        return Err(MapError::InvalidBoundaries(
            "boundaries must be finite numbers".to_string(),
        ));
    }
    if let Some(w) = boundaries.windows(2).find(|w| w[0] > w[1]) {
        return Err(MapError::InvalidBoundaries(format!(
            "boundaries must be non-decreasing ({} is followed by {})",
            w[0], w[1]
        )));
    }

    let sorted = sorted_finite(values);
    if let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) {
        let (first, last) = (boundaries[0], boundaries[boundaries.len() - 1]);
        if first > min || last < max {
            return Err(MapError::InvalidBoundaries(format!(
                "boundaries {}..{} do not cover the data range {}..{}",
                first, last, min, max
            )));
        }
    }
    Ok(())
}

fn check_class_count(count: usize, max: usize) -> Result<()> {
    if (MIN_CLASSES..=max).contains(&count) {
        Ok(())
    } else {
        Err(MapError::ClassCount { got: count, min: MIN_CLASSES, max })
    }
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn quantile_limits(sorted: &[f64], classes: usize) -> Vec<f64> {
    let last = (sorted.len() - 1) as f64;
    (0..=classes)
        .map(|i| {
            let rank = last * i as f64 / classes as f64;
            let lo = rank.floor() as usize;
            let frac = rank - lo as f64;
            if frac == 0.0 {
                sorted[lo]
            } else {
                sorted[lo] * (1.0 - frac) + sorted[lo + 1] * frac
            }
        })
        .collect()
}

fn equidistant_limits(min: f64, max: f64, classes: usize) -> Vec<f64> {
    let width = (max - min) / classes as f64;
    (0..=classes).map(|i| min + i as f64 * width).collect()
}

/// 1-D Lloyd iteration; boundaries sit halfway between adjacent centers.
fn kmeans_limits(sorted: &[f64], classes: usize) -> Vec<f64> {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let (mut centers, iterations) = kmeans_centers(sorted, classes, KMEANS_MAX_ITERATIONS);
    debug!(iterations, "k-means converged");

    centers.sort_by(f64::total_cmp);
    let mut limits = Vec::with_capacity(classes + 1);
    limits.push(min);
    limits.extend(centers.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    limits.push(max);
    limits
}

/// Centers after at most `max_iterations` rounds, and the rounds taken.
/// A center that attracts no value keeps its position.
fn kmeans_centers(sorted: &[f64], classes: usize, max_iterations: usize) -> (Vec<f64>, usize) {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mut centers: Vec<f64> = (0..classes)
        .map(|i| min + i as f64 * (max - min) / classes as f64)
        .collect();

    let mut iterations = 0;
    loop {
        let mut sums = vec![0.0; classes];
        let mut sizes = vec![0usize; classes];
        for &v in sorted {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, &c) in centers.iter().enumerate() {
                let dist = (c - v).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            sums[best] += v;
            sizes[best] += 1;
        }

        let next: Vec<f64> = centers
            .iter()
            .enumerate()
            .map(|(j, &c)| if sizes[j] == 0 { c } else { sums[j] / sizes[j] as f64 })
            .collect();

        iterations += 1;
        let converged = next == centers;
        centers = next;
        if converged || iterations >= max_iterations {
            break;
        }
    }
    (centers, iterations)
}
