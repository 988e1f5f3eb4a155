use thiserror::Error;

use crate::model::{FilterId, LayerId};

/// Errors surfaced by the classification, filtering and legend engine.
///
/// Per-feature data problems (missing or non-numeric values) are never
/// reported here: those features are skipped and rendered with defaults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("steps must be between {min} and {max} (got {got})")]
    ClassCount { got: usize, min: usize, max: usize },

    #[error("field '{0}' has no numeric values to classify")]
    EmptyValues(String),

    #[error("invalid custom boundaries: {0}")]
    InvalidBoundaries(String),

    #[error("custom mode requires user-defined boundaries")]
    MissingBoundaries,

    #[error("unknown color scheme '{0}'")]
    UnknownScheme(String),

    #[error("field '{0}' not found")]
    UnknownField(String),

    #[error("invalid color options: {0}")]
    InvalidColorOptions(String),

    #[error("invalid symbol options: {0}")]
    InvalidSymbolOptions(String),

    #[error("invalid filter range: lower limit {lower} is above upper limit {upper}")]
    InvalidRange { lower: f64, upper: f64 },

    #[error("{0}")]
    UnsupportedFilterMode(String),

    #[error("filter step {index} out of bounds ({count} steps defined)")]
    UnknownStep { index: usize, count: usize },

    #[error("layer {0} does not exist")]
    UnknownLayer(LayerId),

    #[error("filter {0} does not exist")]
    UnknownFilter(FilterId),

    #[error("invalid save data: {0}")]
    Bundle(String),
}

/// Broad category of a [`MapError`], used by callers deciding how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A rejected update; the previous configuration stays in force.
    Configuration,
    /// A filter or layer id that no longer resolves.
    DanglingReference,
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::UnknownLayer(_) | MapError::UnknownFilter(_) => ErrorKind::DanglingReference,
            _ => ErrorKind::Configuration,
        }
    }
}

pub type Result<T, E = MapError> = std::result::Result<T, E>;
