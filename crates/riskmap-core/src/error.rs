//! Error types for the risk-map core.

use thiserror::Error;

use crate::selection::SelectorId;

/// Reference-data (country catalog) errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse country catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate country ISO code '{iso}'")]
    DuplicateIso { iso: String },

    #[error("country '{iso}' has max admin level 0; at least level 1 is required")]
    NoAdminLevels { iso: String },

    #[error("country '{iso}' lists no hazards")]
    NoHazards { iso: String },
}

/// Configuration errors, reported by `DashboardConfig::validate`.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse dashboard config: {0}")]
    Parse(String),

    #[error("class count must be at least 1")]
    ZeroClasses,

    #[error("class count {class_count} exceeds palette size {palette_len}")]
    TooManyClasses { class_count: usize, palette_len: usize },

    #[error("palette must contain at least one colour")]
    EmptyPalette,

    #[error("invalid colour '{0}': expected #rrggbb or #rrggbbaa")]
    InvalidColor(String),

    #[error("join key template '{0}' has no {{level}} placeholder")]
    KeyTemplate(String),
}

/// Rejected user selections. The selection state is untouched when one of
/// these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("{0} selector is disabled")]
    Disabled(SelectorId),

    #[error("'{value}' is not an option of the {selector} selector")]
    InvalidOption { selector: SelectorId, value: String },

    #[error("unknown selector '{0}'")]
    UnknownSelector(String),
}

/// Boundary geometry could not be obtained or parsed.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("boundary service returned no data for {iso} ADM{level}")]
    Unavailable { iso: String, level: u8 },

    #[error("malformed boundary payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for BoundaryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Metric-row batch load failures.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("workbook not found: {workbook}")]
    NotFound { workbook: String },

    #[error("malformed sheet '{sheet}': {reason}")]
    MalformedSheet { sheet: String, reason: String },

    #[error("metric loader failed: {0}")]
    Unavailable(String),
}
