//! Dashboard configuration: classification, styling, join key and variant
//! switches. Loaded from JSON by the page or the inspect tool.

use serde::{Deserialize, Serialize};

use crate::classify::{default_palette, Color};
use crate::error::ConfigError;

/// Placeholder substituted with the admin level in key templates.
pub const LEVEL_PLACEHOLDER: &str = "{level}";

// ── Join key ──────────────────────────────────────────────────────────────────

/// Which properties identify an administrative unit at a given level.
///
/// Boundary sources disagree on naming (`NAM_2` vs `HASC_2`), so the fields
/// are templates with a `{level}` placeholder and must be chosen per source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKey {
    /// Feature property holding the key, e.g. `NAM_{level}`.
    pub feature_field: String,
    /// Sheet column holding the same key.
    pub row_field: String,
    /// Feature property shown as the unit name in popups.
    #[serde(default = "default_label_field")]
    pub label_field: String,
}

fn default_label_field() -> String {
    "NAM_{level}".to_string()
}

impl JoinKey {
    /// Join on administrative names (`NAM_<level>`).
    pub fn name() -> Self {
        Self {
            feature_field: "NAM_{level}".to_string(),
            row_field: "NAM_{level}".to_string(),
            label_field: default_label_field(),
        }
    }

    /// Join on hierarchical administrative codes (`HASC_<level>`).
    pub fn hasc() -> Self {
        Self {
            feature_field: "HASC_{level}".to_string(),
            row_field: "HASC_{level}".to_string(),
            label_field: default_label_field(),
        }
    }

    pub fn feature_field_for(&self, level: u8) -> String {
        expand(&self.feature_field, level)
    }

    pub fn row_field_for(&self, level: u8) -> String {
        expand(&self.row_field, level)
    }

    pub fn label_field_for(&self, level: u8) -> String {
        expand(&self.label_field, level)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for template in [&self.feature_field, &self.row_field, &self.label_field] {
            if !template.contains(LEVEL_PLACEHOLDER) {
                return Err(ConfigError::KeyTemplate(template.clone()));
            }
        }
        Ok(())
    }
}

fn expand(template: &str, level: u8) -> String {
    template.replace(LEVEL_PLACEHOLDER, &level.to_string())
}

// ── Styling ──────────────────────────────────────────────────────────────────

/// Stroke of every boundary feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlineStyle {
    pub color: Color,
    pub weight: f32,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self { color: Color::BLACK, weight: 2.0 }
    }
}

// ── Dashboard config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Requested natural-breaks classes; at most `palette.len()`.
    #[serde(default = "default_class_count")]
    pub class_count: usize,
    /// Light → dark.
    #[serde(default = "default_palette")]
    pub palette: Vec<Color>,
    #[serde(default = "default_no_data_color")]
    pub no_data_color: Color,
    #[serde(default)]
    pub outline: OutlineStyle,
    /// Fill opacity of classed features (0-1).
    #[serde(default = "default_overlay_opacity")]
    pub overlay_opacity: f32,
    /// Required: there is no safe default naming convention.
    pub join_key: JoinKey,
    /// `false` for dashboards without period/scenario selectors.
    #[serde(default = "enabled")]
    pub temporal: bool,
    /// Whether the exceedance curve chart is rebuilt on each load.
    #[serde(default = "enabled")]
    pub chart: bool,
}

fn default_class_count() -> usize { 5 }
fn default_no_data_color() -> Color { Color::NO_DATA }
fn default_overlay_opacity() -> f32 { 0.8 }
fn enabled() -> bool { true }

impl DashboardConfig {
    pub fn new(join_key: JoinKey) -> Self {
        Self {
            class_count: default_class_count(),
            palette: default_palette(),
            no_data_color: default_no_data_color(),
            outline: OutlineStyle::default(),
            overlay_opacity: default_overlay_opacity(),
            join_key,
            temporal: true,
            chart: true,
        }
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        if self.class_count == 0 {
            return Err(ConfigError::ZeroClasses);
        }
        if self.class_count > self.palette.len() {
            return Err(ConfigError::TooManyClasses {
                class_count: self.class_count,
                palette_len: self.palette.len(),
            });
        }
        self.join_key.validate()
    }
}
