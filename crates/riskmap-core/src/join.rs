//! Boundary–metric join: match each displayed feature to its metric row by
//! administrative key and restyle it from the colour scale.

use std::collections::HashMap;

use serde::Serialize;

use crate::boundary::BoundaryFeature;
use crate::catalog::ExposureCategory;
use crate::classify::ColorScale;
use crate::config::{DashboardConfig, JoinKey};
use crate::layer::{BoundaryLayer, FeatureStyle};
use crate::legend::format_value;
use crate::metrics::MetricRow;

/// Popup line for units without a usable EAI.
pub const NO_DATA_TEXT: &str = "No data available";

/// Outcome counts of one overlay application.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    /// Features coloured from a positive EAI.
    pub matched: usize,
    /// Features with a row whose EAI is zero, negative or unparsable.
    pub no_risk: usize,
    /// Keys (or labels) of features without any row.
    pub unmatched: Vec<String>,
}

/// For each feature, the first row whose key equals the feature's key at
/// `level`. Features lacking the key property never match.
pub fn match_rows<'a, 'f>(
    features: impl IntoIterator<Item = &'f BoundaryFeature>,
    rows: &'a [MetricRow],
    level: u8,
    key: &JoinKey,
) -> Vec<Option<&'a MetricRow>> {
    let index = index_rows(rows);
    let field = key.feature_field_for(level);
    features
        .into_iter()
        .map(|f| f.property_key(&field).and_then(|k| index.get(k.as_str()).copied()))
        .collect()
}

/// Key → row, first occurrence kept.
fn index_rows(rows: &[MetricRow]) -> HashMap<&str, &MetricRow> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index.entry(row.admin_key.as_str()).or_insert(row);
    }
    index
}

/// Colour and annotate every feature of `layer` from `rows`.
///
/// Unmatched and no-risk features get a transparent fill and a no-data
/// popup; nothing is removed from the layer. Rows are not modified.
pub fn apply_overlay(
    layer: &mut BoundaryLayer,
    rows: &[MetricRow],
    category: ExposureCategory,
    scale: &ColorScale,
    config: &DashboardConfig,
) -> JoinReport {
    let key = &config.join_key;
    let level = layer.admin_level;
    let label_field = key.label_field_for(level);
    let key_field = key.feature_field_for(level);

    let matches = match_rows(layer.features.iter().map(|r| &r.feature), rows, level, key);

    let no_data_style = FeatureStyle {
        fill_color: scale.no_data(),
        ..FeatureStyle::outline(&config.outline)
    };

    let mut report = JoinReport::default();
    for (rendered, matched) in layer.features.iter_mut().zip(matches) {
        let name = rendered
            .feature
            .property_key(&label_field)
            .or_else(|| rendered.feature.property_key(&key_field))
            .unwrap_or_else(|| "Unknown area".to_string());

        match matched {
            Some(row) if row.has_risk() => {
                let fill = scale.color_for(row.eai);
                rendered.style = FeatureStyle {
                    fill_color: fill,
                    fill_opacity: if fill.is_transparent() { 0.0 } else { config.overlay_opacity },
                    ..FeatureStyle::outline(&config.outline)
                };
                rendered.popup = Some(popup_html(&name, Some(row), category));
                report.matched += 1;
            }
            Some(_) => {
                rendered.style = no_data_style;
                rendered.popup = Some(popup_html(&name, None, category));
                report.no_risk += 1;
            }
            None => {
                rendered.style = no_data_style;
                rendered.popup = Some(popup_html(&name, None, category));
                report.unmatched.push(
                    rendered.feature.property_key(&key_field).unwrap_or(name),
                );
            }
        }
    }

    if !report.unmatched.is_empty() {
        tracing::warn!(
            iso = %layer.iso,
            level,
            unmatched = report.unmatched.len(),
            field = %key_field,
            "Boundary features without metric rows"
        );
    }
    report
}

/// Popup content for one unit; `row` is `None` for no-data units.
pub fn popup_html(name: &str, row: Option<&MetricRow>, category: ExposureCategory) -> String {
    let mut html = format!("<strong>{}</strong><br>", escape(name));
    match row {
        Some(row) => {
            html.push_str(&format!(
                "{} EAI: {} {}",
                category.display_name(),
                format_value(row.eai),
                category.unit()
            ));
            if let Some(share) = row.eai_share {
                html.push_str(&format!("<br>Share of exposure: {}%", format_value(share)));
            }
        }
        None => html.push_str(NO_DATA_TEXT),
    }
    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FeatureCollection, Geometry};
    use crate::classify::{classify, default_palette};
    use serde_json::{json, Map, Value};

    fn feature(props: Value) -> BoundaryFeature {
        let props: Map<String, Value> = serde_json::from_value(props).unwrap();
        let ring = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        BoundaryFeature::new(Some(Geometry::Polygon { coordinates: vec![ring] }), props)
    }

    fn layer(features: Vec<BoundaryFeature>) -> BoundaryLayer {
        let config = DashboardConfig::new(JoinKey::hasc());
        BoundaryLayer::new("XXX", 1, FeatureCollection::new(features), &config.outline).unwrap()
    }

    fn run(layer: &mut BoundaryLayer, rows: &[MetricRow]) -> JoinReport {
        let config = DashboardConfig::new(JoinKey::hasc());
        let values: Vec<f64> = rows.iter().map(|r| r.eai).collect();
        let scale = ColorScale::new(classify(&values, 5), default_palette());
        apply_overlay(layer, rows, ExposureCategory::Population, &scale, &config)
    }

    #[test]
    fn matching_row_colours_feature() {
        let mut l = layer(vec![feature(json!({"HASC_1": "X1", "NAM_1": "Alpha"}))]);
        let report = run(&mut l, &[MetricRow::new("X1", 5.0)]);
        assert_eq!(report.matched, 1);
        let f = &l.features[0];
        assert!(!f.style.is_transparent());
        assert!(f.popup.as_deref().unwrap().contains("Population EAI: 5 people"));
    }

    #[test]
    fn non_matching_row_leaves_feature_transparent_with_no_data_popup() {
        let mut l = layer(vec![feature(json!({"HASC_1": "X1", "NAM_1": "Alpha"}))]);
        let report = run(&mut l, &[MetricRow::new("X2", 5.0)]);
        assert_eq!(report.unmatched, vec!["X1".to_string()]);
        let f = &l.features[0];
        assert!(f.style.is_transparent());
        assert_eq!(f.style.fill_opacity, 0.0);
        assert!(f.popup.as_deref().unwrap().contains(NO_DATA_TEXT));
        assert_eq!(l.features.len(), 1);
    }

    #[test]
    fn zero_eai_renders_like_missing() {
        let mut l = layer(vec![
            feature(json!({"HASC_1": "X1"})),
            feature(json!({"HASC_1": "X2"})),
        ]);
        let report = run(&mut l, &[MetricRow::new("X1", 0.0)]);
        assert_eq!(report.no_risk, 1);
        assert_eq!(l.features[0].style, l.features[1].style);
        assert_eq!(l.features[0].popup, l.features[1].popup.as_ref().map(|p| p.replace("X2", "X1")));
    }

    #[test]
    fn first_duplicate_row_wins() {
        let features = vec![feature(json!({"HASC_1": "X1"}))];
        let rows = vec![MetricRow::new("X1", 1.0), MetricRow::new("X1", 99.0)];
        let key = JoinKey::hasc();
        let matched = match_rows(&features, &rows, 1, &key);
        assert_eq!(matched[0].unwrap().eai, 1.0);
    }

    #[test]
    fn overlay_follows_row_matching() {
        let features = vec![
            feature(json!({"HASC_1": "X1", "NAM_1": "Alpha"})),
            feature(json!({"HASC_1": "X2", "NAM_1": "Beta"})),
            feature(json!({"NAM_1": "Gamma"})),
        ];
        let rows = vec![MetricRow::new("X1", 2.0), MetricRow::new("X1", 40.0), MetricRow::new("X2", 0.0)];
        let matched = match_rows(&features, &rows, 1, &JoinKey::hasc());

        let mut l = layer(features);
        let report = run(&mut l, &rows);
        assert_eq!((report.matched, report.no_risk, report.unmatched.len()), (1, 1, 1));
        assert_eq!(matched[0].unwrap().eai, 2.0);
        assert!(l.features[0].popup.as_deref().unwrap().contains("EAI: 2 people"));
        assert!(matched[2].is_none());
        assert_eq!(report.unmatched, vec!["Gamma".to_string()]);
    }

    #[test]
    fn numeric_codes_match_text_keys() {
        let features = vec![feature(json!({"CODE_2": 1204}))];
        let rows = vec![MetricRow::new("1204", 3.0)];
        let key = JoinKey {
            feature_field: "CODE_{level}".into(),
            row_field: "CODE_{level}".into(),
            label_field: "NAM_{level}".into(),
        };
        assert!(match_rows(&features, &rows, 2, &key)[0].is_some());
    }

    #[test]
    fn share_shown_when_present() {
        let row = MetricRow { admin_key: "X".into(), eai: 1500.0, eai_share: Some(2.25) };
        let html = popup_html("A<b>", Some(&row), ExposureCategory::BuiltUp);
        assert_eq!(
            html,
            "<strong>A&lt;b&gt;</strong><br>Built-up EAI: 1,500 ha<br>Share of exposure: 2.25%"
        );
    }
}
