//! Legend: one swatch per class, top class first.

use serde::Serialize;

use crate::catalog::ExposureCategory;
use crate::classify::{Color, ColorScale};

/// Label of the single swatch shown when nothing is classed.
pub const NO_DATA_LABEL: &str = "No data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: Color,
    pub label: String,
}

/// Renderable colour key, entries ordered high → low.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    /// Legend for a classed overlay of `category`.
    pub fn for_category(scale: &ColorScale, category: ExposureCategory) -> Self {
        build_legend(scale.breakpoints(), scale, &category_title(category))
    }

    pub fn no_data(title: &str, color: Color) -> Self {
        Self {
            title: title.to_string(),
            entries: vec![LegendEntry { color, label: NO_DATA_LABEL.to_string() }],
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].label == NO_DATA_LABEL
    }

    /// HTML fragment for the map's legend control.
    pub fn to_html(&self) -> String {
        let mut html = format!("<div class=\"legend\"><h4>{}</h4>", escape_html(&self.title));
        for entry in &self.entries {
            html.push_str(&format!(
                "<i style=\"background:{}\"></i> {}<br>",
                entry.color,
                escape_html(&entry.label)
            ));
        }
        html.push_str("</div>");
        html
    }

    /// Plain-text rendering, one swatch per line.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n", self.title);
        for entry in &self.entries {
            out.push_str(&format!("  {}  {}\n", entry.color, entry.label));
        }
        out
    }
}

pub fn category_title(category: ExposureCategory) -> String {
    format!("{} EAI ({})", category.display_name(), category.unit())
}

/// Build the key for ascending lower-edge `breakpoints`.
///
/// Top class reads `b+`, the bottom class `< b₁` (its implicit lower bound
/// is zero), the rest `bᵢ – bᵢ₊₁`. Repeated edges leave zero-width classes
/// that no value falls into; those get no swatch. No breakpoints → a single
/// no-data swatch.
pub fn build_legend(breakpoints: &[f64], scale: &ColorScale, title: &str) -> Legend {
    let k = breakpoints.len();
    if k == 0 {
        return Legend::no_data(title, scale.no_data());
    }

    let entries = (0..k)
        .rev()
        .filter(|&i| i == k - 1 || breakpoints[i] < breakpoints[i + 1])
        .map(|i| {
            let label = if i == k - 1 {
                format!("{}+", format_value(breakpoints[i]))
            } else if i == 0 {
                format!("< {}", format_value(breakpoints[1]))
            } else {
                format!("{} – {}", format_value(breakpoints[i]), format_value(breakpoints[i + 1]))
            };
            LegendEntry { color: scale.class_color(i), label }
        })
        .collect();

    Legend { title: title.to_string(), entries }
}

/// Human-readable EAI figure: grouped integers from 100 up, two decimals
/// from 1, three significant figures below.
pub fn format_value(v: f64) -> String {
    let abs = v.abs();
    if abs >= 100.0 {
        group_thousands(v.round() as i64)
    } else if abs >= 1.0 {
        trim_zeros(format!("{v:.2}"))
    } else if abs == 0.0 || abs.is_nan() {
        format!("{}", abs)
    } else {
        // 0.5 → 3 decimals, 0.042 → 4, 0.00042 → 6.
        let decimals = ((-abs.log10()).ceil() as i32 + 2).clamp(3, 17) as usize;
        trim_zeros(format!("{v:.decimals$}"))
    }
}

fn trim_zeros(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::default_palette;

    fn scale(breaks: &[f64]) -> ColorScale {
        ColorScale::new(breaks.to_vec(), default_palette())
    }

    #[test]
    fn entries_run_high_to_low() {
        let breaks = [2.0, 15.0, 240.0, 5000.0];
        let s = scale(&breaks);
        let legend = build_legend(&breaks, &s, "Population EAI (people)");
        let labels: Vec<&str> = legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["5,000+", "240 – 5,000", "15 – 240", "< 15"]);
        assert_eq!(legend.entries[0].color, default_palette()[6]);
        assert_eq!(legend.entries[3].color, default_palette()[0]);
    }

    #[test]
    fn single_class_reads_open_ended() {
        let s = scale(&[3.5]);
        let legend = build_legend(&[3.5], &s, "t");
        assert_eq!(legend.entries.len(), 1);
        assert_eq!(legend.entries[0].label, "3.5+");
    }

    #[test]
    fn empty_breaks_render_no_data_swatch() {
        let s = scale(&[]);
        let legend = Legend::for_category(&s, ExposureCategory::Cropland);
        assert!(legend.is_no_data());
        assert_eq!(legend.entries[0].color, Color::NO_DATA);
        assert_eq!(legend.title, "Cropland EAI (ha)");
    }

    #[test]
    fn html_contains_swatches() {
        let s = scale(&[1.0, 10.0]);
        let html = build_legend(&[1.0, 10.0], &s, "A & B").to_html();
        assert!(html.starts_with("<div class=\"legend\"><h4>A &amp; B</h4>"));
        assert_eq!(html.matches("<i style=").count(), 2);
    }

    #[test]
    fn tiny_values_keep_significant_figures() {
        assert_eq!(format_value(0.00042), "0.00042");
        assert_eq!(format_value(0.000123456), "0.000123");
        let breaks = [0.0001, 0.0032, 0.0064];
        let s = scale(&breaks);
        let legend = build_legend(&breaks, &s, "Cropland EAI (ha)");
        let labels: Vec<&str> = legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["0.0064+", "0.0032 – 0.0064", "< 0.0032"]);
    }

    #[test]
    fn repeated_edges_get_no_empty_swatch() {
        let breaks = crate::classify::classify(&[1.0, 5.0, 5.0, 5.0, 5.0], 3);
        assert_eq!(breaks, vec![1.0, 5.0, 5.0]);
        let s = scale(&breaks);
        let legend = build_legend(&breaks, &s, "t");
        let labels: Vec<&str> = legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["5+", "< 5"]);
        // Swatch colours are the ones features actually receive.
        assert_eq!(legend.entries[0].color, s.color_for(5.0));
        assert_eq!(legend.entries[1].color, s.color_for(1.0));
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(1234567.4), "1,234,567");
        assert_eq!(format_value(12.5), "12.5");
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(0.0421), "0.0421");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(0.123456), "0.123");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-1500.0), "-1,500");
    }
}
