//! Exceedance-frequency curve model for the risk chart.

use serde::Serialize;

use crate::catalog::ExposureCategory;
use crate::legend::format_value;
use crate::metrics::SummaryBatch;

/// Impact reached or exceeded with the given annual frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub return_period: f64,
    /// 1 / return period, events per year.
    pub frequency: f64,
    pub impact: f64,
}

/// Frequency vs. impact, ordered by increasing impact, with the total-EAI
/// annotation drawn on the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceedanceCurve {
    pub category: ExposureCategory,
    pub points: Vec<CurvePoint>,
    pub total_eai: f64,
    pub annotation: String,
}

impl ExceedanceCurve {
    /// Build from a summary sheet. `fallback_total` (the sum of unit EAI) is
    /// used when the sheet carries no total row.
    pub fn from_summary(summary: &SummaryBatch, category: ExposureCategory, fallback_total: f64) -> Self {
        let mut points: Vec<CurvePoint> = summary
            .rows
            .iter()
            .filter(|r| r.return_period.is_finite() && r.return_period > 0.0 && r.impact.is_finite())
            .map(|r| CurvePoint {
                return_period: r.return_period,
                frequency: 1.0 / r.return_period,
                impact: r.impact,
            })
            .collect();
        points.sort_by(|a, b| {
            a.impact
                .total_cmp(&b.impact)
                .then(b.frequency.total_cmp(&a.frequency))
        });

        let total_eai = summary.total_eai.unwrap_or(fallback_total);
        let annotation = format!(
            "Total EAI: {} {}",
            format_value(total_eai),
            category.unit()
        );
        Self { category, points, total_eai, annotation }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Draws the curve; purely presentational.
pub trait ChartRenderer {
    fn draw(&mut self, curve: &ExceedanceCurve);
    fn clear(&mut self);
}
