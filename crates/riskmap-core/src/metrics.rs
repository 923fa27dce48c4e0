//! Metric rows: one EAI record per administrative unit, built from the raw
//! records of a workbook sheet, plus the summary rows used for charting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{ExposureCategory, Hazard, Period, Scenario};
use crate::error::LoadError;

/// One sheet row as delivered by the spreadsheet reader: column → cell.
pub type Record = Map<String, Value>;

/// Column of the summary sheet holding the return period.
pub const RETURN_PERIOD_COLUMN: &str = "RP";
/// Return-period cell marking the total-EAI row of a summary sheet.
pub const TOTAL_ROW_MARKER: &str = "EAI";

// ── Query ─────────────────────────────────────────────────────────────────────

/// Everything identifying one metric-row batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub iso: String,
    pub admin_level: u8,
    pub hazard: Hazard,
    pub category: ExposureCategory,
    /// `None` for dashboards without a temporal dimension.
    pub period: Option<Period>,
    /// `None` for the baseline period.
    pub scenario: Option<Scenario>,
}

impl MetricQuery {
    /// `<ISO>_ADM<level>_<HAZ>[_<year>[_<scenario>]].xlsx`
    pub fn workbook(&self) -> String {
        let mut name = format!("{}_ADM{}_{}", self.iso, self.admin_level, self.hazard.code());
        if let Some(period) = self.period {
            name.push_str(&format!("_{}", period.year()));
            if let Some(scenario) = self.scenario {
                name.push_str(&format!("_{}", scenario.code()));
            }
        }
        name.push_str(".xlsx");
        name
    }

    pub fn sheet(&self) -> &'static str {
        self.category.sheet_id()
    }

    pub fn summary_sheet(&self) -> String {
        format!("{}_RP", self.category.sheet_id())
    }
}

// ── Rows ──────────────────────────────────────────────────────────────────────

/// EAI for one administrative unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub admin_key: String,
    /// Expected annual impact in the category's unit.
    pub eai: f64,
    /// EAI as a percentage of the unit's total exposure.
    pub eai_share: Option<f64>,
}

impl MetricRow {
    pub fn new(admin_key: &str, eai: f64) -> Self {
        Self { admin_key: admin_key.to_string(), eai, eai_share: None }
    }

    /// Zero, negative and unparsable EAI carry no colour.
    pub fn has_risk(&self) -> bool {
        self.eai.is_finite() && self.eai > 0.0
    }
}

/// One point of the exceedance curve: impact reached once every
/// `return_period` years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub return_period: f64,
    pub impact: f64,
}

/// Country-level aggregate per return period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryBatch {
    pub rows: Vec<SummaryRow>,
    pub total_eai: Option<f64>,
}

impl SummaryBatch {
    /// Read a summary sheet: `RP` plus the category's `<PREFIX>_EAI`
    /// column; an `RP` cell of `EAI` marks the total row.
    pub fn from_records(records: &[Record], category: ExposureCategory) -> Result<Self, LoadError> {
        let sheet = format!("{}_RP", category.sheet_id());
        let impact_col = category.eai_column();
        require_column(records, RETURN_PERIOD_COLUMN, &sheet)?;
        require_column(records, &impact_col, &sheet)?;

        let mut batch = SummaryBatch::default();
        for record in records {
            let Some(impact) = record.get(&impact_col).and_then(parse_number) else {
                continue;
            };
            match record.get(RETURN_PERIOD_COLUMN) {
                Some(Value::String(s)) if s.trim().eq_ignore_ascii_case(TOTAL_ROW_MARKER) => {
                    batch.total_eai = Some(impact);
                }
                Some(rp) => {
                    if let Some(return_period) = parse_number(rp) {
                        batch.rows.push(SummaryRow { return_period, impact });
                    }
                }
                None => {}
            }
        }
        Ok(batch)
    }
}

/// Rows of one (country, level, hazard, period, scenario, category) selection.
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricBatch {
    pub rows: Vec<MetricRow>,
    pub summary: Option<SummaryBatch>,
}

impl MetricBatch {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows, summary: None }
    }

    pub fn with_summary(mut self, summary: SummaryBatch) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Build rows from raw sheet records.
    ///
    /// `key_column` is the join-key column for the active level (see
    /// `JoinKey::row_field_for`). Records without a key are skipped; an
    /// unparsable EAI cell is kept as a no-risk row.
    pub fn from_records(
        records: &[Record],
        key_column: &str,
        category: ExposureCategory,
    ) -> Result<Self, LoadError> {
        let sheet = category.sheet_id();
        let eai_col = category.eai_column();
        let share_col = category.eai_share_column();
        require_column(records, key_column, sheet)?;
        require_column(records, &eai_col, sheet)?;

        let mut rows = Vec::with_capacity(records.len());
        let mut keyless = 0usize;
        let mut unparsable = 0usize;
        for record in records {
            let key = match record.get(key_column) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    keyless += 1;
                    continue;
                }
            };
            let eai = match record.get(&eai_col).and_then(parse_number) {
                Some(v) => v,
                None => {
                    unparsable += 1;
                    0.0
                }
            };
            let eai_share = record.get(&share_col).and_then(parse_number);
            rows.push(MetricRow { admin_key: key, eai, eai_share });
        }

        if keyless > 0 {
            tracing::warn!(sheet, key_column, skipped = keyless, "Rows without an admin key skipped");
        }
        if unparsable > 0 {
            tracing::warn!(sheet, column = %eai_col, count = unparsable, "Unparsable EAI cells treated as no data");
        }

        Ok(Self::new(rows))
    }

    /// EAI sample for classification.
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.eai).collect()
    }

    /// Sum of positive EAI across rows.
    pub fn total_eai(&self) -> f64 {
        self.rows.iter().filter(|r| r.has_risk()).map(|r| r.eai).sum()
    }
}

fn require_column(records: &[Record], column: &str, sheet: &str) -> Result<(), LoadError> {
    if records.is_empty() || records.iter().any(|r| r.contains_key(column)) {
        return Ok(());
    }
    Err(LoadError::MalformedSheet {
        sheet: sheet.to_string(),
        reason: format!("missing column '{column}'"),
    })
}

/// Numeric cell: JSON number, or text such as `"1,234.5"` / `"12.5%"`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(v: Value) -> Vec<Record> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn workbook_name_follows_selection() {
        let mut q = MetricQuery {
            iso: "NPL".into(),
            admin_level: 2,
            hazard: Hazard::RiverFlood,
            category: ExposureCategory::Population,
            period: Some(Period::Y2050),
            scenario: Some(Scenario::Ssp245),
        };
        assert_eq!(q.workbook(), "NPL_ADM2_FL_2050_SSP245.xlsx");
        q.period = Some(Period::Baseline);
        q.scenario = None;
        assert_eq!(q.workbook(), "NPL_ADM2_FL_2020.xlsx");
        q.period = None;
        assert_eq!(q.workbook(), "NPL_ADM2_FL.xlsx");
        assert_eq!(q.summary_sheet(), "POP_RP");
    }

    #[test]
    fn rows_built_from_sheet_records() {
        let recs = records(json!([
            {"NAM_1": "North", "POP_EAI": 1520.5, "POP_EAI%": "0.8%"},
            {"NAM_1": "South", "POP_EAI": "2,310", "POP_EAI%": 1.1},
            {"NAM_1": "", "POP_EAI": 9.0},
            {"NAM_1": "East", "POP_EAI": "n/a"}
        ]));
        let batch = MetricBatch::from_records(&recs, "NAM_1", ExposureCategory::Population).unwrap();
        assert_eq!(batch.rows.len(), 3);
        assert_eq!(batch.rows[0].eai_share, Some(0.8));
        assert_eq!(batch.rows[1].eai, 2310.0);
        assert_eq!(batch.rows[2].admin_key, "East");
        assert!(!batch.rows[2].has_risk());
        assert_eq!(batch.total_eai(), 3830.5);
    }

    #[test]
    fn missing_eai_column_is_malformed() {
        let recs = records(json!([{"NAM_1": "North", "BU_EAI": 3.0}]));
        let err = MetricBatch::from_records(&recs, "NAM_1", ExposureCategory::Population).unwrap_err();
        assert!(matches!(err, LoadError::MalformedSheet { ref sheet, .. } if sheet == "POP"));
    }

    #[test]
    fn empty_sheet_is_an_empty_batch() {
        let batch = MetricBatch::from_records(&[], "NAM_1", ExposureCategory::Cropland).unwrap();
        assert!(batch.rows.is_empty());
    }

    #[test]
    fn summary_reads_total_row() {
        let recs = records(json!([
            {"RP": 10, "BU_EAI": 40.0},
            {"RP": "100", "BU_EAI": 210.0},
            {"RP": "EAI", "BU_EAI": 12.5}
        ]));
        let s = SummaryBatch::from_records(&recs, ExposureCategory::BuiltUp).unwrap();
        assert_eq!(s.rows.len(), 2);
        assert_eq!(s.rows[1], SummaryRow { return_period: 100.0, impact: 210.0 });
        assert_eq!(s.total_eai, Some(12.5));
    }
}
