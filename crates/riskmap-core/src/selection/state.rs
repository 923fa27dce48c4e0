use serde::Serialize;

use crate::catalog::{ExposureCategory, Hazard, Period, Scenario};
use crate::metrics::MetricQuery;

use super::SelectorId;

/// A validated value for one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SelectorValue {
    /// ISO code.
    Country(String),
    AdminLevel(u8),
    Hazard(Hazard),
    Period(Period),
    Scenario(Scenario),
    Exposure(ExposureCategory),
}

impl SelectorValue {
    pub fn selector(&self) -> SelectorId {
        match self {
            SelectorValue::Country(_)    => SelectorId::Country,
            SelectorValue::AdminLevel(_) => SelectorId::AdminLevel,
            SelectorValue::Hazard(_)     => SelectorId::Hazard,
            SelectorValue::Period(_)     => SelectorId::Period,
            SelectorValue::Scenario(_)   => SelectorId::Scenario,
            SelectorValue::Exposure(_)   => SelectorId::Exposure,
        }
    }

    /// The dropdown option value this corresponds to.
    pub fn option_value(&self) -> String {
        match self {
            SelectorValue::Country(iso)  => iso.clone(),
            SelectorValue::AdminLevel(l) => l.to_string(),
            SelectorValue::Hazard(h)     => h.code().to_string(),
            SelectorValue::Period(p)     => p.year().to_string(),
            SelectorValue::Scenario(s)   => s.label().to_string(),
            SelectorValue::Exposure(c)   => c.value().to_string(),
        }
    }
}

/// Committed selections. Only ever a prefix of the selector chain is set
/// (period/scenario skipped where they do not apply).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub country: Option<String>,
    pub admin_level: Option<u8>,
    pub hazard: Option<Hazard>,
    pub period: Option<Period>,
    pub scenario: Option<Scenario>,
    pub exposure: Option<ExposureCategory>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        *self == Selection::default()
    }

    pub fn value(&self, id: SelectorId) -> Option<SelectorValue> {
        match id {
            SelectorId::Country    => self.country.clone().map(SelectorValue::Country),
            SelectorId::AdminLevel => self.admin_level.map(SelectorValue::AdminLevel),
            SelectorId::Hazard     => self.hazard.map(SelectorValue::Hazard),
            SelectorId::Period     => self.period.map(SelectorValue::Period),
            SelectorId::Scenario   => self.scenario.map(SelectorValue::Scenario),
            SelectorId::Exposure   => self.exposure.map(SelectorValue::Exposure),
        }
    }

    pub(crate) fn set(&mut self, value: SelectorValue) {
        match value {
            SelectorValue::Country(iso)  => self.country = Some(iso),
            SelectorValue::AdminLevel(l) => self.admin_level = Some(l),
            SelectorValue::Hazard(h)     => self.hazard = Some(h),
            SelectorValue::Period(p)     => self.period = Some(p),
            SelectorValue::Scenario(s)   => self.scenario = Some(s),
            SelectorValue::Exposure(c)   => self.exposure = Some(c),
        }
    }

    /// Clear `id` and every selector downstream of it.
    pub(crate) fn clear_from(&mut self, id: SelectorId) {
        for sel in SelectorId::CHAIN.into_iter().filter(|s| *s >= id) {
            match sel {
                SelectorId::Country    => self.country = None,
                SelectorId::AdminLevel => self.admin_level = None,
                SelectorId::Hazard     => self.hazard = None,
                SelectorId::Period     => self.period = None,
                SelectorId::Scenario   => self.scenario = None,
                SelectorId::Exposure   => self.exposure = None,
            }
        }
    }

    /// Metric query for `category` on top of the committed upstream
    /// selections; `None` while the upstream chain is incomplete.
    pub fn query_for(&self, category: ExposureCategory, temporal: bool) -> Option<MetricQuery> {
        let (period, scenario) = if temporal {
            let period = self.period?;
            let scenario = if period.is_baseline() { None } else { Some(self.scenario?) };
            (Some(period), scenario)
        } else {
            (None, None)
        };
        Some(MetricQuery {
            iso: self.country.clone()?,
            admin_level: self.admin_level?,
            hazard: self.hazard?,
            category,
            period,
            scenario,
        })
    }
}
