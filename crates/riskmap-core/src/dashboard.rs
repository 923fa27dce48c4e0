//! Dashboard orchestrator: the selection machine, the boundary layer, the
//! classed overlay, the legend and the risk chart behind one owner.
//!
//! Every user choice goes through [`Dashboard::choose`], which may hand back a
//! [`Request`] for the host to fulfil. The host reports the outcome with
//! `complete_boundaries` / `complete_metrics` and the ticket it was given;
//! results for superseded tickets are dropped without touching anything.

use std::fmt;

use serde::Serialize;

use crate::boundary::FeatureCollection;
use crate::catalog::{CountryCatalog, ExposureCategory};
use crate::chart::{ChartRenderer, ExceedanceCurve};
use crate::classify::{classify, ColorScale};
use crate::config::DashboardConfig;
use crate::error::{BoundaryError, ConfigError, LoadError, SelectionError};
use crate::join::{apply_overlay, JoinReport};
use crate::layer::{BoundaryLayer, LayerController, MapSurface};
use crate::legend::Legend;
use crate::metrics::MetricBatch;
use crate::selection::{
    Fetch, Selection, SelectionMachine, SelectorId, SelectorValue, SelectorView, Ticket,
    Transition,
};

/// Data the host must fetch before a pending choice can be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub ticket: Ticket,
    pub fetch: Fetch,
}

/// A failed step, surfaced to the page instead of crashing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub selector: SelectorId,
    pub message: String,
}

impl Diagnostic {
    fn new(selector: SelectorId, message: impl Into<String>) -> Self {
        let diagnostic = Self { selector, message: message.into() };
        tracing::warn!(selector = %diagnostic.selector, "{}", diagnostic.message);
        diagnostic
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector, self.message)
    }
}

/// Outcome of handing a fetch result back to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket was superseded; nothing changed.
    Stale,
    /// The step was aborted; the dashboard stays at the previous step.
    Failed(Diagnostic),
}

/// The classed EAI overlay currently drawn on the boundary layer.
#[derive(Debug, Clone)]
struct Overlay {
    scale: ColorScale,
    legend: Legend,
    report: JoinReport,
    curve: Option<ExceedanceCurve>,
}

pub struct Dashboard<S: MapSurface> {
    config: DashboardConfig,
    machine: SelectionMachine,
    layers: LayerController<S>,
    /// Level-0 outline of the committed country, restored when the admin
    /// level is cleared.
    country_outline: Option<BoundaryLayer>,
    overlay: Option<Overlay>,
    chart: Option<Box<dyn ChartRenderer>>,
}

impl<S: MapSurface> Dashboard<S> {
    pub fn new(config: DashboardConfig, catalog: CountryCatalog, surface: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let machine = SelectionMachine::new(catalog, config.temporal);
        Ok(Self {
            config,
            machine,
            layers: LayerController::new(surface),
            country_outline: None,
            overlay: None,
            chart: None,
        })
    }

    /// Attach the renderer for the exceedance curve.
    pub fn with_chart(mut self, chart: Box<dyn ChartRenderer>) -> Self {
        self.chart = Some(chart);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn selectors(&self) -> Vec<SelectorView> {
        self.machine.views()
    }

    pub fn selection(&self) -> &Selection {
        self.machine.selection()
    }

    pub fn layer(&self) -> Option<&BoundaryLayer> {
        self.layers.layer()
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.overlay.as_ref().map(|o| &o.legend)
    }

    pub fn scale(&self) -> Option<&ColorScale> {
        self.overlay.as_ref().map(|o| &o.scale)
    }

    pub fn report(&self) -> Option<&JoinReport> {
        self.overlay.as_ref().map(|o| &o.report)
    }

    pub fn curve(&self) -> Option<&ExceedanceCurve> {
        self.overlay.as_ref().and_then(|o| o.curve.as_ref())
    }

    pub fn surface(&self) -> &S {
        self.layers.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.layers.surface_mut()
    }

    /// Whether a result carrying `ticket` would still be applied.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.machine.pending_for(ticket).is_some()
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Apply a user choice (`None` clears the selector).
    ///
    /// Downstream selectors, the overlay, the legend and the chart are
    /// cleared before this returns. Clearing the country unmounts the
    /// boundary layer; clearing the admin level goes back to the country
    /// outline.
    pub fn choose(&mut self, id: SelectorId, raw: Option<&str>) -> Result<Option<Request>, SelectionError> {
        let transition = self.machine.choose(id, raw)?;
        self.clear_overlay();
        if id == SelectorId::Country {
            self.country_outline = None;
        }
        match transition {
            Transition::Cleared(SelectorId::Country) => {
                self.layers.clear();
                Ok(None)
            }
            Transition::Cleared(SelectorId::AdminLevel) => {
                self.layers.replace(self.country_outline.clone());
                Ok(None)
            }
            Transition::Cleared(_) | Transition::Committed(_) => Ok(None),
            Transition::Pending { ticket, fetch, .. } => Ok(Some(Request { ticket, fetch })),
        }
    }

    /// Parse `selector` by its key (`"admin-level"`, ...) and choose.
    pub fn choose_by_key(&mut self, selector: &str, raw: Option<&str>) -> Result<Option<Request>, SelectionError> {
        let id: SelectorId = selector.parse()?;
        self.choose(id, raw)
    }

    /// Deliver the boundary geometry requested for `ticket`.
    ///
    /// The previous layer is removed whether or not the new one can be
    /// shown. An empty or failed payload aborts the step.
    pub fn complete_boundaries(
        &mut self,
        ticket: Ticket,
        result: Result<FeatureCollection, BoundaryError>,
    ) -> Completion {
        let (selector, iso, level) = match self.machine.pending_for(ticket) {
            Some(SelectorValue::Country(iso)) => (SelectorId::Country, iso.clone(), 0),
            Some(SelectorValue::AdminLevel(level)) => {
                let Some(iso) = self.machine.selection().country.clone() else {
                    return Completion::Stale;
                };
                (SelectorId::AdminLevel, iso, *level)
            }
            _ => {
                tracing::debug!(ticket = ticket.epoch(), "Discarding stale boundary result");
                return Completion::Stale;
            }
        };

        let incoming = match result {
            Ok(collection) => BoundaryLayer::new(&iso, level, collection, &self.config.outline),
            Err(err) => {
                self.layers.replace(None);
                self.machine.resolve(ticket, false);
                return Completion::Failed(Diagnostic::new(selector, err.to_string()));
            }
        };

        if selector == SelectorId::Country {
            self.country_outline = incoming.clone();
        }
        if self.layers.replace(incoming) {
            self.machine.resolve(ticket, true);
            Completion::Applied
        } else {
            self.machine.resolve(ticket, false);
            let err = BoundaryError::Unavailable { iso, level };
            Completion::Failed(Diagnostic::new(selector, err.to_string()))
        }
    }

    /// Deliver the metric rows requested for `ticket`: classify, recolour the
    /// displayed layer, rebuild the legend and the chart.
    pub fn complete_metrics(&mut self, ticket: Ticket, result: Result<MetricBatch, LoadError>) -> Completion {
        let category = match self.machine.pending_for(ticket) {
            Some(SelectorValue::Exposure(category)) => *category,
            _ => {
                tracing::debug!(ticket = ticket.epoch(), "Discarding stale metric result");
                return Completion::Stale;
            }
        };

        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                self.machine.resolve(ticket, false);
                return Completion::Failed(Diagnostic::new(SelectorId::Exposure, err.to_string()));
            }
        };

        match self.apply_batch(&batch, category) {
            Some(overlay) => {
                tracing::info!(
                    category = category.value(),
                    rows = batch.rows.len(),
                    classes = overlay.scale.breakpoints().len(),
                    matched = overlay.report.matched,
                    "Overlay applied"
                );
                if let (Some(chart), Some(curve)) = (self.chart.as_mut(), overlay.curve.as_ref()) {
                    chart.draw(curve);
                }
                self.overlay = Some(overlay);
                self.machine.resolve(ticket, true);
                Completion::Applied
            }
            None => {
                self.machine.resolve(ticket, false);
                Completion::Failed(Diagnostic::new(SelectorId::Exposure, "no boundary layer is displayed"))
            }
        }
    }

    fn apply_batch(&mut self, batch: &MetricBatch, category: ExposureCategory) -> Option<Overlay> {
        let breakpoints = classify(&batch.values(), self.config.class_count);
        let scale = ColorScale::with_no_data(breakpoints, self.config.palette.clone(), self.config.no_data_color);
        let config = &self.config;
        let report = self
            .layers
            .restyle(|layer| apply_overlay(layer, &batch.rows, category, &scale, config))?;
        let legend = Legend::for_category(&scale, category);
        let curve = config
            .chart
            .then_some(batch.summary.as_ref())
            .flatten()
            .map(|summary| ExceedanceCurve::from_summary(summary, category, batch.total_eai()));
        Some(Overlay { scale, legend, report, curve })
    }

    /// Drop the overlay, back to plain outlines.
    fn clear_overlay(&mut self) {
        if self.overlay.take().is_none() {
            return;
        }
        let outline = self.config.outline;
        self.layers.restyle(|layer| layer.reset_styles(&outline));
        if let Some(chart) = self.chart.as_mut() {
            chart.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::boundary::{BoundaryFeature, Geometry};
    use crate::config::JoinKey;
    use crate::layer::testing::RecordingSurface;
    use crate::metrics::{MetricRow, SummaryBatch, SummaryRow};

    #[derive(Default)]
    struct ChartLog {
        drawn: Vec<ExceedanceCurve>,
        clears: usize,
    }

    struct RecordingChart(Rc<RefCell<ChartLog>>);

    impl ChartRenderer for RecordingChart {
        fn draw(&mut self, curve: &ExceedanceCurve) {
            self.0.borrow_mut().drawn.push(curve.clone());
        }

        fn clear(&mut self) {
            self.0.borrow_mut().clears += 1;
        }
    }

    fn dashboard() -> Dashboard<RecordingSurface> {
        Dashboard::new(DashboardConfig::new(JoinKey::hasc()), CountryCatalog::default(), RecordingSurface::default())
            .unwrap()
    }

    /// One unit square per key, placed side by side from `origin`.
    fn boundaries(level: u8, keys: &[&str], origin: f64) -> FeatureCollection {
        let features = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let x = origin + i as f64;
                let ring = vec![vec![x, 0.0], vec![x + 1.0, 0.0], vec![x + 1.0, 1.0], vec![x, 0.0]];
                let mut props: Map<String, Value> = Map::new();
                props.insert(format!("HASC_{level}"), json!(key));
                props.insert(format!("NAM_{level}"), json!(format!("Unit {key}")));
                BoundaryFeature::new(Some(Geometry::Polygon { coordinates: vec![ring] }), props)
            })
            .collect();
        FeatureCollection::new(features)
    }

    fn request(r: Result<Option<Request>, SelectionError>) -> Request {
        r.unwrap().expect("expected a request")
    }

    /// Drive a dashboard to a baseline hazard selection with ADM1 drawn.
    fn ready(d: &mut Dashboard<RecordingSurface>) {
        let r = request(d.choose(SelectorId::Country, Some("NPL")));
        assert_eq!(d.complete_boundaries(r.ticket, Ok(boundaries(0, &["NP"], 0.0))), Completion::Applied);
        let r = request(d.choose(SelectorId::AdminLevel, Some("1")));
        assert_eq!(
            d.complete_boundaries(r.ticket, Ok(boundaries(1, &["NP.A", "NP.B", "NP.C"], 0.0))),
            Completion::Applied
        );
        assert_eq!(d.choose(SelectorId::Hazard, Some("FL")).unwrap(), None);
        assert_eq!(d.choose(SelectorId::Period, Some("2020")).unwrap(), None);
    }

    fn batch(values: &[(&str, f64)]) -> MetricBatch {
        MetricBatch::new(values.iter().map(|(k, v)| MetricRow::new(k, *v)).collect())
    }

    #[test]
    fn country_choice_mounts_outline_and_fits_view() {
        let mut d = dashboard();
        let r = request(d.choose(SelectorId::Country, Some("NPL")));
        assert_eq!(r.fetch, Fetch::Boundaries { iso: "NPL".into(), admin_level: 0 });
        assert!(d.layer().is_none());
        assert_eq!(d.complete_boundaries(r.ticket, Ok(boundaries(0, &["NP"], 3.0))), Completion::Applied);
        let layer = d.layer().unwrap();
        assert_eq!((layer.iso.as_str(), layer.admin_level), ("NPL", 0));
        assert_eq!(d.surface().fits.len(), 1);
        assert_eq!(d.surface().fits[0].min_lon, 3.0);
        assert_eq!(d.selection().country.as_deref(), Some("NPL"));
    }

    #[test]
    fn exposure_load_colours_layer_and_builds_legend() {
        let mut d = dashboard();
        ready(&mut d);
        let r = request(d.choose(SelectorId::Exposure, Some("population")));
        let Fetch::Metrics(q) = &r.fetch else { panic!("expected metrics fetch") };
        assert_eq!(q.workbook(), "NPL_ADM1_FL_2020.xlsx");

        let rows = batch(&[("NP.A", 10.0), ("NP.B", 250.0)]);
        assert_eq!(d.complete_metrics(r.ticket, Ok(rows)), Completion::Applied);

        let layer = d.layer().unwrap();
        assert!(!layer.features[0].style.is_transparent());
        assert!(!layer.features[1].style.is_transparent());
        assert!(layer.features[2].style.is_transparent());
        assert_eq!(d.report().unwrap().unmatched, vec!["NP.C".to_string()]);

        let legend = d.legend().unwrap();
        assert_eq!(legend.title, "Population EAI (people)");
        assert_eq!(legend.entries.len(), 2);
        // The mounted copy on the surface carries the same styles.
        assert_eq!(&d.surface().mounted[0].1, d.layer().unwrap());
        assert_eq!(d.selection().exposure, Some(ExposureCategory::Population));
    }

    #[test]
    fn all_zero_rows_give_no_data_legend() {
        let mut d = dashboard();
        ready(&mut d);
        let r = request(d.choose(SelectorId::Exposure, Some("cropland")));
        assert_eq!(d.complete_metrics(r.ticket, Ok(batch(&[("NP.A", 0.0)]))), Completion::Applied);
        assert!(d.legend().unwrap().is_no_data());
        assert!(d.layer().unwrap().features.iter().all(|f| f.style.is_transparent()));
    }

    #[test]
    fn later_selection_wins_over_earlier_slow_fetch() {
        let mut d = dashboard();
        ready(&mut d);
        let slow = request(d.choose(SelectorId::Exposure, Some("population")));
        let fast = request(d.choose(SelectorId::Exposure, Some("built-up")));

        assert_eq!(d.complete_metrics(fast.ticket, Ok(batch(&[("NP.A", 7.0)]))), Completion::Applied);
        assert_eq!(d.complete_metrics(slow.ticket, Ok(batch(&[("NP.B", 9.0)]))), Completion::Stale);

        assert_eq!(d.legend().unwrap().title, "Built-up EAI (ha)");
        assert_eq!(d.selection().exposure, Some(ExposureCategory::BuiltUp));
        let layer = d.layer().unwrap();
        assert!(!layer.features[0].style.is_transparent());
        assert!(layer.features[1].style.is_transparent());
    }

    #[test]
    fn stale_boundary_result_does_not_replace_layer() {
        let mut d = dashboard();
        let first = request(d.choose(SelectorId::Country, Some("NPL")));
        let second = request(d.choose(SelectorId::Country, Some("ETH")));
        assert_eq!(d.complete_boundaries(second.ticket, Ok(boundaries(0, &["ET"], 30.0))), Completion::Applied);
        assert_eq!(d.complete_boundaries(first.ticket, Ok(boundaries(0, &["NP"], 80.0))), Completion::Stale);
        assert_eq!(d.layer().unwrap().iso, "ETH");
        assert_eq!(d.surface().mounted.len(), 1);
        assert_eq!(d.surface().fits.len(), 1);
    }

    #[test]
    fn failed_level_fetch_removes_layer_and_stays_at_previous_step() {
        let mut d = dashboard();
        ready(&mut d);
        let r = request(d.choose(SelectorId::AdminLevel, Some("2")));
        let err = BoundaryError::Unavailable { iso: "NPL".into(), level: 2 };
        let Completion::Failed(diag) = d.complete_boundaries(r.ticket, Err(err)) else {
            panic!("expected failure");
        };
        assert_eq!(diag.selector, SelectorId::AdminLevel);
        assert!(d.layer().is_none());
        assert!(d.surface().mounted.is_empty());
        assert_eq!(d.selection().country.as_deref(), Some("NPL"));
        assert_eq!(d.selection().admin_level, None);
        let enabled: Vec<SelectorId> = d.selectors().into_iter().filter(|v| v.enabled).map(|v| v.id).collect();
        assert_eq!(enabled, vec![SelectorId::Country, SelectorId::AdminLevel]);
    }

    #[test]
    fn empty_payload_clears_layer_without_moving_view() {
        let mut d = dashboard();
        ready(&mut d);
        let fits = d.surface().fits.len();
        let r = request(d.choose(SelectorId::AdminLevel, Some("2")));
        let outcome = d.complete_boundaries(r.ticket, Ok(FeatureCollection::new(vec![])));
        assert!(matches!(outcome, Completion::Failed(_)));
        assert!(d.layer().is_none());
        assert_eq!(d.surface().fits.len(), fits);
    }

    #[test]
    fn failed_metric_load_keeps_layer_without_overlay() {
        let mut d = dashboard();
        ready(&mut d);
        let r = request(d.choose(SelectorId::Exposure, Some("population")));
        let err = LoadError::NotFound { workbook: "NPL_ADM1_FL_2020.xlsx".into() };
        let outcome = d.complete_metrics(r.ticket, Err(err));
        assert!(matches!(outcome, Completion::Failed(Diagnostic { selector: SelectorId::Exposure, .. })));
        assert!(d.legend().is_none());
        assert!(d.layer().is_some());
        assert_eq!(d.selection().exposure, None);
        assert_eq!(d.selection().hazard, Some(crate::catalog::Hazard::RiverFlood));
    }

    #[test]
    fn upstream_change_resets_overlay_and_chart() {
        let log = Rc::new(RefCell::new(ChartLog::default()));
        let mut d = dashboard().with_chart(Box::new(RecordingChart(log.clone())));
        ready(&mut d);
        let r = request(d.choose(SelectorId::Exposure, Some("population")));
        let summary = SummaryBatch {
            rows: vec![
                SummaryRow { return_period: 10.0, impact: 50.0 },
                SummaryRow { return_period: 100.0, impact: 400.0 },
            ],
            total_eai: Some(12.0),
        };
        let rows = batch(&[("NP.A", 4.0), ("NP.B", 8.0)]).with_summary(summary);
        assert_eq!(d.complete_metrics(r.ticket, Ok(rows)), Completion::Applied);
        assert_eq!(log.borrow().drawn.len(), 1);
        assert_eq!(d.curve().unwrap().annotation, "Total EAI: 12 people");

        d.choose(SelectorId::Hazard, Some("LS")).unwrap();
        assert!(d.legend().is_none() && d.curve().is_none());
        assert_eq!(log.borrow().clears, 1);
        let layer = d.layer().unwrap();
        assert!(layer.features.iter().all(|f| f.style.is_transparent() && f.popup.is_none()));
        assert_eq!(d.selection().exposure, None);
    }

    #[test]
    fn clearing_admin_level_restores_country_outline() {
        let mut d = dashboard();
        ready(&mut d);
        assert_eq!(d.layer().unwrap().admin_level, 1);
        let fits = d.surface().fits.len();

        assert_eq!(d.choose(SelectorId::AdminLevel, None).unwrap(), None);
        let layer = d.layer().unwrap();
        assert_eq!((layer.iso.as_str(), layer.admin_level), ("NPL", 0));
        assert_eq!(d.surface().mounted.len(), 1);
        assert_eq!(d.surface().fits.len(), fits + 1);
        assert_eq!(d.selection().admin_level, None);
    }

    #[test]
    fn clearing_level_after_failed_country_leaves_no_layer() {
        let mut d = dashboard();
        ready(&mut d);
        let r = request(d.choose(SelectorId::Country, Some("ETH")));
        d.complete_boundaries(r.ticket, Err(BoundaryError::Malformed("bad".into())));
        assert!(d.layer().is_none());
        // Admin level is disabled without a committed country.
        assert!(d.choose(SelectorId::AdminLevel, None).is_err());
        assert!(d.layer().is_none());
    }

    #[test]
    fn clearing_country_unmounts_layer() {
        let mut d = dashboard();
        ready(&mut d);
        assert_eq!(d.choose(SelectorId::Country, None).unwrap(), None);
        assert!(d.layer().is_none());
        assert!(d.surface().mounted.is_empty());
        assert!(d.selection().is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = DashboardConfig::new(JoinKey::name());
        config.class_count = 0;
        let err = Dashboard::new(config, CountryCatalog::default(), RecordingSurface::default()).err();
        assert_eq!(err, Some(ConfigError::ZeroClasses));
    }

    #[test]
    fn choose_by_key_rejects_unknown_selector() {
        let mut d = dashboard();
        assert_eq!(
            d.choose_by_key("district", Some("x")),
            Err(SelectionError::UnknownSelector("district".into()))
        );
        assert!(d.choose_by_key("country", Some("BGD")).unwrap().is_some());
    }
}
