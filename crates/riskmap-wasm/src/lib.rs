//! Browser binding for the risk-map dashboard.
//!
//! The page constructs one [`RiskDashboard`] with its config, an optional
//! country catalog and a hooks object, then forwards every `<select>` change
//! to [`RiskDashboard::select`]. Fetches run through the hooks; their results
//! are applied only if no newer selection was made in the meantime.

mod hooks;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Promise;
use riskmap_core::{
    catalog::CountryCatalog,
    config::DashboardConfig,
    dashboard::{Completion, Dashboard},
    selection::Fetch,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use hooks::{to_js, JsChart, JsHooks, JsMapSurface};

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Hooks run while the dashboard is mid-update; calling back into it from
/// one of them is reported as an error instead of aborting the instance.
fn busy() -> JsValue {
    JsValue::from_str("dashboard is busy: it cannot be used from inside a map or chart hook")
}

#[wasm_bindgen]
pub struct RiskDashboard {
    inner: Rc<RefCell<Dashboard<JsMapSurface>>>,
    hooks: Rc<JsHooks>,
}

#[wasm_bindgen]
impl RiskDashboard {
    /// `config_json`: dashboard config. `catalog_json`: country capability
    /// list, or `undefined` for the built-in one. `hooks`: page callbacks.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, catalog_json: Option<String>, hooks: JsValue) -> Result<RiskDashboard, JsValue> {
        let config = DashboardConfig::from_json(config_json).map_err(js_error)?;
        let catalog = match catalog_json {
            Some(json) => CountryCatalog::from_json(&json).map_err(js_error)?,
            None => CountryCatalog::default(),
        };
        let hooks = Rc::new(JsHooks::from_object(&hooks)?);

        let mut dashboard = Dashboard::new(config, catalog, JsMapSurface::new(hooks.clone())).map_err(js_error)?;
        if hooks.has_chart() && dashboard.config().chart {
            dashboard = dashboard.with_chart(Box::new(JsChart::new(hooks.clone())));
        }
        Ok(RiskDashboard { inner: Rc::new(RefCell::new(dashboard)), hooks })
    }

    /// Apply a selector change (`value` empty or undefined clears it).
    ///
    /// Rejects synchronously for disabled selectors and unknown options. The
    /// returned promise resolves to `"applied"`, `"stale"` or `"failed"`;
    /// failures are also reported through `onDiagnostic`.
    pub fn select(&self, selector: &str, value: Option<String>) -> Result<Promise, JsValue> {
        let request = self
            .inner
            .try_borrow_mut()
            .map_err(|_| busy())?
            .choose_by_key(selector, value.as_deref())
            .map_err(js_error)?;

        let inner = self.inner.clone();
        let hooks = self.hooks.clone();
        Ok(future_to_promise(async move {
            let Some(request) = request else {
                return Ok(JsValue::from_str("applied"));
            };
            let completion = match request.fetch {
                Fetch::Boundaries { iso, admin_level } => {
                    let result = hooks.fetch_boundaries(&iso, admin_level).await;
                    inner.try_borrow_mut().map_err(|_| busy())?.complete_boundaries(request.ticket, result)
                }
                Fetch::Metrics(query) => {
                    let key_column = inner.try_borrow().map_err(|_| busy())?.config().join_key.row_field_for(query.admin_level);
                    let result = hooks.load_metrics(&query, &key_column).await;
                    inner.try_borrow_mut().map_err(|_| busy())?.complete_metrics(request.ticket, result)
                }
            };
            let status = match &completion {
                Completion::Applied => "applied",
                Completion::Stale => "stale",
                Completion::Failed(diagnostic) => {
                    hooks.diagnostic(diagnostic);
                    "failed"
                }
            };
            Ok(JsValue::from_str(status))
        }))
    }

    /// Every selector with its enabled flag, options and current value.
    pub fn selectors(&self) -> Result<JsValue, JsValue> {
        self.read(|d| to_js(&d.selectors()))
    }

    pub fn selection(&self) -> Result<JsValue, JsValue> {
        self.read(|d| to_js(d.selection()))
    }

    /// Legend control markup; `undefined` while no overlay is shown.
    #[wasm_bindgen(js_name = legendHtml)]
    pub fn legend_html(&self) -> Result<Option<String>, JsValue> {
        self.read(|d| d.legend().map(|l| l.to_html()))
    }

    /// Legend as data (title plus colour/label entries).
    pub fn legend(&self) -> Result<JsValue, JsValue> {
        self.read(|d| to_js(&d.legend()))
    }

    /// Matched/unmatched counts of the current overlay.
    #[wasm_bindgen(js_name = joinReport)]
    pub fn join_report(&self) -> Result<JsValue, JsValue> {
        self.read(|d| to_js(&d.report()))
    }
}

impl RiskDashboard {
    fn read<R>(&self, f: impl FnOnce(&Dashboard<JsMapSurface>) -> R) -> Result<R, JsValue> {
        let dashboard = self.inner.try_borrow().map_err(|_| busy())?;
        Ok(f(&dashboard))
    }
}
