//! Page callbacks: the JS side fetches data, draws on the Leaflet map and
//! renders the chart. Each hook is a plain function on one options object.

use std::rc::Rc;

use js_sys::{Function, Promise, Reflect};
use riskmap_core::{
    boundary::{Bounds, FeatureCollection},
    chart::{ChartRenderer, ExceedanceCurve},
    error::{BoundaryError, LoadError},
    layer::{BoundaryLayer, MapSurface},
    metrics::{MetricBatch, MetricQuery, Record, SummaryBatch},
    Diagnostic,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// What `loadMetrics` resolves to.
#[derive(Deserialize)]
struct SheetPayload {
    rows: Vec<Record>,
    #[serde(default)]
    summary: Option<Vec<Record>>,
}

/// Argument handed to `loadMetrics`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetRequest<'a> {
    query: &'a MetricQuery,
    workbook: String,
    sheet: &'static str,
    summary_sheet: String,
    key_column: &'a str,
}

pub struct JsHooks {
    fetch_boundaries: Function,
    load_metrics: Function,
    add_layer: Function,
    remove_layer: Function,
    restyle_layer: Function,
    fit_bounds: Function,
    draw_chart: Option<Function>,
    clear_chart: Option<Function>,
    on_diagnostic: Option<Function>,
}

fn hook(obj: &JsValue, name: &str) -> Result<Option<Function>, JsValue> {
    let value = Reflect::get(obj, &JsValue::from_str(name))?;
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    value
        .dyn_into::<Function>()
        .map(Some)
        .map_err(|_| JsValue::from_str(&format!("hook '{name}' is not a function")))
}

fn required(obj: &JsValue, name: &str) -> Result<Function, JsValue> {
    hook(obj, name)?.ok_or_else(|| JsValue::from_str(&format!("missing required hook '{name}'")))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).unwrap_or_else(|err| {
        tracing::warn!(%err, "Serialization to JS failed");
        JsValue::NULL
    })
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Await whatever a hook returned, promise or not.
async fn settle(returned: Result<JsValue, JsValue>) -> Result<JsValue, JsValue> {
    let promise = Promise::resolve(&returned?);
    JsFuture::from(promise).await
}

impl JsHooks {
    pub fn from_object(obj: &JsValue) -> Result<Self, JsValue> {
        Ok(Self {
            fetch_boundaries: required(obj, "fetchBoundaries")?,
            load_metrics: required(obj, "loadMetrics")?,
            add_layer: required(obj, "addLayer")?,
            remove_layer: required(obj, "removeLayer")?,
            restyle_layer: required(obj, "restyleLayer")?,
            fit_bounds: required(obj, "fitBounds")?,
            draw_chart: hook(obj, "drawChart")?,
            clear_chart: hook(obj, "clearChart")?,
            on_diagnostic: hook(obj, "onDiagnostic")?,
        })
    }

    pub fn has_chart(&self) -> bool {
        self.draw_chart.is_some()
    }

    /// `fetchBoundaries(iso, level)`. Null, undefined or a rejection all
    /// mean no data.
    pub async fn fetch_boundaries(&self, iso: &str, level: u8) -> Result<FeatureCollection, BoundaryError> {
        let returned = self
            .fetch_boundaries
            .call2(&JsValue::NULL, &JsValue::from_str(iso), &JsValue::from(level));
        let unavailable = || BoundaryError::Unavailable { iso: iso.to_string(), level };
        let value = settle(returned).await.map_err(|err| {
            tracing::warn!(iso, level, error = %describe(&err), "Boundary fetch rejected");
            unavailable()
        })?;
        if value.is_null() || value.is_undefined() {
            return Err(unavailable());
        }
        serde_wasm_bindgen::from_value(value).map_err(|e| BoundaryError::Malformed(e.to_string()))
    }

    /// `loadMetrics(request)` resolving to `{ rows, summary? }`; null means
    /// the workbook does not exist.
    pub async fn load_metrics(&self, query: &MetricQuery, key_column: &str) -> Result<MetricBatch, LoadError> {
        let request = SheetRequest {
            query,
            workbook: query.workbook(),
            sheet: query.sheet(),
            summary_sheet: query.summary_sheet(),
            key_column,
        };
        let returned = self.load_metrics.call1(&JsValue::NULL, &to_js(&request));
        let value = settle(returned)
            .await
            .map_err(|err| LoadError::Unavailable(describe(&err)))?;
        if value.is_null() || value.is_undefined() {
            return Err(LoadError::NotFound { workbook: query.workbook() });
        }
        let payload: SheetPayload = serde_wasm_bindgen::from_value(value).map_err(|e| LoadError::MalformedSheet {
            sheet: query.sheet().to_string(),
            reason: e.to_string(),
        })?;

        let batch = MetricBatch::from_records(&payload.rows, key_column, query.category)?;
        match payload.summary {
            Some(records) => Ok(batch.with_summary(SummaryBatch::from_records(&records, query.category)?)),
            None => Ok(batch),
        }
    }

    pub fn diagnostic(&self, diagnostic: &Diagnostic) {
        if let Some(f) = &self.on_diagnostic {
            if let Err(err) = f.call1(&JsValue::NULL, &to_js(diagnostic)) {
                tracing::warn!(error = %describe(&err), "onDiagnostic hook threw");
            }
        }
    }
}

fn call_logged(name: &str, result: Result<JsValue, JsValue>) -> JsValue {
    result.unwrap_or_else(|err| {
        tracing::warn!(hook = name, error = %describe(&err), "Map hook threw");
        JsValue::UNDEFINED
    })
}

// ── Map surface ───────────────────────────────────────────────────────────────

/// Leaflet map driven through the hooks. Layer handles are whatever
/// `addLayer` returned.
pub struct JsMapSurface {
    hooks: Rc<JsHooks>,
}

impl JsMapSurface {
    pub fn new(hooks: Rc<JsHooks>) -> Self {
        Self { hooks }
    }
}

impl MapSurface for JsMapSurface {
    type Handle = JsValue;

    fn add_layer(&mut self, layer: &BoundaryLayer) -> JsValue {
        call_logged("addLayer", self.hooks.add_layer.call1(&JsValue::NULL, &to_js(layer)))
    }

    fn remove_layer(&mut self, handle: JsValue) {
        call_logged("removeLayer", self.hooks.remove_layer.call1(&JsValue::NULL, &handle));
    }

    fn restyle_layer(&mut self, handle: &JsValue, layer: &BoundaryLayer) {
        call_logged("restyleLayer", self.hooks.restyle_layer.call2(&JsValue::NULL, handle, &to_js(layer)));
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        // Leaflet LatLngBounds order: [[south, west], [north, east]].
        let corners = [[bounds.min_lat, bounds.min_lon], [bounds.max_lat, bounds.max_lon]];
        call_logged("fitBounds", self.hooks.fit_bounds.call1(&JsValue::NULL, &to_js(&corners)));
    }
}

// ── Chart ─────────────────────────────────────────────────────────────────────

pub struct JsChart {
    hooks: Rc<JsHooks>,
}

impl JsChart {
    pub fn new(hooks: Rc<JsHooks>) -> Self {
        Self { hooks }
    }
}

impl ChartRenderer for JsChart {
    fn draw(&mut self, curve: &ExceedanceCurve) {
        if let Some(f) = &self.hooks.draw_chart {
            call_logged("drawChart", f.call1(&JsValue::NULL, &to_js(curve)));
        }
    }

    fn clear(&mut self) {
        if let Some(f) = &self.hooks.clear_chart {
            call_logged("clearChart", f.call0(&JsValue::NULL));
        }
    }
}
