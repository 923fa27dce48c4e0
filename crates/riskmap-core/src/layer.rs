//! The displayed boundary layer and the map surface it is drawn on.
//!
//! At most one boundary layer is mounted at a time. Replacing it always
//! unmounts the previous one first; an empty replacement leaves the map
//! without a layer and the viewport where it was.

use serde::Serialize;

use crate::boundary::{BoundaryFeature, Bounds, FeatureCollection};
use crate::classify::Color;
use crate::config::OutlineStyle;

/// Leaflet-style path options for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureStyle {
    /// Stroke colour.
    pub color: Color,
    pub weight: f32,
    pub fill_color: Color,
    pub fill_opacity: f32,
}

impl FeatureStyle {
    /// Unfilled outline, used before any overlay and for no-data units.
    pub fn outline(outline: &OutlineStyle) -> Self {
        Self {
            color: outline.color,
            weight: outline.weight,
            fill_color: Color::NO_DATA,
            fill_opacity: 0.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.fill_opacity == 0.0 || self.fill_color.is_transparent()
    }
}

/// A boundary feature together with its current rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedFeature {
    pub feature: BoundaryFeature,
    pub style: FeatureStyle,
    /// Popup HTML; `None` until an overlay is applied.
    pub popup: Option<String>,
}

/// Boundaries of one country at one admin level, as displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryLayer {
    pub iso: String,
    pub admin_level: u8,
    pub features: Vec<RenderedFeature>,
    pub bounds: Bounds,
}

impl BoundaryLayer {
    /// `None` when the collection is empty or has no coordinates at all.
    pub fn new(iso: &str, admin_level: u8, collection: FeatureCollection, outline: &OutlineStyle) -> Option<Self> {
        if collection.is_empty() {
            return None;
        }
        let bounds = collection.bounds()?;
        let style = FeatureStyle::outline(outline);
        let features = collection
            .features
            .into_iter()
            .map(|feature| RenderedFeature { feature, style, popup: None })
            .collect();
        Some(Self { iso: iso.to_string(), admin_level, features, bounds })
    }

    /// Drop any overlay: outline-only styling, no popups.
    pub fn reset_styles(&mut self, outline: &OutlineStyle) {
        let style = FeatureStyle::outline(outline);
        for f in &mut self.features {
            f.style = style;
            f.popup = None;
        }
    }
}

// ── Map surface ───────────────────────────────────────────────────────────────

/// The base map the layer is drawn on (Leaflet in the page, a recorder in
/// tests).
pub trait MapSurface {
    type Handle;

    fn add_layer(&mut self, layer: &BoundaryLayer) -> Self::Handle;
    fn remove_layer(&mut self, handle: Self::Handle);
    /// Push new per-feature styles/popups for an already mounted layer.
    fn restyle_layer(&mut self, handle: &Self::Handle, layer: &BoundaryLayer);
    fn fit_bounds(&mut self, bounds: Bounds);
}

struct Mounted<H> {
    handle: H,
    layer: BoundaryLayer,
}

/// Owns the single displayed boundary layer.
pub struct LayerController<S: MapSurface> {
    surface: S,
    current: Option<Mounted<S::Handle>>,
}

impl<S: MapSurface> LayerController<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, current: None }
    }

    pub fn layer(&self) -> Option<&BoundaryLayer> {
        self.current.as_ref().map(|m| &m.layer)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Unmount the current layer (if any) and mount `incoming` (if any),
    /// fitting the viewport to it. Returns whether a layer is now mounted.
    pub fn replace(&mut self, incoming: Option<BoundaryLayer>) -> bool {
        self.clear();
        let Some(layer) = incoming else {
            return false;
        };
        let handle = self.surface.add_layer(&layer);
        self.surface.fit_bounds(layer.bounds);
        tracing::info!(
            iso = %layer.iso,
            level = layer.admin_level,
            features = layer.features.len(),
            "Boundary layer mounted"
        );
        self.current = Some(Mounted { handle, layer });
        true
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.surface.remove_layer(previous.handle);
        }
    }

    /// Mutate the mounted layer's rendering and push it to the surface.
    /// `None` when no layer is mounted.
    pub fn restyle<R>(&mut self, f: impl FnOnce(&mut BoundaryLayer) -> R) -> Option<R> {
        let mounted = self.current.as_mut()?;
        let out = f(&mut mounted.layer);
        self.surface.restyle_layer(&mounted.handle, &mounted.layer);
        Some(out)
    }
}
