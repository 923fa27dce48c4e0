//! Core of the climate-risk choropleth: selector chain, natural-breaks
//! classification, colour scale, boundary–metric join, legend and the
//! single boundary layer shown on the map.
//!
//! Nothing here performs I/O. Boundary geometry and metric rows are fetched
//! by the host and handed back to [`dashboard::Dashboard`] together with the
//! ticket of the request they answer.

pub mod boundary;
pub mod catalog;
pub mod chart;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod join;
pub mod layer;
pub mod legend;
pub mod metrics;
pub mod selection;

pub use dashboard::{Completion, Dashboard, Diagnostic, Request};
