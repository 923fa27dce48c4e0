//! Cascading selector chain:
//!   country → admin level → hazard → period → scenario → exposure.
//!
//! Each selector is enabled only while everything upstream holds a value.
//! Choosing (or clearing) a selector synchronously clears and disables
//! everything below it. Choices that need data (country outline, level
//! boundaries, metric rows) stay pending until resolved with the ticket
//! they were issued; results carrying an older ticket are discarded.

pub mod machine;
pub mod state;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use machine::{Fetch, Resolution, SelectionMachine, Ticket, Transition};
pub use state::{Selection, SelectorValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorId {
    Country,
    AdminLevel,
    Hazard,
    Period,
    Scenario,
    Exposure,
}

impl SelectorId {
    /// Upstream → downstream.
    pub const CHAIN: [SelectorId; 6] = [
        SelectorId::Country,
        SelectorId::AdminLevel,
        SelectorId::Hazard,
        SelectorId::Period,
        SelectorId::Scenario,
        SelectorId::Exposure,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SelectorId::Country    => "country",
            SelectorId::AdminLevel => "admin-level",
            SelectorId::Hazard     => "hazard",
            SelectorId::Period     => "period",
            SelectorId::Scenario   => "scenario",
            SelectorId::Exposure   => "exposure",
        }
    }

    /// Period and scenario exist only on dashboards with a time dimension.
    pub fn is_temporal(self) -> bool {
        matches!(self, SelectorId::Period | SelectorId::Scenario)
    }
}

impl fmt::Display for SelectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectorId::AdminLevel => "admin level",
            other => other.key(),
        };
        f.write_str(name)
    }
}

impl FromStr for SelectorId {
    type Err = crate::error::SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SelectorId::CHAIN
            .into_iter()
            .find(|id| id.key() == s)
            .ok_or_else(|| crate::error::SelectionError::UnknownSelector(s.to_string()))
    }
}

/// One entry of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// What the page should show for one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorView {
    pub id: SelectorId,
    pub enabled: bool,
    /// Empty while disabled.
    pub options: Vec<SelectOption>,
    /// Committed value, or the value awaiting its fetch.
    pub value: Option<String>,
}
