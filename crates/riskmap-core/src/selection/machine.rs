//! Selection state machine with epoch-gated asynchronous commits.

use serde::Serialize;

use crate::catalog::{Country, CountryCatalog, ExposureCategory, Hazard, Period, Scenario};
use crate::error::SelectionError;
use crate::metrics::MetricQuery;

use super::{SelectOption, Selection, SelectorId, SelectorValue, SelectorView};

/// Identifies the selection epoch a fetch was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn epoch(self) -> u64 {
        self.0
    }
}

/// Data a pending choice waits for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Fetch {
    /// Boundary geometry of `iso` at `admin_level` (0 = country outline).
    Boundaries { iso: String, admin_level: u8 },
    Metrics(MetricQuery),
}

/// Result of a user choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The selector was emptied; everything downstream cleared too.
    Cleared(SelectorId),
    /// Value committed immediately.
    Committed(SelectorId),
    /// Value waits for `fetch`; commit it with [`SelectionMachine::resolve`].
    Pending { ticket: Ticket, value: SelectorValue, fetch: Fetch },
}

/// Outcome of resolving a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed(SelectorId),
    /// Fetch failed; state stays where the previous step left it.
    Aborted(SelectorId),
    /// A newer choice superseded the ticket; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
struct PendingChoice {
    ticket: Ticket,
    value: SelectorValue,
}

/// Owns the selection and decides which selectors are live.
#[derive(Debug, Clone)]
pub struct SelectionMachine {
    catalog: CountryCatalog,
    temporal: bool,
    selection: Selection,
    pending: Option<PendingChoice>,
    epoch: u64,
}

impl SelectionMachine {
    /// `temporal = false` drops the period and scenario selectors.
    pub fn new(catalog: CountryCatalog, temporal: bool) -> Self {
        Self {
            catalog,
            temporal,
            selection: Selection::default(),
            pending: None,
            epoch: 0,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &CountryCatalog {
        &self.catalog
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Pending value for `ticket`, if that ticket is still current.
    pub fn pending_for(&self, ticket: Ticket) -> Option<&SelectorValue> {
        self.pending
            .as_ref()
            .filter(|p| p.ticket == ticket && ticket.0 == self.epoch)
            .map(|p| &p.value)
    }

    fn country(&self) -> Option<&Country> {
        self.catalog.get(self.selection.country.as_deref()?)
    }

    // ── Enablement and options ───────────────────────────────────────────

    /// Whether `id` is part of this dashboard's chain at all.
    pub fn applies(&self, id: SelectorId) -> bool {
        self.temporal || !id.is_temporal()
    }

    /// Every upstream selector holds a committed value.
    pub fn is_enabled(&self, id: SelectorId) -> bool {
        let s = &self.selection;
        match id {
            SelectorId::Country    => true,
            SelectorId::AdminLevel => s.country.is_some(),
            SelectorId::Hazard     => s.admin_level.is_some(),
            SelectorId::Period     => self.temporal && s.hazard.is_some(),
            SelectorId::Scenario   => {
                self.temporal && s.hazard.is_some() && s.period.is_some_and(|p| !p.is_baseline())
            }
            SelectorId::Exposure   => {
                s.hazard.is_some()
                    && (!self.temporal
                        || s.period.is_some_and(|p| p.is_baseline() || s.scenario.is_some()))
            }
        }
    }

    /// Options offered by `id`; empty while it is disabled.
    pub fn options(&self, id: SelectorId) -> Vec<SelectOption> {
        if !self.is_enabled(id) {
            return Vec::new();
        }
        match id {
            SelectorId::Country => self
                .catalog
                .sorted_by_name()
                .into_iter()
                .map(|c| SelectOption::new(&c.iso, &c.name))
                .collect(),
            SelectorId::AdminLevel => self
                .country()
                .map(|c| {
                    (1..=c.max_admin_level)
                        .map(|l| SelectOption::new(l.to_string(), format!("ADM{l}")))
                        .collect()
                })
                .unwrap_or_default(),
            SelectorId::Hazard => self
                .country()
                .map(|c| {
                    c.hazards
                        .iter()
                        .map(|h| SelectOption::new(h.code(), h.display_name()))
                        .collect()
                })
                .unwrap_or_default(),
            SelectorId::Period => Period::ALL
                .into_iter()
                .map(|p| SelectOption::new(p.year().to_string(), p.label()))
                .collect(),
            SelectorId::Scenario => Scenario::ALL
                .into_iter()
                .map(|s| SelectOption::new(s.label(), s.label()))
                .collect(),
            SelectorId::Exposure => ExposureCategory::ALL
                .into_iter()
                .map(|c| SelectOption::new(c.value(), c.display_name()))
                .collect(),
        }
    }

    pub fn view(&self, id: SelectorId) -> SelectorView {
        let pending = self
            .pending
            .as_ref()
            .filter(|p| p.value.selector() == id)
            .map(|p| p.value.option_value());
        SelectorView {
            id,
            enabled: self.is_enabled(id),
            options: self.options(id),
            value: pending.or_else(|| self.selection.value(id).map(|v| v.option_value())),
        }
    }

    /// Views of every selector this dashboard has, upstream first.
    pub fn views(&self) -> Vec<SelectorView> {
        SelectorId::CHAIN
            .into_iter()
            .filter(|id| self.applies(*id))
            .map(|id| self.view(id))
            .collect()
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Apply a user choice. `raw` of `None` (or blank) clears the selector.
    ///
    /// On success the selector and everything downstream are cleared before
    /// anything else happens, and any in-flight ticket becomes stale.
    pub fn choose(&mut self, id: SelectorId, raw: Option<&str>) -> Result<Transition, SelectionError> {
        if !self.applies(id) || !self.is_enabled(id) {
            return Err(SelectionError::Disabled(id));
        }
        let raw = raw.map(str::trim).filter(|r| !r.is_empty());
        let value = raw.map(|r| self.parse_value(id, r)).transpose()?;
        let fetch = match &value {
            Some(v) => self.fetch_for(v)?,
            None => None,
        };

        self.epoch += 1;
        self.pending = None;
        self.selection.clear_from(id);

        let Some(value) = value else {
            tracing::debug!(selector = %id, epoch = self.epoch, "Selector cleared");
            return Ok(Transition::Cleared(id));
        };

        match fetch {
            Some(fetch) => {
                let ticket = Ticket(self.epoch);
                tracing::debug!(selector = %id, epoch = self.epoch, ?fetch, "Choice pending");
                self.pending = Some(PendingChoice { ticket, value: value.clone() });
                Ok(Transition::Pending { ticket, value, fetch })
            }
            None => {
                tracing::debug!(selector = %id, epoch = self.epoch, "Choice committed");
                self.selection.set(value);
                Ok(Transition::Committed(id))
            }
        }
    }

    /// Settle the pending choice issued with `ticket`.
    pub fn resolve(&mut self, ticket: Ticket, success: bool) -> Resolution {
        if self.pending_for(ticket).is_none() {
            tracing::debug!(ticket = ticket.0, epoch = self.epoch, "Discarding stale result");
            return Resolution::Stale;
        }
        let Some(PendingChoice { value, .. }) = self.pending.take() else {
            return Resolution::Stale;
        };
        let id = value.selector();
        if success {
            self.selection.set(value);
            Resolution::Committed(id)
        } else {
            Resolution::Aborted(id)
        }
    }

    fn parse_value(&self, id: SelectorId, raw: &str) -> Result<SelectorValue, SelectionError> {
        let invalid = || SelectionError::InvalidOption { selector: id, value: raw.to_string() };
        let value = match id {
            SelectorId::Country => {
                let country = self.catalog.get(raw).ok_or_else(invalid)?;
                SelectorValue::Country(country.iso.clone())
            }
            SelectorId::AdminLevel => {
                let level: u8 = raw.parse().map_err(|_| invalid())?;
                let country = self.country().ok_or_else(invalid)?;
                if !country.supports_level(level) {
                    return Err(invalid());
                }
                SelectorValue::AdminLevel(level)
            }
            SelectorId::Hazard => {
                let hazard: Hazard = raw.parse().map_err(|_| invalid())?;
                let country = self.country().ok_or_else(invalid)?;
                if !country.supports_hazard(hazard) {
                    return Err(invalid());
                }
                SelectorValue::Hazard(hazard)
            }
            SelectorId::Period => SelectorValue::Period(raw.parse().map_err(|_| invalid())?),
            SelectorId::Scenario => SelectorValue::Scenario(raw.parse().map_err(|_| invalid())?),
            SelectorId::Exposure => SelectorValue::Exposure(raw.parse().map_err(|_| invalid())?),
        };
        Ok(value)
    }

    /// What must be fetched before `value` can be committed.
    fn fetch_for(&self, value: &SelectorValue) -> Result<Option<Fetch>, SelectionError> {
        let fetch = match value {
            SelectorValue::Country(iso) => Fetch::Boundaries { iso: iso.clone(), admin_level: 0 },
            SelectorValue::AdminLevel(level) => {
                let iso = self
                    .selection
                    .country
                    .clone()
                    .ok_or(SelectionError::Disabled(SelectorId::AdminLevel))?;
                Fetch::Boundaries { iso, admin_level: *level }
            }
            SelectorValue::Exposure(category) => {
                let query = self
                    .selection
                    .query_for(*category, self.temporal)
                    .ok_or(SelectionError::Disabled(SelectorId::Exposure))?;
                Fetch::Metrics(query)
            }
            SelectorValue::Hazard(_) | SelectorValue::Period(_) | SelectorValue::Scenario(_) => {
                return Ok(None)
            }
        };
        Ok(Some(fetch))
    }
}
