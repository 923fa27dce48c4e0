//! Static reference data: hazards, exposure categories, periods, scenarios
//! and the per-country capability catalog.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Year of the historical baseline period.
pub const BASELINE_YEAR: u16 = 2020;

// ── Hazards ───────────────────────────────────────────────────────────────────

/// Hazard types with modelled EAI layers. Serialized as the short code used
/// in workbook names (`FL`, `CF`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hazard {
    #[serde(rename = "FL")]
    RiverFlood,
    #[serde(rename = "CF")]
    CoastalFlood,
    #[serde(rename = "TC")]
    TropicalCyclone,
    #[serde(rename = "DR")]
    Drought,
    #[serde(rename = "HS")]
    HeatStress,
    #[serde(rename = "LS")]
    Landslide,
}

impl Hazard {
    pub const ALL: [Hazard; 6] = [
        Hazard::RiverFlood,
        Hazard::CoastalFlood,
        Hazard::TropicalCyclone,
        Hazard::Drought,
        Hazard::HeatStress,
        Hazard::Landslide,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Hazard::RiverFlood      => "FL",
            Hazard::CoastalFlood    => "CF",
            Hazard::TropicalCyclone => "TC",
            Hazard::Drought         => "DR",
            Hazard::HeatStress      => "HS",
            Hazard::Landslide       => "LS",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Hazard::RiverFlood      => "River flood",
            Hazard::CoastalFlood    => "Coastal flood",
            Hazard::TropicalCyclone => "Tropical cyclone",
            Hazard::Drought         => "Drought",
            Hazard::HeatStress      => "Heat stress",
            Hazard::Landslide       => "Landslide",
        }
    }
}

impl FromStr for Hazard {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hazard::ALL.into_iter().find(|h| h.code() == s).ok_or(())
    }
}

// ── Exposure categories ───────────────────────────────────────────────────────

/// Exposed asset class the EAI is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExposureCategory {
    Population,
    BuiltUp,
    Cropland,
}

impl ExposureCategory {
    pub const ALL: [ExposureCategory; 3] = [
        ExposureCategory::Population,
        ExposureCategory::BuiltUp,
        ExposureCategory::Cropland,
    ];

    /// Selector value, also the serde form.
    pub fn value(self) -> &'static str {
        match self {
            ExposureCategory::Population => "population",
            ExposureCategory::BuiltUp    => "built-up",
            ExposureCategory::Cropland   => "cropland",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ExposureCategory::Population => "Population",
            ExposureCategory::BuiltUp    => "Built-up",
            ExposureCategory::Cropland   => "Cropland",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ExposureCategory::Population => "people",
            ExposureCategory::BuiltUp    => "ha",
            ExposureCategory::Cropland   => "ha",
        }
    }

    /// Sheet holding this category's rows; doubles as the column prefix
    /// (`POP_EAI`, `POP_EAI%`).
    pub fn sheet_id(self) -> &'static str {
        match self {
            ExposureCategory::Population => "POP",
            ExposureCategory::BuiltUp    => "BU",
            ExposureCategory::Cropland   => "AGR",
        }
    }

    pub fn eai_column(self) -> String {
        format!("{}_EAI", self.sheet_id())
    }

    pub fn eai_share_column(self) -> String {
        format!("{}_EAI%", self.sheet_id())
    }
}

impl FromStr for ExposureCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExposureCategory::ALL.into_iter().find(|c| c.value() == s).ok_or(())
    }
}

// ── Periods and scenarios ─────────────────────────────────────────────────────

/// Time period of the hazard model run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Baseline,
    Y2030,
    Y2050,
    Y2080,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Baseline, Period::Y2030, Period::Y2050, Period::Y2080];

    pub fn year(self) -> u16 {
        match self {
            Period::Baseline => BASELINE_YEAR,
            Period::Y2030    => 2030,
            Period::Y2050    => 2050,
            Period::Y2080    => 2080,
        }
    }

    /// No climate scenario applies to the historical baseline.
    pub fn is_baseline(self) -> bool {
        self == Period::Baseline
    }

    pub fn label(self) -> String {
        match self {
            Period::Baseline => format!("{BASELINE_YEAR} (baseline)"),
            other => other.year().to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let year: u16 = s.trim().parse().map_err(|_| ())?;
        Period::ALL.into_iter().find(|p| p.year() == year).ok_or(())
    }
}

/// Shared socio-economic pathway scenario for future periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "SSP1-2.6")]
    Ssp126,
    #[serde(rename = "SSP2-4.5")]
    Ssp245,
    #[serde(rename = "SSP3-7.0")]
    Ssp370,
    #[serde(rename = "SSP5-8.5")]
    Ssp585,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [Scenario::Ssp126, Scenario::Ssp245, Scenario::Ssp370, Scenario::Ssp585];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Ssp126 => "SSP1-2.6",
            Scenario::Ssp245 => "SSP2-4.5",
            Scenario::Ssp370 => "SSP3-7.0",
            Scenario::Ssp585 => "SSP5-8.5",
        }
    }

    /// Compact form used in workbook names.
    pub fn code(self) -> &'static str {
        match self {
            Scenario::Ssp126 => "SSP126",
            Scenario::Ssp245 => "SSP245",
            Scenario::Ssp370 => "SSP370",
            Scenario::Ssp585 => "SSP585",
        }
    }
}

impl FromStr for Scenario {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.label() == s || sc.code() == s)
            .ok_or(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Country capabilities ──────────────────────────────────────────────────────

/// What the dashboard can show for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    /// ISO 3166-1 alpha-3.
    pub iso: String,
    /// Finest administrative level with boundaries and metric sheets.
    pub max_admin_level: u8,
    /// Ordered, duplicate-free.
    pub hazards: Vec<Hazard>,
}

impl Country {
    pub fn new(name: &str, iso: &str, max_admin_level: u8, hazards: &[Hazard]) -> Self {
        Self {
            name: name.to_string(),
            iso: iso.to_string(),
            max_admin_level,
            hazards: hazards.to_vec(),
        }
    }

    pub fn supports_level(&self, level: u8) -> bool {
        (1..=self.max_admin_level).contains(&level)
    }

    pub fn supports_hazard(&self, hazard: Hazard) -> bool {
        self.hazards.contains(&hazard)
    }
}

/// Immutable set of country capability records, looked up by ISO code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CountryCatalog {
    countries: Vec<Country>,
}

impl CountryCatalog {
    /// Build a catalog, rejecting duplicate ISO codes and records with no
    /// selectable levels or hazards. Repeated hazard codes are collapsed,
    /// keeping first-seen order.
    pub fn new(countries: Vec<Country>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut cleaned = Vec::with_capacity(countries.len());
        for mut country in countries {
            if !seen.insert(country.iso.clone()) {
                return Err(CatalogError::DuplicateIso { iso: country.iso });
            }
            if country.max_admin_level == 0 {
                return Err(CatalogError::NoAdminLevels { iso: country.iso });
            }
            let mut hazards_seen = HashSet::new();
            country.hazards.retain(|h| hazards_seen.insert(*h));
            if country.hazards.is_empty() {
                return Err(CatalogError::NoHazards { iso: country.iso });
            }
            cleaned.push(country);
        }
        Ok(Self { countries: cleaned })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let countries: Vec<Country> = serde_json::from_str(json)?;
        Self::new(countries)
    }

    pub fn get(&self, iso: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.iso == iso)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Countries ordered by display name, as offered by the country selector.
    pub fn sorted_by_name(&self) -> Vec<&Country> {
        let mut out: Vec<&Country> = self.countries.iter().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl Default for CountryCatalog {
    fn default() -> Self {
        use Hazard::*;
        Self {
            countries: vec![
                Country::new("Bangladesh",  "BGD", 3, &[RiverFlood, CoastalFlood, TropicalCyclone]),
                Country::new("Ethiopia",    "ETH", 3, &[RiverFlood, Drought, HeatStress]),
                Country::new("Mozambique",  "MOZ", 2, &[RiverFlood, CoastalFlood, TropicalCyclone, Drought]),
                Country::new("Nepal",       "NPL", 2, &[RiverFlood, Landslide, HeatStress]),
                Country::new("Philippines", "PHL", 2, &[RiverFlood, CoastalFlood, TropicalCyclone, Landslide]),
                Country::new("Tajikistan",  "TJK", 2, &[RiverFlood, Landslide, Drought]),
                Country::new("Viet Nam",    "VNM", 2, &[RiverFlood, CoastalFlood, TropicalCyclone, HeatStress]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_json_round_trip_uses_short_codes() {
        let json = r#"[{"name":"Nepal","iso":"NPL","max_admin_level":2,"hazards":["FL","LS"]}]"#;
        let catalog = CountryCatalog::from_json(json).unwrap();
        let nepal = catalog.get("NPL").unwrap();
        assert_eq!(nepal.hazards, vec![Hazard::RiverFlood, Hazard::Landslide]);
        assert!(nepal.supports_level(2));
        assert!(!nepal.supports_level(0));
        assert!(!nepal.supports_level(3));
    }

    #[test]
    fn duplicate_iso_rejected() {
        let countries = vec![
            Country::new("A", "AAA", 1, &[Hazard::Drought]),
            Country::new("A again", "AAA", 2, &[Hazard::Drought]),
        ];
        assert!(matches!(
            CountryCatalog::new(countries),
            Err(CatalogError::DuplicateIso { .. })
        ));
    }

    #[test]
    fn zero_admin_levels_rejected() {
        let countries = vec![Country::new("A", "AAA", 0, &[Hazard::Drought])];
        assert!(matches!(
            CountryCatalog::new(countries),
            Err(CatalogError::NoAdminLevels { .. })
        ));
    }

    #[test]
    fn repeated_hazards_collapsed_in_order() {
        let countries = vec![Country::new(
            "A",
            "AAA",
            1,
            &[Hazard::Landslide, Hazard::RiverFlood, Hazard::Landslide],
        )];
        let catalog = CountryCatalog::new(countries).unwrap();
        assert_eq!(
            catalog.get("AAA").unwrap().hazards,
            vec![Hazard::Landslide, Hazard::RiverFlood]
        );
    }

    #[test]
    fn sorted_by_name_is_alphabetical() {
        let catalog = CountryCatalog::default();
        let names: Vec<&str> = catalog.sorted_by_name().iter().map(|c| c.name.as_str()).collect();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn period_and_scenario_parse() {
        assert_eq!("2020".parse::<Period>(), Ok(Period::Baseline));
        assert_eq!("2050".parse::<Period>(), Ok(Period::Y2050));
        assert!("2040".parse::<Period>().is_err());
        assert_eq!("SSP2-4.5".parse::<Scenario>(), Ok(Scenario::Ssp245));
        assert_eq!("SSP585".parse::<Scenario>(), Ok(Scenario::Ssp585));
        assert_eq!("built-up".parse::<ExposureCategory>(), Ok(ExposureCategory::BuiltUp));
    }

    #[test]
    fn category_columns_use_sheet_prefix() {
        assert_eq!(ExposureCategory::Cropland.eai_column(), "AGR_EAI");
        assert_eq!(ExposureCategory::Population.eai_share_column(), "POP_EAI%");
    }
}
