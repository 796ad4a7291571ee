//! Raw records returned by the statistical data sources.
//!
//! Values are already parsed: suppressed or missing estimates are `None`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of a Census API response, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CensusRecord {
    /// The `NAME` column, when requested.
    pub name: Option<String>,
    /// Parsed variable values.
    pub values: BTreeMap<String, Option<f64>>,
}

impl CensusRecord {
    /// Returns `true` if the provider returned no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.values.is_empty()
    }

    /// Returns the parsed value of `variable`, if present and not suppressed.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied().flatten()
    }

    /// Merges another record into this one. Later values win.
    pub fn merge(&mut self, other: Self) {
        if other.name.is_some() {
            self.name = other.name;
        }
        self.values.extend(other.values);
    }
}

/// County population and components of change (PEP).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountyDrivers {
    /// County population (`POP`).
    pub population: Option<f64>,
    /// Births (`BIRTHS`).
    pub births: Option<f64>,
    /// Deaths (`DEATHS`).
    pub deaths: Option<f64>,
    /// Net domestic migration (`DOMESTICMIG`).
    pub domestic_migration: Option<f64>,
    /// Net international migration (`INTERNATIONALMIG`).
    pub international_migration: Option<f64>,
    /// Natural increase (`NATURALINC`).
    pub natural_increase: Option<f64>,
}

impl CountyDrivers {
    /// Reads PEP variables out of a merged population/components record.
    #[must_use]
    pub fn from_record(record: &CensusRecord) -> Self {
        Self {
            population: record.get("POP"),
            births: record.get("BIRTHS"),
            deaths: record.get("DEATHS"),
            domestic_migration: record.get("DOMESTICMIG"),
            international_migration: record.get("INTERNATIONALMIG"),
            natural_increase: record.get("NATURALINC"),
        }
    }

    /// County population when it is known and positive.
    #[must_use]
    pub fn positive_population(&self) -> Option<f64> {
        self.population.filter(|p| *p > 0.0)
    }
}

/// County-to-county migration flows (ACS flows).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationFlows {
    /// Movers in (`MOVEDIN`).
    pub moved_in: Option<f64>,
    /// Movers out (`MOVEDOUT`).
    pub moved_out: Option<f64>,
    /// Net movers (`MOVEDNET`).
    pub moved_net: Option<f64>,
}

impl MigrationFlows {
    /// Reads flow variables out of a record.
    #[must_use]
    pub fn from_record(record: &CensusRecord) -> Self {
        Self {
            moved_in: record.get("MOVEDIN"),
            moved_out: record.get("MOVEDOUT"),
            moved_net: record.get("MOVEDNET"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Option<f64>)]) -> CensusRecord {
        CensusRecord {
            name: None,
            values: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn merge_keeps_both_sides() {
        let mut a = record(&[("A", Some(1.0))]);
        a.name = Some("Tract 1".to_string());
        a.merge(record(&[("B", None), ("C", Some(3.0))]));
        assert_eq!(a.name.as_deref(), Some("Tract 1"));
        assert_eq!(a.get("A"), Some(1.0));
        assert_eq!(a.get("B"), None);
        assert_eq!(a.get("C"), Some(3.0));
        assert!(!a.is_empty());
    }

    #[test]
    fn drivers_require_positive_population() {
        let drivers = CountyDrivers::from_record(&record(&[("POP", Some(0.0))]));
        assert_eq!(drivers.positive_population(), None);
        let drivers = CountyDrivers::from_record(&record(&[("POP", Some(10.0))]));
        assert_eq!(drivers.positive_population(), Some(10.0));
    }
}
