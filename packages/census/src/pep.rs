//! County population drivers: PEP population, PEP components of change,
//! and ACS county-to-county migration flows.

use realmarket_market_models::sources::{CensusRecord, CountyDrivers, MigrationFlows};
use realmarket_market_models::{FipsCode, GeographyLevel};

use crate::{CensusClient, CensusError, Dataset};

/// PEP population variable.
pub const PEP_POPULATION: &[&str] = &["POP"];

/// PEP components of change variables.
pub const PEP_COMPONENTS: &[&str] = &[
    "BIRTHS",
    "DEATHS",
    "DOMESTICMIG",
    "INTERNATIONALMIG",
    "NATURALINC",
];

/// ACS flows variables.
pub const FLOW_VARIABLES: &[&str] = &["MOVEDIN", "MOVEDOUT", "MOVEDNET"];

fn owned(variables: &[&str]) -> Vec<String> {
    variables.iter().map(|v| (*v).to_string()).collect()
}

impl CensusClient {
    /// Fetches PEP county population and components concurrently.
    ///
    /// Each half's failure is logged and skipped. Returns `None` when
    /// neither half produced data.
    pub async fn county_drivers(&self, fips: &FipsCode) -> Option<CountyDrivers> {
        let year = self.settings.pep_year;
        let population_vars = owned(PEP_POPULATION);
        let component_vars = owned(PEP_COMPONENTS);

        let (population, components) = tokio::join!(
            self.fetch(
                Dataset::PepPopulation,
                year,
                fips,
                GeographyLevel::County,
                &population_vars,
            ),
            self.fetch(
                Dataset::PepComponents,
                year,
                fips,
                GeographyLevel::County,
                &component_vars,
            ),
        );

        let mut merged = CensusRecord::default();
        for (label, result) in [("population", population), ("components", components)] {
            match result {
                Ok(record) => merged.merge(record),
                Err(e) => log::warn!(
                    "PEP {label} fetch failed for county {}{}: {e}",
                    fips.state,
                    fips.county
                ),
            }
        }

        if merged.values.values().all(Option::is_none) {
            return None;
        }
        Some(CountyDrivers::from_record(&merged))
    }

    /// Fetches county-to-county migration flows for the tract's county.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request fails after retries.
    pub async fn migration_flows(
        &self,
        fips: &FipsCode,
    ) -> Result<Option<MigrationFlows>, CensusError> {
        let record = self
            .fetch(
                Dataset::AcsFlows,
                self.settings.flows_year,
                fips,
                GeographyLevel::County,
                &owned(FLOW_VARIABLES),
            )
            .await?;

        if record.is_empty() {
            return Ok(None);
        }
        Ok(Some(MigrationFlows::from_record(&record)))
    }
}
