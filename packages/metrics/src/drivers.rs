//! County population drivers: migration and natural increase.

use realmarket_market_models::sources::{CountyDrivers, MigrationFlows};
use realmarket_market_models::{MigrationData, NaturalIncreaseData};

use crate::{round_count, round_to};

/// Migration metrics. Requires a positive PEP county population and flow
/// data; missing raw counts default to zero.
#[must_use]
pub fn migration(drivers: &CountyDrivers, flows: Option<&MigrationFlows>) -> Option<MigrationData> {
    let population = drivers.positive_population()?;
    let flows = flows?;

    let net = flows.moved_net.unwrap_or(0.0);
    let inflows = flows.moved_in.unwrap_or(0.0);
    let outflows = flows.moved_out.unwrap_or(0.0);

    Some(MigrationData {
        net_migration: round_count(net),
        net_migration_rate: round_to(net / population * 100.0, 2),
        domestic_migration: round_count(drivers.domestic_migration.unwrap_or(0.0)),
        international_migration: round_count(drivers.international_migration.unwrap_or(0.0)),
        inflows: round_count(inflows),
        outflows: round_count(outflows),
        gross_migration: round_count(inflows + outflows),
    })
}

/// Natural increase metrics. Requires a positive PEP county population.
///
/// The change is PEP's `NATURALINC`, or births minus deaths when that is
/// missing.
#[must_use]
pub fn natural_increase(drivers: &CountyDrivers) -> Option<NaturalIncreaseData> {
    let population = drivers.positive_population()?;
    let births = drivers.births.unwrap_or(0.0);
    let deaths = drivers.deaths.unwrap_or(0.0);
    let change = drivers.natural_increase.unwrap_or_else(|| {
        if drivers.births.is_some() && drivers.deaths.is_some() {
            births - deaths
        } else {
            0.0
        }
    });

    Some(NaturalIncreaseData {
        births: round_count(births),
        deaths: round_count(deaths),
        natural_change: round_count(change),
        natural_increase_rate: round_to(change / population * 1000.0, 2),
    })
}
