//! Population density.

use realmarket_market_models::{PopulationDensity, TrendPoint};

/// Square meters in one square mile.
pub const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.11;

/// Converts a land area to square miles.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn square_miles(land_area_sq_meters: u64) -> f64 {
    land_area_sq_meters as f64 / SQ_METERS_PER_SQ_MILE
}

/// Density of `population` over the tract's land area, and its change
/// since the first point of `trend`.
///
/// `people_per_sq_mile` is 0 when the land area is unknown. The change is
/// `None` unless the trend has at least two points and the area is known.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn population_density(
    population: f64,
    land_area_sq_meters: u64,
    trend: &[TrendPoint],
) -> PopulationDensity {
    if land_area_sq_meters == 0 {
        return PopulationDensity {
            people_per_sq_mile: 0.0,
            change_over_period: None,
        };
    }

    let area = square_miles(land_area_sq_meters);
    let current = population / area;
    let change_over_period = match trend {
        [first, _, ..] => Some(current - first.population as f64 / area),
        _ => None,
    };

    PopulationDensity {
        people_per_sq_mile: current,
        change_over_period,
    }
}
