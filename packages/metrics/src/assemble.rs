//! Snapshot assembly.
//!
//! [`build_snapshot`] turns the fetched records and the derived driver and
//! density metrics into one validated [`MarketDataSnapshot`]. Growth and the
//! projection are computed here from the trends.

use realmarket_market_models::acs;
use realmarket_market_models::sources::CensusRecord;
use realmarket_market_models::{
    AgeDistribution, BenchmarkData, Demographics, EconomicContext, GeographicLocation,
    GeographyLevel, HouseholdComposition, HousingMetrics, MarketDataSnapshot, MetricValue,
    MigrationData, NaturalIncreaseData, PopulationDensity, PopulationTrend, RaceAndEthnicity,
    SexDistribution, TrendPoint, WalkabilityScores,
};

use crate::growth::growth_metrics;
use crate::moe::{metric, sum_with_moe, value_with_moe};
use crate::projection::project;
use crate::ratios::{safe_div_percent, sum_or_zero, sum_values};
use crate::MetricsError;

/// Geography name used when the API did not return one.
const UNKNOWN_GEOGRAPHY: &str = "N/A";

/// Everything a snapshot is built from.
#[derive(Debug, Clone)]
pub struct SnapshotInputs<'a> {
    /// The address as the caller supplied it.
    pub search_address: &'a str,
    /// ACS release year of `acs`.
    pub data_year: i32,
    /// Level `acs` was fetched at.
    pub geography_level: GeographyLevel,
    /// Geocoded location.
    pub location: &'a GeographicLocation,
    /// Detailed-table record for `data_year`. Must not be empty.
    pub acs: &'a CensusRecord,
    /// Subject-table record, if it was fetched.
    pub subject: Option<&'a CensusRecord>,
    /// Data-profile record, if it was fetched.
    pub profile: Option<&'a CensusRecord>,
    /// Observed tract population, ascending by year.
    pub tract_trend: &'a [TrendPoint],
    /// Observed county population, if it was fetched.
    pub county_trend: Option<&'a [TrendPoint]>,
    /// County migration metrics.
    pub migration: Option<MigrationData>,
    /// County natural increase metrics.
    pub natural_increase: Option<NaturalIncreaseData>,
    /// Tract density.
    pub population_density: PopulationDensity,
    /// Walk Score and Transit Score.
    pub walkability: Option<WalkabilityScores>,
    /// Length of the historical window.
    pub period_years: u32,
    /// Number of projected years.
    pub projection_years: u32,
}

/// Assembles and validates a snapshot.
///
/// # Errors
///
/// Returns [`MetricsError::NoDemographicData`] if the ACS record is empty,
/// or [`MetricsError::Invalid`] if the result breaks a schema invariant.
pub fn build_snapshot(inputs: SnapshotInputs<'_>) -> Result<MarketDataSnapshot, MetricsError> {
    if inputs.acs.is_empty() {
        return Err(MetricsError::NoDemographicData);
    }

    let mut data = inputs.acs.clone();
    for extra in [inputs.subject, inputs.profile].into_iter().flatten() {
        data.merge(extra.clone());
    }

    let geography_name = inputs
        .acs
        .name
        .clone()
        .or_else(|| data.name.clone())
        .unwrap_or_else(|| UNKNOWN_GEOGRAPHY.to_string());

    #[allow(clippy::cast_precision_loss)]
    let latest_observed = inputs.tract_trend.last().map(|p| p.population as f64);
    let acs_population = data.get(acs::TOTAL_POPULATION);
    let moe_population = data.get("B01003_001M");

    let projection = project(
        acs_population.or(latest_observed),
        inputs.county_trend.unwrap_or_default(),
        inputs.data_year + 1,
        inputs.projection_years,
    );

    let snapshot = MarketDataSnapshot {
        search_address: inputs.search_address.to_string(),
        data_year: inputs.data_year,
        geography_name,
        geography_level: inputs.geography_level,
        fips: inputs.location.fips.clone(),
        tract_area_sq_meters: inputs.location.land_area_sq_meters,
        coordinates: inputs.location.coordinates,
        total_population: value_with_moe(latest_observed.or(acs_population), moe_population),
        median_age: metric(&data, acs::MEDIAN_AGE),
        growth: growth_metrics(inputs.tract_trend, inputs.period_years),
        migration: inputs.migration,
        natural_increase: inputs.natural_increase,
        population_density: inputs.population_density,
        age_distribution: age_distribution(&data),
        sex_distribution: sex_distribution(&data),
        demographics: demographics(&data),
        housing: housing(&data),
        economic_context: economic_context(&data),
        walkability: inputs.walkability,
        population_trends: PopulationTrend {
            trend: inputs.tract_trend.to_vec(),
            projection,
            benchmark: inputs.county_trend.map(|county| BenchmarkData {
                county_trend: county.to_vec(),
            }),
        },
    };

    snapshot.validate()?;
    log::debug!(
        "Assembled snapshot for {:?} ({})",
        snapshot.search_address,
        snapshot.fips.geoid()
    );
    Ok(snapshot)
}

/// Keeps a metric only if it has an estimate.
fn present(metric: MetricValue) -> Option<MetricValue> {
    metric.value.is_some().then_some(metric)
}

fn age_distribution(data: &CensusRecord) -> AgeDistribution {
    AgeDistribution {
        under_18: sum_with_moe(data, acs::AGE_UNDER_18),
        age_18_to_34: sum_with_moe(data, acs::AGE_18_TO_34),
        age_35_to_64: sum_with_moe(data, acs::AGE_35_TO_64),
        over_65: sum_with_moe(data, acs::AGE_65_AND_OVER),
    }
}

fn sex_distribution(data: &CensusRecord) -> Option<SexDistribution> {
    let male = metric(data, acs::TOTAL_MALE);
    let female = metric(data, acs::TOTAL_FEMALE);
    if male.value.is_none() && female.value.is_none() {
        return None;
    }
    let total = Some(sum_or_zero(male.value, female.value));
    Some(SexDistribution {
        percent_male: safe_div_percent(male.value, total),
        percent_female: safe_div_percent(female.value, total),
        male,
        female,
    })
}

fn demographics(data: &CensusRecord) -> Demographics {
    let households = data.get(acs::TOTAL_HOUSEHOLDS);
    let household_composition = households.map(|_| HouseholdComposition {
        total_households: present(metric(data, acs::TOTAL_HOUSEHOLDS)),
        percent_family_households: safe_div_percent(data.get(acs::FAMILY_HOUSEHOLDS), households),
        percent_married_couple_family: safe_div_percent(
            data.get(acs::MARRIED_COUPLE_FAMILY),
            households,
        ),
        percent_non_family_households: safe_div_percent(
            data.get(acs::NONFAMILY_HOUSEHOLDS),
            households,
        ),
    });

    let race_total = data.get(acs::RACE_TOTAL);
    let race_and_ethnicity = race_total.map(|_| RaceAndEthnicity {
        percent_white_non_hispanic: safe_div_percent(
            data.get(acs::RACE_WHITE_NON_HISPANIC),
            race_total,
        ),
        percent_black_non_hispanic: safe_div_percent(
            data.get(acs::RACE_BLACK_NON_HISPANIC),
            race_total,
        ),
        percent_asian_non_hispanic: safe_div_percent(
            data.get(acs::RACE_ASIAN_NON_HISPANIC),
            race_total,
        ),
        percent_hispanic: safe_div_percent(data.get(acs::RACE_HISPANIC), race_total),
        percent_other_non_hispanic: safe_div_percent(
            Some(sum_values(data, acs::RACE_OTHER_NON_HISPANIC)),
            race_total,
        ),
    });

    Demographics {
        median_household_income: present(metric(data, acs::MEDIAN_HOUSEHOLD_INCOME)),
        percent_bachelors_or_higher: safe_div_percent(
            Some(sum_values(data, acs::EDU_BACHELORS_OR_HIGHER)),
            data.get(acs::EDU_TOTAL_25_OVER),
        ),
        avg_household_size: present(metric(data, acs::AVG_HOUSEHOLD_SIZE)),
        household_composition,
        race_and_ethnicity,
    }
}

fn housing(data: &CensusRecord) -> HousingMetrics {
    let for_rent = data.get(acs::VACANT_FOR_RENT);
    let for_sale = data.get(acs::VACANT_FOR_SALE);
    HousingMetrics {
        percent_renter_occupied: safe_div_percent(
            data.get(acs::RENTER_OCCUPIED_UNITS),
            data.get(acs::TOTAL_OCCUPIED_UNITS),
        ),
        median_home_value: present(metric(data, acs::MEDIAN_HOME_VALUE)),
        median_gross_rent: present(metric(data, acs::MEDIAN_GROSS_RENT)),
        median_year_structure_built: present(metric(data, acs::MEDIAN_YEAR_BUILT)),
        vacancy_rate: safe_div_percent(
            data.get(acs::VACANT_UNITS),
            data.get(acs::TOTAL_HOUSING_UNITS),
        ),
        rental_vacancy_rate: safe_div_percent(
            for_rent,
            Some(sum_or_zero(data.get(acs::RENTER_OCCUPIED_UNITS), for_rent)),
        ),
        homeowner_vacancy_rate: safe_div_percent(
            for_sale,
            Some(sum_or_zero(data.get(acs::OWNER_OCCUPIED_UNITS), for_sale)),
        ),
    }
}

fn economic_context(data: &CensusRecord) -> Option<EconomicContext> {
    let context = EconomicContext {
        poverty_rate: data.get(acs::POVERTY_RATE),
        labor_force_participation_rate: safe_div_percent(
            data.get(acs::IN_LABOR_FORCE),
            data.get(acs::LABOR_FORCE_TOTAL_16_OVER),
        ),
        mean_commute_time_minutes: present(metric(data, acs::MEAN_COMMUTE_TIME)),
    };
    let empty = context.poverty_rate.is_none()
        && context.labor_force_participation_rate.is_none()
        && context.mean_commute_time_minutes.is_none();
    (!empty).then_some(context)
}
