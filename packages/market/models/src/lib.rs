#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Market data snapshot schema and shared geography types.
//!
//! [`MarketDataSnapshot`] is the unit returned to callers and stored in the
//! response cache. Every field is spelled out so that a snapshot missing a
//! required input fails at construction time, and a cached blob written by
//! an older schema fails [`MarketDataSnapshot::from_json`] and is refetched.
//!
//! The [`sources`] module holds the raw records produced by the statistical
//! data client; the [`acs`] module lists the Census variables the pipeline
//! requests.

pub mod acs;
pub mod fips;
pub mod sources;

use serde::{Deserialize, Serialize};

use crate::fips::FipsError;

/// Errors raised when a snapshot does not match the current schema.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The blob could not be decoded into a [`MarketDataSnapshot`].
    #[error("Snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A FIPS code is malformed.
    #[error(transparent)]
    Fips(#[from] FipsError),

    /// The observed or projected trend is out of order.
    #[error("Invalid trend: {message}")]
    Trend {
        /// Description of the ordering violation.
        message: String,
    },

    /// A metric carries a relative MOE without an estimate.
    #[error("Metric {field} has a relative MOE but no value")]
    OrphanMoe {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Census geography level a snapshot describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeographyLevel {
    /// Census tract.
    Tract,
    /// County containing the tract.
    County,
}

/// State, county, and tract FIPS codes for one census tract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FipsCode {
    /// Two-digit state code (e.g. `"11"`).
    pub state: String,
    /// Three-digit county code (e.g. `"001"`).
    pub county: String,
    /// Six-digit tract code (e.g. `"006202"`).
    pub tract: String,
}

impl FipsCode {
    /// Builds a validated FIPS triple.
    ///
    /// # Errors
    ///
    /// Returns [`FipsError`] if any code has the wrong width, contains
    /// non-digits, or names an unknown state.
    pub fn new(
        state: impl Into<String>,
        county: impl Into<String>,
        tract: impl Into<String>,
    ) -> Result<Self, FipsError> {
        let code = Self {
            state: state.into(),
            county: county.into(),
            tract: tract.into(),
        };
        code.validate()?;
        Ok(code)
    }

    /// Splits an 11-digit tract GEOID (`SSCCCTTTTTT`) into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`FipsError`] if the GEOID is not 11 digits or the parts are
    /// invalid.
    pub fn from_geoid(geoid: &str) -> Result<Self, FipsError> {
        if geoid.len() != 11 || !geoid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FipsError::Geoid {
                value: geoid.to_string(),
            });
        }
        Self::new(&geoid[..2], &geoid[2..5], &geoid[5..])
    }

    /// Checks widths, digits, and the state code.
    ///
    /// # Errors
    ///
    /// Returns [`FipsError`] describing the first invalid part.
    pub fn validate(&self) -> Result<(), FipsError> {
        fips::check_code("state", &self.state, fips::STATE_WIDTH)?;
        fips::check_code("county", &self.county, fips::COUNTY_WIDTH)?;
        fips::check_code("tract", &self.tract, fips::TRACT_WIDTH)?;
        if !fips::is_state_fips(&self.state) {
            return Err(FipsError::UnknownState {
                value: self.state.clone(),
            });
        }
        Ok(())
    }

    /// Returns the 11-digit tract GEOID.
    #[must_use]
    pub fn geoid(&self) -> String {
        format!("{}{}{}", self.state, self.county, self.tract)
    }
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// A resolved address location. Immutable once produced by the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicLocation {
    /// FIPS hierarchy of the containing tract.
    pub fips: FipsCode,
    /// Point the address resolved to.
    pub coordinates: Coordinates,
    /// Tract land area in square meters.
    pub land_area_sq_meters: u64,
}

/// An estimate paired with its relative margin of error (percent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// The estimate, if the source reported one.
    pub value: Option<f64>,
    /// Margin of error as a percentage of `value`.
    pub relative_moe: Option<f64>,
}

impl MetricValue {
    /// A metric with neither an estimate nor an MOE.
    pub const EMPTY: Self = Self {
        value: None,
        relative_moe: None,
    };

    /// Returns `false` when a relative MOE is present without an estimate.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        !(self.value.is_none() && self.relative_moe.is_some())
    }
}

/// One year of a population series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Data year.
    pub year: i32,
    /// Population for the year.
    pub population: i64,
    /// Whether the value is projected rather than observed.
    #[serde(default)]
    pub is_projection: bool,
}

impl TrendPoint {
    /// An observed data point.
    #[must_use]
    pub const fn observed(year: i32, population: i64) -> Self {
        Self {
            year,
            population,
            is_projection: false,
        }
    }

    /// A projected data point.
    #[must_use]
    pub const fn projected(year: i32, population: i64) -> Self {
        Self {
            year,
            population,
            is_projection: true,
        }
    }
}

/// Growth over the historical window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    /// Length of the requested historical window.
    pub period_years: u32,
    /// Compound annual growth rate (%).
    pub cagr: Option<f64>,
    /// Growth over the most recent year (%).
    pub yoy_growth: Option<f64>,
    /// Population change from first to last observation.
    pub absolute_change: Option<i64>,
}

/// County migration drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationData {
    /// Net movers.
    pub net_migration: i64,
    /// Net movers as a percentage of county population.
    pub net_migration_rate: f64,
    /// Net domestic migration (PEP).
    pub domestic_migration: i64,
    /// Net international migration (PEP).
    pub international_migration: i64,
    /// Movers in.
    pub inflows: i64,
    /// Movers out.
    pub outflows: i64,
    /// Inflows plus outflows.
    pub gross_migration: i64,
}

/// County births and deaths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaturalIncreaseData {
    /// Births.
    pub births: i64,
    /// Deaths.
    pub deaths: i64,
    /// Births minus deaths.
    pub natural_change: i64,
    /// Natural change per 1,000 residents.
    pub natural_increase_rate: f64,
}

/// Population density of the tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationDensity {
    /// Residents per square mile of land.
    pub people_per_sq_mile: f64,
    /// Change in density over the historical window.
    pub change_over_period: Option<f64>,
}

/// Four-bucket age breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeDistribution {
    /// Residents under 18.
    pub under_18: MetricValue,
    /// Residents aged 18 to 34.
    #[serde(rename = "_18_to_34")]
    pub age_18_to_34: MetricValue,
    /// Residents aged 35 to 64.
    #[serde(rename = "_35_to_64")]
    pub age_35_to_64: MetricValue,
    /// Residents 65 and over.
    pub over_65: MetricValue,
}

/// Male / female totals and shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SexDistribution {
    /// Male residents.
    pub male: MetricValue,
    /// Female residents.
    pub female: MetricValue,
    /// Male share (%).
    pub percent_male: Option<f64>,
    /// Female share (%).
    pub percent_female: Option<f64>,
}

/// Household type breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdComposition {
    /// Total households.
    pub total_households: Option<MetricValue>,
    /// Family households (%).
    pub percent_family_households: Option<f64>,
    /// Married-couple families (%).
    pub percent_married_couple_family: Option<f64>,
    /// Non-family households (%).
    pub percent_non_family_households: Option<f64>,
}

/// Race and ethnicity shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceAndEthnicity {
    /// White alone, not Hispanic (%).
    pub percent_white_non_hispanic: Option<f64>,
    /// Black alone, not Hispanic (%).
    pub percent_black_non_hispanic: Option<f64>,
    /// Asian alone, not Hispanic (%).
    pub percent_asian_non_hispanic: Option<f64>,
    /// Hispanic or Latino of any race (%).
    pub percent_hispanic: Option<f64>,
    /// All other non-Hispanic groups (%).
    pub percent_other_non_hispanic: Option<f64>,
}

/// Socio-economic profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    /// Median household income.
    pub median_household_income: Option<MetricValue>,
    /// Adults 25+ with a bachelor's degree or higher (%).
    pub percent_bachelors_or_higher: Option<f64>,
    /// Average household size.
    pub avg_household_size: Option<MetricValue>,
    /// Household type breakdown.
    pub household_composition: Option<HouseholdComposition>,
    /// Race and ethnicity shares.
    pub race_and_ethnicity: Option<RaceAndEthnicity>,
}

/// Labor and poverty indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicContext {
    /// Share of residents below the poverty line (%).
    pub poverty_rate: Option<f64>,
    /// Residents 16+ in the labor force (%).
    pub labor_force_participation_rate: Option<f64>,
    /// Mean travel time to work.
    pub mean_commute_time_minutes: Option<MetricValue>,
}

/// Housing tenure, value, and vacancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingMetrics {
    /// Renter-occupied share of occupied units (%).
    pub percent_renter_occupied: Option<f64>,
    /// Median owner-occupied home value.
    pub median_home_value: Option<MetricValue>,
    /// Median gross rent.
    pub median_gross_rent: Option<MetricValue>,
    /// Median year structures were built.
    pub median_year_structure_built: Option<MetricValue>,
    /// Vacant share of all units (%).
    pub vacancy_rate: Option<f64>,
    /// Rental vacancy rate (%).
    pub rental_vacancy_rate: Option<f64>,
    /// Homeowner vacancy rate (%).
    pub homeowner_vacancy_rate: Option<f64>,
}

/// Walk Score and Transit Score for the address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkabilityScores {
    /// Walk Score (0-100).
    pub walk_score: Option<u32>,
    /// Walk Score label (e.g. "Walker's Paradise").
    pub walk_score_description: Option<String>,
    /// Transit Score (0-100).
    pub transit_score: Option<u32>,
    /// Transit Score label.
    pub transit_score_description: Option<String>,
}

/// Parent-geography series used as a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkData {
    /// County population series.
    pub county_trend: Vec<TrendPoint>,
}

/// Observed series, projection, and benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationTrend {
    /// Observed tract series, ascending by year.
    pub trend: Vec<TrendPoint>,
    /// Projected tract series following `trend`.
    pub projection: Vec<TrendPoint>,
    /// County benchmark series.
    pub benchmark: Option<BenchmarkData>,
}

/// The fully assembled, cacheable market profile for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSnapshot {
    /// The address as the caller supplied it.
    pub search_address: String,
    /// ACS release year the snapshot is built from.
    pub data_year: i32,
    /// Census name of the geography (e.g. "Census Tract 62.02; ...").
    pub geography_name: String,
    /// Level of `geography_name`.
    pub geography_level: GeographyLevel,
    /// FIPS hierarchy.
    pub fips: FipsCode,
    /// Tract land area in square meters.
    pub tract_area_sq_meters: u64,
    /// Resolved coordinates of the address.
    pub coordinates: Coordinates,

    /// Total population.
    pub total_population: MetricValue,
    /// Median age.
    pub median_age: MetricValue,

    /// Growth over the historical window.
    pub growth: GrowthMetrics,

    /// County migration drivers.
    pub migration: Option<MigrationData>,
    /// County natural increase.
    pub natural_increase: Option<NaturalIncreaseData>,

    /// Density of the tract.
    pub population_density: PopulationDensity,

    /// Age breakdown.
    pub age_distribution: AgeDistribution,
    /// Sex breakdown.
    pub sex_distribution: Option<SexDistribution>,
    /// Socio-economic profile.
    pub demographics: Demographics,

    /// Housing metrics.
    pub housing: HousingMetrics,

    /// Labor and poverty indicators.
    pub economic_context: Option<EconomicContext>,

    /// Walkability scores.
    pub walkability: Option<WalkabilityScores>,

    /// Observed series, projection, and benchmark.
    pub population_trends: PopulationTrend,
}

impl MarketDataSnapshot {
    /// Decodes a cached blob and validates it against the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if decoding or any semantic check fails.
    pub fn from_json(blob: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(blob)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] describing the first violation.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.fips.validate()?;

        let trends = &self.population_trends;
        check_series("trend", &trends.trend, false)?;
        check_series("projection", &trends.projection, true)?;
        if let Some(benchmark) = &trends.benchmark {
            check_series("county_trend", &benchmark.county_trend, false)?;
        }
        if let (Some(last), Some(first)) = (trends.trend.last(), trends.projection.first()) {
            if first.year <= last.year {
                return Err(SnapshotError::Trend {
                    message: format!(
                        "projection starts at {} but observed trend ends at {}",
                        first.year, last.year
                    ),
                });
            }
        }

        for (field, metric) in self.metrics() {
            if !metric.is_consistent() {
                return Err(SnapshotError::OrphanMoe { field });
            }
        }

        Ok(())
    }

    fn metrics(&self) -> Vec<(&'static str, &MetricValue)> {
        let age = &self.age_distribution;
        let mut metrics = vec![
            ("total_population", &self.total_population),
            ("median_age", &self.median_age),
            ("under_18", &age.under_18),
            ("18_to_34", &age.age_18_to_34),
            ("35_to_64", &age.age_35_to_64),
            ("over_65", &age.over_65),
        ];

        let optional = [
            (
                "median_household_income",
                self.demographics.median_household_income.as_ref(),
            ),
            (
                "avg_household_size",
                self.demographics.avg_household_size.as_ref(),
            ),
            (
                "total_households",
                self.demographics
                    .household_composition
                    .as_ref()
                    .and_then(|h| h.total_households.as_ref()),
            ),
            ("median_home_value", self.housing.median_home_value.as_ref()),
            ("median_gross_rent", self.housing.median_gross_rent.as_ref()),
            (
                "median_year_structure_built",
                self.housing.median_year_structure_built.as_ref(),
            ),
            (
                "mean_commute_time_minutes",
                self.economic_context
                    .as_ref()
                    .and_then(|e| e.mean_commute_time_minutes.as_ref()),
            ),
            ("male", self.sex_distribution.as_ref().map(|s| &s.male)),
            ("female", self.sex_distribution.as_ref().map(|s| &s.female)),
        ];
        metrics.extend(
            optional
                .into_iter()
                .filter_map(|(name, metric)| metric.map(|m| (name, m))),
        );
        metrics
    }
}

fn check_series(
    name: &str,
    points: &[TrendPoint],
    projected: bool,
) -> Result<(), SnapshotError> {
    if let Some(point) = points.iter().find(|p| p.is_projection != projected) {
        return Err(SnapshotError::Trend {
            message: format!(
                "{name} point for {} has is_projection={}",
                point.year, point.is_projection
            ),
        });
    }
    if let Some(pair) = points.windows(2).find(|w| w[1].year <= w[0].year) {
        return Err(SnapshotError::Trend {
            message: format!(
                "{name} is not ascending ({} then {})",
                pair[0].year, pair[1].year
            ),
        });
    }
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
#[allow(clippy::missing_panics_doc)]
pub mod test_support {
    //! Snapshot fixtures shared by this crate's tests.

    use super::*;

    /// Returns a small but valid snapshot.
    #[must_use]
    pub fn sample_snapshot(address: &str) -> MarketDataSnapshot {
        let metric = |value: f64| MetricValue {
            value: Some(value),
            relative_moe: Some(5.0),
        };
        MarketDataSnapshot {
            search_address: address.to_string(),
            data_year: 2023,
            geography_name: "Census Tract 62.02; District of Columbia".to_string(),
            geography_level: GeographyLevel::Tract,
            fips: FipsCode::new("11", "001", "006202").unwrap(),
            tract_area_sq_meters: 2_589_988,
            coordinates: Coordinates {
                lat: 38.8977,
                lon: -77.0365,
            },
            total_population: metric(1100.0),
            median_age: metric(34.5),
            growth: GrowthMetrics {
                period_years: 5,
                cagr: Some(2.41),
                yoy_growth: Some(1.0),
                absolute_change: Some(100),
            },
            migration: None,
            natural_increase: None,
            population_density: PopulationDensity {
                people_per_sq_mile: 1100.0,
                change_over_period: Some(100.0),
            },
            age_distribution: AgeDistribution {
                under_18: metric(200.0),
                age_18_to_34: metric(300.0),
                age_35_to_64: metric(400.0),
                over_65: metric(200.0),
            },
            sex_distribution: None,
            demographics: Demographics {
                median_household_income: Some(metric(95_000.0)),
                percent_bachelors_or_higher: Some(61.2),
                avg_household_size: None,
                household_composition: None,
                race_and_ethnicity: None,
            },
            housing: HousingMetrics {
                percent_renter_occupied: Some(55.0),
                median_home_value: None,
                median_gross_rent: None,
                median_year_structure_built: None,
                vacancy_rate: Some(4.2),
                rental_vacancy_rate: None,
                homeowner_vacancy_rate: None,
            },
            economic_context: None,
            walkability: None,
            population_trends: PopulationTrend {
                trend: vec![
                    TrendPoint::observed(2019, 1000),
                    TrendPoint::observed(2023, 1100),
                ],
                projection: vec![TrendPoint::projected(2024, 1120)],
                benchmark: Some(BenchmarkData {
                    county_trend: vec![
                        TrendPoint::observed(2019, 50_000),
                        TrendPoint::observed(2023, 52_000),
                    ],
                }),
            },
        }
    }
}
