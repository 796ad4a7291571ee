#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistical data client for the market data pipeline.
//!
//! Wraps the Census Bureau data API (ACS detailed, subject, profile and
//! flows tables, PEP population and components), the Walk Score API, and
//! the `TIGERweb` tract layer behind one [`CensusClient`].
//!
//! All outbound calls share one `reqwest::Client`, are bounded by a shared
//! semaphore, and retry transient failures through [`realmarket_retry`].
//! Census "no data" answers (HTTP 204, an empty body, or a table without a
//! data row) produce an empty [`CensusRecord`] rather than an error.
//!
//! The [`StatisticalSource`] trait is the seam the orchestrator fans out
//! over, so it can be replaced with a fake in tests.

pub mod client;
pub mod pep;
pub mod table;
pub mod tigerweb;
pub mod walkscore;

use async_trait::async_trait;
use geojson::FeatureCollection;
use realmarket_market_models::sources::{CensusRecord, CountyDrivers, MigrationFlows};
use realmarket_market_models::{
    Coordinates, FipsCode, GeographyLevel, TrendPoint, WalkabilityScores,
};
use realmarket_retry::RetryError;
use thiserror::Error;

pub use crate::client::{
    CensusClient, CensusSettings, Dataset, Endpoints, MAX_VARIABLES_PER_REQUEST,
};

/// Errors from the statistical data sources.
#[derive(Debug, Error)]
pub enum CensusError {
    /// The endpoint kept failing after retries, or failed permanently.
    #[error("{endpoint} unavailable: {source}")]
    Unavailable {
        /// Which endpoint was called.
        endpoint: String,
        /// Final request error.
        #[source]
        source: RetryError,
    },

    /// The response body did not have the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The request limiter was closed.
    #[error("Request limiter closed")]
    LimiterClosed,
}

impl CensusError {
    /// Whether retrying the request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { source, .. } => source.is_transient(),
            Self::Parse { .. } | Self::LimiterClosed => false,
        }
    }
}

/// The data sources the orchestrator fans out to.
#[async_trait]
pub trait StatisticalSource: Send + Sync {
    /// Fetches one ACS table for a geography. `NAME` is always included.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request fails after retries.
    async fn fetch_acs(
        &self,
        fips: &FipsCode,
        year: i32,
        level: GeographyLevel,
        variables: &[String],
        dataset: Dataset,
    ) -> Result<CensusRecord, CensusError>;

    /// Fetches a long ACS variable list in chunks, skipping failed chunks.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if every chunk fails.
    async fn fetch_large_acs(
        &self,
        fips: &FipsCode,
        year: i32,
        level: GeographyLevel,
        variables: &[String],
    ) -> Result<CensusRecord, CensusError>;

    /// Fetches total population for each year, dropping missing years.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if any year's request fails.
    async fn fetch_population_trend(
        &self,
        fips: &FipsCode,
        level: GeographyLevel,
        years: &[i32],
    ) -> Result<Vec<TrendPoint>, CensusError>;

    /// Fetches PEP county population and components of change.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the source cannot be queried at all.
    async fn fetch_county_drivers(
        &self,
        fips: &FipsCode,
    ) -> Result<Option<CountyDrivers>, CensusError>;

    /// Fetches county migration flows.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request fails after retries.
    async fn fetch_migration_flows(
        &self,
        fips: &FipsCode,
    ) -> Result<Option<MigrationFlows>, CensusError>;

    /// Fetches Walk Score and Transit Score. `None` without an API key.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request fails.
    async fn fetch_walkability(
        &self,
        address: &str,
        coordinates: Coordinates,
    ) -> Result<Option<WalkabilityScores>, CensusError>;

    /// Fetches the tract polygon. Empty collection when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request fails after retries.
    async fn fetch_tract_boundary(
        &self,
        fips: &FipsCode,
    ) -> Result<FeatureCollection, CensusError>;
}

#[async_trait]
impl StatisticalSource for CensusClient {
    async fn fetch_acs(
        &self,
        fips: &FipsCode,
        year: i32,
        level: GeographyLevel,
        variables: &[String],
        dataset: Dataset,
    ) -> Result<CensusRecord, CensusError> {
        self.fetch(dataset, year, fips, level, variables).await
    }

    async fn fetch_large_acs(
        &self,
        fips: &FipsCode,
        year: i32,
        level: GeographyLevel,
        variables: &[String],
    ) -> Result<CensusRecord, CensusError> {
        self.fetch_chunked(year, fips, level, variables).await
    }

    async fn fetch_population_trend(
        &self,
        fips: &FipsCode,
        level: GeographyLevel,
        years: &[i32],
    ) -> Result<Vec<TrendPoint>, CensusError> {
        self.population_trend(fips, level, years).await
    }

    async fn fetch_county_drivers(
        &self,
        fips: &FipsCode,
    ) -> Result<Option<CountyDrivers>, CensusError> {
        Ok(self.county_drivers(fips).await)
    }

    async fn fetch_migration_flows(
        &self,
        fips: &FipsCode,
    ) -> Result<Option<MigrationFlows>, CensusError> {
        self.migration_flows(fips).await
    }

    async fn fetch_walkability(
        &self,
        address: &str,
        coordinates: Coordinates,
    ) -> Result<Option<WalkabilityScores>, CensusError> {
        self.walkability(address, coordinates).await
    }

    async fn fetch_tract_boundary(
        &self,
        fips: &FipsCode,
    ) -> Result<FeatureCollection, CensusError> {
        self.tract_boundary(fips).await
    }
}
