#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Market data orchestration.
//!
//! [`MarketDataService`] runs one request lifecycle: cache check, geocode,
//! concurrent fetch of every statistical source, metric derivation,
//! snapshot assembly, and cache write. [`config::AppConfig`] and
//! [`context::build_service`] wire the production collaborators together.

pub mod config;
pub mod context;
pub mod service;

use realmarket_census::CensusError;
use realmarket_database::DbError;
use realmarket_geocoder::GeocodeError;
use realmarket_market_models::SnapshotError;
use realmarket_market_models::fips::FipsError;
use thiserror::Error;

pub use crate::config::AppConfig;
pub use crate::context::build_service;
pub use crate::service::{MarketDataService, PipelineSettings};

/// Errors surfaced by the market data service.
#[derive(Debug, Error)]
pub enum MarketError {
    /// No geocoding provider could locate the address.
    #[error("Geocoding failed: {0}")]
    GeocodingFailure(#[from] GeocodeError),

    /// A critical data source failed after exhausting retries.
    #[error("Failed to fetch required data for {task}: {source}")]
    ServiceUnavailable {
        /// Which fetch failed.
        task: &'static str,
        /// Final source error.
        #[source]
        source: CensusError,
    },

    /// The address geocoded but no demographic data exists for its tract.
    #[error("No demographic data found for {address:?}")]
    NotFound {
        /// The address as given.
        address: String,
    },

    /// Malformed FIPS codes.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] FipsError),

    /// The assembled snapshot broke a schema invariant.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),

    /// The cache store failed.
    #[error("Cache error: {0}")]
    Cache(#[from] DbError),

    /// A background task panicked or was cancelled.
    #[error("Task error: {message}")]
    Task {
        /// Description of what went wrong.
        message: String,
    },

    /// A collaborator could not be constructed at startup.
    #[error("Startup error: {message}")]
    Startup {
        /// Description of what went wrong.
        message: String,
    },
}
