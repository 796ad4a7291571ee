#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resolves a free-form US address to its census tract.
//!
//! Provider paths are configured via TOML files in `services/` and tried
//! in priority order:
//!
//! 1. **Hybrid** (priority 1): Nominatim for coordinates, the Census
//!    geographies-by-coordinates endpoint for the tract, and the Census
//!    GEOINFO API for the tract's land area.
//! 2. **Census one-line** (priority 2): a single Census request that maps
//!    the address string straight to a tract.
//!
//! Each path is retried on its own (see [`realmarket_retry::with_backoff`])
//! before the resolver moves on to the next one. The first path that
//! produces a full [`GeographicLocation`] wins.

pub mod census;
pub mod nominatim;
pub mod service_registry;
pub mod strategy;

use async_trait::async_trait;
use realmarket_market_models::GeographicLocation;
use realmarket_market_models::fips::FipsError;
use realmarket_retry::{RetryError, RetryPolicy};
use thiserror::Error;

use crate::service_registry::GeocodingService;
pub use crate::strategy::{GeocodeStrategy, HybridStrategy, OnelineStrategy};

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed after the request-level checks.
    #[error(transparent)]
    Http(#[from] RetryError),

    /// The provider answered but had no match for the address.
    #[error("{provider} found no match for {address:?}")]
    NoMatch {
        /// Provider path that was asked.
        provider: String,
        /// The address as given.
        address: String,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider returned malformed FIPS codes.
    #[error(transparent)]
    Fips(#[from] FipsError),

    /// Every provider path failed.
    #[error("Address {address:?} could not be geocoded")]
    Exhausted {
        /// The address as given.
        address: String,
    },
}

impl GeocodeError {
    /// Whether the failure is worth retrying on the same provider path.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_transient(),
            Self::NoMatch { .. } | Self::Parse { .. } | Self::Fips(_) | Self::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Resolves an address string to a tract location.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Returns the location of `address`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Exhausted`] when no provider can locate it.
    async fn resolve(&self, address: &str) -> Result<GeographicLocation, GeocodeError>;
}

/// Settings shared by every provider path.
#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    /// `User-Agent` sent to Nominatim (required by its usage policy).
    pub user_agent: String,
    /// Census data API key used for the GEOINFO refinement.
    pub census_api_key: Option<String>,
    /// ACS release year used to pick the geography vintage.
    pub acs_year: i32,
}

impl GeocoderSettings {
    /// The Census geocoder vintage that matches `acs_year`.
    #[must_use]
    pub fn vintage(&self) -> String {
        format!("ACS{}_Current", self.acs_year)
    }
}

/// Tries each provider path in order until one resolves the address.
pub struct GeocodingResolver {
    strategies: Vec<Box<dyn GeocodeStrategy>>,
    policy: RetryPolicy,
}

impl GeocodingResolver {
    /// Creates a resolver over an explicit, ordered list of strategies.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn GeocodeStrategy>>, policy: RetryPolicy) -> Self {
        Self { strategies, policy }
    }

    /// Builds strategies for the given provider configurations, in order.
    #[must_use]
    pub fn from_services(
        client: &reqwest::Client,
        services: &[GeocodingService],
        settings: &GeocoderSettings,
        policy: RetryPolicy,
    ) -> Self {
        let strategies = services
            .iter()
            .map(|service| strategy::build(service, client, settings))
            .collect();
        Self::new(strategies, policy)
    }

    /// Builds the resolver from the enabled services in the embedded
    /// registry.
    #[must_use]
    pub fn from_registry(
        client: &reqwest::Client,
        settings: &GeocoderSettings,
        policy: RetryPolicy,
    ) -> Self {
        let services = service_registry::enabled_services();
        log::debug!(
            "Geocoding providers: {}",
            services
                .iter()
                .map(|s| s.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self::from_services(client, &services, settings, policy)
    }

    /// Number of configured provider paths.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.strategies.len()
    }
}

#[async_trait]
impl AddressResolver for GeocodingResolver {
    async fn resolve(&self, address: &str) -> Result<GeographicLocation, GeocodeError> {
        for strategy in &self.strategies {
            log::info!("Geocoding {address:?} with {}", strategy.id());
            let attempt = realmarket_retry::with_backoff(
                &self.policy,
                strategy.id(),
                GeocodeError::is_transient,
                || strategy.locate(address),
            )
            .await;

            match attempt {
                Ok(location) => {
                    let fips = &location.fips;
                    log::info!(
                        "Geocoded {address:?} via {} to {}-{}-{}",
                        strategy.id(),
                        fips.state,
                        fips.county,
                        fips.tract
                    );
                    return Ok(location);
                }
                Err(e) => log::warn!("{} failed for {address:?}: {e}", strategy.id()),
            }
        }

        log::error!("All geocoding providers failed for {address:?}");
        Err(GeocodeError::Exhausted {
            address: address.to_string(),
        })
    }
}
