//! Production wiring of the market data service.

use std::sync::Arc;

use realmarket_census::{CensusClient, CensusSettings, Endpoints};
use realmarket_database::{DuckDbStore, ResponseCache};
use realmarket_geocoder::{GeocoderSettings, GeocodingResolver};
use realmarket_retry::RetryPolicy;

use crate::service::{MarketDataService, PipelineSettings};
use crate::{AppConfig, MarketError};

/// Builds the shared HTTP client, the geocoder, the census client, and the
/// cache store described by `config`.
///
/// # Errors
///
/// Returns [`MarketError::Startup`] if the HTTP client cannot be built, or
/// [`MarketError::Cache`] if the cache database cannot be opened.
pub fn build_service(config: &AppConfig) -> Result<MarketDataService, MarketError> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| MarketError::Startup {
            message: format!("HTTP client: {e}"),
        })?;
    let policy = RetryPolicy::default();

    let resolver = GeocodingResolver::from_registry(
        &http,
        &GeocoderSettings {
            user_agent: config.geocoder_user_agent.clone(),
            census_api_key: config.census_api_key.clone(),
            acs_year: config.acs_year,
        },
        policy,
    );
    log::info!("Geocoder ready with {} provider paths", resolver.provider_count());

    let census = CensusClient::new(
        http,
        Endpoints::default(),
        CensusSettings {
            census_api_key: config.census_api_key.clone(),
            walkscore_api_key: config.walkscore_api_key.clone(),
            pep_year: config.pep_year,
            flows_year: config.flows_year,
            max_concurrent_requests: config.max_concurrent_requests,
        },
        policy,
    );

    let store = if config.in_memory_cache() {
        log::warn!("Using an in-memory market cache; entries are lost on exit");
        DuckDbStore::open_in_memory(config.cache_pool_size)?
    } else {
        DuckDbStore::open(&config.cache_db_path, config.cache_pool_size)?
    };

    Ok(MarketDataService::new(
        Arc::new(resolver),
        Arc::new(census),
        ResponseCache::new(Arc::new(store)),
        PipelineSettings {
            acs_year: config.acs_year,
            historical_years: config.historical_years,
            projection_years: config.projection_years,
        },
    ))
}
