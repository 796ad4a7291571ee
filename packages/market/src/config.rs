//! Process configuration read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::MarketError;

/// `CACHE_DB_PATH` value that selects an in-memory cache.
pub const IN_MEMORY: &str = ":memory:";

const DEFAULT_USER_AGENT: &str = "realmarket/0.1 (market data lookup)";

/// Settings for the market data pipeline and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `CENSUS_API_KEY`.
    pub census_api_key: Option<String>,
    /// `WALKSCORE_API_KEY`. Walkability is skipped without it.
    pub walkscore_api_key: Option<String>,
    /// `CACHE_DB_PATH`, or [`IN_MEMORY`].
    pub cache_db_path: PathBuf,
    /// `HTTP_TIMEOUT_SECS`, per outbound request.
    pub http_timeout: Duration,
    /// `MAX_CONCURRENT_REQUESTS` across all data sources.
    pub max_concurrent_requests: usize,
    /// `GEOCODER_USER_AGENT`, sent to Nominatim.
    pub geocoder_user_agent: String,
    /// Latest ACS 5-year release.
    pub acs_year: i32,
    /// PEP vintage for county drivers.
    pub pep_year: i32,
    /// ACS flows release year.
    pub flows_year: i32,
    /// Length of the historical trend window.
    pub historical_years: u32,
    /// Number of projected years.
    pub projection_years: u32,
    /// Pooled cache database connections.
    pub cache_pool_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            census_api_key: None,
            walkscore_api_key: None,
            cache_db_path: realmarket_database::paths::market_cache_db_path(),
            http_timeout: Duration::from_secs(20),
            max_concurrent_requests: 8,
            geocoder_user_agent: DEFAULT_USER_AGENT.to_string(),
            acs_year: 2023,
            pep_year: 2019,
            flows_year: 2022,
            historical_years: 5,
            projection_years: 3,
            cache_pool_size: 4,
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Startup`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, MarketError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset or blank variables.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Startup`] if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MarketError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            census_api_key: get("CENSUS_API_KEY"),
            walkscore_api_key: get("WALKSCORE_API_KEY"),
            cache_db_path: get("CACHE_DB_PATH").map_or(defaults.cache_db_path, PathBuf::from),
            http_timeout: parse(&get, "HTTP_TIMEOUT_SECS")?
                .map_or(defaults.http_timeout, Duration::from_secs),
            max_concurrent_requests: parse(&get, "MAX_CONCURRENT_REQUESTS")?
                .unwrap_or(defaults.max_concurrent_requests),
            geocoder_user_agent: get("GEOCODER_USER_AGENT").unwrap_or(defaults.geocoder_user_agent),
            ..defaults
        })
    }

    /// Whether the cache should live in memory only.
    #[must_use]
    pub fn in_memory_cache(&self) -> bool {
        self.cache_db_path.as_os_str() == IN_MEMORY
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, MarketError> {
    get(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| MarketError::Startup {
                message: format!("{name} must be a number, got {raw:?}"),
            })
        })
        .transpose()
}
