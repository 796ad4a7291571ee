//! The market data request lifecycle.

use std::sync::Arc;

use geojson::FeatureCollection;
use realmarket_census::{CensusError, Dataset, StatisticalSource};
use realmarket_database::{DbError, ResponseCache};
use realmarket_geocoder::AddressResolver;
use realmarket_market_models::{FipsCode, GeographyLevel, MarketDataSnapshot, acs};
use realmarket_metrics::density::population_density;
use realmarket_metrics::{MetricsError, SnapshotInputs, build_snapshot, drivers};

use crate::MarketError;

/// Dataset years and windows for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Latest ACS 5-year release.
    pub acs_year: i32,
    /// Length of the historical trend window.
    pub historical_years: u32,
    /// Number of projected years.
    pub projection_years: u32,
}

impl PipelineSettings {
    /// The years of the historical window, ascending, ending at `acs_year`.
    #[must_use]
    pub fn trend_years(&self) -> Vec<i32> {
        let span = i32::try_from(self.historical_years).unwrap_or(i32::MAX);
        (self.acs_year.saturating_sub(span) + 1..=self.acs_year).collect()
    }
}

/// Resolves addresses into market data snapshots.
#[derive(Clone)]
pub struct MarketDataService {
    resolver: Arc<dyn AddressResolver>,
    source: Arc<dyn StatisticalSource>,
    cache: ResponseCache,
    settings: PipelineSettings,
}

impl MarketDataService {
    /// Creates a service over its collaborators.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        source: Arc<dyn StatisticalSource>,
        cache: ResponseCache,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            resolver,
            source,
            cache,
            settings,
        }
    }

    /// Returns the market data snapshot for an address, from the cache when
    /// possible.
    ///
    /// Only the primary ACS dataset and the tract trend are critical; any
    /// other source that fails leaves its part of the snapshot empty.
    ///
    /// # Errors
    ///
    /// * [`MarketError::GeocodingFailure`] if the address cannot be located
    /// * [`MarketError::ServiceUnavailable`] if a critical source fails
    /// * [`MarketError::NotFound`] if the tract has no ACS data
    pub async fn get_market_data(&self, address: &str) -> Result<MarketDataSnapshot, MarketError> {
        match self.cached(address).await {
            Ok(Some(snapshot)) => return Ok(snapshot),
            Ok(None) => {}
            Err(e) => log::warn!("Cache lookup for {address:?} failed, treating as miss: {e}"),
        }

        let location = self.resolver.resolve(address).await?;
        let fips = &location.fips;
        log::info!("Resolved {address:?} to tract {}", fips.geoid());

        let year = self.settings.acs_year;
        let years = self.settings.trend_years();
        let primary_vars = acs::with_moe(&acs::detailed_variables());
        let subject_vars = acs::with_moe(acs::SUBJECT_VARIABLES);
        let profile_vars = acs::with_moe(acs::PROFILE_VARIABLES);
        let source = self.source.as_ref();

        let (primary, subject, profile, tract_trend, county_trend, county, flows, walkability) = tokio::join!(
            source.fetch_large_acs(fips, year, GeographyLevel::Tract, &primary_vars),
            source.fetch_acs(fips, year, GeographyLevel::Tract, &subject_vars, Dataset::AcsSubject),
            source.fetch_acs(fips, year, GeographyLevel::Tract, &profile_vars, Dataset::AcsProfile),
            source.fetch_population_trend(fips, GeographyLevel::Tract, &years),
            source.fetch_population_trend(fips, GeographyLevel::County, &years),
            source.fetch_county_drivers(fips),
            source.fetch_migration_flows(fips),
            source.fetch_walkability(address, location.coordinates),
        );

        let primary = critical("latest_year_data", primary)?;
        let tract_trend = critical("tract_trend", tract_trend)?;
        let subject = optional("subject_data", subject);
        let profile = optional("profile_data", profile);
        let county_trend = optional("county_trend", county_trend);
        let county = optional("county_drivers", county).flatten();
        let flows = optional("migration_flows", flows).flatten();
        let walkability = optional("walkability", walkability).flatten();

        let (migration, natural_increase) = county.as_ref().map_or((None, None), |pep| {
            (
                drivers::migration(pep, flows.as_ref()),
                drivers::natural_increase(pep),
            )
        });

        #[allow(clippy::cast_precision_loss)]
        let latest_population = tract_trend.last().map_or_else(
            || primary.get(acs::TOTAL_POPULATION).unwrap_or(0.0),
            |point| point.population as f64,
        );
        let density =
            population_density(latest_population, location.land_area_sq_meters, &tract_trend);

        let snapshot = build_snapshot(SnapshotInputs {
            search_address: address,
            data_year: year,
            geography_level: GeographyLevel::Tract,
            location: &location,
            acs: &primary,
            subject: subject.as_ref(),
            profile: profile.as_ref(),
            tract_trend: &tract_trend,
            county_trend: county_trend.as_deref(),
            migration,
            natural_increase,
            population_density: density,
            walkability,
            period_years: self.settings.historical_years,
            projection_years: self.settings.projection_years,
        })
        .map_err(|e| match e {
            MetricsError::NoDemographicData => MarketError::NotFound {
                address: address.to_string(),
            },
            MetricsError::Invalid(e) => MarketError::InvalidSnapshot(e),
        })?;

        if let Err(e) = self.store(address, &snapshot).await {
            log::error!("Failed to cache snapshot for {address:?}: {e}");
        }
        Ok(snapshot)
    }

    /// Sorted distinct addresses with a cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Cache`] if the store fails.
    pub async fn list_cached_addresses(&self) -> Result<Vec<String>, MarketError> {
        let cache = self.cache.clone();
        blocking(move || cache.list_addresses()).await
    }

    /// Evicts the cached snapshot for an address, returning the rows
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Cache`] if the store fails.
    pub async fn delete_cached(&self, address: &str) -> Result<usize, MarketError> {
        let cache = self.cache.clone();
        let address = address.to_string();
        blocking(move || cache.delete(&address)).await
    }

    /// Fetches the boundary of a tract as `GeoJSON`.
    ///
    /// # Errors
    ///
    /// * [`MarketError::InvalidInput`] for malformed FIPS codes
    /// * [`MarketError::ServiceUnavailable`] if the boundary service fails
    pub async fn tract_boundary(
        &self,
        state: &str,
        county: &str,
        tract: &str,
    ) -> Result<FeatureCollection, MarketError> {
        let fips = FipsCode::new(state, county, tract)?;
        log::info!("Fetching boundary for tract {}", fips.geoid());
        self.source
            .fetch_tract_boundary(&fips)
            .await
            .map_err(|source| MarketError::ServiceUnavailable {
                task: "tract_boundary",
                source,
            })
    }

    async fn cached(&self, address: &str) -> Result<Option<MarketDataSnapshot>, MarketError> {
        let cache = self.cache.clone();
        let address = address.to_string();
        blocking(move || cache.get(&address)).await
    }

    async fn store(&self, address: &str, snapshot: &MarketDataSnapshot) -> Result<(), MarketError> {
        let cache = self.cache.clone();
        let address = address.to_string();
        let snapshot = snapshot.clone();
        blocking(move || cache.put(&address, &snapshot)).await
    }
}

/// Runs a blocking cache operation off the async worker threads.
async fn blocking<T, F>(op: F) -> Result<T, MarketError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| MarketError::Task {
            message: format!("cache task: {e}"),
        })?
        .map_err(MarketError::from)
}

fn critical<T>(task: &'static str, result: Result<T, CensusError>) -> Result<T, MarketError> {
    result.map_err(|source| {
        log::error!("Critical task {task} failed: {source}");
        MarketError::ServiceUnavailable { task, source }
    })
}

fn optional<T>(task: &str, result: Result<T, CensusError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Task {task} failed, continuing without it: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use realmarket_census::{CensusClient, CensusSettings, Endpoints};
    use realmarket_database::{CacheStore, DuckDbStore, cache_key};
    use realmarket_geocoder::GeocodeError;
    use realmarket_market_models::sources::{CensusRecord, CountyDrivers, MigrationFlows};
    use realmarket_market_models::{
        Coordinates, GeographicLocation, TrendPoint, WalkabilityScores,
    };
    use realmarket_retry::{RetryError, RetryPolicy};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct FixedResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AddressResolver for FixedResolver {
        async fn resolve(
            &self,
            address: &str,
        ) -> Result<GeographicLocation, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeocodeError::Exhausted {
                    address: address.to_string(),
                });
            }
            Ok(GeographicLocation {
                fips: FipsCode::new("11", "001", "006202").unwrap(),
                coordinates: Coordinates {
                    lat: 38.8977,
                    lon: -77.0365,
                },
                land_area_sq_meters: 2_589_988,
            })
        }
    }

    /// Scripted data source. Tasks named in `failing` return an error.
    #[derive(Default)]
    struct FakeSource {
        failing: Vec<&'static str>,
        empty_primary: bool,
        primary_calls: AtomicUsize,
        boundary_calls: Mutex<Vec<String>>,
    }

    fn unavailable(endpoint: &str) -> CensusError {
        CensusError::Unavailable {
            endpoint: endpoint.to_string(),
            source: RetryError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                url: "https://api.census.gov/data".to_string(),
            },
        }
    }

    impl FakeSource {
        fn check(&self, task: &'static str) -> Result<(), CensusError> {
            if self.failing.contains(&task) {
                Err(unavailable(task))
            } else {
                Ok(())
            }
        }
    }

    fn record(pairs: &[(&str, f64)]) -> CensusRecord {
        CensusRecord {
            name: Some("Census Tract 62.02; District of Columbia; District of Columbia".to_string()),
            values: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), Some(*v)))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[async_trait]
    impl StatisticalSource for FakeSource {
        async fn fetch_acs(
            &self,
            _fips: &FipsCode,
            _year: i32,
            _level: GeographyLevel,
            _variables: &[String],
            dataset: Dataset,
        ) -> Result<CensusRecord, CensusError> {
            match dataset {
                Dataset::AcsSubject => {
                    self.check("subject")?;
                    Ok(record(&[(acs::POVERTY_RATE, 12.3)]))
                }
                _ => {
                    self.check("profile")?;
                    Ok(record(&[(acs::MEAN_COMMUTE_TIME, 28.0)]))
                }
            }
        }

        async fn fetch_large_acs(
            &self,
            _fips: &FipsCode,
            _year: i32,
            _level: GeographyLevel,
            _variables: &[String],
        ) -> Result<CensusRecord, CensusError> {
            self.primary_calls.fetch_add(1, Ordering::SeqCst);
            self.check("primary")?;
            if self.empty_primary {
                return Ok(CensusRecord::default());
            }
            Ok(record(&[
                (acs::TOTAL_POPULATION, 1100.0),
                ("B01003_001M", 110.0),
                (acs::MEDIAN_AGE, 34.5),
            ]))
        }

        async fn fetch_population_trend(
            &self,
            _fips: &FipsCode,
            level: GeographyLevel,
            years: &[i32],
        ) -> Result<Vec<TrendPoint>, CensusError> {
            let base = match level {
                GeographyLevel::Tract => {
                    self.check("tract_trend")?;
                    1000
                }
                GeographyLevel::County => {
                    self.check("county_trend")?;
                    50_000
                }
            };
            Ok(years
                .iter()
                .zip(0..)
                .map(|(year, i)| TrendPoint::observed(*year, base + base / 40 * i))
                .collect())
        }

        async fn fetch_county_drivers(
            &self,
            _fips: &FipsCode,
        ) -> Result<Option<CountyDrivers>, CensusError> {
            self.check("drivers")?;
            Ok(Some(CountyDrivers {
                population: Some(700_000.0),
                births: Some(9000.0),
                deaths: Some(5000.0),
                domestic_migration: None,
                international_migration: Some(3000.0),
                natural_increase: Some(4000.0),
            }))
        }

        async fn fetch_migration_flows(
            &self,
            _fips: &FipsCode,
        ) -> Result<Option<MigrationFlows>, CensusError> {
            self.check("flows")?;
            Ok(Some(MigrationFlows {
                moved_in: Some(60_000.0),
                moved_out: Some(55_000.0),
                moved_net: Some(5000.0),
            }))
        }

        async fn fetch_walkability(
            &self,
            _address: &str,
            _coordinates: Coordinates,
        ) -> Result<Option<WalkabilityScores>, CensusError> {
            self.check("walkability")?;
            Ok(Some(WalkabilityScores {
                walk_score: Some(98),
                walk_score_description: Some("Walker's Paradise".to_string()),
                transit_score: Some(100),
                transit_score_description: None,
            }))
        }

        async fn fetch_tract_boundary(
            &self,
            fips: &FipsCode,
        ) -> Result<FeatureCollection, CensusError> {
            self.check("boundary")?;
            if let Ok(mut calls) = self.boundary_calls.lock() {
                calls.push(fips.geoid());
            }
            Ok(FeatureCollection {
                bbox: None,
                features: Vec::new(),
                foreign_members: None,
            })
        }
    }

    const SETTINGS: PipelineSettings = PipelineSettings {
        acs_year: 2023,
        historical_years: 5,
        projection_years: 3,
    };

    struct Harness {
        service: MarketDataService,
        resolver: Arc<FixedResolver>,
        source: Arc<FakeSource>,
        store: Arc<DuckDbStore>,
    }

    fn harness(source: FakeSource) -> Harness {
        let resolver = Arc::new(FixedResolver {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let source = Arc::new(source);
        let store = Arc::new(DuckDbStore::open_in_memory(2).unwrap());
        let service = MarketDataService::new(
            resolver.clone(),
            source.clone(),
            ResponseCache::new(store.clone()),
            SETTINGS,
        );
        Harness {
            service,
            resolver,
            source,
            store,
        }
    }

    #[test]
    fn trend_years_end_at_acs_year() {
        assert_eq!(SETTINGS.trend_years(), vec![2019, 2020, 2021, 2022, 2023]);
    }

    #[tokio::test]
    async fn assembles_full_snapshot_and_caches_it() {
        let h = harness(FakeSource::default());
        let snapshot = h.service.get_market_data("1600 Pennsylvania Ave NW").await.unwrap();

        assert_eq!(snapshot.fips.geoid(), "11001006202");
        assert_eq!(snapshot.total_population.value, Some(1100.0));
        assert_eq!(snapshot.walkability.as_ref().unwrap().walk_score, Some(98));
        assert_eq!(snapshot.migration.as_ref().unwrap().net_migration, 5000);
        assert_eq!(snapshot.natural_increase.as_ref().unwrap().natural_change, 4000);
        assert_eq!(snapshot.economic_context.as_ref().unwrap().poverty_rate, Some(12.3));
        assert_eq!(snapshot.population_trends.trend.len(), 5);
        assert_eq!(snapshot.population_trends.projection.len(), 3);
        assert_eq!(snapshot.population_trends.projection[0].year, 2024);
        assert!(snapshot.population_trends.benchmark.is_some());
        assert!((snapshot.population_density.people_per_sq_mile - 1100.0).abs() < 0.01);

        let again = h.service.get_market_data("  1600 PENNSYLVANIA ave nw").await.unwrap();
        assert_eq!(again, snapshot);
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.service.list_cached_addresses().await.unwrap(),
            vec!["1600 Pennsylvania Ave NW".to_string()]
        );
    }

    #[tokio::test]
    async fn non_critical_failures_degrade_to_none() {
        let h = harness(FakeSource {
            failing: vec!["walkability", "drivers", "county_trend", "subject", "profile"],
            ..FakeSource::default()
        });
        let snapshot = h.service.get_market_data("1 Main St").await.unwrap();

        assert!(snapshot.walkability.is_none());
        assert!(snapshot.migration.is_none());
        assert!(snapshot.natural_increase.is_none());
        assert!(snapshot.economic_context.is_none());
        assert!(snapshot.population_trends.benchmark.is_none());
        assert!(snapshot.population_trends.projection.is_empty());
        assert_eq!(snapshot.median_age.value, Some(34.5));
    }

    #[tokio::test]
    async fn migration_needs_flows_but_natural_increase_does_not() {
        let h = harness(FakeSource {
            failing: vec!["flows"],
            ..FakeSource::default()
        });
        let snapshot = h.service.get_market_data("1 Main St").await.unwrap();
        assert!(snapshot.migration.is_none());
        assert!(snapshot.natural_increase.is_some());
    }

    #[tokio::test]
    async fn critical_failure_is_unavailable_and_not_cached() {
        for task in ["primary", "tract_trend"] {
            let h = harness(FakeSource {
                failing: vec![task],
                ..FakeSource::default()
            });
            let result = h.service.get_market_data("1 Main St").await;
            assert!(
                matches!(result, Err(MarketError::ServiceUnavailable { .. })),
                "{task}: {result:?}"
            );
            assert!(h.service.list_cached_addresses().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn census_outage_is_unavailable_not_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let census = CensusClient::new(
            reqwest::Client::new(),
            Endpoints {
                census_root: format!("{}/data", server.uri()),
                walkscore_url: format!("{}/score", server.uri()),
                tigerweb_url: format!("{}/tigerweb/query", server.uri()),
            },
            CensusSettings {
                census_api_key: None,
                walkscore_api_key: None,
                pep_year: 2019,
                flows_year: 2022,
                max_concurrent_requests: 8,
            },
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        );
        let store = Arc::new(DuckDbStore::open_in_memory(1).unwrap());
        let service = MarketDataService::new(
            Arc::new(FixedResolver {
                calls: AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(census),
            ResponseCache::new(store),
            SETTINGS,
        );

        let result = service.get_market_data("1 Main St").await;
        assert!(
            matches!(
                result,
                Err(MarketError::ServiceUnavailable {
                    task: "latest_year_data",
                    ..
                })
            ),
            "{result:?}"
        );
        assert!(service.list_cached_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_cached_blob_is_recomputed_and_rewritten() {
        let h = harness(FakeSource::default());
        let key = cache_key("1 Main St");
        h.store
            .put(&key, r#"{"search_address":"1 Main St"}"#, "1 Main St")
            .unwrap();

        let snapshot = h.service.get_market_data("1 main st").await.unwrap();
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.source.primary_calls.load(Ordering::SeqCst), 1);

        let stored = h.store.get(&key).unwrap().unwrap();
        assert_eq!(MarketDataSnapshot::from_json(&stored.snapshot).unwrap(), snapshot);

        let again = h.service.get_market_data("1 Main St").await.unwrap();
        assert_eq!(again, snapshot);
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_primary_dataset_is_not_found() {
        let h = harness(FakeSource {
            empty_primary: true,
            ..FakeSource::default()
        });
        let result = h.service.get_market_data("1 Main St").await;
        assert!(matches!(result, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn geocoding_failure_is_surfaced() {
        let resolver = Arc::new(FixedResolver {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let store = Arc::new(DuckDbStore::open_in_memory(1).unwrap());
        let service = MarketDataService::new(
            resolver,
            Arc::new(FakeSource::default()),
            ResponseCache::new(store),
            SETTINGS,
        );
        let result = service.get_market_data("nowhere").await;
        assert!(matches!(result, Err(MarketError::GeocodingFailure(_))));
    }

    #[tokio::test]
    async fn delete_evicts_cached_snapshot() {
        let h = harness(FakeSource::default());
        h.service.get_market_data("1 Main St").await.unwrap();
        assert_eq!(h.service.delete_cached("1 MAIN ST").await.unwrap(), 1);
        assert!(h.service.list_cached_addresses().await.unwrap().is_empty());

        h.service.get_market_data("1 Main St").await.unwrap();
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn tract_boundary_validates_fips() {
        let h = harness(FakeSource::default());
        let result = h.service.tract_boundary("1", "001", "006202").await;
        assert!(matches!(result, Err(MarketError::InvalidInput(_))));

        h.service.tract_boundary("11", "001", "006202").await.unwrap();
        assert_eq!(
            *h.source.boundary_calls.lock().unwrap(),
            vec!["11001006202".to_string()]
        );
    }

    #[tokio::test]
    async fn tract_boundary_failure_is_unavailable() {
        let h = harness(FakeSource {
            failing: vec!["boundary"],
            ..FakeSource::default()
        });
        let result = h.service.tract_boundary("11", "001", "006202").await;
        assert!(matches!(
            result,
            Err(MarketError::ServiceUnavailable {
                task: "tract_boundary",
                ..
            })
        ));
    }
}
