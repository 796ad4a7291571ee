//! Census Bureau data API client.
//!
//! `GET {root}/{year}/{dataset}?get=NAME,VAR1,...&for=tract:T&in=state:S county:C&key=K`

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use realmarket_market_models::sources::CensusRecord;
use realmarket_market_models::{FipsCode, GeographyLevel, TrendPoint, acs};
use realmarket_retry::{RetryError, RetryPolicy};
use reqwest::StatusCode;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::CensusError;
use crate::table::parse_table;

/// Largest variable list sent in one request. The API rejects more than
/// 50 `get` columns, and `NAME` takes one of them.
pub const MAX_VARIABLES_PER_REQUEST: usize = 45;

/// Census data API datasets the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum Dataset {
    /// ACS 5-year detailed tables.
    #[strum(serialize = "acs/acs5")]
    AcsDetailed,
    /// ACS 5-year subject tables.
    #[strum(serialize = "acs/acs5/subject")]
    AcsSubject,
    /// ACS 5-year data profiles.
    #[strum(serialize = "acs/acs5/profile")]
    AcsProfile,
    /// PEP population totals.
    #[strum(serialize = "pep/population")]
    PepPopulation,
    /// PEP components of change.
    #[strum(serialize = "pep/components")]
    PepComponents,
    /// ACS county-to-county migration flows.
    #[strum(serialize = "acs/flows")]
    AcsFlows,
}

impl Dataset {
    /// Whether the `NAME` column is requested alongside the variables.
    #[must_use]
    pub const fn includes_name(self) -> bool {
        matches!(self, Self::AcsDetailed | Self::AcsSubject | Self::AcsProfile)
    }
}

/// Base URLs of the external services.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Census data API root (e.g., `"https://api.census.gov/data"`).
    pub census_root: String,
    /// Walk Score score endpoint.
    pub walkscore_url: String,
    /// `TIGERweb` tract layer query endpoint.
    pub tigerweb_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            census_root: "https://api.census.gov/data".to_string(),
            walkscore_url: "https://api.walkscore.com/score".to_string(),
            tigerweb_url: "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/Tracts_Blocks/MapServer/2/query".to_string(),
        }
    }
}

/// Keys, dataset years, and limits for the client.
#[derive(Debug, Clone)]
pub struct CensusSettings {
    /// Census data API key. Requests work without one at a lower quota.
    pub census_api_key: Option<String>,
    /// Walk Score API key. Walkability is skipped without one.
    pub walkscore_api_key: Option<String>,
    /// PEP vintage for county drivers.
    pub pep_year: i32,
    /// ACS flows release year.
    pub flows_year: i32,
    /// Maximum in-flight requests across all clones of the client.
    pub max_concurrent_requests: usize,
}

/// Client for the statistical data sources. Cheap to clone; clones share
/// the HTTP connection pool and the request limiter.
#[derive(Clone)]
pub struct CensusClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoints: Arc<Endpoints>,
    pub(crate) settings: Arc<CensusSettings>,
    pub(crate) policy: RetryPolicy,
    limiter: Arc<Semaphore>,
}

impl CensusClient {
    /// Creates a client.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        settings: CensusSettings,
        policy: RetryPolicy,
    ) -> Self {
        let permits = settings.max_concurrent_requests.max(1);
        Self {
            http,
            endpoints: Arc::new(endpoints),
            settings: Arc::new(settings),
            policy,
            limiter: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Waits for a free request slot.
    pub(crate) async fn permit(&self) -> Result<SemaphorePermit<'_>, CensusError> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| CensusError::LimiterClosed)
    }

    /// Fetches one table row of `variables` for a geography.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError::Unavailable`] once retries are exhausted or
    /// the API rejects the request, and [`CensusError::Parse`] for a
    /// malformed body.
    pub async fn fetch(
        &self,
        dataset: Dataset,
        year: i32,
        fips: &FipsCode,
        level: GeographyLevel,
        variables: &[String],
    ) -> Result<CensusRecord, CensusError> {
        let mut columns: Vec<&str> = Vec::with_capacity(variables.len() + 1);
        if dataset.includes_name() {
            columns.push("NAME");
        }
        columns.extend(variables.iter().map(String::as_str));

        let url = format!("{}/{year}/{dataset}", self.endpoints.census_root);
        let (for_clause, in_clause) = geo_clauses(fips, level);
        let mut params = vec![
            ("get", columns.join(",")),
            ("for", for_clause),
            ("in", in_clause),
        ];
        if let Some(key) = &self.settings.census_api_key {
            params.push(("key", key.clone()));
        }

        log::debug!(
            "Fetching {dataset} {year} for {level} {}: {} variables",
            fips.geoid(),
            variables.len()
        );

        let label = format!("Census {dataset} {year}");
        let body = self.get_table(&label, &url, &params).await?;
        let Some(body) = body else {
            log::warn!("{label}: 204 No Content for {level} {}", fips.geoid());
            return Ok(CensusRecord::default());
        };

        let mut record = parse_table(&body)?;
        if !record.is_empty() {
            for variable in variables {
                record.values.entry(variable.clone()).or_insert(None);
            }
        }
        Ok(record)
    }

    /// Fetches a long ACS detailed-table variable list in chunks of
    /// [`MAX_VARIABLES_PER_REQUEST`], merging the chunks that succeed.
    ///
    /// # Errors
    ///
    /// Failed chunks are logged and skipped as long as one chunk succeeds.
    /// If every chunk fails, returns the last chunk's [`CensusError`].
    pub async fn fetch_chunked(
        &self,
        year: i32,
        fips: &FipsCode,
        level: GeographyLevel,
        variables: &[String],
    ) -> Result<CensusRecord, CensusError> {
        let chunks: Vec<&[String]> = variables.chunks(MAX_VARIABLES_PER_REQUEST).collect();
        let results = join_all(
            chunks
                .iter()
                .map(|chunk| self.fetch(Dataset::AcsDetailed, year, fips, level, chunk)),
        )
        .await;

        let mut merged = CensusRecord::default();
        let mut succeeded = 0;
        let mut last_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(record) => {
                    succeeded += 1;
                    merged.merge(record);
                }
                Err(CensusError::LimiterClosed) => return Err(CensusError::LimiterClosed),
                Err(e) => {
                    log::warn!(
                        "Skipping ACS chunk {}/{} for {}: {e}",
                        index + 1,
                        chunks.len(),
                        fips.geoid()
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => {
                log::error!("All {} ACS chunks failed for {}", chunks.len(), fips.geoid());
                Err(e)
            }
            _ => Ok(merged),
        }
    }

    /// Fetches total population for each year.
    ///
    /// Years with a missing or zero population are dropped; the result is
    /// ascending by year.
    ///
    /// # Errors
    ///
    /// Returns the first [`CensusError`] if any year fails.
    pub async fn population_trend(
        &self,
        fips: &FipsCode,
        level: GeographyLevel,
        years: &[i32],
    ) -> Result<Vec<TrendPoint>, CensusError> {
        let variables = [acs::TOTAL_POPULATION.to_string()];
        let results = join_all(
            years
                .iter()
                .map(|year| self.fetch(Dataset::AcsDetailed, *year, fips, level, &variables)),
        )
        .await;

        let mut trend = Vec::with_capacity(years.len());
        for (year, result) in years.iter().zip(results) {
            let record = result?;
            match record.get(acs::TOTAL_POPULATION).filter(|p| *p > 0.0) {
                Some(population) => trend.push(TrendPoint::observed(*year, round_count(population))),
                None => log::debug!("No {level} population for {} in {year}", fips.geoid()),
            }
        }
        trend.sort_by_key(|p| p.year);
        Ok(trend)
    }

    /// Runs `op` with retries, taking a request slot for each attempt so
    /// backoff sleeps do not hold one.
    pub(crate) async fn with_permit_retries<T, F, Fut>(
        &self,
        label: &str,
        op: F,
    ) -> Result<T, CensusError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RetryError>>,
    {
        let op = &op;
        realmarket_retry::with_backoff(&self.policy, label, CensusError::is_transient, || async move {
            let _permit = self.permit().await?;
            op().await.map_err(|source| CensusError::Unavailable {
                endpoint: label.to_string(),
                source,
            })
        })
        .await
    }

    /// Sends a GET with retries and returns the body, or `None` on 204.
    async fn get_table(
        &self,
        label: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Option<String>, CensusError> {
        let http = &self.http;
        self.with_permit_retries(label, || async move {
            let response =
                realmarket_retry::send(&RetryPolicy::single(), || http.get(url).query(params))
                    .await?;
            if response.status() == StatusCode::NO_CONTENT {
                return Ok(None);
            }
            Ok::<_, RetryError>(Some(response.text().await?))
        })
        .await
    }
}

/// Builds the `for` / `in` clauses for a geography.
#[must_use]
pub fn geo_clauses(fips: &FipsCode, level: GeographyLevel) -> (String, String) {
    match level {
        GeographyLevel::Tract => (
            format!("tract:{}", fips.tract),
            format!("state:{} county:{}", fips.state, fips.county),
        ),
        GeographyLevel::County => (
            format!("county:{}", fips.county),
            format!("state:{}", fips.state),
        ),
    }
}

/// Rounds a parsed count to an integer.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn round_count(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    pub fn fips() -> FipsCode {
        FipsCode::new("11", "001", "006202").unwrap()
    }

    pub fn client(server: &MockServer, walkscore_api_key: Option<&str>) -> CensusClient {
        limited_client(
            server,
            walkscore_api_key,
            4,
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4)),
        )
    }

    fn limited_client(
        server: &MockServer,
        walkscore_api_key: Option<&str>,
        max_concurrent_requests: usize,
        policy: RetryPolicy,
    ) -> CensusClient {
        CensusClient::new(
            reqwest::Client::new(),
            Endpoints {
                census_root: format!("{}/data", server.uri()),
                walkscore_url: format!("{}/score", server.uri()),
                tigerweb_url: format!("{}/tigerweb/query", server.uri()),
            },
            CensusSettings {
                census_api_key: Some("census-key".to_string()),
                walkscore_api_key: walkscore_api_key.map(str::to_string),
                pep_year: 2019,
                flows_year: 2022,
                max_concurrent_requests,
            },
            policy,
        )
    }

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn builds_geo_clauses() {
        assert_eq!(
            geo_clauses(&fips(), GeographyLevel::Tract),
            ("tract:006202".to_string(), "state:11 county:001".to_string())
        );
        assert_eq!(
            geo_clauses(&fips(), GeographyLevel::County),
            ("county:001".to_string(), "state:11".to_string())
        );
    }

    #[test]
    fn dataset_paths() {
        assert_eq!(Dataset::AcsSubject.to_string(), "acs/acs5/subject");
        assert_eq!(Dataset::PepComponents.as_ref(), "pep/components");
        assert!(!Dataset::AcsFlows.includes_name());
    }

    #[tokio::test]
    async fn requests_name_and_geography() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2023/acs/acs5"))
            .and(query_param("get", "NAME,B01003_001E,B01003_001M"))
            .and(query_param("for", "tract:006202"))
            .and(query_param("in", "state:11 county:001"))
            .and(query_param("key", "census-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                ["NAME", "B01003_001E", "B01003_001M", "state", "county", "tract"],
                ["Census Tract 62.02", "4312", "310", "11", "001", "006202"]
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let record = client(&server, None)
            .fetch(
                Dataset::AcsDetailed,
                2023,
                &fips(),
                GeographyLevel::Tract,
                &vars(&["B01003_001E", "B01003_001M"]),
            )
            .await
            .unwrap();
        assert_eq!(record.name.as_deref(), Some("Census Tract 62.02"));
        assert_eq!(record.get("B01003_001E"), Some(4312.0));
        assert_eq!(record.get("B01003_001M"), Some(310.0));
    }

    #[tokio::test]
    async fn no_content_is_empty_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let record = client(&server, None)
            .fetch(
                Dataset::AcsDetailed,
                2019,
                &fips(),
                GeographyLevel::Tract,
                &vars(&["B01003_001E"]),
            )
            .await
            .unwrap();
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, None)
            .fetch(
                Dataset::AcsDetailed,
                2023,
                &fips(),
                GeographyLevel::Tract,
                &vars(&["B01003_001E"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CensusError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn chunked_fetch_merges_successful_chunks() {
        let server = MockServer::start().await;
        let variables: Vec<String> = (1..=50).map(|i| format!("B99999_{i:03}E")).collect();
        let first_get = format!("NAME,{}", variables[..45].join(","));
        let mut header = vec!["NAME".to_string()];
        header.extend(variables[..45].iter().cloned());
        let mut row = vec!["Tract".to_string()];
        row.extend((0..45).map(|i| i.to_string()));

        Mock::given(method("GET"))
            .and(query_param("get", first_get.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([header, row])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let record = client(&server, None)
            .fetch_chunked(2023, &fips(), GeographyLevel::Tract, &variables)
            .await
            .unwrap();
        assert_eq!(record.values.len(), 45);
        assert_eq!(record.get("B99999_045E"), Some(44.0));
        assert_eq!(record.get("B99999_046E"), None);
    }

    #[tokio::test]
    async fn chunked_fetch_fails_when_every_chunk_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(6)
            .mount(&server)
            .await;

        let variables: Vec<String> = (1..=50).map(|i| format!("B99999_{i:03}E")).collect();
        let err = client(&server, None)
            .fetch_chunked(2023, &fips(), GeographyLevel::Tract, &variables)
            .await
            .unwrap_err();
        assert!(matches!(err, CensusError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn retry_backoff_releases_request_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2019/acs/acs5"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2023/acs/acs5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                ["NAME", "B01003_001E"],
                ["Tract", "900"]
            ])))
            .mount(&server)
            .await;

        let census = limited_client(
            &server,
            None,
            1,
            RetryPolicy::new(3, Duration::from_millis(400), Duration::from_millis(400)),
        );
        let variables = vars(&["B01003_001E"]);
        let failing = census.fetch(
            Dataset::AcsDetailed,
            2019,
            &fips(),
            GeographyLevel::Tract,
            &variables,
        );
        let succeeding = async {
            let started = std::time::Instant::now();
            let record = census
                .fetch(
                    Dataset::AcsDetailed,
                    2023,
                    &fips(),
                    GeographyLevel::Tract,
                    &variables,
                )
                .await
                .unwrap();
            (record, started.elapsed())
        };

        let (failed, (record, elapsed)) = tokio::join!(failing, succeeding);
        assert!(failed.is_err());
        assert_eq!(record.get("B01003_001E"), Some(900.0));
        assert!(elapsed < Duration::from_millis(400), "waited {elapsed:?}");
    }

    #[tokio::test]
    async fn trend_drops_missing_years_and_sorts() {
        let server = MockServer::start().await;
        for (year, population) in [(2019, "1000"), (2020, "-666666666"), (2021, "0"), (2022, "1050")] {
            Mock::given(method("GET"))
                .and(path(format!("/data/{year}/acs/acs5")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                    ["NAME", "B01003_001E"],
                    ["Tract", population]
                ])))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/data/2023/acs/acs5"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let trend = client(&server, None)
            .population_trend(
                &fips(),
                GeographyLevel::Tract,
                &[2023, 2022, 2021, 2020, 2019],
            )
            .await
            .unwrap();
        assert_eq!(
            trend,
            vec![TrendPoint::observed(2019, 1000), TrendPoint::observed(2022, 1050)]
        );
    }

    #[tokio::test]
    async fn trend_fails_when_any_year_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2019/acs/acs5"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                ["NAME", "B01003_001E"],
                ["Tract", "900"]
            ])))
            .mount(&server)
            .await;

        let result = client(&server, None)
            .population_trend(&fips(), GeographyLevel::Tract, &[2019, 2020])
            .await;
        assert!(result.is_err());
    }
}
