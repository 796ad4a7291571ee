//! Walk Score API client.
//!
//! See <https://www.walkscore.com/professional/api.php>

use realmarket_market_models::{Coordinates, WalkabilityScores};
use realmarket_retry::RetryPolicy;
use serde_json::Value;

use crate::{CensusClient, CensusError};

impl CensusClient {
    /// Fetches Walk Score and Transit Score for an address.
    ///
    /// Returns `Ok(None)` without calling the API when no key is
    /// configured. The call is made once, without retries.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError::Unavailable`] if the request fails.
    pub async fn walkability(
        &self,
        address: &str,
        coordinates: Coordinates,
    ) -> Result<Option<WalkabilityScores>, CensusError> {
        let Some(api_key) = self.settings.walkscore_api_key.as_deref() else {
            log::warn!("WALKSCORE_API_KEY not set, skipping walkability scores");
            return Ok(None);
        };

        let params = [
            ("format", "json".to_string()),
            ("address", address.to_string()),
            ("lat", coordinates.lat.to_string()),
            ("lon", coordinates.lon.to_string()),
            ("transit", "1".to_string()),
            ("wsapikey", api_key.to_string()),
        ];

        let _permit = self.permit().await?;
        let url = &self.endpoints.walkscore_url;
        let body = realmarket_retry::send_json(&RetryPolicy::single(), || {
            self.http.get(url).query(&params)
        })
        .await
        .map_err(|source| CensusError::Unavailable {
            endpoint: "Walk Score".to_string(),
            source,
        })?;

        Ok(Some(parse_scores(&body)))
    }
}

fn score(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|s| u32::try_from(s).ok())
}

fn parse_scores(body: &Value) -> WalkabilityScores {
    let transit = &body["transit"];
    WalkabilityScores {
        walk_score: score(&body["walkscore"]),
        walk_score_description: body["description"].as_str().map(str::to_string),
        transit_score: score(&transit["score"]),
        transit_score_description: transit["description"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::client;

    const WHITE_HOUSE: Coordinates = Coordinates {
        lat: 38.8977,
        lon: -77.0365,
    };

    #[tokio::test]
    async fn skips_without_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let scores = client(&server, None)
            .walkability("1600 Pennsylvania Ave NW", WHITE_HOUSE)
            .await
            .unwrap();
        assert!(scores.is_none());
    }

    #[tokio::test]
    async fn parses_walk_and_transit_scores() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/score"))
            .and(query_param("transit", "1"))
            .and(query_param("wsapikey", "ws-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 1,
                "walkscore": 98,
                "description": "Walker's Paradise",
                "transit": {"score": 100, "description": "Rider's Paradise"}
            })))
            .mount(&server)
            .await;

        let scores = client(&server, Some("ws-key"))
            .walkability("1600 Pennsylvania Ave NW", WHITE_HOUSE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scores.walk_score, Some(98));
        assert_eq!(scores.transit_score, Some(100));
        assert_eq!(
            scores.walk_score_description.as_deref(),
            Some("Walker's Paradise")
        );
    }

    #[tokio::test]
    async fn failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server, Some("ws-key"))
            .walkability("1600 Pennsylvania Ave NW", WHITE_HOUSE)
            .await;
        assert!(matches!(result, Err(CensusError::Unavailable { .. })));
    }

    #[test]
    fn missing_transit_is_none() {
        let scores = parse_scores(&json!({"walkscore": 40, "description": "Car-Dependent"}));
        assert_eq!(scores.walk_score, Some(40));
        assert_eq!(scores.transit_score, None);
    }
}
