//! Census tract boundaries from the `TIGERweb` `ArcGIS` REST API.

use geojson::FeatureCollection;
use realmarket_market_models::FipsCode;
use realmarket_retry::RetryPolicy;

use crate::{CensusClient, CensusError};

/// Attribute fields returned with each tract feature.
const OUT_FIELDS: &str = "STATE,COUNTY,TRACT";

impl CensusClient {
    /// Fetches the boundary polygon of one tract as `GeoJSON`.
    ///
    /// A query that matches nothing yields an empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError::Unavailable`] if the request fails after
    /// retries, or [`CensusError::Parse`] for a body that is not `GeoJSON`.
    pub async fn tract_boundary(&self, fips: &FipsCode) -> Result<FeatureCollection, CensusError> {
        let params = [
            (
                "where",
                format!(
                    "STATE='{}' AND COUNTY='{}' AND TRACT='{}'",
                    fips.state, fips.county, fips.tract
                ),
            ),
            ("outFields", OUT_FIELDS.to_string()),
            ("outSR", "4326".to_string()),
            ("f", "geojson".to_string()),
        ];

        let url = &self.endpoints.tigerweb_url;
        let http = &self.http;
        let params = &params;
        let body = self
            .with_permit_retries("TIGERweb", || async move {
                realmarket_retry::send_json(&RetryPolicy::single(), || http.get(url).query(params))
                    .await
            })
            .await?;

        parse_collection(body, fips)
    }
}

fn parse_collection(
    body: serde_json::Value,
    fips: &FipsCode,
) -> Result<FeatureCollection, CensusError> {
    let has_features = body["features"]
        .as_array()
        .is_some_and(|features| !features.is_empty());
    if !has_features {
        log::warn!(
            "No TIGERweb features for tract {}, returning empty collection",
            fips.geoid()
        );
        return Ok(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        });
    }

    serde_json::from_value(body).map_err(|e| CensusError::Parse {
        message: format!("TIGERweb GeoJSON for tract {}: {e}", fips.geoid()),
    })
}
