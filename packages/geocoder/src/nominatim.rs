//! Nominatim / `OpenStreetMap` search client.
//!
//! Used for the coordinate step of the hybrid path. The public instance
//! requires an identifying `User-Agent` and allows about one request per
//! second.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use realmarket_market_models::Coordinates;
use realmarket_retry::RetryPolicy;
use reqwest::header::USER_AGENT;

use crate::GeocodeError;

/// Looks up the coordinates of a free-form address.
///
/// Returns `Ok(None)` when Nominatim has no match.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn search(
    client: &reqwest::Client,
    base_url: &str,
    user_agent: &str,
    address: &str,
) -> Result<Option<Coordinates>, GeocodeError> {
    let body = realmarket_retry::send_json(&RetryPolicy::single(), || {
        client
            .get(base_url)
            .header(USER_AGENT, user_agent)
            .query(&[
                ("q", address),
                ("countrycodes", "us"),
                ("format", "json"),
                ("limit", "1"),
            ])
    })
    .await?;

    parse_response(&body)
}

/// Parses a Nominatim JSON response. `lat`/`lon` arrive as strings.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinates>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |field: &str| {
        first[field]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| first[field].as_f64())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {field} in Nominatim response"),
            })
    };

    Ok(Some(Coordinates {
        lat: coordinate("lat")?,
        lon: coordinate("lon")?,
    }))
}
