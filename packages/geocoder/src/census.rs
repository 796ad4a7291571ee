//! US Census Bureau geocoder and GEOINFO clients.
//!
//! - Geographies by coordinates: `GET /geocoder/geographies/coordinates`
//! - Geographies by one-line address: `GET /geocoder/geographies/onelineaddress`
//! - Tract land area: `GET /data/{year}/geoinfo?get=AREALAND`
//!
//! The geocoder endpoints need no API key. Tract objects carry either a
//! `GEOID` or separate `STATE`/`COUNTY`/`TRACT` fields, and land area as
//! `AREALAND` (sometimes `ALAND`), as a number or a string.
//!
//! See <https://geocoding.geo.census.gov/geocoder/Geocoding_Services_API.html>

use realmarket_market_models::{Coordinates, FipsCode, GeographicLocation};
use realmarket_retry::RetryPolicy;
use serde_json::Value;

use crate::GeocodeError;

/// Key of the tract list inside a `geographies` object.
const TRACTS_KEY: &str = "Census Tracts";

/// A tract identified by the Census geocoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TractMatch {
    /// FIPS hierarchy of the tract.
    pub fips: FipsCode,
    /// Land area reported alongside the tract (0 if absent).
    pub land_area_sq_meters: u64,
}

/// Resolves coordinates to the containing tract.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geographies_by_coordinates(
    client: &reqwest::Client,
    url: &str,
    benchmark: &str,
    vintage: &str,
    coordinates: Coordinates,
) -> Result<Option<TractMatch>, GeocodeError> {
    let params = [
        ("x", coordinates.lon.to_string()),
        ("y", coordinates.lat.to_string()),
        ("benchmark", benchmark.to_string()),
        ("vintage", vintage.to_string()),
        ("format", "json".to_string()),
    ];
    let body =
        realmarket_retry::send_json(&RetryPolicy::single(), || client.get(url).query(&params))
            .await?;

    parse_geographies(&body["result"]["geographies"])
}

/// Resolves a one-line address straight to a tract and coordinates.
///
/// The land area comes from the tract object in the same response.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn oneline_geographies(
    client: &reqwest::Client,
    url: &str,
    benchmark: &str,
    vintage: &str,
    address: &str,
) -> Result<Option<GeographicLocation>, GeocodeError> {
    let body = realmarket_retry::send_json(&RetryPolicy::single(), || {
        client.get(url).query(&[
            ("address", address),
            ("benchmark", benchmark),
            ("vintage", vintage),
            ("format", "json"),
        ])
    })
    .await?;

    parse_oneline(&body)
}

/// Fetches the tract's land area from the GEOINFO dataset.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geoinfo_land_area(
    client: &reqwest::Client,
    data_root: &str,
    year: i32,
    api_key: Option<&str>,
    fips: &FipsCode,
) -> Result<Option<u64>, GeocodeError> {
    let url = format!("{data_root}/{year}/geoinfo");
    let mut params = vec![
        ("get", "AREALAND".to_string()),
        ("for", format!("tract:{}", fips.tract)),
        ("in", format!("state:{} county:{}", fips.state, fips.county)),
    ];
    if let Some(key) = api_key {
        params.push(("key", key.to_string()));
    }

    let body =
        realmarket_retry::send_json(&RetryPolicy::single(), || client.get(&url).query(&params))
            .await?;

    parse_geoinfo(&body)
}

/// Picks the first tract out of a `geographies` object.
fn parse_geographies(geographies: &Value) -> Result<Option<TractMatch>, GeocodeError> {
    if !geographies.is_object() {
        return Err(GeocodeError::Parse {
            message: "Missing geographies object".to_string(),
        });
    }
    geographies[TRACTS_KEY]
        .as_array()
        .and_then(|tracts| tracts.first())
        .map(parse_tract)
        .transpose()
}

fn parse_tract(tract: &Value) -> Result<TractMatch, GeocodeError> {
    let fips = if let Some(geoid) = tract["GEOID"].as_str() {
        FipsCode::from_geoid(geoid)?
    } else {
        FipsCode::new(
            str_field(tract, "STATE")?,
            str_field(tract, "COUNTY")?,
            str_field(tract, "TRACT")?,
        )?
    };

    let land_area_sq_meters = json_u64(&tract["AREALAND"])
        .or_else(|| json_u64(&tract["ALAND"]))
        .unwrap_or(0);

    Ok(TractMatch {
        fips,
        land_area_sq_meters,
    })
}

fn parse_oneline(body: &Value) -> Result<Option<GeographicLocation>, GeocodeError> {
    let matches = body["result"]["addressMatches"]
        .as_array()
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing addressMatches array".to_string(),
        })?;

    let Some(first) = matches.first() else {
        return Ok(None);
    };
    let Some(tract) = parse_geographies(&first["geographies"]).ok().flatten() else {
        return Ok(None);
    };

    let coordinate = |axis: &str| {
        first["coordinates"][axis]
            .as_f64()
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {axis} coordinate"),
            })
    };

    Ok(Some(GeographicLocation {
        fips: tract.fips,
        coordinates: Coordinates {
            lat: coordinate("y")?,
            lon: coordinate("x")?,
        },
        land_area_sq_meters: tract.land_area_sq_meters,
    }))
}

/// Parses a Census data API table (`[[header...], [row...]]`).
fn parse_geoinfo(body: &Value) -> Result<Option<u64>, GeocodeError> {
    let rows = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "GEOINFO response is not an array".to_string(),
    })?;
    let (Some(header), Some(row)) = (rows.first(), rows.get(1)) else {
        return Ok(None);
    };

    let index = header
        .as_array()
        .and_then(|cols| cols.iter().position(|c| c.as_str() == Some("AREALAND")));
    Ok(index.and_then(|i| json_u64(&row[i])))
}

fn str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, GeocodeError> {
    value[field].as_str().ok_or_else(|| GeocodeError::Parse {
        message: format!("Missing {field} in tract geography"),
    })
}

/// Reads a non-negative integer from a JSON number or numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_tract_from_geoid() {
        let geos = json!({
            "Census Tracts": [{"GEOID": "11001006202", "AREALAND": 1_234_567}],
            "Counties": [{"STATE": "11", "COUNTY": "001"}]
        });
        let tract = parse_geographies(&geos).unwrap().unwrap();
        assert_eq!(tract.fips.geoid(), "11001006202");
        assert_eq!(tract.land_area_sq_meters, 1_234_567);
    }

    #[test]
    fn parses_tract_from_parts_and_string_area() {
        let geos = json!({
            "Census Tracts": [{"STATE": "06", "COUNTY": "075", "TRACT": "061500", "ALAND": "350000"}]
        });
        let tract = parse_geographies(&geos).unwrap().unwrap();
        assert_eq!(tract.fips.state, "06");
        assert_eq!(tract.fips.tract, "061500");
        assert_eq!(tract.land_area_sq_meters, 350_000);
    }

    #[test]
    fn no_tracts_is_no_match() {
        let geos = json!({"Census Tracts": []});
        assert!(parse_geographies(&geos).unwrap().is_none());
    }

    #[test]
    fn short_geoid_is_rejected() {
        let geos = json!({"Census Tracts": [{"GEOID": "1100100620"}]});
        assert!(matches!(
            parse_geographies(&geos),
            Err(GeocodeError::Fips(_))
        ));
    }

    #[test]
    fn parses_oneline_match() {
        let body = json!({
            "result": {
                "addressMatches": [{
                    "coordinates": {"x": -77.0365, "y": 38.8977},
                    "geographies": {
                        "Census Tracts": [{"GEOID": "11001006202", "AREALAND": "440000"}]
                    }
                }]
            }
        });
        let location = parse_oneline(&body).unwrap().unwrap();
        assert_eq!(location.fips.county, "001");
        assert!((location.coordinates.lat - 38.8977).abs() < 1e-9);
        assert_eq!(location.land_area_sq_meters, 440_000);
    }

    #[test]
    fn oneline_without_tract_is_no_match() {
        let body = json!({
            "result": {
                "addressMatches": [{
                    "coordinates": {"x": -77.0, "y": 38.9},
                    "geographies": {}
                }]
            }
        });
        assert!(parse_oneline(&body).unwrap().is_none());
        let empty = json!({"result": {"addressMatches": []}});
        assert!(parse_oneline(&empty).unwrap().is_none());
    }

    #[test]
    fn parses_geoinfo_table() {
        let body = json!([
            ["AREALAND", "state", "county", "tract"],
            ["2589988", "11", "001", "006202"]
        ]);
        assert_eq!(parse_geoinfo(&body).unwrap(), Some(2_589_988));
        assert_eq!(parse_geoinfo(&json!([["AREALAND"]])).unwrap(), None);
    }
}
