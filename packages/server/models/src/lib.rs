#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the market data server.
//!
//! Snapshots themselves are returned as
//! `realmarket_market_models::MarketDataSnapshot`; the types here only
//! cover request bodies, query strings, and the small fixed payloads.

use serde::{Deserialize, Serialize};

/// Health check payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Body of `POST /api/v1/market-data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataRequest {
    /// Free-form U.S. street address.
    pub address: String,
}

/// Body of `DELETE /api/v1/market-data/cache`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDeleteRequest {
    /// Address whose cached snapshot should be removed.
    pub address: String,
}

/// Query string of `GET /api/v1/tract-geojson`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TractQueryParams {
    /// 2-digit state FIPS code.
    pub state: String,
    /// 3-digit county FIPS code.
    pub county: String,
    /// 6-digit tract code.
    pub tract: String,
}

/// Error body returned with every non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable description of the failure.
    pub detail: String,
}
