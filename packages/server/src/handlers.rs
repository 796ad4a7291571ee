//! HTTP handler functions for the market data API.

use std::time::Instant;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use realmarket_market::MarketError;
use realmarket_server_models::{
    ApiError, ApiHealth, CacheDeleteRequest, MarketDataRequest, TractQueryParams,
};

use crate::AppState;
use crate::auth::Authenticated;

const GEOCODE_DETAIL: &str =
    "Address could not be geocoded. Please check for typos or try a more specific address.";
const INTERNAL_DETAIL: &str = "An unexpected internal error occurred.";

/// Handler failures, rendered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Failure from the market data service.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The request body or query was unusable.
    #[error("{0}")]
    BadRequest(String),
}

impl HandlerError {
    fn detail(&self) -> String {
        match self {
            Self::Market(MarketError::GeocodingFailure(_)) => GEOCODE_DETAIL.to_string(),
            Self::Market(
                MarketError::InvalidSnapshot(_)
                | MarketError::Cache(_)
                | MarketError::Task { .. }
                | MarketError::Startup { .. },
            ) => INTERNAL_DETAIL.to_string(),
            Self::Market(e) => e.to_string(),
            Self::BadRequest(message) => message.clone(),
        }
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Market(MarketError::GeocodingFailure(_) | MarketError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Market(MarketError::ServiceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Market(MarketError::InvalidInput(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Market(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed with {status}: {self}");
        } else {
            log::warn!("Request rejected with {status}: {self}");
        }
        HttpResponse::build(status).json(ApiError {
            detail: self.detail(),
        })
    }
}

/// `GET /` and `GET /api/v1/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/v1/market-data`
///
/// Returns the market data snapshot for the address in the body.
pub async fn market_data(
    state: web::Data<AppState>,
    Authenticated(identity): Authenticated,
    body: web::Json<MarketDataRequest>,
) -> Result<HttpResponse, HandlerError> {
    if body.address.trim().is_empty() {
        return Err(HandlerError::BadRequest("address must not be empty".to_string()));
    }

    let started = Instant::now();
    log::info!(
        "market-data request from {} for {:?}",
        identity.subject,
        body.address
    );
    let snapshot = state.service.get_market_data(&body.address).await?;
    log::info!(
        "Processed {:?} in {:.2}ms",
        body.address,
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(HttpResponse::Ok().json(snapshot))
}

/// `GET /api/v1/tract-geojson?state=..&county=..&tract=..`
///
/// Returns the tract boundary as a `GeoJSON` `FeatureCollection`.
pub async fn tract_geojson(
    state: web::Data<AppState>,
    _auth: Authenticated,
    params: web::Query<TractQueryParams>,
) -> Result<HttpResponse, HandlerError> {
    let collection = state
        .service
        .tract_boundary(&params.state, &params.county, &params.tract)
        .await?;
    Ok(HttpResponse::Ok().json(collection))
}

/// `GET /api/v1/market-data/cache`
///
/// Lists every cached address.
pub async fn cached_addresses(
    state: web::Data<AppState>,
    _auth: Authenticated,
) -> Result<HttpResponse, HandlerError> {
    let addresses = state.service.list_cached_addresses().await?;
    Ok(HttpResponse::Ok().json(addresses))
}

/// `DELETE /api/v1/market-data/cache`
///
/// Evicts the cached snapshot for the address in the body.
pub async fn delete_cached(
    state: web::Data<AppState>,
    _auth: Authenticated,
    body: web::Json<CacheDeleteRequest>,
) -> Result<HttpResponse, HandlerError> {
    state.service.delete_cached(&body.address).await?;
    Ok(HttpResponse::NoContent().finish())
}
