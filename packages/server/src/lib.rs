#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for market data lookups.
//!
//! Every route lives under `/api/v1` and requires a bearer token from
//! `API_TOKENS`, except the health checks. Errors are returned as
//! `{"detail": ...}` with 404 for unknown addresses, 503 when a required
//! data source is down, and 500 otherwise.

pub mod auth;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use realmarket_market::{AppConfig, MarketDataService};

use crate::auth::{IdentityVerifier, StaticTokenVerifier};

/// Shared application state.
pub struct AppState {
    /// The market data pipeline.
    pub service: MarketDataService,
    /// Bearer token verifier.
    pub verifier: Arc<dyn IdentityVerifier>,
}

/// Registers the API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::health)).service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health))
            .route("/market-data", web::post().to(handlers::market_data))
            .route(
                "/market-data/cache",
                web::get().to(handlers::cached_addresses),
            )
            .route(
                "/market-data/cache",
                web::delete().to(handlers::delete_cached),
            )
            .route("/tract-geojson", web::get().to(handlers::tract_geojson)),
    );
}

/// Starts the market data API server.
///
/// Builds the market data service from `config`, reads accepted tokens
/// from `API_TOKENS`, and serves until shutdown. The caller provides the
/// async runtime (e.g. via `#[actix_web::main]`) and the logger.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the service cannot be built, the
/// HTTP server fails to bind, or it encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: AppConfig) -> std::io::Result<()> {
    log::info!("Building market data service...");
    let service = realmarket_market::build_service(&config).map_err(std::io::Error::other)?;

    let verifier = StaticTokenVerifier::from_env();
    if verifier.is_empty() {
        log::warn!("API_TOKENS is empty; every authenticated route will return 401");
    }

    let state = web::Data::new(AppState {
        service,
        verifier: verifier.shared(),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
