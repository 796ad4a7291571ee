//! Provider paths the resolver tries in order.

use async_trait::async_trait;
use realmarket_market_models::GeographicLocation;

use crate::service_registry::{GeocodingService, ProviderConfig};
use crate::{GeocodeError, GeocoderSettings, census, nominatim};

/// One complete way of turning an address into a location.
#[async_trait]
pub trait GeocodeStrategy: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Runs the provider path once, without retrying.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if any required step fails or the address
    /// has no match.
    async fn locate(&self, address: &str) -> Result<GeographicLocation, GeocodeError>;
}

/// Nominatim coordinates, Census tract by coordinates, GEOINFO land area.
pub struct HybridStrategy {
    id: String,
    client: reqwest::Client,
    nominatim_url: String,
    geographies_url: String,
    geoinfo_url: String,
    benchmark: String,
    settings: GeocoderSettings,
}

impl HybridStrategy {
    /// Creates the strategy from its endpoints.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        client: reqwest::Client,
        nominatim_url: impl Into<String>,
        geographies_url: impl Into<String>,
        geoinfo_url: impl Into<String>,
        benchmark: impl Into<String>,
        settings: GeocoderSettings,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            nominatim_url: nominatim_url.into(),
            geographies_url: geographies_url.into(),
            geoinfo_url: geoinfo_url.into(),
            benchmark: benchmark.into(),
            settings,
        }
    }

    fn no_match(&self, address: &str) -> GeocodeError {
        GeocodeError::NoMatch {
            provider: self.id.clone(),
            address: address.to_string(),
        }
    }
}

#[async_trait]
impl GeocodeStrategy for HybridStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    async fn locate(&self, address: &str) -> Result<GeographicLocation, GeocodeError> {
        let coordinates = nominatim::search(
            &self.client,
            &self.nominatim_url,
            &self.settings.user_agent,
            address,
        )
        .await?
        .ok_or_else(|| self.no_match(address))?;

        let tract = census::geographies_by_coordinates(
            &self.client,
            &self.geographies_url,
            &self.benchmark,
            &self.settings.vintage(),
            coordinates,
        )
        .await?
        .ok_or_else(|| self.no_match(address))?;

        let refined = census::geoinfo_land_area(
            &self.client,
            &self.geoinfo_url,
            self.settings.acs_year,
            self.settings.census_api_key.as_deref(),
            &tract.fips,
        )
        .await;
        let land_area_sq_meters = match refined {
            Ok(Some(area)) => area,
            Ok(None) => tract.land_area_sq_meters,
            Err(e) => {
                log::warn!(
                    "GEOINFO land area lookup failed for tract {}, keeping {}: {e}",
                    tract.fips.geoid(),
                    tract.land_area_sq_meters
                );
                tract.land_area_sq_meters
            }
        };

        Ok(GeographicLocation {
            fips: tract.fips,
            coordinates,
            land_area_sq_meters,
        })
    }
}

/// Census one-line address geographies lookup.
pub struct OnelineStrategy {
    id: String,
    client: reqwest::Client,
    base_url: String,
    benchmark: String,
    vintage: String,
}

impl OnelineStrategy {
    /// Creates the strategy from its endpoint.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        client: reqwest::Client,
        base_url: impl Into<String>,
        benchmark: impl Into<String>,
        settings: &GeocoderSettings,
    ) -> Self {
        Self {
            id: id.into(),
            client,
            base_url: base_url.into(),
            benchmark: benchmark.into(),
            vintage: settings.vintage(),
        }
    }
}

#[async_trait]
impl GeocodeStrategy for OnelineStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    async fn locate(&self, address: &str) -> Result<GeographicLocation, GeocodeError> {
        census::oneline_geographies(
            &self.client,
            &self.base_url,
            &self.benchmark,
            &self.vintage,
            address,
        )
        .await?
        .ok_or_else(|| GeocodeError::NoMatch {
            provider: self.id.clone(),
            address: address.to_string(),
        })
    }
}

/// Builds the strategy described by a registry entry.
pub(crate) fn build(
    service: &GeocodingService,
    client: &reqwest::Client,
    settings: &GeocoderSettings,
) -> Box<dyn GeocodeStrategy> {
    match &service.provider {
        ProviderConfig::Hybrid {
            nominatim_url,
            geographies_url,
            geoinfo_url,
            benchmark,
        } => Box::new(HybridStrategy::new(
            service.id.clone(),
            client.clone(),
            nominatim_url.clone(),
            geographies_url.clone(),
            geoinfo_url.clone(),
            benchmark.clone(),
            settings.clone(),
        )),
        ProviderConfig::CensusOneline {
            base_url,
            benchmark,
        } => Box::new(OnelineStrategy::new(
            service.id.clone(),
            client.clone(),
            base_url.clone(),
            benchmark.clone(),
            settings,
        )),
    }
}
