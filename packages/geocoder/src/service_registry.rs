//! Compile-time registry of geocoding provider paths.
//!
//! Each provider path is defined in a TOML file under `services/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use serde::Deserialize;

/// A geocoding provider path loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"hybrid"`, `"census_oneline"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this path takes part in resolution.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Execution order. Lower values run first.
    pub priority: u32,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim for coordinates, then Census geographies by coordinates,
    /// then a best-effort GEOINFO land area refinement.
    Hybrid {
        /// Nominatim search endpoint.
        nominatim_url: String,
        /// Census `geographies/coordinates` endpoint.
        geographies_url: String,
        /// Census data API root (`{root}/{year}/geoinfo`).
        geoinfo_url: String,
        /// Census geocoder benchmark (e.g., `"Public_AR_Current"`).
        benchmark: String,
    },
    /// Census `geographies/onelineaddress`: address straight to a tract.
    CensusOneline {
        /// Endpoint URL.
        base_url: String,
        /// Census geocoder benchmark.
        benchmark: String,
    },
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Returns the first endpoint the provider path calls.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Hybrid { nominatim_url, .. } => nominatim_url,
            ProviderConfig::CensusOneline { base_url, .. } => base_url,
        }
    }
}

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("hybrid", include_str!("../services/hybrid.toml")),
    (
        "census_oneline",
        include_str!("../services/census_oneline.toml"),
    ),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Returns all provider paths (enabled and disabled).
///
/// # Panics
///
/// Panics if any embedded TOML config is malformed.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled provider paths, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        assert_eq!(all_services().len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn service_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for svc in &all_services() {
            assert!(seen.insert(svc.id.clone()), "Duplicate service ID: {}", svc.id);
            assert!(!svc.name.is_empty(), "Service {} has empty name", svc.id);
            assert!(!svc.base_url().is_empty(), "Service {} has empty URL", svc.id);
        }
    }

    #[test]
    fn hybrid_runs_before_oneline_fallback() {
        let ids: Vec<String> = enabled_services().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["hybrid", "census_oneline"]);
    }
}
