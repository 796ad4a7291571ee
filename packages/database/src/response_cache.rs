//! Schema-validated snapshot cache keyed by normalized address.
//!
//! Keys are `v4:` followed by the hex SHA-256 of
//! `{normalized address}|tract|5_year_projected`. Bump [`KEY_VERSION`]
//! whenever the snapshot schema changes so stale entries stop matching.

use std::sync::Arc;

use realmarket_market_models::MarketDataSnapshot;
use sha2::{Digest, Sha256};

use crate::DbError;
use crate::store::CacheStore;

/// Schema version tag prefixed to every cache key.
pub const KEY_VERSION: &str = "v4";

const KEY_SUFFIX: &str = "tract|5_year_projected";

/// Collapses internal whitespace, trims, and lower-cases an address.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derives the cache key for an address.
#[must_use]
pub fn cache_key(address: &str) -> String {
    let digest = Sha256::digest(format!("{}|{KEY_SUFFIX}", normalize_address(address)));
    format!("{KEY_VERSION}:{}", hex::encode(digest))
}

/// Snapshot cache on top of a [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Returns the cached snapshot for `address`.
    ///
    /// A blob that no longer decodes or validates is logged and reported
    /// as a miss.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store lookup fails.
    pub fn get(&self, address: &str) -> Result<Option<MarketDataSnapshot>, DbError> {
        let key = cache_key(address);
        let Some(entry) = self.store.get(&key)? else {
            log::info!("Cache MISS for {address:?} ({key})");
            return Ok(None);
        };

        match MarketDataSnapshot::from_json(&entry.snapshot) {
            Ok(snapshot) => {
                log::info!("Cache HIT for {address:?} ({key})");
                Ok(Some(snapshot))
            }
            Err(e) => {
                log::warn!("Cached snapshot for {address:?} ({key}) is invalid, refetching: {e}");
                Ok(None)
            }
        }
    }

    /// Stores `snapshot` under the key derived from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the store write fails.
    pub fn put(&self, address: &str, snapshot: &MarketDataSnapshot) -> Result<(), DbError> {
        let key = cache_key(address);
        let blob = serde_json::to_string(snapshot).map_err(|e| DbError::Serialization {
            message: format!("snapshot for {address:?}: {e}"),
        })?;
        self.store.put(&key, &blob, address)?;
        log::info!("Cached snapshot for {address:?} ({key})");
        Ok(())
    }

    /// Sorted distinct addresses with a cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store query fails.
    pub fn list_addresses(&self) -> Result<Vec<String>, DbError> {
        let addresses = self.store.list_addresses()?;
        log::info!("Found {} cached addresses", addresses.len());
        Ok(addresses)
    }

    /// Removes the snapshot for `address`, returning the rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store delete fails.
    pub fn delete(&self, address: &str) -> Result<usize, DbError> {
        let key = cache_key(address);
        let removed = self.store.delete(&key)?;
        if removed == 0 {
            log::warn!("No cache entry for {address:?} ({key}) to delete");
        } else {
            log::info!("Deleted {removed} cache entry for {address:?} ({key})");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use realmarket_market_models::test_support::sample_snapshot;

    use super::*;
    use crate::store::DuckDbStore;

    fn cache() -> (ResponseCache, Arc<DuckDbStore>) {
        let store = Arc::new(DuckDbStore::open_in_memory(2).unwrap());
        (ResponseCache::new(store.clone()), store)
    }

    #[test]
    fn whitespace_and_case_share_a_key() {
        assert_eq!(
            cache_key("  1600 Pennsylvania   Ave NW "),
            cache_key("1600 pennsylvania ave nw")
        );
        assert_ne!(cache_key("1600 Pennsylvania Ave NW"), cache_key("1601 Pennsylvania Ave NW"));
    }

    #[test]
    fn key_is_versioned_sha256() {
        let key = cache_key("1 Main St");
        let (version, digest) = key.split_once(':').unwrap();
        assert_eq!(version, "v4");
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn put_then_get_returns_equal_snapshot() {
        let (cache, _) = cache();
        let snapshot = sample_snapshot("1600 Pennsylvania Ave NW");
        cache.put("1600 Pennsylvania Ave NW", &snapshot).unwrap();

        let hit = cache.get("1600  PENNSYLVANIA ave nw").unwrap().unwrap();
        assert_eq!(hit, snapshot);
    }

    #[test]
    fn invalid_blob_is_a_miss() {
        let (cache, store) = cache();
        let address = "1 Main St";
        store
            .put(&cache_key(address), "{\"search_address\":\"1 Main St\"}", address)
            .unwrap();

        assert!(cache.get(address).unwrap().is_none());
    }

    #[test]
    fn list_and_delete() {
        let (cache, _) = cache();
        cache.put("b street", &sample_snapshot("b street")).unwrap();
        cache.put("a street", &sample_snapshot("a street")).unwrap();

        assert_eq!(
            cache.list_addresses().unwrap(),
            vec!["a street".to_string(), "b street".to_string()]
        );
        assert_eq!(cache.delete("A Street").unwrap(), 1);
        assert_eq!(cache.delete("a street").unwrap(), 0);
        assert_eq!(cache.list_addresses().unwrap(), vec!["b street".to_string()]);
    }
}
