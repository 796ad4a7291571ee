#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistent response cache for market data snapshots.
//!
//! [`store::CacheStore`] is the raw key/value contract and
//! [`store::DuckDbStore`] its `DuckDB` implementation.
//! [`response_cache::ResponseCache`] sits on top: it derives keys from
//! normalized addresses and validates every blob it reads back.

pub mod paths;
pub mod response_cache;
pub mod store;

pub use response_cache::{ResponseCache, cache_key, normalize_address};
pub use store::{CacheStore, DuckDbStore, StoredEntry};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be serialized for storage.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of what went wrong.
        message: String,
    },

    /// A pooled connection's lock was poisoned by a panicking holder.
    #[error("Connection pool error: {message}")]
    Pool {
        /// Description of what went wrong.
        message: String,
    },
}
