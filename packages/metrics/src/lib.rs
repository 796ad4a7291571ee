#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure computations over already-fetched market data.
//!
//! Nothing in this crate performs I/O. Inputs are the raw records and
//! trends produced by the data client; outputs are the derived fields of a
//! [`MarketDataSnapshot`](realmarket_market_models::MarketDataSnapshot).

pub mod assemble;
pub mod density;
pub mod drivers;
pub mod growth;
pub mod moe;
pub mod projection;
pub mod ratios;

use realmarket_market_models::SnapshotError;
use thiserror::Error;

pub use crate::assemble::{SnapshotInputs, build_snapshot};

/// Errors from snapshot assembly.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The primary ACS record came back empty.
    #[error("No ACS demographic data found for this area")]
    NoDemographicData,

    /// The assembled snapshot violates a schema invariant.
    #[error(transparent)]
    Invalid(#[from] SnapshotError),
}

/// Rounds `value` to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Rounds a count to the nearest integer.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn round_count(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_places() {
        assert!((round_to(2.411_4, 2) - 2.41).abs() < f64::EPSILON);
        assert!((round_to(12.36, 1) - 12.4).abs() < 1e-9);
        assert_eq!(round_count(1040.4), 1040);
        assert_eq!(round_count(1061.5), 1062);
    }
}
