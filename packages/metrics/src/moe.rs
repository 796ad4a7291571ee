//! Margin-of-error propagation.
//!
//! ACS estimates carry a 90% margin of error. For a sum of independent
//! estimates the combined MOE is the square root of the sum of squared
//! component MOEs. Relative MOE is the MOE as a percentage of the
//! estimate, using absolute values, rounded to one decimal.

use realmarket_market_models::MetricValue;
use realmarket_market_models::acs::moe_variable;
use realmarket_market_models::sources::CensusRecord;

use crate::round_to;

/// Relative MOE (%) of an estimate.
///
/// `None` when either side is missing or the estimate is zero.
#[must_use]
pub fn relative_moe(estimate: Option<f64>, moe: Option<f64>) -> Option<f64> {
    let (estimate, moe) = (estimate?, moe?);
    if estimate.abs() < f64::EPSILON {
        return None;
    }
    Some(round_to(moe.abs() / estimate.abs() * 100.0, 1))
}

/// Pairs an estimate with its relative MOE.
#[must_use]
pub fn value_with_moe(estimate: Option<f64>, moe: Option<f64>) -> MetricValue {
    MetricValue {
        value: estimate,
        relative_moe: relative_moe(estimate, moe),
    }
}

/// Combined MOE of a sum. `None` if no component has an MOE.
#[must_use]
pub fn combined_moe(moes: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut sum_of_squares = None;
    for moe in moes.into_iter().flatten() {
        *sum_of_squares.get_or_insert(0.0) += moe * moe;
    }
    sum_of_squares.map(f64::sqrt)
}

/// Reads one estimate variable and its MOE variable out of a record.
#[must_use]
pub fn metric(record: &CensusRecord, estimate: &str) -> MetricValue {
    let moe = moe_variable(estimate).and_then(|m| record.get(&m));
    value_with_moe(record.get(estimate), moe)
}

/// Sums estimate variables and propagates their MOEs.
///
/// Missing estimates count as zero; missing MOEs are skipped.
#[must_use]
pub fn sum_with_moe(record: &CensusRecord, estimates: &[&str]) -> MetricValue {
    let total = estimates
        .iter()
        .map(|v| record.get(v).unwrap_or(0.0))
        .sum::<f64>();
    let moe = combined_moe(
        estimates
            .iter()
            .map(|v| moe_variable(v).and_then(|m| record.get(&m))),
    );
    value_with_moe(Some(total), moe)
}
