//! Percentages and sums over census records.

use realmarket_market_models::sources::CensusRecord;

use crate::round_to;

/// `numerator / denominator * 100`, rounded to one decimal.
///
/// `None` when either side is missing or the denominator is zero.
#[must_use]
pub fn safe_div_percent(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (numerator, denominator) = (numerator?, denominator?);
    if denominator.abs() < f64::EPSILON {
        return None;
    }
    Some(round_to(numerator / denominator * 100.0, 1))
}

/// Sums variables of a record, counting missing values as zero.
#[must_use]
pub fn sum_values(record: &CensusRecord, variables: &[&str]) -> f64 {
    variables.iter().map(|v| record.get(v).unwrap_or(0.0)).sum()
}

/// Sum of two optional values, missing values counting as zero.
#[must_use]
pub fn sum_or_zero(a: Option<f64>, b: Option<f64>) -> f64 {
    a.unwrap_or(0.0) + b.unwrap_or(0.0)
}
