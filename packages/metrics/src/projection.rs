//! Short-horizon population projection.
//!
//! The target geography is projected forward at the average
//! year-over-year growth factor of a larger reference geography.

use realmarket_market_models::TrendPoint;

use crate::round_count;

/// Average year-over-year growth factor of `reference`.
///
/// Ratios whose predecessor is not positive are skipped. `None` when no
/// ratio can be formed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_growth_factor(reference: &[TrendPoint]) -> Option<f64> {
    let ratios: Vec<f64> = reference
        .windows(2)
        .filter(|w| w[0].population > 0)
        .map(|w| w[1].population as f64 / w[0].population as f64)
        .collect();
    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
}

/// Projects `base_population` forward for `horizon` years starting at
/// `first_year`, compounding the reference geography's average growth.
///
/// Returns an empty projection when the base is not positive or the
/// reference trend has fewer than two usable points.
#[must_use]
pub fn project(
    base_population: Option<f64>,
    reference: &[TrendPoint],
    first_year: i32,
    horizon: u32,
) -> Vec<TrendPoint> {
    let Some(base) = base_population.filter(|p| *p > 0.0) else {
        log::warn!("No base population to project from");
        return Vec::new();
    };
    let Some(factor) = average_growth_factor(reference) else {
        log::warn!(
            "Reference trend has {} usable points, skipping projection",
            reference.len()
        );
        return Vec::new();
    };

    let mut current = base;
    (0..horizon)
        .map(|offset| {
            current *= factor;
            TrendPoint::projected(first_year.saturating_add_unsigned(offset), round_count(current))
        })
        .collect()
}
