//! Growth over an observed population trend.

use realmarket_market_models::{GrowthMetrics, TrendPoint};

use crate::round_to;

/// Computes CAGR, year-over-year growth, and absolute change.
///
/// `trend` must be ascending by year. Every rate is `None` when the trend
/// has fewer than two points or starts at a non-positive population.
/// `period_years` is reported as given.
#[must_use]
pub fn growth_metrics(trend: &[TrendPoint], period_years: u32) -> GrowthMetrics {
    let mut metrics = GrowthMetrics {
        period_years,
        cagr: None,
        yoy_growth: None,
        absolute_change: None,
    };

    let (Some(first), Some(last)) = (trend.first(), trend.last()) else {
        return metrics;
    };
    if trend.len() < 2 || first.population <= 0 {
        return metrics;
    }

    #[allow(clippy::cast_precision_loss)]
    let (start, end) = (first.population as f64, last.population as f64);

    let span = last.year - first.year;
    if span > 0 {
        let cagr = (end / start).powf(1.0 / f64::from(span)) - 1.0;
        metrics.cagr = Some(round_to(cagr * 100.0, 2));
    }

    let previous = trend[trend.len() - 2].population;
    if previous > 0 {
        #[allow(clippy::cast_precision_loss)]
        let previous = previous as f64;
        metrics.yoy_growth = Some(round_to((end - previous) / previous * 100.0, 2));
    }

    metrics.absolute_change = Some(last.population - first.population);
    metrics
}
