//! Plain-text rendering of a snapshot for the terminal.

use std::fmt::Write as _;

use realmarket_market_models::{MarketDataSnapshot, MetricValue};

const NA: &str = "n/a";

fn fmt_metric(metric: Option<&MetricValue>) -> String {
    match metric.and_then(|m| m.value.map(|v| (v, m.relative_moe))) {
        Some((value, Some(moe))) => format!("{value} (±{moe:.1}%)"),
        Some((value, None)) => value.to_string(),
        None => NA.to_string(),
    }
}

fn fmt_percent(value: Option<f64>) -> String {
    value.map_or_else(|| NA.to_string(), |v| format!("{v:.2}%"))
}

/// One line per headline figure.
#[must_use]
pub fn summary(snapshot: &MarketDataSnapshot) -> String {
    let mut out = String::new();
    let rows = [
        ("Population", fmt_metric(Some(&snapshot.total_population))),
        ("Median age", fmt_metric(Some(&snapshot.median_age))),
        (
            "Median income",
            fmt_metric(snapshot.demographics.median_household_income.as_ref()),
        ),
        (
            "Growth (CAGR)",
            format!(
                "{} over {} years",
                fmt_percent(snapshot.growth.cagr),
                snapshot.growth.period_years
            ),
        ),
        (
            "Density",
            format!(
                "{:.1} people/sq mi",
                snapshot.population_density.people_per_sq_mile
            ),
        ),
        ("Renter occupied", fmt_percent(snapshot.housing.percent_renter_occupied)),
        (
            "Walk Score",
            snapshot
                .walkability
                .as_ref()
                .and_then(|w| w.walk_score)
                .map_or_else(|| NA.to_string(), |s| s.to_string()),
        ),
    ];

    let _ = writeln!(
        out,
        "{} ({}), ACS {}",
        snapshot.geography_name,
        snapshot.fips.geoid(),
        snapshot.data_year
    );
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<16} {value}");
    }

    let projection = &snapshot.population_trends.projection;
    if !projection.is_empty() {
        let points = projection
            .iter()
            .map(|p| format!("{}: {}", p.year, p.population))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "  {:<16} {points}", "Projection");
    }
    out
}
