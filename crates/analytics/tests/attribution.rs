//! End-to-end checks of the attribution engine on hand-built series.

use analytics::{
    AnalyticsError, AssetReturns, AttributionEngine, AttributionOutcome, PortfolioObservation,
    PortfolioSeries, WeightsSeries,
};
use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use configuration::{AttributionSettings, ResidualPolicy};
use core_types::{Asset, AssetClass, AssetRegistry, Granularity};
use std::collections::BTreeMap;

// =============================================================================
// FIXTURES
// =============================================================================

fn day(i: usize) -> NaiveDate {
    // Monday 1 January 2024
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
}

fn registry(symbols: &[&str]) -> AssetRegistry {
    AssetRegistry::new(
        symbols
            .iter()
            .map(|s| Asset::new(*s, AssetClass::EquityIndex))
            .collect(),
    )
}

fn row(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
}

fn engine(symbols: &[&str], settings: AttributionSettings) -> AttributionEngine {
    AttributionEngine::new(settings, registry(symbols))
}

/// Builds the three aligned inputs. Each day's portfolio return is priced by
/// `pricing(prev_weights, curr_weights, returns)`.
fn inputs(
    weights: &[BTreeMap<String, f64>],
    returns: &[BTreeMap<String, f64>],
    pricing: impl Fn(&BTreeMap<String, f64>, &BTreeMap<String, f64>, &BTreeMap<String, f64>) -> f64,
) -> (PortfolioSeries, AssetReturns, WeightsSeries) {
    let mut portfolio = PortfolioSeries::new();
    let mut asset_returns = AssetReturns::new();
    let mut weights_series = WeightsSeries::new();
    let mut value = 100_000.0;
    for i in 0..weights.len() {
        let daily_return = if i == 0 {
            None
        } else {
            Some(pricing(&weights[i - 1], &weights[i], &returns[i]))
        };
        value *= 1.0 + daily_return.unwrap_or(0.0);
        portfolio.insert(day(i), PortfolioObservation { value, daily_return });
        asset_returns.insert(day(i), returns[i].clone());
        weights_series.insert(day(i), weights[i].clone());
    }
    (portfolio, asset_returns, weights_series)
}

fn dot(weights: &BTreeMap<String, f64>, returns: &BTreeMap<String, f64>) -> f64 {
    weights
        .iter()
        .map(|(s, w)| w * returns.get(s).copied().unwrap_or(0.0))
        .sum()
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn static_weights_without_rebalancing_explain_the_compounded_return() {
    let weights = vec![row(&[("A", 0.6), ("B", 0.4)]); 11];
    let returns = vec![row(&[("A", 0.001), ("B", 0.0005)]); 11];
    let (portfolio, asset_returns, weights_series) =
        inputs(&weights, &returns, |prev, _, r| dot(prev, r));

    let outcome = engine(&["A", "B"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    let report = outcome.report().unwrap();
    let daily = report.get(Granularity::Daily).unwrap();
    let stats = &daily.summary_statistics;

    assert_eq!(stats.periods, 10);
    let a = daily.asset_analysis["A"].total_contribution;
    let b = daily.asset_analysis["B"].total_contribution;
    assert!(a > 0.0 && b > 0.0);
    assert_relative_eq!(a, 0.006, epsilon = 1e-12);
    assert_relative_eq!(b, 0.002, epsilon = 1e-12);
    assert_relative_eq!(a + b, stats.compounded_portfolio_return, epsilon = 1e-4);
    assert_eq!(stats.total_rebalancing_impact, 0.0);
    assert!(stats.residual_within_tolerance);
}

#[test]
fn four_aligned_dates_are_insufficient_not_an_error() {
    let weights = vec![row(&[("A", 1.0)]); 4];
    let returns = vec![row(&[("A", 0.01)]); 4];
    let (portfolio, asset_returns, weights_series) =
        inputs(&weights, &returns, |prev, _, r| dot(prev, r));

    let outcome = engine(&["A"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    assert!(outcome.is_insufficient());

    let json = serde_json::to_value(&outcome).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert!(object["error"].as_str().unwrap().contains("4 aligned dates"));
}

#[test]
fn only_dates_present_in_all_inputs_are_aligned() {
    let weights = vec![row(&[("A", 1.0)]); 6];
    let returns = vec![row(&[("A", 0.01)]); 6];
    let (portfolio, mut asset_returns, weights_series) =
        inputs(&weights, &returns, |prev, _, r| dot(prev, r));
    asset_returns.remove(&day(5));
    asset_returns.remove(&day(4));

    let outcome = engine(&["A"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    assert!(matches!(outcome, AttributionOutcome::Insufficient { .. }));
}

// =============================================================================
// PROPERTIES
// =============================================================================

fn drifting_weights() -> Vec<BTreeMap<String, f64>> {
    [0.5, 0.55, 0.52, 0.6, 0.4, 0.45, 0.5, 0.5]
        .iter()
        .map(|a| row(&[("A", *a), ("B", 1.0 - a)]))
        .collect()
}

fn drifting_returns() -> Vec<BTreeMap<String, f64>> {
    [
        (0.0, 0.0),
        (0.012, -0.004),
        (-0.008, 0.003),
        (0.02, 0.001),
        (-0.015, 0.006),
        (0.004, -0.002),
        (0.007, 0.0),
        (-0.003, 0.002),
    ]
    .iter()
    .map(|(a, b)| row(&[("A", *a), ("B", *b)]))
    .collect()
}

#[test]
fn each_day_is_additive_when_every_asset_is_covered() {
    // Pricing at the end-of-day weights makes the decomposition exact.
    let (portfolio, asset_returns, weights_series) =
        inputs(&drifting_weights(), &drifting_returns(), |_, curr, r| dot(curr, r));
    let settings = AttributionSettings {
        residual_policy: ResidualPolicy::Fail,
        ..AttributionSettings::default()
    };
    let outcome = engine(&["A", "B"], settings)
        .compute(
            &portfolio,
            &asset_returns,
            &weights_series,
            &[Granularity::Daily, Granularity::Weekly, Granularity::Monthly],
        )
        .unwrap();
    let report = outcome.report().unwrap();

    for period in &report.get(Granularity::Daily).unwrap().periods {
        let explained = period.total_asset_contribution() + period.weight_change_impact;
        assert_relative_eq!(explained, period.total_return, epsilon = 1e-6);
    }
    assert_eq!(report.granularities.len(), 3);
    // Periods run 2..8 January; Monday the 8th opens the second ISO week.
    assert_eq!(report.get(Granularity::Weekly).unwrap().periods.len(), 2);
    assert_eq!(report.get(Granularity::Monthly).unwrap().periods.len(), 1);
}

#[test]
fn weekly_totals_compound_daily_returns() {
    let (portfolio, asset_returns, weights_series) =
        inputs(&drifting_weights(), &drifting_returns(), |_, curr, r| dot(curr, r));
    let outcome = engine(&["A", "B"], AttributionSettings::default())
        .compute(
            &portfolio,
            &asset_returns,
            &weights_series,
            &[Granularity::Weekly, Granularity::Daily],
        )
        .unwrap();
    let report = outcome.report().unwrap();
    let daily = &report.get(Granularity::Daily).unwrap().periods;
    let weekly = &report.get(Granularity::Weekly).unwrap().periods;

    let first_week = &daily[..6];
    let compounded = first_week.iter().fold(1.0, |acc, p| acc * (1.0 + p.total_return)) - 1.0;
    assert_relative_eq!(weekly[0].total_return, compounded, epsilon = 1e-12);
    assert_eq!(weekly[0].date, day(6));
    assert_eq!(weekly[1].date, day(7));
    let summed: f64 = first_week.iter().map(|p| p.asset_contributions["A"]).sum();
    assert_relative_eq!(weekly[0].asset_contributions["A"], summed, epsilon = 1e-12);
}

#[test]
fn asset_with_zero_weight_contributes_exactly_nothing() {
    let weights: Vec<_> = drifting_weights()
        .into_iter()
        .map(|mut w| {
            w.insert("C".to_string(), 0.0);
            w
        })
        .collect();
    let returns: Vec<_> = drifting_returns()
        .into_iter()
        .map(|mut r| {
            r.insert("C".to_string(), 0.05);
            r
        })
        .collect();
    let (portfolio, asset_returns, weights_series) =
        inputs(&weights, &returns, |_, curr, r| dot(curr, r));

    let keep_everything = AttributionSettings {
        weight_epsilon: 0.0,
        ..AttributionSettings::default()
    };
    let outcome = engine(&["A", "B", "C"], keep_everything)
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    let c = &outcome.report().unwrap().get(Granularity::Daily).unwrap().asset_analysis["C"];
    assert_eq!(c.total_contribution, 0.0);
    assert_eq!(c.total_rebalancing_impact, 0.0);

    // With the default epsilon it is not reported at all.
    let outcome = engine(&["A", "B", "C"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    assert_eq!(outcome.report().unwrap().assets, vec!["A", "B"]);
}

#[test]
fn assets_outside_the_registry_are_ignored() {
    let (portfolio, asset_returns, weights_series) =
        inputs(&drifting_weights(), &drifting_returns(), |_, curr, r| dot(curr, r));
    let outcome = engine(&["A", "Z"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    assert_eq!(outcome.report().unwrap().assets, vec!["A"]);
}

#[test]
fn residual_policy_decides_between_warning_and_failure() {
    // Pricing at beginning-of-day weights leaves the weight-change term unexplained.
    let (portfolio, asset_returns, weights_series) =
        inputs(&drifting_weights(), &drifting_returns(), |prev, _, r| dot(prev, r));

    let outcome = engine(&["A", "B"], AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    let stats = &outcome.report().unwrap().get(Granularity::Daily).unwrap().summary_statistics;
    assert!(!stats.residual_within_tolerance);
    assert_relative_eq!(
        stats.attribution_accuracy,
        stats.total_rebalancing_impact.abs(),
        epsilon = 1e-12
    );

    let strict = AttributionSettings {
        residual_policy: ResidualPolicy::Fail,
        ..AttributionSettings::default()
    };
    let err = engine(&["A", "B"], strict)
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap_err();
    assert!(matches!(
        err,
        AnalyticsError::ResidualExceeded { granularity: Granularity::Daily, .. }
    ));
}

#[test]
fn contributors_are_ranked_by_net_impact() {
    let symbols = ["A", "B", "C", "D", "E", "F"];
    let weights = vec![row(&symbols.map(|s| (s, 1.0 / 6.0))); 6];
    let returns = vec![
        row(&[("A", 0.01), ("B", 0.02), ("C", -0.01), ("D", 0.03), ("E", 0.0), ("F", -0.02)]);
        6
    ];
    let (portfolio, asset_returns, weights_series) =
        inputs(&weights, &returns, |prev, _, r| dot(prev, r));

    let outcome = engine(&symbols, AttributionSettings::default())
        .compute(&portfolio, &asset_returns, &weights_series, &[Granularity::Daily])
        .unwrap();
    let daily = outcome.report().unwrap().get(Granularity::Daily).unwrap();
    let top: Vec<&str> = daily.top_contributors.iter().map(|r| r.symbol.as_str()).collect();
    let bottom: Vec<&str> = daily.bottom_contributors.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(top, vec!["D", "B", "A", "E", "C"]);
    assert_eq!(bottom, vec!["F", "C", "E", "A", "B"]);
}
