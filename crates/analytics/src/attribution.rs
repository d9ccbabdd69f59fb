use crate::error::AnalyticsError;
use crate::granularity::aggregate;
use crate::report::{
    AssetAnalysis, AttributionOutcome, AttributionReport, AttributionResult, GranularityReport,
    RankedAsset, SummaryStatistics,
};
use crate::{AssetReturns, PortfolioSeries, WeightsSeries};
use chrono::NaiveDate;
use configuration::{AttributionSettings, ResidualPolicy};
use core_types::{AssetRegistry, Granularity};
use std::collections::{BTreeMap, BTreeSet};

/// How many assets are listed in the top and bottom contributor tables.
pub const RANKED_ASSETS: usize = 5;

/// Decomposes realized portfolio returns into per-asset contributions and the
/// impact of weight changes.
///
/// Stateless apart from its settings and the registry used for universe
/// filtering.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    settings: AttributionSettings,
    registry: AssetRegistry,
}

impl AttributionEngine {
    pub fn new(settings: AttributionSettings, registry: AssetRegistry) -> Self {
        Self { settings, registry }
    }

    /// The main entry point for attribution.
    ///
    /// # Returns
    ///
    /// * `Ok(AttributionOutcome::Report)` - one report per requested granularity.
    /// * `Ok(AttributionOutcome::Insufficient)` - fewer aligned dates than
    ///   `min_common_dates`. This is expected sparsity, not a failure.
    /// * `Err(AnalyticsError::ResidualExceeded)` - the residual broke tolerance
    ///   under `ResidualPolicy::Fail`.
    pub fn compute(
        &self,
        portfolio: &PortfolioSeries,
        asset_returns: &AssetReturns,
        weights: &WeightsSeries,
        granularities: &[Granularity],
    ) -> Result<AttributionOutcome, AnalyticsError> {
        let aligned: Vec<NaiveDate> = portfolio
            .keys()
            .filter(|date| asset_returns.contains_key(*date) && weights.contains_key(*date))
            .copied()
            .collect();

        if aligned.len() < self.settings.min_common_dates {
            tracing::warn!(
                aligned = aligned.len(),
                required = self.settings.min_common_dates,
                "not enough aligned dates for attribution"
            );
            return Ok(AttributionOutcome::Insufficient {
                error: format!(
                    "insufficient data: {} aligned dates, at least {} required",
                    aligned.len(),
                    self.settings.min_common_dates
                ),
            });
        }

        let assets = self.universe(&aligned, asset_returns, weights);
        let daily = self.daily_results(&aligned, portfolio, asset_returns, weights, &assets);
        tracing::info!(
            aligned = aligned.len(),
            assets = assets.len(),
            periods = daily.len(),
            "attribution decomposed"
        );

        let mut requested: Vec<Granularity> = granularities.to_vec();
        requested.sort();
        requested.dedup();

        let mut reports = BTreeMap::new();
        for granularity in requested {
            let periods = aggregate(&daily, granularity);
            reports.insert(granularity, self.synthesize(granularity, periods, &assets)?);
        }

        // `aligned` holds at least `min_common_dates` (>= 2) entries here.
        let (start_date, end_date) = match (aligned.first(), aligned.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(AnalyticsError::NotEnoughData(
                    "no aligned dates".to_string(),
                ));
            }
        };

        Ok(AttributionOutcome::Report(AttributionReport {
            start_date,
            end_date,
            aligned_dates: aligned.len(),
            assets,
            granularities: reports,
        }))
    }

    /// Registry ∩ weight columns ∩ return columns, minus assets that are
    /// structurally absent (total absolute weight below epsilon).
    fn universe(
        &self,
        aligned: &[NaiveDate],
        asset_returns: &AssetReturns,
        weights: &WeightsSeries,
    ) -> Vec<String> {
        let columns = |frame: &BTreeMap<NaiveDate, BTreeMap<String, f64>>| -> BTreeSet<String> {
            aligned
                .iter()
                .filter_map(|date| frame.get(date))
                .flat_map(|row| row.keys().cloned())
                .collect()
        };
        let weight_columns = columns(weights);
        let return_columns = columns(asset_returns);

        self.registry
            .symbols()
            .filter(|symbol| weight_columns.contains(*symbol) && return_columns.contains(*symbol))
            .filter(|symbol| {
                let exposure: f64 = aligned
                    .iter()
                    .map(|date| weight_on(weights, *date, symbol).abs())
                    .sum();
                if exposure < self.settings.weight_epsilon {
                    tracing::debug!(symbol, exposure, "dropping structurally absent asset");
                    false
                } else {
                    true
                }
            })
            .map(str::to_string)
            .collect()
    }

    fn daily_results(
        &self,
        aligned: &[NaiveDate],
        portfolio: &PortfolioSeries,
        asset_returns: &AssetReturns,
        weights: &WeightsSeries,
        assets: &[String],
    ) -> Vec<AttributionResult> {
        let mut results = Vec::with_capacity(aligned.len().saturating_sub(1));
        for pair in aligned.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            let Some(total_return) = portfolio_return(portfolio, prev, curr) else {
                tracing::warn!(date = %curr, "portfolio return is not finite; skipping day");
                continue;
            };

            let mut asset_contributions = BTreeMap::new();
            let mut rebalancing_impact = BTreeMap::new();
            for symbol in assets {
                let ret = asset_returns
                    .get(&curr)
                    .and_then(|row| row.get(symbol))
                    .copied()
                    .filter(|r| r.is_finite())
                    .unwrap_or(0.0);
                let weight_prev = weight_on(weights, prev, symbol);
                let weight_curr = weight_on(weights, curr, symbol);
                asset_contributions.insert(symbol.clone(), weight_prev * ret);
                rebalancing_impact.insert(symbol.clone(), (weight_curr - weight_prev) * ret);
            }

            results.push(AttributionResult {
                date: curr,
                granularity: Granularity::Daily,
                total_return,
                weight_change_impact: rebalancing_impact.values().sum(),
                asset_contributions,
                rebalancing_impact,
            });
        }
        results
    }

    fn synthesize(
        &self,
        granularity: Granularity,
        periods: Vec<AttributionResult>,
        assets: &[String],
    ) -> Result<GranularityReport, AnalyticsError> {
        let total_portfolio_return: f64 = periods.iter().map(|p| p.total_return).sum();
        let compounded_portfolio_return =
            periods.iter().fold(1.0, |acc, p| acc * (1.0 + p.total_return)) - 1.0;
        let total_asset_contribution: f64 =
            periods.iter().map(AttributionResult::total_asset_contribution).sum();
        let total_rebalancing_impact: f64 = periods.iter().map(|p| p.weight_change_impact).sum();
        let attribution_accuracy =
            (total_portfolio_return - (total_asset_contribution + total_rebalancing_impact)).abs();
        let residual_within_tolerance = attribution_accuracy <= self.settings.residual_tolerance;

        if !residual_within_tolerance {
            match self.settings.residual_policy {
                ResidualPolicy::Warn => tracing::warn!(
                    %granularity,
                    residual = attribution_accuracy,
                    tolerance = self.settings.residual_tolerance,
                    "attribution residual exceeds tolerance"
                ),
                ResidualPolicy::Fail => {
                    return Err(AnalyticsError::ResidualExceeded {
                        granularity,
                        residual: attribution_accuracy,
                        tolerance: self.settings.residual_tolerance,
                    });
                }
            }
        }

        let mut asset_analysis = BTreeMap::new();
        for symbol in assets {
            let contributions: Vec<f64> = periods
                .iter()
                .map(|p| p.asset_contributions.get(symbol).copied().unwrap_or(0.0))
                .collect();
            let impacts: Vec<f64> = periods
                .iter()
                .map(|p| p.rebalancing_impact.get(symbol).copied().unwrap_or(0.0))
                .collect();
            let (total_contribution, average_contribution, contribution_std) = describe(&contributions);
            let (total_impact, average_impact, impact_std) = describe(&impacts);
            asset_analysis.insert(
                symbol.clone(),
                AssetAnalysis {
                    total_contribution,
                    average_contribution,
                    contribution_std,
                    total_rebalancing_impact: total_impact,
                    average_rebalancing_impact: average_impact,
                    rebalancing_impact_std: impact_std,
                    net_impact: total_contribution + total_impact,
                },
            );
        }

        let mut ranked: Vec<RankedAsset> = asset_analysis
            .iter()
            .map(|(symbol, analysis)| RankedAsset {
                symbol: symbol.clone(),
                net_impact: analysis.net_impact,
            })
            .collect();
        // Stable sorts keep ties in symbol order.
        ranked.sort_by(|a, b| b.net_impact.total_cmp(&a.net_impact));
        let top_contributors = ranked.iter().take(RANKED_ASSETS).cloned().collect();
        ranked.sort_by(|a, b| a.net_impact.total_cmp(&b.net_impact));
        let bottom_contributors = ranked.into_iter().take(RANKED_ASSETS).collect();

        Ok(GranularityReport {
            summary_statistics: SummaryStatistics {
                periods: periods.len(),
                total_portfolio_return,
                compounded_portfolio_return,
                total_asset_contribution,
                total_rebalancing_impact,
                attribution_accuracy,
                residual_within_tolerance,
            },
            asset_analysis,
            top_contributors,
            bottom_contributors,
            periods,
        })
    }
}

fn weight_on(weights: &WeightsSeries, date: NaiveDate, symbol: &str) -> f64 {
    weights
        .get(&date)
        .and_then(|row| row.get(symbol))
        .copied()
        .filter(|w| w.is_finite())
        .unwrap_or(0.0)
}

/// The recorded return at `curr`, or `value[curr] / value[prev] - 1`.
fn portfolio_return(portfolio: &PortfolioSeries, prev: NaiveDate, curr: NaiveDate) -> Option<f64> {
    let current = portfolio.get(&curr)?;
    let ret = match current.daily_return {
        Some(ret) => ret,
        None => current.value / portfolio.get(&prev)?.value - 1.0,
    };
    ret.is_finite().then_some(ret)
}

/// Total, mean and sample standard deviation. A single value has zero spread.
fn describe(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = values.len() as f64;
    let total: f64 = values.iter().sum();
    let mean = total / n;
    if values.len() < 2 {
        return (total, mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (total, mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn describe_uses_sample_deviation() {
        let (total, mean, std) = describe(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(total, 10.0);
        assert_eq!(mean, 2.5);
        assert_relative_eq!(std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(describe(&[0.3]), (0.3, 0.3, 0.0));
    }

    #[test]
    fn portfolio_return_prefers_recorded_value() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut series = PortfolioSeries::new();
        series.insert(d1, crate::PortfolioObservation { value: 100.0, daily_return: None });
        series.insert(d2, crate::PortfolioObservation { value: 110.0, daily_return: None });
        assert_relative_eq!(portfolio_return(&series, d1, d2).unwrap(), 0.1, epsilon = 1e-12);

        series.insert(d2, crate::PortfolioObservation { value: 110.0, daily_return: Some(0.05) });
        assert_eq!(portfolio_return(&series, d1, d2), Some(0.05));

        series.insert(d2, crate::PortfolioObservation { value: f64::NAN, daily_return: None });
        assert_eq!(portfolio_return(&series, d1, d2), None);
    }
}
