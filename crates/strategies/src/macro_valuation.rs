use crate::error::StrategyError;
use crate::percentile::{OutlierFilter, trailing_percentile};
use crate::{Signals, WeightCalculator, finish};
use configuration::MacroParams;
use core_types::{CalculationProvenance, MarketContext, TargetWeights};
use std::collections::BTreeMap;

/// The valuation/yield driven macro allocation.
///
/// - Equities: `base_allocation * (1 - valuation_percentile)`; cheap markets get more.
/// - Bond: `base_allocation * yield_percentile^2`; high yields get more.
/// - Cash: `current_yield / 100` once the yield reaches `min_yield`, else nothing.
/// - Commodity: a fixed raw weight.
///
/// Raw weights are normalized to sum to one. A missing or empty valuation or
/// yield series is an error, never a silent default.
#[derive(Debug, Clone)]
pub struct MacroValuationWeights {
    params: MacroParams,
}

impl MacroValuationWeights {
    pub fn new(params: MacroParams) -> Result<Self, StrategyError> {
        if params.equities.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "macro model needs at least one equity sleeve".to_string(),
            ));
        }
        let negative = params.equities.iter().any(|e| e.base_allocation < 0.0)
            || params.bond.base_allocation < 0.0
            || params.commodity.as_ref().is_some_and(|c| c.raw_weight < 0.0);
        if negative {
            return Err(StrategyError::InvalidParameters(
                "macro allocations must be non-negative".to_string(),
            ));
        }
        Ok(Self { params })
    }
}

impl WeightCalculator for MacroValuationWeights {
    fn name(&self) -> &str {
        "macro_valuation"
    }

    fn calculate(
        &self,
        market: &MarketContext<'_>,
    ) -> Result<(TargetWeights, CalculationProvenance), StrategyError> {
        let date = market.date();
        let mut raw = BTreeMap::new();
        let mut valuation_percentiles = BTreeMap::new();
        let mut valuation_ratios = BTreeMap::new();

        for equity in &self.params.equities {
            let series = market
                .valuation_series(&equity.symbol)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    StrategyError::DataMissing(format!(
                        "valuation series for {} is missing or empty",
                        equity.symbol
                    ))
                })?;
            let reading = trailing_percentile(
                series,
                date,
                equity.lookback_years,
                OutlierFilter::ValuationRatio,
            )?;
            tracing::debug!(
                symbol = %equity.symbol,
                ratio = reading.current,
                percentile = reading.percentile,
                sample = reading.sample_size,
                "valuation percentile"
            );
            valuation_ratios.insert(equity.symbol.clone(), reading.current);
            valuation_percentiles.insert(equity.symbol.clone(), reading.percentile);
            raw.insert(
                equity.symbol.clone(),
                equity.base_allocation * (1.0 - reading.percentile),
            );
        }

        let yields = market.yield_series();
        if yields.is_empty() {
            return Err(StrategyError::DataMissing(
                "benchmark yield series is missing or empty".to_string(),
            ));
        }
        let bond = &self.params.bond;
        let yield_reading = trailing_percentile(yields, date, bond.lookback_years, OutlierFilter::None)?;
        let current_yield = yield_reading.current;
        raw.insert(
            bond.symbol.clone(),
            bond.base_allocation * yield_reading.percentile.powi(2),
        );

        if let Some(cash) = &self.params.cash {
            let weight = if current_yield >= cash.min_yield {
                current_yield / 100.0
            } else {
                0.0
            };
            raw.insert(cash.symbol.clone(), weight);
        }

        if let Some(commodity) = &self.params.commodity {
            raw.insert(commodity.symbol.clone(), commodity.raw_weight);
        }

        let mut signals = Signals::new();
        signals.insert("valuation_ratio".to_string(), valuation_ratios);
        signals.insert("valuation_percentile".to_string(), valuation_percentiles);
        signals.insert(
            "yield".to_string(),
            BTreeMap::from([
                ("current".to_string(), current_yield),
                ("percentile".to_string(), yield_reading.percentile),
            ]),
        );

        finish(self.name(), market, signals, raw, false).map_err(|e| match e {
            StrategyError::Weights(inner) => StrategyError::Calculation(format!(
                "macro raw weights could not be normalized on {date}: {inner}"
            )),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use configuration::{BondSleeve, CashSleeve, CommoditySleeve, EquitySleeve};
    use core_types::{Asset, AssetClass, AssetRegistry, MarketData, TimeSeries};

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn params() -> MacroParams {
        MacroParams {
            equities: vec![EquitySleeve {
                symbol: "SPY".to_string(),
                base_allocation: 0.6,
                lookback_years: 20,
            }],
            bond: BondSleeve {
                symbol: "IEF".to_string(),
                base_allocation: 0.3,
                lookback_years: 10,
            },
            cash: Some(CashSleeve {
                symbol: "BIL".to_string(),
                min_yield: 4.0,
            }),
            commodity: Some(CommoditySleeve {
                symbol: "GLD".to_string(),
                raw_weight: 0.1,
            }),
        }
    }

    fn registry() -> AssetRegistry {
        AssetRegistry::new(vec![
            Asset::new("SPY", AssetClass::EquityIndex),
            Asset::new("IEF", AssetClass::Bond),
            Asset::new("BIL", AssetClass::CashEquivalent),
            Asset::new("GLD", AssetClass::Commodity),
        ])
    }

    /// Four monthly P/E readings (last = 20, the 3rd lowest of 4) and yields
    /// ending at `last_yield`.
    fn data(last_yield: f64) -> MarketData {
        let pe: TimeSeries = [(d(2020, 1), 15.0), (d(2020, 2), 25.0), (d(2020, 3), 18.0), (d(2020, 4), 20.0)]
            .into_iter()
            .collect();
        let yields: TimeSeries = [(d(2020, 1), 2.0), (d(2020, 2), 5.0), (d(2020, 3), 1.0), (d(2020, 4), last_yield)]
            .into_iter()
            .collect();
        MarketData {
            valuations: BTreeMap::from([("SPY".to_string(), pe)]),
            yields,
            ..MarketData::default()
        }
    }

    #[test]
    fn cash_gets_nothing_below_minimum_yield() {
        let data = data(3.0);
        let registry = registry();
        let calc = MacroValuationWeights::new(params()).unwrap();
        let (weights, provenance) = calc
            .calculate(&MarketContext::new(d(2020, 4), &data, &registry))
            .unwrap();
        assert_eq!(weights.get("BIL"), 0.0);
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-9);

        // SPY: 0.6 * (1 - 0.75); IEF: 0.3 * 0.75^2; GLD: 0.1
        let raw = provenance.raw_weights();
        assert_relative_eq!(raw["SPY"], 0.15, epsilon = 1e-12);
        assert_relative_eq!(raw["IEF"], 0.16875, epsilon = 1e-12);
        assert_relative_eq!(raw["GLD"], 0.1, epsilon = 1e-12);
        assert_relative_eq!(provenance.normalization_factor(), 1.0 / 0.41875, epsilon = 1e-12);
        assert_relative_eq!(
            provenance.signal("valuation_percentile").unwrap()["SPY"],
            0.75
        );
    }

    #[test]
    fn cash_earns_its_yield_at_or_above_minimum() {
        let data = data(4.0);
        let registry = registry();
        let calc = MacroValuationWeights::new(params()).unwrap();
        let (_, provenance) = calc
            .calculate(&MarketContext::new(d(2020, 4), &data, &registry))
            .unwrap();
        assert_relative_eq!(provenance.raw_weights()["BIL"], 0.04, epsilon = 1e-12);
    }

    #[test]
    fn missing_valuation_series_is_fatal() {
        let mut data = data(3.0);
        data.valuations.clear();
        let registry = registry();
        let calc = MacroValuationWeights::new(params()).unwrap();
        let err = calc
            .calculate(&MarketContext::new(d(2020, 4), &data, &registry))
            .unwrap_err();
        assert!(matches!(err, StrategyError::DataMissing(_)));
    }

    #[test]
    fn missing_yield_series_is_fatal() {
        let mut data = data(3.0);
        data.yields = TimeSeries::new();
        let registry = registry();
        let calc = MacroValuationWeights::new(params()).unwrap();
        let err = calc
            .calculate(&MarketContext::new(d(2020, 4), &data, &registry))
            .unwrap_err();
        assert!(matches!(err, StrategyError::DataMissing(_)));
    }
}
