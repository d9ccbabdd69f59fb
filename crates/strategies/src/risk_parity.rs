use crate::error::StrategyError;
use crate::{Signals, WeightCalculator, finish};
use configuration::RiskParityParams;
use core_types::{CalculationProvenance, MarketContext, TargetWeights};
use std::collections::BTreeMap;

/// Score given to an asset with fewer returns than the volatility window.
pub const NEUTRAL_SCORE: f64 = 1.0;

/// Inverse-volatility ("risk parity") allocation.
///
/// Volatility is the mean absolute daily return over the trailing window,
/// floored at `min_volatility` before inversion.
#[derive(Debug, Clone)]
pub struct RiskParityWeights {
    volatility_window: usize,
    min_volatility: f64,
}

impl RiskParityWeights {
    pub fn new(params: RiskParityParams) -> Result<Self, StrategyError> {
        if params.volatility_window == 0 {
            return Err(StrategyError::InvalidParameters(
                "volatility window must be positive".to_string(),
            ));
        }
        if !(params.min_volatility > 0.0) {
            return Err(StrategyError::InvalidParameters(
                "minimum volatility must be positive".to_string(),
            ));
        }
        Ok(Self {
            volatility_window: params.volatility_window,
            min_volatility: params.min_volatility,
        })
    }

    /// Mean absolute return over the trailing window, or `None` when the
    /// history holds fewer returns than the window.
    pub fn volatility(&self, history: &[f64]) -> Result<Option<f64>, StrategyError> {
        if history.len() < self.volatility_window + 1 {
            return Ok(None);
        }
        let tail = &history[history.len() - self.volatility_window - 1..];
        let total: f64 = tail
            .windows(2)
            .map(|pair| (pair[1] / pair[0] - 1.0).abs())
            .sum();
        let volatility = total / self.volatility_window as f64;
        if !volatility.is_finite() {
            return Err(StrategyError::Calculation(
                "non-finite return in volatility window".to_string(),
            ));
        }
        Ok(Some(volatility))
    }
}

impl WeightCalculator for RiskParityWeights {
    fn name(&self) -> &str {
        "risk_parity"
    }

    fn calculate(
        &self,
        market: &MarketContext<'_>,
    ) -> Result<(TargetWeights, CalculationProvenance), StrategyError> {
        let mut scores = BTreeMap::new();
        let mut volatilities = BTreeMap::new();
        for symbol in market.universe().symbols() {
            let history = market
                .price_history(symbol)
                .filter(|h| !h.is_empty())
                .ok_or_else(|| {
                    StrategyError::DataMissing(format!(
                        "no prices for {symbol} on or before {}",
                        market.date()
                    ))
                })?;
            let score = match self.volatility(&history)? {
                Some(volatility) => {
                    volatilities.insert(symbol.to_string(), volatility);
                    1.0 / volatility.max(self.min_volatility)
                }
                None => NEUTRAL_SCORE,
            };
            scores.insert(symbol.to_string(), score);
        }

        let mut signals = Signals::new();
        signals.insert("volatility".to_string(), volatilities);
        signals.insert("inverse_volatility_score".to_string(), scores.clone());
        finish(self.name(), market, signals, scores, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calc(window: usize) -> RiskParityWeights {
        RiskParityWeights::new(RiskParityParams {
            volatility_window: window,
            min_volatility: 0.001,
        })
        .unwrap()
    }

    #[test]
    fn short_history_has_no_volatility_estimate() {
        let history = vec![100.0; 21];
        assert_eq!(calc(21).volatility(&history).unwrap(), None);
    }

    #[test]
    fn volatility_is_mean_absolute_return_of_trailing_window() {
        // Only the last two returns are inside a window of 2: +10% and -10%.
        let history = vec![50.0, 100.0, 110.0, 99.0];
        assert_relative_eq!(calc(2).volatility(&history).unwrap().unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn flat_prices_hit_the_volatility_floor() {
        let history = vec![100.0; 30];
        let volatility = calc(21).volatility(&history).unwrap().unwrap();
        assert_eq!(volatility, 0.0);
        assert_relative_eq!(1.0 / volatility.max(0.001), 1000.0);
    }
}
