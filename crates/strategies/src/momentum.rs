use crate::error::StrategyError;
use crate::{Signals, WeightCalculator, finish};
use configuration::MomentumParams;
use core_types::{CalculationProvenance, MarketContext, TargetWeights};
use std::collections::BTreeMap;

/// Score given to an asset without a full lookback of history.
pub const NEUTRAL_SCORE: f64 = 1.0;

/// Allocates in proportion to positive trailing returns.
///
/// `score = max(0, (p_now - p_then) / p_then)` where `p_then` is the close
/// `lookback_periods` observations back. Short histories score neutral rather
/// than failing; an all-zero board falls back to equal weights.
#[derive(Debug, Clone)]
pub struct MomentumWeights {
    lookback_periods: usize,
}

impl MomentumWeights {
    pub fn new(params: MomentumParams) -> Result<Self, StrategyError> {
        if params.lookback_periods == 0 {
            return Err(StrategyError::InvalidParameters(
                "momentum lookback must be positive".to_string(),
            ));
        }
        Ok(Self {
            lookback_periods: params.lookback_periods,
        })
    }

    /// The momentum score of a single close history (oldest first).
    pub fn score(&self, history: &[f64]) -> Result<f64, StrategyError> {
        let Some(&now) = history.last() else {
            return Err(StrategyError::DataMissing("empty price history".to_string()));
        };
        if history.len() < self.lookback_periods {
            return Ok(NEUTRAL_SCORE);
        }
        let then = history[history.len() - self.lookback_periods];
        if !(then > 0.0) || !now.is_finite() {
            return Err(StrategyError::Calculation(format!(
                "cannot compute trailing return from {then} to {now}"
            )));
        }
        Ok(((now - then) / then).max(0.0))
    }
}

impl WeightCalculator for MomentumWeights {
    fn name(&self) -> &str {
        "momentum"
    }

    fn calculate(
        &self,
        market: &MarketContext<'_>,
    ) -> Result<(TargetWeights, CalculationProvenance), StrategyError> {
        let mut scores = BTreeMap::new();
        for symbol in market.universe().symbols() {
            let history = market.price_history(symbol).ok_or_else(|| {
                StrategyError::DataMissing(format!("no price series for {symbol}"))
            })?;
            let score = self.score(&history).map_err(|e| match e {
                StrategyError::DataMissing(_) => StrategyError::DataMissing(format!(
                    "no prices for {symbol} on or before {}",
                    market.date()
                )),
                other => other,
            })?;
            tracing::debug!(symbol, score, observations = history.len(), "momentum score");
            scores.insert(symbol.to_string(), score);
        }

        let mut signals = Signals::new();
        signals.insert("momentum_score".to_string(), scores.clone());
        finish(self.name(), market, signals, scores, true)
    }
}
