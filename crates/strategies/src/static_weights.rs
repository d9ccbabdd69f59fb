use crate::error::StrategyError;
use crate::{Signals, WeightCalculator};
use configuration::StaticParams;
use core_types::{CalculationProvenance, MarketContext, TargetWeights};
use std::collections::BTreeMap;

/// A fixed-mix allocation that ignores market history entirely.
#[derive(Debug, Clone)]
pub struct StaticWeights {
    name: String,
    weights: TargetWeights,
}

impl StaticWeights {
    /// Creates a new `StaticWeights` from configured parameters.
    ///
    /// The mapping must already be a valid allocation; it is not rescaled.
    pub fn new(params: StaticParams) -> Result<Self, StrategyError> {
        let mut mapping = BTreeMap::new();
        for entry in params.weights {
            if mapping.insert(entry.symbol.clone(), entry.weight).is_some() {
                return Err(StrategyError::InvalidParameters(format!(
                    "symbol '{}' appears twice in static weights",
                    entry.symbol
                )));
            }
        }
        let weights = TargetWeights::try_from_map(mapping)
            .map_err(|e| StrategyError::InvalidParameters(e.to_string()))?;
        Ok(Self {
            name: "static".to_string(),
            weights,
        })
    }

    /// The explicit degraded mode: one equal share per symbol.
    pub fn equal_weight<'a>(
        symbols: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, StrategyError> {
        let weights = TargetWeights::equal(symbols)
            .map_err(|e| StrategyError::InvalidParameters(e.to_string()))?;
        Ok(Self {
            name: "equal_weight".to_string(),
            weights,
        })
    }

    pub fn weights(&self) -> &TargetWeights {
        &self.weights
    }
}

impl WeightCalculator for StaticWeights {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(
        &self,
        market: &MarketContext<'_>,
    ) -> Result<(TargetWeights, CalculationProvenance), StrategyError> {
        let provenance = CalculationProvenance::new(
            self.name.as_str(),
            market.date(),
            Signals::new(),
            self.weights.as_map().clone(),
            1.0,
            self.weights.clone(),
        );
        Ok((self.weights.clone(), provenance))
    }
}
