use crate::WeightCalculator;
use crate::error::StrategyError;
use crate::macro_valuation::MacroValuationWeights;
use crate::momentum::MomentumWeights;
use crate::risk_parity::RiskParityWeights;
use crate::static_weights::StaticWeights;
use configuration::CalculatorSettings;
use core_types::AssetRegistry;

/// Creates a new calculator instance from the `[calculator]` configuration block.
///
/// Universe-driven calculators (momentum, risk parity) read their universe from
/// the market context at calculation time; the registry is only checked here
/// so a misconfigured run fails before the first bar.
pub fn create_calculator(
    settings: &CalculatorSettings,
    registry: &AssetRegistry,
) -> Result<Box<dyn WeightCalculator>, StrategyError> {
    if registry.is_empty() {
        return Err(StrategyError::InvalidParameters(
            "asset registry is empty".to_string(),
        ));
    }
    // The compiler will error if a new calculator kind is added but not handled here.
    match settings {
        CalculatorSettings::Static(params) => Ok(Box::new(StaticWeights::new(params.clone())?)),
        CalculatorSettings::Momentum(params) => Ok(Box::new(MomentumWeights::new(params.clone())?)),
        CalculatorSettings::RiskParity(params) => {
            Ok(Box::new(RiskParityWeights::new(params.clone())?))
        }
        CalculatorSettings::Macro(params) => {
            Ok(Box::new(MacroValuationWeights::new(params.clone())?))
        }
    }
}
