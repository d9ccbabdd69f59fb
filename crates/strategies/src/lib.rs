//! # Meridian Weight Calculators
//!
//! This crate contains the allocation logic for the Meridian system. It defines a
//! universal `WeightCalculator` trait and provides several concrete implementations.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of brokers,
//!   logs or reports. It depends only on `core-types` and `configuration`.
//! - **Calculator Agnostic Engine:** By using the `WeightCalculator` trait, the
//!   rebalancing state machine can run any allocation model without knowing its
//!   internal details.
//! - **Fail Fast:** A calculator never substitutes default weights for missing or
//!   invalid data. Equal weighting is available only as the explicit
//!   `StaticWeights::equal_weight` constructor.
//!
//! ## Public API
//!
//! - `WeightCalculator`: The core trait all calculators implement.
//! - `create_calculator`: The factory function to construct a calculator instance.
//! - The concrete calculator structs themselves (e.g., `MomentumWeights`).

// Declare all the modules that constitute this crate.
pub mod error;
pub mod factory;
pub mod macro_valuation;
pub mod momentum;
pub mod percentile;
pub mod risk_parity;
pub mod static_weights;

// Re-export the key components to create a clean, public-facing API.
pub use error::StrategyError;
pub use factory::create_calculator;
pub use macro_valuation::MacroValuationWeights;
pub use momentum::MomentumWeights;
pub use risk_parity::RiskParityWeights;
pub use static_weights::StaticWeights;

use core_types::{CalculationProvenance, MarketContext, TargetWeights};
use std::collections::BTreeMap;

/// Named per-asset inputs recorded in a provenance, e.g. `"momentum_score"`.
pub type Signals = BTreeMap<String, BTreeMap<String, f64>>;

/// The core trait that all weight calculators must implement.
///
/// `calculate` takes `&self`: a calculator holds only its parameters, so two
/// calls with the same context always return identical weights. The
/// `Send + Sync` bounds let independent runs live on separate threads.
pub trait WeightCalculator: Send + Sync {
    /// A short identifier recorded in every provenance.
    fn name(&self) -> &str;

    /// Computes target weights as of `market.date()`.
    ///
    /// # Returns
    ///
    /// * `Ok((weights, provenance))` - a fully-invested allocation and its audit record.
    /// * `Err(StrategyError)` - required data was missing or a calculation failed.
    ///   Callers must treat this as fatal.
    fn calculate(
        &self,
        market: &MarketContext<'_>,
    ) -> Result<(TargetWeights, CalculationProvenance), StrategyError>;
}

/// Normalizes raw scores into weights and wraps everything into a provenance.
///
/// When `equal_when_zero` is set and every raw score is exactly zero, each
/// asset gets a raw weight of one instead.
pub(crate) fn finish(
    name: &str,
    market: &MarketContext<'_>,
    signals: Signals,
    mut raw: BTreeMap<String, f64>,
    equal_when_zero: bool,
) -> Result<(TargetWeights, CalculationProvenance), StrategyError> {
    if equal_when_zero && !raw.is_empty() && raw.values().all(|v| *v == 0.0) {
        tracing::debug!(calculator = name, date = %market.date(), "all scores zero; equal-weighting universe");
        raw.values_mut().for_each(|v| *v = 1.0);
    }
    let (weights, factor) = TargetWeights::normalize(&raw)?;
    let provenance =
        CalculationProvenance::new(name, market.date(), signals, raw, factor, weights.clone());
    Ok((weights, provenance))
}
