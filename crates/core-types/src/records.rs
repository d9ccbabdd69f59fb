use crate::enums::{GateBasis, TriggerType};
use crate::weights::{CalculationProvenance, TargetWeights};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Realized (post-trade) weights at the close of one simulated period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsEvolutionEntry {
    pub date: NaiveDate,
    pub weights: BTreeMap<String, f64>,
}

/// Diagnostics describing why and when a rebalance fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    pub trigger_type: TriggerType,
    pub gate_basis: GateBasis,
    /// Simulated periods since the previous rebalance; `None` on the first one.
    pub periods_since_last: Option<usize>,
    /// Calendar days since the previous rebalance; `None` on the first one.
    pub days_since_last: Option<i64>,
    /// Largest `|current - target|` across the target universe.
    pub max_deviation: f64,
}

/// A rebalance that was actually instructed to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceEvent {
    pub date: NaiveDate,
    pub portfolio_value: Decimal,
    pub prior_weights: BTreeMap<String, f64>,
    pub target_weights: TargetWeights,
    pub trigger: TriggerContext,
    pub provenance: CalculationProvenance,
}
