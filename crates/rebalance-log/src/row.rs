use crate::error::LogError;
use chrono::NaiveDate;
use core_types::{GateBasis, RebalanceEvent, TriggerType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single rebalance flattened into one table row for export.
///
/// Weight maps and the provenance signals are stored as JSON object text so
/// the row stays flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceLogRow {
    pub date: NaiveDate,
    pub portfolio_value: Decimal,
    pub trigger_type: TriggerType,
    pub gate_basis: GateBasis,
    pub periods_since_last: Option<usize>,
    pub days_since_last: Option<i64>,
    pub max_deviation: f64,
    pub calculator: String,
    pub prior_weights: String,
    pub target_weights: String,
    /// `signal name -> asset -> value`, e.g. valuation percentiles.
    pub signals: String,
    pub raw_weights: String,
    pub normalization_factor: f64,
}

impl RebalanceLogRow {
    pub fn from_event(event: &RebalanceEvent) -> Result<Self, LogError> {
        Ok(Self {
            date: event.date,
            portfolio_value: event.portfolio_value,
            trigger_type: event.trigger.trigger_type,
            gate_basis: event.trigger.gate_basis,
            periods_since_last: event.trigger.periods_since_last,
            days_since_last: event.trigger.days_since_last,
            max_deviation: event.trigger.max_deviation,
            calculator: event.provenance.calculator().to_string(),
            prior_weights: serde_json::to_string(&event.prior_weights)?,
            target_weights: serde_json::to_string(&event.target_weights)?,
            signals: serde_json::to_string(event.provenance.signals())?,
            raw_weights: serde_json::to_string(event.provenance.raw_weights())?,
            normalization_factor: event.provenance.normalization_factor(),
        })
    }
}
