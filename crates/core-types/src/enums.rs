use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// The semantic class of an asset. Configuration validation checks each macro
/// sleeve against it, so a bond sleeve must point at a `Bond` asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    EquityIndex,
    Bond,
    Commodity,
    CashEquivalent,
}

/// How elapsed time since the last rebalance is measured by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBasis {
    /// Count of simulated periods (bars).
    TradingPeriods,
    /// Calendar days between dates.
    CalendarDays,
}

impl fmt::Display for GateBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateBasis::TradingPeriods => write!(f, "trading_periods"),
            GateBasis::CalendarDays => write!(f, "calendar_days"),
        }
    }
}

/// Why a rebalance event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// The very first simulated period always establishes the allocation.
    Initial,
    /// The time gate was open and at least one weight drifted past the threshold.
    ScheduledThreshold,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::Initial => write!(f, "initial"),
            TriggerType::ScheduledThreshold => write!(f, "scheduled_threshold"),
        }
    }
}

/// The bucket size of an attribution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Daily => write!(f, "daily"),
            Granularity::Weekly => write!(f, "weekly"),
            Granularity::Monthly => write!(f, "monthly"),
        }
    }
}
