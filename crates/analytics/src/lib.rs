//! # Meridian Analytics
//!
//! This crate is the "unbiased judge" of a run. It turns the logs written by the
//! rebalancer into numbers a person can act on.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No knowledge of brokers or files. Inputs are ordered
//!   series, outputs are serializable reports.
//! - **Stateless Calculation:** `AttributionEngine` and `PerformanceEngine` hold
//!   only their settings. The same inputs always give the same report.
//! - **Insufficient is not an error:** too few aligned dates yields
//!   `AttributionOutcome::Insufficient`, which serializes as `{"error": "..."}`.
//!
//! ## Public API
//!
//! - `AttributionEngine`: per-asset contribution and rebalancing impact.
//! - `PerformanceEngine`: return, drawdown and risk-adjusted summary of an equity curve.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod attribution;
pub mod error;
pub mod granularity;
pub mod performance;
pub mod report;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use attribution::AttributionEngine;
pub use error::AnalyticsError;
pub use performance::{PerformanceEngine, PerformanceReport};
pub use rebalance_log::WeightsSeries;
pub use report::{
    AssetAnalysis, AttributionOutcome, AttributionReport, AttributionResult, GranularityReport,
    RankedAsset, SummaryStatistics,
};

/// One point of the portfolio series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioObservation {
    pub value: f64,
    /// The return since the previous observation, when the producer knows it.
    /// Otherwise it is recomputed from consecutive values.
    #[serde(default)]
    pub daily_return: Option<f64>,
}

pub type PortfolioSeries = BTreeMap<NaiveDate, PortfolioObservation>;

/// `date -> symbol -> simple return realized on that date`.
pub type AssetReturns = BTreeMap<NaiveDate, BTreeMap<String, f64>>;
