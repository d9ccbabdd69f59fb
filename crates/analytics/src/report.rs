use chrono::NaiveDate;
use core_types::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The decomposition of one period's portfolio return.
///
/// Daily results come straight from consecutive aligned dates. Weekly and
/// monthly results are separate values built from the daily ones and are
/// dated with the last observed date of their bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub date: NaiveDate,
    pub granularity: Granularity,
    pub total_return: f64,
    /// Beginning-of-period weight times the asset's return.
    pub asset_contributions: BTreeMap<String, f64>,
    /// Sum of `rebalancing_impact` across assets.
    pub weight_change_impact: f64,
    /// Change in weight over the period times the asset's return.
    pub rebalancing_impact: BTreeMap<String, f64>,
}

impl AttributionResult {
    pub fn total_asset_contribution(&self) -> f64 {
        self.asset_contributions.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub periods: usize,
    /// Arithmetic sum of period returns. Not compounded.
    pub total_portfolio_return: f64,
    /// `Π(1 + r) - 1` over the same periods, for reference.
    pub compounded_portfolio_return: f64,
    pub total_asset_contribution: f64,
    pub total_rebalancing_impact: f64,
    /// `|total_portfolio_return - (total_asset_contribution + total_rebalancing_impact)|`
    pub attribution_accuracy: f64,
    pub residual_within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAnalysis {
    pub total_contribution: f64,
    pub average_contribution: f64,
    pub contribution_std: f64,
    pub total_rebalancing_impact: f64,
    pub average_rebalancing_impact: f64,
    pub rebalancing_impact_std: f64,
    pub net_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAsset {
    pub symbol: String,
    pub net_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranularityReport {
    pub summary_statistics: SummaryStatistics,
    pub asset_analysis: BTreeMap<String, AssetAnalysis>,
    pub top_contributors: Vec<RankedAsset>,
    pub bottom_contributors: Vec<RankedAsset>,
    /// Raw per-period rows, for export.
    pub periods: Vec<AttributionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub aligned_dates: usize,
    /// Assets that survived universe filtering.
    pub assets: Vec<String>,
    pub granularities: BTreeMap<Granularity, GranularityReport>,
}

impl AttributionReport {
    pub fn get(&self, granularity: Granularity) -> Option<&GranularityReport> {
        self.granularities.get(&granularity)
    }
}

/// What `AttributionEngine::compute` hands back when nothing went wrong.
///
/// Untagged, so the insufficient case is exactly `{"error": "..."}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributionOutcome {
    Report(AttributionReport),
    Insufficient { error: String },
}

impl AttributionOutcome {
    pub fn report(&self) -> Option<&AttributionReport> {
        match self {
            AttributionOutcome::Report(report) => Some(report),
            AttributionOutcome::Insufficient { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, AttributionOutcome::Insufficient { .. })
    }
}
