use crate::error::AnalyticsError;
use chrono::NaiveDate;
use core_types::RebalanceEvent;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// A compact summary of how the equity curve behaved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub initial_equity: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,

    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>, // Option<> for cases with no stdev
    pub calmar_ratio: Option<Decimal>, // Option<> for cases with no drawdown

    pub rebalance_count: usize,
    pub periods: usize,
}

/// A stateless calculator for deriving performance metrics from an equity curve.
#[derive(Debug, Default)]
pub struct PerformanceEngine {}

impl PerformanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Arguments
    ///
    /// * `equity_curve` - The portfolio value at each simulated close.
    /// * `rebalances` - Every rebalance the run instructed.
    pub fn calculate(
        &self,
        equity_curve: &[(NaiveDate, Decimal)],
        rebalances: &[RebalanceEvent],
    ) -> Result<PerformanceReport, AnalyticsError> {
        let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
            return Err(AnalyticsError::NotEnoughData(
                "equity curve is empty".to_string(),
            ));
        };
        let initial_equity = first.1;
        let final_equity = last.1;

        let total_return_pct = if initial_equity > Decimal::ZERO {
            (final_equity - initial_equity) / initial_equity * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let (max_drawdown, max_drawdown_pct) = Self::drawdown(equity_curve);
        let calmar_ratio = (max_drawdown_pct > Decimal::ZERO).then(|| total_return_pct / max_drawdown_pct);
        let sharpe_ratio = Self::sharpe(equity_curve)?;

        Ok(PerformanceReport {
            initial_equity,
            final_equity,
            total_return_pct,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            calmar_ratio,
            rebalance_count: rebalances.len(),
            periods: equity_curve.len(),
        })
    }

    /// Largest peak-to-trough decline, absolute and as a percentage of that peak.
    fn drawdown(equity_curve: &[(NaiveDate, Decimal)]) -> (Decimal, Decimal) {
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = Decimal::ZERO;
        let mut peak_equity = Decimal::ZERO;

        for &(_date, equity) in equity_curve {
            if equity > peak_equity {
                peak_equity = equity;
            }
            let drawdown = peak_equity - equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                if peak_equity > Decimal::ZERO {
                    max_drawdown_pct = drawdown / peak_equity * Decimal::ONE_HUNDRED;
                }
            }
        }
        (max_drawdown, max_drawdown_pct)
    }

    /// Per-period Sharpe with a zero risk-free rate. Not annualized.
    fn sharpe(equity_curve: &[(NaiveDate, Decimal)]) -> Result<Option<Decimal>, AnalyticsError> {
        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .filter(|w| !w[0].1.is_zero())
            .map(|w| (w[1].1 - w[0].1) / w[0].1)
            .collect();

        if returns.len() < 2 {
            return Ok(None);
        }

        let mean_return = returns.iter().sum::<Decimal>() / Decimal::from(returns.len());
        let variance = returns
            .iter()
            .map(|r| (*r - mean_return) * (*r - mean_return))
            .sum::<Decimal>()
            / Decimal::from(returns.len());

        if variance <= Decimal::ZERO {
            return Ok(None);
        }

        let std_dev = variance.sqrt().ok_or_else(|| {
            AnalyticsError::Calculation("failed to take square root of return variance".to_string())
        })?;
        Ok((std_dev > Decimal::ZERO).then(|| mean_return / std_dev))
    }
}
