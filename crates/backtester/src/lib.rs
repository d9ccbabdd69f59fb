//! # Meridian Backtester
//!
//! The simulation driver. It owns the per-bar loop over the common trading
//! calendar, marks the simulated broker to market and hands each period to the
//! `RebalanceStateMachine`, which owns the rebalance decision and the log.

use analytics::{AssetReturns, PerformanceEngine, PerformanceReport, PortfolioObservation, PortfolioSeries};
use chrono::NaiveDate;
use configuration::{RebalanceSettings, Simulation};
use core_types::{AssetRegistry, Execution, MarketContext, MarketData};
use executor::{Broker, SimulatedBroker};
use indicatif::{ProgressBar, ProgressStyle};
use rebalance_log::RebalanceLog;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use strategies::WeightCalculator;

pub mod error;
pub mod rebalancer;

pub use error::BacktestError;
pub use rebalancer::RebalanceStateMachine;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub calculator: String,
    pub equity_curve: Vec<(NaiveDate, Decimal)>,
    pub log: RebalanceLog,
    pub executions: Vec<Execution>,
    /// Close-to-close returns of every universe asset on the simulated calendar.
    pub asset_returns: AssetReturns,
    pub performance: PerformanceReport,
}

impl SimulationResult {
    /// The equity curve in the shape the attribution engine consumes.
    pub fn portfolio_series(&self) -> Result<PortfolioSeries, BacktestError> {
        to_portfolio_series(&self.equity_curve)
    }
}

/// Converts an equity curve into a portfolio series, deriving each daily
/// return from the previous value.
pub fn to_portfolio_series(
    equity_curve: &[(NaiveDate, Decimal)],
) -> Result<PortfolioSeries, BacktestError> {
    let mut series = PortfolioSeries::new();
    let mut previous: Option<Decimal> = None;
    for (date, equity) in equity_curve {
        let value = equity.to_f64().ok_or_else(|| {
            BacktestError::DataUnavailable(format!("equity on {date} is not representable"))
        })?;
        let daily_return = match previous {
            Some(prev) if !prev.is_zero() => ((*equity - prev) / prev).to_f64(),
            _ => None,
        };
        series.insert(*date, PortfolioObservation { value, daily_return });
        previous = Some(*equity);
    }
    Ok(series)
}

/// The main backtesting engine.
pub struct Backtester {
    data: MarketData,
    registry: AssetRegistry,
    simulation: Simulation,
    machine: RebalanceStateMachine,
    broker: SimulatedBroker,
    show_progress: bool,
}

impl Backtester {
    pub fn new(
        data: MarketData,
        registry: AssetRegistry,
        simulation: Simulation,
        rebalance: RebalanceSettings,
        calculator: Box<dyn WeightCalculator>,
    ) -> Self {
        let broker = SimulatedBroker::new(simulation.initial_capital);
        Self {
            data,
            registry,
            simulation,
            machine: RebalanceStateMachine::new(calculator, rebalance),
            broker,
            show_progress: true,
        }
    }

    /// Hides the progress bar, e.g. for tests or non-interactive runs.
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// The dates every universe asset has a close on, clipped to the
    /// configured start and end.
    pub fn calendar(&self) -> Vec<NaiveDate> {
        self.data
            .common_dates(self.registry.symbols())
            .into_iter()
            .filter(|d| self.simulation.start_date.is_none_or(|start| *d >= start))
            .filter(|d| self.simulation.end_date.is_none_or(|end| *d <= end))
            .collect()
    }

    /// Runs the simulation over the whole calendar.
    pub fn run(mut self) -> Result<SimulationResult, BacktestError> {
        let calendar = self.calendar();
        if calendar.is_empty() {
            return Err(BacktestError::DataUnavailable(
                "universe assets share no trading dates in the requested range".to_string(),
            ));
        }
        tracing::info!(
            calculator = self.machine.calculator_name(),
            periods = calendar.len(),
            start = %calendar[0],
            end = %calendar[calendar.len() - 1],
            "starting simulation"
        );

        let progress_bar = if self.show_progress {
            let bar = ProgressBar::new(calendar.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("=>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut equity_curve = Vec::with_capacity(calendar.len());
        let mut asset_returns = AssetReturns::new();
        let mut previous_closes: Option<BTreeMap<String, f64>> = None;

        for date in calendar {
            let closes = self
                .data
                .closes_on(date, self.registry.symbols())
                .ok_or_else(|| BacktestError::DataUnavailable(format!("missing close on {date}")))?;

            // --- 1. MARK TO MARKET ---
            self.broker.mark_to_market(&closes)?;

            // --- 2. REBALANCE DECISION ---
            let market = MarketContext::new(date, &self.data, &self.registry);
            self.machine.step(date, &market, &mut self.broker)?;

            // --- 3. RECORD EQUITY AND RETURNS ---
            equity_curve.push((date, self.broker.portfolio_value()?));
            let returns = match &previous_closes {
                Some(prev) => closes
                    .iter()
                    .filter_map(|(symbol, close)| {
                        prev.get(symbol).map(|p| (symbol.clone(), close / p - 1.0))
                    })
                    .collect(),
                None => BTreeMap::new(),
            };
            asset_returns.insert(date, returns);
            previous_closes = Some(closes);
            progress_bar.inc(1);
        }

        progress_bar.finish_with_message("Simulation complete.");

        let calculator = self.machine.calculator_name().to_string();
        let log = self.machine.into_log();
        let performance = PerformanceEngine::new().calculate(&equity_curve, log.rebalances())?;
        tracing::info!(
            rebalances = performance.rebalance_count,
            total_return_pct = %performance.total_return_pct.round_dp(2),
            max_drawdown_pct = %performance.max_drawdown_pct.round_dp(2),
            "simulation finished"
        );

        Ok(SimulationResult {
            calculator,
            equity_curve,
            log,
            executions: self.broker.executions().to_vec(),
            asset_returns,
            performance,
        })
    }
}
