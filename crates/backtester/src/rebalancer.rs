use crate::error::BacktestError;
use chrono::NaiveDate;
use configuration::RebalanceSettings;
use core_types::{
    GateBasis, MarketContext, RebalanceEvent, TargetWeights, TriggerContext, TriggerType,
    WeightsEvolutionEntry,
};
use executor::Broker;
use rebalance_log::RebalanceLog;
use std::collections::{BTreeMap, BTreeSet};
use strategies::WeightCalculator;

/// Decides, once per simulated period, whether to rebalance.
///
/// Each `step` runs the time gate, then (if open) the calculator and the
/// threshold trigger, instructs the broker when needed and appends to the log.
/// The driver owns the bar loop; this type only owns the decision.
pub struct RebalanceStateMachine {
    calculator: Box<dyn WeightCalculator>,
    settings: RebalanceSettings,
    /// Number of completed `step` calls.
    period_index: usize,
    last_step: Option<NaiveDate>,
    /// Period index and date of the most recent rebalance.
    last_rebalance: Option<(usize, NaiveDate)>,
    log: RebalanceLog,
}

impl RebalanceStateMachine {
    pub fn new(calculator: Box<dyn WeightCalculator>, settings: RebalanceSettings) -> Self {
        Self {
            calculator,
            settings,
            period_index: 0,
            last_step: None,
            last_rebalance: None,
            log: RebalanceLog::new(),
        }
    }

    pub fn calculator_name(&self) -> &str {
        self.calculator.name()
    }

    pub fn log(&self) -> &RebalanceLog {
        &self.log
    }

    pub fn into_log(self) -> RebalanceLog {
        self.log
    }

    pub fn periods(&self) -> usize {
        self.period_index
    }

    /// Advances the machine by one period.
    ///
    /// Returns the rebalance event when one was instructed. A calculator or
    /// broker failure aborts the step and is returned as-is.
    pub fn step<B: Broker + ?Sized>(
        &mut self,
        current_date: NaiveDate,
        market: &MarketContext<'_>,
        broker: &mut B,
    ) -> Result<Option<RebalanceEvent>, BacktestError> {
        if let Some(last) = self.last_step {
            if current_date < last {
                return Err(BacktestError::OutOfOrder {
                    date: current_date,
                    last,
                });
            }
        }
        if market.date() != current_date {
            return Err(BacktestError::ContextMismatch {
                date: current_date,
                context: market.date(),
            });
        }

        let index = self.period_index;
        let event = if self.time_gate_met(index, current_date) {
            self.evaluate(index, current_date, market, broker)?
        } else {
            tracing::trace!(date = %current_date, "rebalance gate closed");
            None
        };

        let weights = realized_weights(broker.current_weights()?, market);
        self.log.record_weights(WeightsEvolutionEntry {
            date: current_date,
            weights,
        })?;

        self.period_index += 1;
        self.last_step = Some(current_date);
        Ok(event)
    }

    fn time_gate_met(&self, index: usize, date: NaiveDate) -> bool {
        let Some((last_index, last_date)) = self.last_rebalance else {
            return true;
        };
        match self.settings.basis {
            GateBasis::TradingPeriods => index - last_index >= self.settings.interval,
            GateBasis::CalendarDays => {
                (date - last_date).num_days() >= self.settings.interval as i64
            }
        }
    }

    /// Gate is open: compute targets, test the threshold, trade if triggered.
    fn evaluate<B: Broker + ?Sized>(
        &mut self,
        index: usize,
        date: NaiveDate,
        market: &MarketContext<'_>,
        broker: &mut B,
    ) -> Result<Option<RebalanceEvent>, BacktestError> {
        let (target, provenance) = self.calculator.calculate(market)?;
        let current = broker.current_weights()?;
        let max_deviation = max_deviation(&current, &target);
        let initial = self.last_rebalance.is_none();
        let triggered = max_deviation > self.settings.threshold;

        tracing::debug!(
            %date,
            calculator = self.calculator.name(),
            max_deviation,
            threshold = self.settings.threshold,
            triggered,
            "rebalance gate open"
        );
        if !initial && !triggered {
            return Ok(None);
        }

        let portfolio_value = broker.portfolio_value()?;
        instruct(broker, &current, &target, date)?;

        let event = RebalanceEvent {
            date,
            portfolio_value,
            prior_weights: current,
            target_weights: target,
            trigger: TriggerContext {
                trigger_type: if initial {
                    TriggerType::Initial
                } else {
                    TriggerType::ScheduledThreshold
                },
                gate_basis: self.settings.basis,
                periods_since_last: self.last_rebalance.map(|(i, _)| index - i),
                days_since_last: self.last_rebalance.map(|(_, d)| (date - d).num_days()),
                max_deviation,
            },
            provenance,
        };
        tracing::info!(
            %date,
            trigger = %event.trigger.trigger_type,
            portfolio_value = %portfolio_value,
            max_deviation,
            "rebalanced"
        );
        self.log.record_rebalance(event.clone())?;
        self.last_rebalance = Some((index, date));
        Ok(Some(event))
    }
}

/// Largest `|current - target|` over every asset that is either held or targeted.
///
/// A held asset missing from the target counts as a deviation down to zero.
/// The built-in calculators name every asset they can allocate to, so for them
/// this equals the maximum over the target alone.
fn max_deviation(current: &BTreeMap<String, f64>, target: &TargetWeights) -> f64 {
    let symbols: BTreeSet<&str> = current
        .keys()
        .map(String::as_str)
        .chain(target.iter().map(|(s, _)| s))
        .collect();
    symbols
        .into_iter()
        .map(|s| (current.get(s).copied().unwrap_or(0.0) - target.get(s)).abs())
        .fold(0.0, f64::max)
}

/// Sends the orders: every reduction first so the buys are funded.
fn instruct<B: Broker + ?Sized>(
    broker: &mut B,
    current: &BTreeMap<String, f64>,
    target: &TargetWeights,
    date: NaiveDate,
) -> Result<(), BacktestError> {
    let held = |s: &str| current.get(s).copied().unwrap_or(0.0);

    // Held assets missing from the target are liquidated.
    let mut sells: Vec<(&str, f64)> = current
        .keys()
        .filter(|s| target.get(s) == 0.0)
        .map(|s| (s.as_str(), 0.0))
        .collect();
    sells.extend(
        target
            .iter()
            .filter(|(s, w)| *w > 0.0 && *w < held(*s)),
    );
    let buys = target.iter().filter(|(s, w)| *w > 0.0 && *w >= held(*s));

    for (symbol, weight) in sells.into_iter().chain(buys) {
        broker.set_target_weight(symbol, weight, date)?;
    }
    Ok(())
}

/// Broker weights with a zero for every universe asset not currently held.
fn realized_weights(
    mut weights: BTreeMap<String, f64>,
    market: &MarketContext<'_>,
) -> BTreeMap<String, f64> {
    for symbol in market.universe().symbols() {
        weights.entry(symbol.to_string()).or_insert(0.0);
    }
    weights
}
