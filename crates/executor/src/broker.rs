use crate::error::ExecutorError;
use crate::portfolio::Portfolio;
use chrono::NaiveDate;
use core_types::{Execution, OrderSide};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Decimal places kept on simulated share quantities.
pub const QUANTITY_DP: u32 = 6;

/// The execution collaborator the rebalancer talks to.
///
/// Implementations fill instructions at the current period's close. No partial
/// fills or slippage are modeled at this layer.
pub trait Broker {
    /// Cash plus all positions marked at the latest closes.
    fn portfolio_value(&self) -> Result<Decimal, ExecutorError>;

    /// Share count held in `symbol`; zero when flat.
    fn position(&self, symbol: &str) -> Decimal;

    /// Realized weight of every held position as a fraction of portfolio value.
    fn current_weights(&self) -> Result<BTreeMap<String, f64>, ExecutorError>;

    /// Trades `symbol` so that it makes up `weight` of the portfolio.
    ///
    /// A zero weight on an existing position liquidates it completely.
    /// Returns `None` when no trade was necessary.
    fn set_target_weight(
        &mut self,
        symbol: &str,
        weight: f64,
        date: NaiveDate,
    ) -> Result<Option<Execution>, ExecutorError>;
}

/// The "virtual broker" for backtesting.
///
/// The driver marks it to market with each period's closes before the
/// rebalancer runs; every instruction then fills at exactly that close.
#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    portfolio: Portfolio,
    prices: BTreeMap<String, Decimal>,
    executions: Vec<Execution>,
}

impl SimulatedBroker {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
            prices: BTreeMap::new(),
            executions: Vec::new(),
        }
    }

    /// Records the closing prices of a period. Symbols not mentioned keep
    /// their last known close.
    pub fn mark_to_market(&mut self, closes: &BTreeMap<String, f64>) -> Result<(), ExecutorError> {
        for (symbol, close) in closes {
            let price = Decimal::from_f64(*close)
                .filter(|p| p.is_sign_positive() && !p.is_zero())
                .ok_or_else(|| {
                    ExecutorError::PortfolioError(format!("invalid close {close} for {symbol}"))
                })?;
            self.prices.insert(symbol.clone(), price);
        }
        Ok(())
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Every fill so far, in execution order.
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    fn price(&self, symbol: &str) -> Result<Decimal, ExecutorError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExecutorError::PriceUnavailable(symbol.to_string()))
    }
}

impl Broker for SimulatedBroker {
    fn portfolio_value(&self) -> Result<Decimal, ExecutorError> {
        self.portfolio.calculate_total_equity(&self.prices)
    }

    fn position(&self, symbol: &str) -> Decimal {
        self.portfolio
            .get_position(symbol)
            .map(|p| p.quantity)
            .unwrap_or_default()
    }

    fn current_weights(&self) -> Result<BTreeMap<String, f64>, ExecutorError> {
        let total = self.portfolio_value()?;
        let mut weights = BTreeMap::new();
        if total <= Decimal::ZERO {
            return Ok(weights);
        }
        for (symbol, position) in &self.portfolio.positions {
            let value = self.price(symbol)? * position.quantity;
            let weight = (value / total).to_f64().ok_or_else(|| {
                ExecutorError::PortfolioError(format!("weight of {symbol} is not representable"))
            })?;
            weights.insert(symbol.clone(), weight);
        }
        Ok(weights)
    }

    fn set_target_weight(
        &mut self,
        symbol: &str,
        weight: f64,
        date: NaiveDate,
    ) -> Result<Option<Execution>, ExecutorError> {
        let invalid = || ExecutorError::InvalidWeight {
            symbol: symbol.to_string(),
            weight,
        };
        if !weight.is_finite() || weight < 0.0 {
            return Err(invalid());
        }

        let held = self.position(symbol);
        let (side, quantity, price) = if weight == 0.0 {
            if held.is_zero() {
                return Ok(None);
            }
            // Full liquidation: sell exactly what is held.
            (OrderSide::Sell, held, self.price(symbol)?)
        } else {
            let price = self.price(symbol)?;
            let total = self.portfolio_value()?;
            let fraction = Decimal::from_f64(weight).ok_or_else(invalid)?;
            let target = ((total * fraction) / price)
                .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero);
            let delta = target - held;
            if delta.is_zero() {
                return Ok(None);
            }
            if delta.is_sign_positive() {
                // Never spend more than the cash on hand; rounding can push a
                // fully-invested target a hair past it.
                let affordable = (self.portfolio.cash / price)
                    .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero);
                let quantity = delta.min(affordable);
                if quantity.is_zero() {
                    return Ok(None);
                }
                (OrderSide::Buy, quantity, price)
            } else {
                (OrderSide::Sell, delta.abs(), price)
            }
        };

        let execution = Execution {
            execution_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            date,
        };
        self.portfolio.update_with_execution(&execution)?;
        tracing::debug!(
            symbol,
            side = ?execution.side,
            quantity = %execution.quantity,
            price = %execution.price,
            "simulated fill"
        );
        self.executions.push(execution.clone());
        Ok(Some(execution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn broker() -> SimulatedBroker {
        let mut broker = SimulatedBroker::new(dec!(10000));
        broker
            .mark_to_market(&BTreeMap::from([
                ("A".to_string(), 100.0),
                ("B".to_string(), 50.0),
            ]))
            .unwrap();
        broker
    }

    #[test]
    fn targets_are_filled_at_the_close() {
        let mut broker = broker();
        let fill = broker.set_target_weight("A", 0.6, date()).unwrap().unwrap();
        assert_eq!(fill.side, OrderSide::Buy);
        assert_eq!(fill.quantity, dec!(60));
        assert_eq!(fill.price, dec!(100));
        broker.set_target_weight("B", 0.4, date()).unwrap();

        let weights = broker.current_weights().unwrap();
        assert_relative_eq!(weights["A"], 0.6, epsilon = 1e-12);
        assert_relative_eq!(weights["B"], 0.4, epsilon = 1e-12);
        assert_eq!(broker.portfolio_value().unwrap(), dec!(10000));
    }

    #[test]
    fn zero_target_liquidates_whole_position() {
        let mut broker = broker();
        broker.set_target_weight("A", 0.5, date()).unwrap();
        let fill = broker.set_target_weight("A", 0.0, date()).unwrap().unwrap();
        assert_eq!(fill.side, OrderSide::Sell);
        assert_eq!(fill.quantity, dec!(50));
        assert_eq!(broker.position("A"), Decimal::ZERO);
        assert!(broker.set_target_weight("A", 0.0, date()).unwrap().is_none());
    }

    #[test]
    fn drift_is_traded_back_to_target() {
        let mut broker = broker();
        broker.set_target_weight("A", 0.5, date()).unwrap();
        broker.set_target_weight("B", 0.5, date()).unwrap();
        broker
            .mark_to_market(&BTreeMap::from([("A".to_string(), 150.0)]))
            .unwrap();
        // A is now 7500 of 12500 = 0.6
        assert_relative_eq!(broker.current_weights().unwrap()["A"], 0.6, epsilon = 1e-12);
        let fill = broker.set_target_weight("A", 0.5, date()).unwrap().unwrap();
        assert_eq!(fill.side, OrderSide::Sell);
        assert_relative_eq!(broker.current_weights().unwrap()["A"], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn unknown_symbol_has_no_price() {
        let mut broker = broker();
        assert!(matches!(
            broker.set_target_weight("Z", 0.1, date()),
            Err(ExecutorError::PriceUnavailable(_))
        ));
        assert!(matches!(
            broker.set_target_weight("A", -0.1, date()),
            Err(ExecutorError::InvalidWeight { .. })
        ));
    }
}
