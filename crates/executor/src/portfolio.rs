use crate::error::ExecutorError;
use core_types::{Execution, OrderSide, Position};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Manages the state of a long-only account: cash and positions.
/// Its sole responsibility is to accurately reflect the current state based on executions.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting capital.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
        }
    }

    /// Applies one fill to cash and positions.
    ///
    /// Long-only: a buy must be covered by cash and a sell by the held quantity.
    /// Nothing is mutated when the fill is rejected.
    pub fn update_with_execution(&mut self, execution: &Execution) -> Result<(), ExecutorError> {
        let cost = execution.price * execution.quantity;
        let symbol = &execution.symbol;

        match execution.side {
            OrderSide::Buy => {
                if cost > self.cash {
                    return Err(ExecutorError::InsufficientCash {
                        required: cost.to_string(),
                        available: self.cash.to_string(),
                    });
                }
                self.cash -= cost;

                let position = self.positions.entry(symbol.clone()).or_insert_with(|| Position {
                    symbol: symbol.clone(),
                    quantity: Decimal::ZERO,
                    average_price: Decimal::ZERO,
                    last_updated: execution.date,
                });
                // New average entry price across the old and added quantity.
                let total_quantity = position.quantity + execution.quantity;
                if !total_quantity.is_zero() {
                    position.average_price = (position.average_price * position.quantity + cost) / total_quantity;
                }
                position.quantity = total_quantity;
                position.last_updated = execution.date;
            }
            OrderSide::Sell => {
                let available = self.positions.get(symbol).map(|p| p.quantity).unwrap_or_default();
                if execution.quantity > available {
                    return Err(ExecutorError::InvalidClosingQuantity {
                        requested: execution.quantity.to_string(),
                        available: available.to_string(),
                    });
                }
                self.cash += cost;
                if let Some(position) = self.positions.get_mut(symbol) {
                    position.quantity -= execution.quantity;
                    position.last_updated = execution.date;
                    // Flat positions are dropped so `positions` only lists holdings.
                    if position.quantity.is_zero() {
                        self.positions.remove(symbol);
                    }
                }
            }
        }

        Ok(())
    }

    /// Cash plus every holding marked at `market_prices`.
    ///
    /// A holding without a price is an error rather than a silent zero.
    pub fn calculate_total_equity(
        &self,
        market_prices: &BTreeMap<String, Decimal>,
    ) -> Result<Decimal, ExecutorError> {
        let mut positions_value = Decimal::ZERO;
        for (symbol, position) in &self.positions {
            let current_price = market_prices
                .get(symbol)
                .ok_or_else(|| ExecutorError::PriceUnavailable(symbol.clone()))?;
            positions_value += *current_price * position.quantity;
        }
        Ok(self.cash + positions_value)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }
}
