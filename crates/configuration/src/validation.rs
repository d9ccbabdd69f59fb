use crate::error::ConfigError;
use crate::settings::{CalculatorSettings, Config};
use core_types::AssetClass;
use rust_decimal::Decimal;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

impl Config {
    /// Rejects configurations the engines cannot run with.
    ///
    /// Bad settings are fatal at construction; nothing downstream falls back
    /// to defaults for them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.initial_capital <= Decimal::ZERO {
            return Err(invalid("simulation.initial_capital must be positive"));
        }
        if let (Some(start), Some(end)) = (self.simulation.start_date, self.simulation.end_date) {
            if start > end {
                return Err(invalid(format!(
                    "simulation.start_date {start} is after end_date {end}"
                )));
            }
        }

        if self.rebalance.interval == 0 {
            return Err(invalid("rebalance.interval must be a positive integer"));
        }
        let threshold = self.rebalance.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(invalid(format!(
                "rebalance.threshold must lie in (0, 1], got {threshold}"
            )));
        }

        if self.assets.is_empty() {
            return Err(invalid("at least one [[assets]] entry is required"));
        }

        self.validate_calculator()?;

        let attribution = &self.attribution;
        if attribution.min_common_dates < 2 {
            return Err(invalid("attribution.min_common_dates must be at least 2"));
        }
        if attribution.weight_epsilon < 0.0 || attribution.residual_tolerance < 0.0 {
            return Err(invalid(
                "attribution.weight_epsilon and residual_tolerance must be non-negative",
            ));
        }
        if attribution.granularities.is_empty() {
            return Err(invalid("attribution.granularities must not be empty"));
        }

        Ok(())
    }

    fn validate_calculator(&self) -> Result<(), ConfigError> {
        let registry = self.registry();
        let known = |symbol: &str| -> Result<(), ConfigError> {
            if registry.contains(symbol) {
                Ok(())
            } else {
                Err(invalid(format!(
                    "calculator references unknown asset '{symbol}'"
                )))
            }
        };
        let sleeve = |symbol: &str, expected: AssetClass| -> Result<(), ConfigError> {
            known(symbol)?;
            match registry.class_of(symbol) {
                Some(class) if class == expected => Ok(()),
                Some(class) => Err(invalid(format!(
                    "asset '{symbol}' is {class:?} but its macro sleeve needs {expected:?}"
                ))),
                None => Ok(()),
            }
        };

        match &self.calculator {
            CalculatorSettings::Static(params) => {
                if params.weights.is_empty() {
                    return Err(invalid("static calculator needs at least one weight"));
                }
                for entry in &params.weights {
                    known(&entry.symbol)?;
                }
            }
            CalculatorSettings::Momentum(params) => {
                if params.lookback_periods == 0 {
                    return Err(invalid("momentum.lookback_periods must be positive"));
                }
            }
            CalculatorSettings::RiskParity(params) => {
                if params.volatility_window == 0 {
                    return Err(invalid("risk_parity.volatility_window must be positive"));
                }
                if !(params.min_volatility > 0.0) {
                    return Err(invalid("risk_parity.min_volatility must be positive"));
                }
            }
            CalculatorSettings::Macro(params) => {
                if params.equities.is_empty() {
                    return Err(invalid("macro calculator needs at least one equity sleeve"));
                }
                for equity in &params.equities {
                    sleeve(&equity.symbol, AssetClass::EquityIndex)?;
                    if equity.base_allocation < 0.0 || equity.lookback_years == 0 {
                        return Err(invalid(format!(
                            "equity sleeve '{}' needs a non-negative allocation and a positive lookback",
                            equity.symbol
                        )));
                    }
                }
                sleeve(&params.bond.symbol, AssetClass::Bond)?;
                if params.bond.base_allocation < 0.0 || params.bond.lookback_years == 0 {
                    return Err(invalid(
                        "bond sleeve needs a non-negative allocation and a positive lookback",
                    ));
                }
                if let Some(cash) = &params.cash {
                    sleeve(&cash.symbol, AssetClass::CashEquivalent)?;
                }
                if let Some(commodity) = &params.commodity {
                    sleeve(&commodity.symbol, AssetClass::Commodity)?;
                    if commodity.raw_weight < 0.0 {
                        return Err(invalid("commodity.raw_weight must be non-negative"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ConfigError;
    use crate::load_config_from_str;
    use crate::settings::{CalculatorSettings, ResidualPolicy};
    use core_types::{GateBasis, Granularity};

    const BASE: &str = r#"
        [simulation]
        initial_capital = 100000
        start_date = "2020-01-01"

        [rebalance]
        interval = 20
        basis = "trading_periods"
        threshold = 0.05

        [[assets]]
        symbol = "SPY"
        class = "equity_index"

        [[assets]]
        symbol = "AGG"
        class = "bond"

        [calculator]
        kind = "static"
        weights = [
            { symbol = "SPY", weight = 0.6 },
            { symbol = "AGG", weight = 0.4 },
        ]
    "#;

    #[test]
    fn parses_a_complete_static_configuration() {
        let config = load_config_from_str(BASE).unwrap();
        assert_eq!(config.rebalance.basis, GateBasis::TradingPeriods);
        assert_eq!(config.rebalance.interval, 20);
        assert_eq!(config.registry().len(), 2);
        match &config.calculator {
            CalculatorSettings::Static(params) => {
                assert_eq!(params.weights[0].symbol, "SPY");
            }
            other => panic!("unexpected calculator {other:?}"),
        }
        assert_eq!(
            config.attribution.granularities,
            vec![Granularity::Daily, Granularity::Weekly, Granularity::Monthly]
        );
        assert_eq!(config.attribution.residual_policy, ResidualPolicy::Warn);
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        for bad in ["0.0", "1.5", "-0.1"] {
            let toml = BASE.replace("threshold = 0.05", &format!("threshold = {bad}"));
            assert!(matches!(
                load_config_from_str(&toml),
                Err(ConfigError::ValidationError(_))
            ));
        }
        let full = BASE.replace("threshold = 0.05", "threshold = 1.0");
        assert!(load_config_from_str(&full).is_ok());
    }

    #[test]
    fn rejects_zero_interval() {
        let toml = BASE.replace("interval = 20", "interval = 0");
        assert!(matches!(
            load_config_from_str(&toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_calculator_assets_outside_registry() {
        let toml = BASE.replace(r#"{ symbol = "AGG", weight = 0.4 }"#, r#"{ symbol = "TLT", weight = 0.4 }"#);
        assert!(matches!(
            load_config_from_str(&toml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn macro_defaults_fill_in_optional_fields() {
        let toml = r#"
            [simulation]
            initial_capital = 50000

            [rebalance]
            interval = 30
            basis = "calendar_days"
            threshold = 0.1

            [[assets]]
            symbol = "SPY"
            class = "equity_index"

            [[assets]]
            symbol = "IEF"
            class = "bond"

            [calculator]
            kind = "macro"
            equities = [{ symbol = "SPY", base_allocation = 0.6, lookback_years = 20 }]
            bond = { symbol = "IEF", base_allocation = 0.4 }
        "#;
        let config = load_config_from_str(toml).unwrap();
        match config.calculator {
            CalculatorSettings::Macro(params) => {
                assert_eq!(params.bond.lookback_years, 10);
                assert!(params.cash.is_none());
            }
            other => panic!("unexpected calculator {other:?}"),
        }
    }

    #[test]
    fn rejects_macro_sleeve_of_the_wrong_class() {
        let toml = r#"
            [simulation]
            initial_capital = 50000

            [rebalance]
            interval = 30
            basis = "calendar_days"
            threshold = 0.1

            [[assets]]
            symbol = "SPY"
            class = "equity_index"

            [[assets]]
            symbol = "GLD"
            class = "commodity"

            [calculator]
            kind = "macro"
            equities = [{ symbol = "SPY", base_allocation = 0.6, lookback_years = 20 }]
            bond = { symbol = "GLD", base_allocation = 0.4 }
        "#;
        match load_config_from_str(toml) {
            Err(ConfigError::ValidationError(message)) => {
                assert!(message.contains("GLD"), "{message}");
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
