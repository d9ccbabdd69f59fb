use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;
mod validation;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    AttributionSettings, BondSleeve, CalculatorSettings, CashSleeve, CommoditySleeve, Config,
    EquitySleeve, LoggingSettings, MacroParams, MomentumParams, RebalanceSettings,
    ResidualPolicy, RiskParityParams, Simulation, StaticParams, WeightEntry,
};

/// Environment variables with this prefix override file values,
/// e.g. `MERIDIAN__REBALANCE__THRESHOLD=0.1`.
pub const ENV_PREFIX: &str = "MERIDIAN";

/// Loads and validates the application configuration from a TOML file.
///
/// The file is layered under environment overrides, deserialized into the
/// strongly-typed `Config` and checked before being handed back, so every
/// consumer can rely on a valid interval, threshold and calculator block.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

/// Parses and validates configuration held in memory (no environment layer).
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::GateBasis;

    #[test]
    fn sample_configuration_loads_from_disk() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config.toml");
        let config: Config = load_config(&path).unwrap();
        assert_eq!(config.rebalance.basis, GateBasis::TradingPeriods);
        assert_eq!(config.calculator.kind(), "macro");
        assert_eq!(config.registry().len(), 5);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
