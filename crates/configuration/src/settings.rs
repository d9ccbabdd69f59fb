use chrono::NaiveDate;
use core_types::{Asset, AssetRegistry, GateBasis, Granularity};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub simulation: Simulation,
    pub rebalance: RebalanceSettings,
    /// The known asset registry, in order of appearance.
    pub assets: Vec<Asset>,
    pub calculator: CalculatorSettings,
    #[serde(default)]
    pub attribution: AttributionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    pub fn registry(&self) -> AssetRegistry {
        AssetRegistry::new(self.assets.clone())
    }
}

/// Contains parameters for a single backtest run.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    /// The initial starting capital for the simulation.
    pub initial_capital: Decimal,
    /// Optional first simulated date; defaults to the first common price date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Optional last simulated date; defaults to the last common price date.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// The gate and trigger parameters of the rebalancing state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceSettings {
    /// Minimum elapsed periods (or calendar days) between rebalances.
    pub interval: usize,
    pub basis: GateBasis,
    /// Maximum tolerated `|current - target|` before trading, in (0, 1].
    pub threshold: f64,
}

/// Selects and parameterizes the weight calculator.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculatorSettings {
    Static(StaticParams),
    Momentum(MomentumParams),
    RiskParity(RiskParityParams),
    Macro(MacroParams),
}

impl CalculatorSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            CalculatorSettings::Static(_) => "static",
            CalculatorSettings::Momentum(_) => "momentum",
            CalculatorSettings::RiskParity(_) => "risk_parity",
            CalculatorSettings::Macro(_) => "macro",
        }
    }
}

/// A `symbol = weight` pair. Symbols are kept as values rather than table
/// keys so their case survives the config loader.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightEntry {
    pub symbol: String,
    pub weight: f64,
}

/// Parameters for the fixed-mix calculator.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticParams {
    pub weights: Vec<WeightEntry>,
}

/// Parameters for the trailing-return momentum calculator.
#[derive(Debug, Clone, Deserialize)]
pub struct MomentumParams {
    #[serde(default = "default_momentum_lookback")]
    pub lookback_periods: usize,
}

/// Parameters for the inverse-volatility calculator.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskParityParams {
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
    /// Floor applied to the volatility estimate before inverting it.
    #[serde(default = "default_min_volatility")]
    pub min_volatility: f64,
}

/// Parameters for the valuation/yield macro model.
#[derive(Debug, Clone, Deserialize)]
pub struct MacroParams {
    pub equities: Vec<EquitySleeve>,
    pub bond: BondSleeve,
    #[serde(default)]
    pub cash: Option<CashSleeve>,
    #[serde(default)]
    pub commodity: Option<CommoditySleeve>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EquitySleeve {
    pub symbol: String,
    pub base_allocation: f64,
    /// Percentile window length; 10 for regional indices, 20 for broad US ones.
    pub lookback_years: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BondSleeve {
    pub symbol: String,
    pub base_allocation: f64,
    #[serde(default = "default_yield_lookback_years")]
    pub lookback_years: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashSleeve {
    pub symbol: String,
    /// Benchmark yield (in percent) below which cash gets no allocation.
    #[serde(default = "default_min_cash_yield")]
    pub min_yield: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommoditySleeve {
    pub symbol: String,
    pub raw_weight: f64,
}

/// What to do when the attribution residual exceeds its tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ResidualPolicy {
    /// Log a warning and flag the summary.
    #[default]
    Warn,
    /// Refuse to produce the report.
    Fail,
}

/// Contains parameters for the attribution engine.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributionSettings {
    #[serde(default = "default_granularities")]
    pub granularities: Vec<Granularity>,
    /// Fewer aligned dates than this yields an "insufficient data" outcome.
    #[serde(default = "default_min_common_dates")]
    pub min_common_dates: usize,
    /// Assets whose total absolute weight stays below this are dropped.
    #[serde(default = "default_weight_epsilon")]
    pub weight_epsilon: f64,
    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,
    #[serde(default)]
    pub residual_policy: ResidualPolicy,
}

impl Default for AttributionSettings {
    fn default() -> Self {
        Self {
            granularities: default_granularities(),
            min_common_dates: default_min_common_dates(),
            weight_epsilon: default_weight_epsilon(),
            residual_tolerance: default_residual_tolerance(),
            residual_policy: ResidualPolicy::default(),
        }
    }
}

/// Controls the tracing subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

// --- Defaults ---

fn default_momentum_lookback() -> usize {
    252
}

fn default_volatility_window() -> usize {
    21
}

fn default_min_volatility() -> f64 {
    0.001
}

fn default_yield_lookback_years() -> u32 {
    10
}

fn default_min_cash_yield() -> f64 {
    4.0
}

fn default_granularities() -> Vec<Granularity> {
    vec![Granularity::Daily, Granularity::Weekly, Granularity::Monthly]
}

fn default_min_common_dates() -> usize {
    5
}

fn default_weight_epsilon() -> f64 {
    0.001
}

fn default_residual_tolerance() -> f64 {
    1e-3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "meridian.log".to_string()
}
