//! # Meridian Core Types
//!
//! Layer 0 of the workspace: the shared vocabulary every other crate speaks.
//! It has no knowledge of configuration, execution or reporting.
//!
//! - `TimeSeries` / `MarketData` / `MarketContext`: read-only market history.
//! - `TargetWeights` / `CalculationProvenance`: the output of a weight calculation.
//! - `WeightsEvolutionEntry` / `RebalanceEvent`: the records the rebalancer appends.
//! - `Execution` / `Position`: broker-side state.

pub mod enums;
pub mod error;
pub mod market;
pub mod records;
pub mod series;
pub mod structs;
pub mod weights;

// Re-export the core types to provide a clean public API.
pub use enums::{AssetClass, GateBasis, Granularity, OrderSide, TriggerType};
pub use error::CoreError;
pub use market::{MarketContext, MarketData};
pub use records::{RebalanceEvent, TriggerContext, WeightsEvolutionEntry};
pub use series::TimeSeries;
pub use structs::{Asset, AssetRegistry, Execution, Position};
pub use weights::{CalculationProvenance, TargetWeights, WEIGHT_TOLERANCE};
