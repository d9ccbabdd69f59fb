//! # Meridian Rebalance Log
//!
//! The passive, append-only record of a simulation run. It holds two
//! independent, date-ordered collections:
//!
//! - `WeightsEvolutionEntry`: realized weights, one per simulated period.
//! - `RebalanceEvent`: one per rebalance that was actually instructed.
//!
//! Past entries are never mutated. The attribution engine reads the weights
//! series from here, and the flat `RebalanceLogRow` table is what gets exported.

pub mod error;
pub mod log;
pub mod row;

pub use error::LogError;
pub use log::{RebalanceLog, WeightsSeries};
pub use row::RebalanceLogRow;
