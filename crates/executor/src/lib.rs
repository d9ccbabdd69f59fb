//! # Meridian Executor Crate
//!
//! This crate provides the broker collaborator for the rebalancing engine. It defines
//! a generic `Broker` trait and provides a `SimulatedBroker` for backtesting, as well
//! as a `Portfolio` manager to track the state of a trading account.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `SimulatedBroker` turns a target weight into
//!   an `Execution` receipt at the period's close. The `Portfolio` struct is the state
//!   machine that applies the results of an execution to cash and positions.
//! - **Execution Abstraction:** The `Broker` trait keeps the rebalancing state machine
//!   agnostic about how instructions are filled.
//!
//! ## Public API
//!
//! - `Broker`: The core trait for all execution collaborators.
//! - `SimulatedBroker`: The "virtual broker" for backtesting; fills at the close,
//!   with no partial fills, fees or slippage.
//! - `Portfolio`: The in-memory state manager for a trading account.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod broker;
pub mod error;
pub mod portfolio;

// Re-export the key components to provide a clean, public-facing API.
pub use broker::{Broker, QUANTITY_DP, SimulatedBroker};
pub use error::ExecutorError;
pub use portfolio::Portfolio;
