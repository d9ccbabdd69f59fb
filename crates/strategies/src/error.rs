use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Weight calculator received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Required market data is missing: {0}")]
    DataMissing(String),

    #[error("An error occurred during weight calculation: {0}")]
    Calculation(String),

    #[error("Produced weights are invalid: {0}")]
    Weights(#[from] CoreError),
}
