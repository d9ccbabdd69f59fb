use core_types::Granularity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Error in calculation: {0}")]
    Calculation(String),

    #[error(
        "{granularity} attribution residual {residual:.6} exceeds tolerance {tolerance}"
    )]
    ResidualExceeded {
        granularity: Granularity,
        residual: f64,
        tolerance: f64,
    },
}
