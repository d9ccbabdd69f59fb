use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientCash { required: String, available: String },

    #[error("Invalid order quantity for closing position. Requested: {requested}, Available: {available}")]
    InvalidClosingQuantity { requested: String, available: String },

    #[error("No closing price available for symbol: {0}")]
    PriceUnavailable(String),

    #[error("Target weight for {symbol} is invalid: {weight}")]
    InvalidWeight { symbol: String, weight: f64 },

    #[error("An unexpected portfolio state was encountered: {0}")]
    PortfolioError(String),
}
