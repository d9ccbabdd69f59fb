use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Execution simulation error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("Rebalance log error: {0}")]
    Log(#[from] rebalance_log::LogError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Step for {date} arrived after {last}; periods must be stepped in date order")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },

    #[error("Market context is dated {context} but the step is for {date}")]
    ContextMismatch { date: NaiveDate, context: NaiveDate },

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),

    #[error("Historical data for the requested range is incomplete or missing: {0}")]
    DataUnavailable(String),
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}
