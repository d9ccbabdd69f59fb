use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("{kind} entry dated {date} precedes the last recorded date {last}")]
    OutOfOrder {
        kind: &'static str,
        date: NaiveDate,
        last: NaiveDate,
    },

    #[error("Failed to serialize log row: {0}")]
    Serialization(#[from] serde_json::Error),
}
