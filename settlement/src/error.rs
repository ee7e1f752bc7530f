//! Error types for settlement scheduling and fee calculation

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Capture timestamp cannot be scheduled
    #[error("Invalid capture timestamp {captured_at} for transaction {transaction_id}")]
    InvalidCaptureDate {
        /// Offending transaction
        transaction_id: String,
        /// Timestamp as received
        captured_at: DateTime<Utc>,
    },

    /// Billing period ends before it starts
    #[error("Invalid billing period: end {end} precedes start {start}")]
    InvalidBillingPeriod {
        /// Period start
        start: NaiveDate,
        /// Period end (exclusive)
        end: NaiveDate,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Arithmetic out of range
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
