//! Error types for the payout engine

use thiserror::Error;

/// Result type for payout engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payout engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Settlement error
    #[error("Settlement error: {0}")]
    Settlement(#[from] settlement::Error),

    /// Inputs needed for a balance could not be read
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Capture recorded in a currency other than the vendor's
    #[error("Transaction {transaction_id} for vendor {vendor_id} is in {found}, account settles in {expected}")]
    CurrencyMismatch {
        /// Vendor
        vendor_id: String,
        /// Offending capture
        transaction_id: String,
        /// Account currency
        expected: ledger_core::Currency,
        /// Capture currency
        found: ledger_core::Currency,
    },

    /// Balance total does not fit in an amount
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Ledger(e) => e.is_retryable(),
            Error::Settlement(settlement::Error::Ledger(e)) => e.is_retryable(),
            _ => false,
        }
    }
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
