//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Vendor has no account record and no activity
    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    /// Payout request not found
    #[error("Payout request not found: {0}")]
    PayoutNotFound(String),

    /// A collaborator could not supply the data needed to answer
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Conditional write lost a race against another writer (retryable)
    #[error("Concurrency conflict for vendor {vendor_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Vendor whose payout ledger moved
        vendor_id: String,
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Capture rejected where it enters the ledger
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Payout state machine violation
    #[error("Invalid transition for payout {payout_id}: {from} -> {to}")]
    InvalidTransition {
        /// Payout request ID
        payout_id: String,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller should re-read state and retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(feature = "rocksdb")]
impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
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
