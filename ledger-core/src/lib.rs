//! Vendor Ledger Core
//!
//! Domain types and the persistence contract for the settlement & payout
//! engine.
//!
//! # Architecture
//!
//! - **Immutable captures**: Transactions are recorded once and never mutated
//! - **Derived balances**: Nothing balance-like is stored; it is recomputed
//! - **Conditional writes**: Payout writes carry the per-vendor version they
//!   were based on, so reservations cannot be applied against stale balances
//!
//! # Invariants
//!
//! - Money is integer minor units; rates are exact decimals
//! - Transaction IDs are unique per store (captures are idempotent)
//! - Payout status only moves along pending → processing → paid, or to failed
//!   from a non-terminal state

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

#[cfg(feature = "rocksdb")]
pub mod storage;

// Re-exports
pub use config::{StoreBackend, StoreConfig};
pub use error::{Error, Result};
pub use store::{open as open_store, LedgerSnapshot, MemoryStore, PayoutLedger, Store};
pub use types::{
    Amount, Currency, FeeSchedule, PayoutRequest, PayoutStatus, Transaction, VendorAccount,
    VendorId,
};

#[cfg(feature = "rocksdb")]
pub use storage::RocksStore;
