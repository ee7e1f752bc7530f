//! Vendor Payout Engine
//!
//! Withdrawable balances and payout requests for marketplace vendors.
//!
//! # Architecture
//!
//! - [`BalanceLedger`] derives the available balance from settled
//!   transactions, per-period fees and outstanding payouts
//! - [`PayoutRequestManager`] authorizes and reserves payouts, then drives
//!   them through pending → processing → paid | failed
//! - [`PayoutEngine`] wires both to a [`Store`](ledger_core::Store) from
//!   configuration
//!
//! Balances are never stored. Each read recomputes from transactions, the
//! holiday calendar and the payout history, as of the engine's [`Clock`].
//!
//! # Example
//!
//! ```no_run
//! use payout_engine::{Config, CreateOutcome, PayoutEngine};
//! use ledger_core::{Amount, VendorId};
//!
//! fn main() -> payout_engine::Result<()> {
//!     let engine = PayoutEngine::open(Config::from_env()?)?;
//!     let vendor = VendorId::new("vendor-42");
//!
//!     match engine.payouts().create(&vendor, Amount::from_major(300))? {
//!         CreateOutcome::Created(request) => println!("reserved {}", request.id),
//!         CreateOutcome::Denied(reason) => println!("denied: {}", reason),
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod balance;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod payouts;

// Re-exports
pub use balance::{
    AuthorizationResult, BalanceLedger, BalanceSnapshot, DenialReason, VendorStatement,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, PayoutConfig};
pub use engine::PayoutEngine;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use payouts::{CreateOutcome, PayoutRequestManager};
