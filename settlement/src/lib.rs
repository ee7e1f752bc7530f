//! Settlement scheduling and fee calculation
//!
//! Turns captured marketplace transactions into settlement timelines and
//! per-period fee breakdowns.
//!
//! # Architecture
//!
//! - [`BankingCalendar`]: weekday + holiday calendar, `add_banking_days`
//! - [`SettlementScheduler`]: T+1 processing and T+2 crediting dates, with
//!   status derived on read from a reference day
//! - [`FeeCalculator`]: gross revenue, processing fee, prorated subscription
//!   and per-transaction fees for one [`BillingPeriod`]
//!
//! Nothing here holds state beyond the holiday calendar. Both calculators can
//! be shared across threads.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{BankingCalendar, BillingPeriod, FeeCalculator, SettlementScheduler};
//! use ledger_core::{FeeSchedule, VendorId};
//! use chrono::NaiveDate;
//!
//! fn main() -> settlement::Result<()> {
//!     let christmas = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
//!     let scheduler = SettlementScheduler::new(BankingCalendar::new([christmas]));
//!     let fees = FeeCalculator::new(FeeSchedule::default())?;
//!
//!     let period = BillingPeriod::month(2024, 12)?;
//!     let breakdown = fees.compute(&VendorId::new("vendor-1"), &period, &[])?;
//!     println!("net revenue {}", breakdown.net_revenue());
//!     # let _ = scheduler;
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

pub mod calendar;
pub mod config;
pub mod error;
pub mod fees;
pub mod period;
pub mod scheduler;
pub mod types;

// Re-exports
pub use calendar::BankingCalendar;
pub use config::{CalendarConfig, Config};
pub use error::{Error, Result};
pub use fees::FeeCalculator;
pub use period::BillingPeriod;
pub use scheduler::SettlementScheduler;
pub use types::*;
