//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (serde, `snake_case` enums)
//! - Exact arithmetic (integer minor units for money, Decimal for rates)
//! - Explicit fields instead of untyped metadata bags

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use uuid::Uuid;

/// Vendor identifier (marketplace seller account)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    /// Create new vendor ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
///
/// Every supported currency has two minor-unit digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::INR => "INR",
        }
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "AED" => Ok(Currency::AED),
            "INR" => Ok(Currency::INR),
            other => Err(Error::Other(format!("Unsupported currency: {}", other))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Monetary amount in minor units (cents, paise, fils)
///
/// Signed so that a period's net revenue can go below zero. Captured amounts
/// are checked by [`Transaction::validate`] when they are recorded; payout
/// amounts are checked at authorization.
///
/// The operators follow plain `i64` semantics and are meant for values
/// already bounded by a checked sum. Totals over stored data go through
/// [`Amount::checked_add`] and [`Amount::checked_sub`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// Create from minor units
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Create from whole major units
    ///
    /// `major` must lie within `i64::MAX / 100`.
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Minor units
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Major-unit decimal view (e.g. 51561 -> 515.61)
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Round a fractional minor-unit quantity half-up to a whole amount
    ///
    /// Returns `None` if the value does not fit in 64 bits.
    pub fn round_half_up(minor: Decimal) -> Option<Self> {
        minor
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    /// Strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self + rhs`, or `None` on overflow
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// `self - rhs`, or `None` on overflow
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Mul<i64> for Amount {
    type Output = Amount;

    fn mul(self, rhs: i64) -> Amount {
        Amount(self.0 * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

/// Captured payment event
///
/// Immutable once received; retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID (deduplicated upstream)
    pub id: Uuid,

    /// Owning vendor
    pub vendor_id: VendorId,

    /// Captured amount (minor units, non-negative)
    pub amount: Amount,

    /// Currency
    pub currency: Currency,

    /// Capture timestamp, source of truth for settlement scheduling
    pub captured_at: DateTime<Utc>,

    /// Originating payment channel
    pub gateway: String,
}

impl Transaction {
    /// Reject captures that cannot be counted as revenue
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_negative() {
            return Err(Error::InvalidTransaction(format!(
                "transaction {} has negative amount {}",
                self.id, self.amount
            )));
        }
        Ok(())
    }

    /// Capture date (UTC calendar day)
    pub fn capture_date(&self) -> NaiveDate {
        self.captured_at.date_naive()
    }
}

/// Payout request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Reserved against the balance, not yet sent
    Pending,
    /// Submitted to the payout rail
    Processing,
    /// Funds delivered (terminal)
    Paid,
    /// Rejected or bounced (terminal), reservation released
    Failed,
}

impl PayoutStatus {
    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Failed)
    }

    /// Whether the request's amount is deducted from the available balance
    pub fn holds_funds(&self) -> bool {
        !matches!(self, PayoutStatus::Failed)
    }

    /// Whether `next` is a legal edge from `self`
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Pending, PayoutStatus::Processing)
                | (PayoutStatus::Processing, PayoutStatus::Paid)
                | (PayoutStatus::Pending, PayoutStatus::Failed)
                | (PayoutStatus::Processing, PayoutStatus::Failed)
        )
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor-initiated withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Request ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Requesting vendor
    pub vendor_id: VendorId,

    /// Requested amount (minor units, positive)
    pub amount: Amount,

    /// Currency
    pub currency: Currency,

    /// Request timestamp
    pub requested_at: DateTime<Utc>,

    /// Current status
    pub status: PayoutStatus,

    /// Last status change
    pub updated_at: DateTime<Utc>,

    /// Why the payout failed (only set when `status == Failed`)
    #[serde(default)]
    pub failure_reason: Option<String>,

    /// Rail or bank reference recorded on completion
    #[serde(default)]
    pub settlement_reference: Option<String>,
}

impl PayoutRequest {
    /// New pending request
    pub fn new(
        vendor_id: VendorId,
        amount: Amount,
        currency: Currency,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            vendor_id,
            amount,
            currency,
            requested_at,
            status: PayoutStatus::Pending,
            updated_at: requested_at,
            failure_reason: None,
            settlement_reference: None,
        }
    }

    /// Move to `next`, rejecting illegal edges without touching `self`
    pub fn transition(&mut self, next: PayoutStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                payout_id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

/// Vendor plan pricing
///
/// Missing fields fall back to the standard plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Subscription fee per calendar month
    pub monthly_fee: Amount,

    /// Flat fee per captured transaction
    pub per_transaction_fee: Amount,

    /// Payment-processing rate applied to gross revenue (0.025 = 2.5%)
    #[serde(with = "rust_decimal::serde::str")]
    pub processing_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            monthly_fee: Amount::from_major(999),
            per_transaction_fee: Amount::from_major(5),
            processing_rate: Decimal::new(25, 3),
        }
    }
}

impl FeeSchedule {
    /// Zero-fee plan
    pub fn free() -> Self {
        Self {
            monthly_fee: Amount::ZERO,
            per_transaction_fee: Amount::ZERO,
            processing_rate: Decimal::ZERO,
        }
    }
}

/// Vendor account as supplied by the vendor account store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAccount {
    /// Vendor ID
    pub vendor_id: VendorId,

    /// Settlement currency
    pub currency: Currency,

    /// Plan pricing; `None` bills the platform default plan
    #[serde(default)]
    pub fee_schedule: Option<FeeSchedule>,

    /// First day the subscription is billed
    pub billing_start: NaiveDate,
}
