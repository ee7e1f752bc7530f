//! Core types for settlement scheduling and fees

use crate::{period::BillingPeriod, Error, Result};
use chrono::NaiveDate;
use ledger_core::{Amount, VendorId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Settlement lifecycle of a captured transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Before the processing date
    Pending,
    /// On or after the processing date, before crediting
    Processing,
    /// Credited and withdrawable
    Completed,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Processing => "processing",
            SettlementStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Settlement timeline derived from a transaction's capture date
///
/// Status is not stored; ask [`SettlementRecord::status`] for a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Transaction this record belongs to
    pub transaction_id: Uuid,

    /// Owning vendor
    pub vendor_id: VendorId,

    /// Captured amount
    pub amount: Amount,

    /// T+1 banking day
    pub processing_date: NaiveDate,

    /// T+2 banking days
    pub crediting_date: NaiveDate,
}

impl SettlementRecord {
    /// Lifecycle state as of `today`
    pub fn status(&self, today: NaiveDate) -> SettlementStatus {
        if today < self.processing_date {
            SettlementStatus::Pending
        } else if today < self.crediting_date {
            SettlementStatus::Processing
        } else {
            SettlementStatus::Completed
        }
    }

    /// Credited on or before `today`
    pub fn is_completed(&self, today: NaiveDate) -> bool {
        self.status(today) == SettlementStatus::Completed
    }
}

/// Counts and amounts per settlement status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Transactions not yet processing
    pub pending_count: usize,
    /// Amount not yet processing
    pub pending_amount: Amount,
    /// Transactions processing
    pub processing_count: usize,
    /// Amount processing
    pub processing_amount: Amount,
    /// Transactions credited
    pub completed_count: usize,
    /// Amount credited
    pub completed_amount: Amount,
}

impl SettlementSummary {
    /// Add one record's amount under its status
    pub fn add(&mut self, status: SettlementStatus, amount: Amount) {
        match status {
            SettlementStatus::Pending => {
                self.pending_count += 1;
                self.pending_amount += amount;
            }
            SettlementStatus::Processing => {
                self.processing_count += 1;
                self.processing_amount += amount;
            }
            SettlementStatus::Completed => {
                self.completed_count += 1;
                self.completed_amount += amount;
            }
        }
    }

    /// Captured but not yet withdrawable
    pub fn in_flight_amount(&self) -> Amount {
        self.pending_amount + self.processing_amount
    }
}

/// Layered fee breakdown for one vendor and billing period
///
/// Constructed only through [`FeeBreakdown::from_components`], which derives
/// the totals with checked arithmetic, so `net_revenue` can never disagree
/// with its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    vendor_id: VendorId,
    period: BillingPeriod,
    as_of: NaiveDate,
    transaction_count: u64,
    days_elapsed: u32,
    days_in_month: u32,
    gross_revenue: Amount,
    payment_processing_fee: Amount,
    subscription_fee_prorated: Amount,
    transaction_fee_total: Amount,
    platform_fee_total: Amount,
    net_revenue: Amount,
}

/// Inputs to a [`FeeBreakdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeComponents {
    /// Vendor
    pub vendor_id: VendorId,
    /// Period
    pub period: BillingPeriod,
    /// Reference date for proration
    pub as_of: NaiveDate,
    /// Transactions counted
    pub transaction_count: u64,
    /// Days billed
    pub days_elapsed: u32,
    /// Length of the month the period starts in
    pub days_in_month: u32,
    /// Sum of captured amounts
    pub gross_revenue: Amount,
    /// Gross × processing rate, rounded
    pub payment_processing_fee: Amount,
    /// Prorated subscription, rounded
    pub subscription_fee_prorated: Amount,
    /// Per-transaction fee × count
    pub transaction_fee_total: Amount,
}

impl FeeBreakdown {
    /// Derive totals from components
    pub fn from_components(c: FeeComponents) -> Result<Self> {
        let platform_fee_total = c
            .subscription_fee_prorated
            .checked_add(c.transaction_fee_total)
            .ok_or_else(|| Error::Calculation("platform fee total overflow".to_string()))?;
        let net_revenue = c
            .gross_revenue
            .checked_sub(c.payment_processing_fee)
            .and_then(|v| v.checked_sub(platform_fee_total))
            .ok_or_else(|| Error::Calculation("net revenue overflow".to_string()))?;

        Ok(Self {
            vendor_id: c.vendor_id,
            period: c.period,
            as_of: c.as_of,
            transaction_count: c.transaction_count,
            days_elapsed: c.days_elapsed,
            days_in_month: c.days_in_month,
            gross_revenue: c.gross_revenue,
            payment_processing_fee: c.payment_processing_fee,
            subscription_fee_prorated: c.subscription_fee_prorated,
            transaction_fee_total: c.transaction_fee_total,
            platform_fee_total,
            net_revenue,
        })
    }

    /// Vendor
    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    /// Billing period
    pub fn period(&self) -> BillingPeriod {
        self.period
    }

    /// Proration reference date
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Transactions counted
    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// Days billed
    pub fn days_elapsed(&self) -> u32 {
        self.days_elapsed
    }

    /// Days in the month the period starts in
    pub fn days_in_month(&self) -> u32 {
        self.days_in_month
    }

    /// Sum of transaction amounts
    pub fn gross_revenue(&self) -> Amount {
        self.gross_revenue
    }

    /// Payment-processing fee
    pub fn payment_processing_fee(&self) -> Amount {
        self.payment_processing_fee
    }

    /// Prorated subscription fee
    pub fn subscription_fee_prorated(&self) -> Amount {
        self.subscription_fee_prorated
    }

    /// Per-transaction fees
    pub fn transaction_fee_total(&self) -> Amount {
        self.transaction_fee_total
    }

    /// Subscription + per-transaction fees
    pub fn platform_fee_total(&self) -> Amount {
        self.platform_fee_total
    }

    /// Gross minus all fees; may be negative
    pub fn net_revenue(&self) -> Amount {
        self.net_revenue
    }
}
