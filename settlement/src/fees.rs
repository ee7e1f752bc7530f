//! Fee calculation
//!
//! Converts a billing period's transactions into a [`FeeBreakdown`]:
//!
//! ```text
//! gross_revenue             = Σ amount
//! payment_processing_fee    = round(gross_revenue × processing_rate)
//! subscription_fee_prorated = round(monthly_fee × days_elapsed / days_in_month)
//! transaction_fee_total     = per_transaction_fee × transaction_count
//! net_revenue               = gross − processing − subscription − transaction fees
//! ```
//!
//! All amounts are integer minor units. Each rounded fee is rounded once,
//! half-up, to a whole minor unit and never re-rounded afterwards.

use crate::{
    period::BillingPeriod,
    types::{FeeBreakdown, FeeComponents},
    Error, Result,
};
use chrono::{NaiveDate, Utc};
use ledger_core::{Amount, FeeSchedule, Transaction, VendorId};
use rust_decimal::Decimal;
use tracing::debug;

/// Computes fee breakdowns for one fee schedule
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    schedule: FeeSchedule,
}

impl FeeCalculator {
    /// Create calculator, rejecting negative fee settings
    pub fn new(schedule: FeeSchedule) -> Result<Self> {
        validate_schedule(&schedule)?;
        Ok(Self { schedule })
    }

    /// Fee schedule in use
    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Breakdown with proration as of today (UTC)
    pub fn compute(
        &self,
        vendor_id: &VendorId,
        period: &BillingPeriod,
        transactions: &[Transaction],
    ) -> Result<FeeBreakdown> {
        self.compute_as_of(vendor_id, period, transactions, Utc::now().date_naive())
    }

    /// Breakdown with proration as of `as_of`
    ///
    /// Only transactions belonging to `vendor_id` and captured inside
    /// `period` are counted. An empty set still carries the prorated
    /// subscription, so `net_revenue` can be negative.
    pub fn compute_as_of<'a>(
        &self,
        vendor_id: &VendorId,
        period: &BillingPeriod,
        transactions: impl IntoIterator<Item = &'a Transaction>,
        as_of: NaiveDate,
    ) -> Result<FeeBreakdown> {
        if period.end() < period.start() {
            return Err(Error::InvalidBillingPeriod {
                start: period.start(),
                end: period.end(),
            });
        }

        let mut gross_minor: i64 = 0;
        let mut transaction_count: u64 = 0;
        for transaction in transactions.into_iter().filter(|t| {
            &t.vendor_id == vendor_id && period.contains_timestamp(t.captured_at)
        }) {
            gross_minor = gross_minor
                .checked_add(transaction.amount.minor())
                .ok_or_else(|| Error::Calculation("gross revenue overflow".to_string()))?;
            transaction_count += 1;
        }
        let gross_revenue = Amount::from_minor(gross_minor);

        let payment_processing_fee = self.processing_fee(gross_revenue)?;
        let (subscription_fee_prorated, days_elapsed, days_in_month) =
            self.prorate_subscription(period, as_of)?;
        let transaction_fee_total = self.transaction_fees(transaction_count)?;

        let breakdown = FeeBreakdown::from_components(FeeComponents {
            vendor_id: vendor_id.clone(),
            period: *period,
            as_of,
            transaction_count,
            days_elapsed,
            days_in_month,
            gross_revenue,
            payment_processing_fee,
            subscription_fee_prorated,
            transaction_fee_total,
        })?;

        debug!(
            vendor_id = %vendor_id,
            %period,
            transactions = transaction_count,
            gross = %breakdown.gross_revenue(),
            net = %breakdown.net_revenue(),
            "Computed fee breakdown"
        );

        Ok(breakdown)
    }

    /// `round(gross × processing_rate)`
    pub fn processing_fee(&self, gross: Amount) -> Result<Amount> {
        let fee = Decimal::from(gross.minor())
            .checked_mul(self.schedule.processing_rate)
            .ok_or_else(|| Error::Calculation("processing fee overflow".to_string()))?;
        Amount::round_half_up(fee)
            .ok_or_else(|| Error::Calculation(format!("processing fee {} out of range", fee)))
    }

    /// Prorated subscription with the day counts it was based on
    ///
    /// `days_elapsed` counts from the period start through `as_of`
    /// inclusive, clamped to `[0, days_in_month]` and to the period's own
    /// length, so a period opened mid-month is billed only for its days.
    pub fn prorate_subscription(
        &self,
        period: &BillingPeriod,
        as_of: NaiveDate,
    ) -> Result<(Amount, u32, u32)> {
        let days_in_month = period.days_in_start_month()?;
        let days_elapsed = if as_of < period.start() {
            0
        } else {
            let elapsed = (as_of - period.start()).num_days() + 1;
            elapsed
                .min(days_in_month as i64)
                .min(period.days() as i64) as u32
        };

        let prorated = Decimal::from(self.schedule.monthly_fee.minor())
            .checked_mul(Decimal::from(days_elapsed))
            .and_then(|v| v.checked_div(Decimal::from(days_in_month)))
            .ok_or_else(|| Error::Calculation("subscription proration overflow".to_string()))?;
        let amount = Amount::round_half_up(prorated).ok_or_else(|| {
            Error::Calculation(format!("prorated subscription {} out of range", prorated))
        })?;

        Ok((amount, days_elapsed, days_in_month))
    }

    /// `per_transaction_fee × count`
    pub fn transaction_fees(&self, count: u64) -> Result<Amount> {
        i64::try_from(count)
            .ok()
            .and_then(|c| self.schedule.per_transaction_fee.minor().checked_mul(c))
            .map(Amount::from_minor)
            .ok_or_else(|| Error::Calculation("transaction fee overflow".to_string()))
    }
}

/// Reject negative fee settings
pub fn validate_schedule(schedule: &FeeSchedule) -> Result<()> {
    if schedule.monthly_fee.is_negative() {
        return Err(Error::Config(format!(
            "monthly_fee must be non-negative, got {}",
            schedule.monthly_fee
        )));
    }
    if schedule.per_transaction_fee.is_negative() {
        return Err(Error::Config(format!(
            "per_transaction_fee must be non-negative, got {}",
            schedule.per_transaction_fee
        )));
    }
    if schedule.processing_rate < Decimal::ZERO {
        return Err(Error::Config(format!(
            "processing_rate must be non-negative, got {}",
            schedule.processing_rate
        )));
    }
    Ok(())
}
