//! Settlement timeline scheduling
//!
//! Every captured transaction is processed on the first banking day after
//! capture (T+1) and credited one banking day later (T+2). Dates are a pure
//! function of `captured_at` and the holiday calendar, so scheduling the same
//! transaction twice always yields the same record.

use crate::{
    calendar::BankingCalendar,
    types::{SettlementRecord, SettlementStatus, SettlementSummary},
    Error, Result,
};
use chrono::NaiveDate;
use ledger_core::Transaction;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Assigns processing and crediting dates to captured transactions
#[derive(Debug)]
pub struct SettlementScheduler {
    calendar: RwLock<Arc<BankingCalendar>>,
}

impl SettlementScheduler {
    /// Create new scheduler
    pub fn new(calendar: BankingCalendar) -> Self {
        Self {
            calendar: RwLock::new(Arc::new(calendar)),
        }
    }

    /// Calendar currently in effect
    pub fn calendar(&self) -> Arc<BankingCalendar> {
        self.calendar.read().clone()
    }

    /// Swap in a new holiday calendar
    ///
    /// Records derived after the call use the new calendar; nothing derived
    /// earlier is stored, so there is nothing to migrate.
    pub fn reload_calendar(&self, calendar: BankingCalendar) {
        let count = calendar.holidays().count();
        *self.calendar.write() = Arc::new(calendar);
        info!("Banking calendar reloaded with {} holidays", count);
    }

    /// Derive the settlement record for a transaction
    pub fn schedule(&self, transaction: &Transaction) -> Result<SettlementRecord> {
        // The zero timestamp is what ingestion emits for a capture it never saw
        if transaction.captured_at.timestamp() == 0 {
            return Err(invalid_capture(transaction));
        }

        let calendar = self.calendar();
        let capture_date = transaction.capture_date();

        let processing_date = calendar
            .add_banking_days(capture_date, 1)
            .ok_or_else(|| invalid_capture(transaction))?;
        let crediting_date = calendar
            .add_banking_days(processing_date, 1)
            .ok_or_else(|| invalid_capture(transaction))?;

        debug!(
            transaction_id = %transaction.id,
            %capture_date,
            %processing_date,
            %crediting_date,
            "Scheduled settlement"
        );

        Ok(SettlementRecord {
            transaction_id: transaction.id,
            vendor_id: transaction.vendor_id.clone(),
            amount: transaction.amount,
            processing_date,
            crediting_date,
        })
    }

    /// Settlement status of a transaction as of `today`
    pub fn status(&self, transaction: &Transaction, today: NaiveDate) -> Result<SettlementStatus> {
        Ok(self.schedule(transaction)?.status(today))
    }

    /// Schedule a batch, failing on the first invalid capture
    pub fn schedule_all(&self, transactions: &[Transaction]) -> Result<Vec<SettlementRecord>> {
        transactions.iter().map(|t| self.schedule(t)).collect()
    }

    /// Transactions credited on or before `today`
    pub fn completed<'a>(
        &self,
        transactions: &'a [Transaction],
        today: NaiveDate,
    ) -> Result<Vec<&'a Transaction>> {
        let mut settled = Vec::new();
        for transaction in transactions {
            if self.schedule(transaction)?.is_completed(today) {
                settled.push(transaction);
            }
        }
        Ok(settled)
    }

    /// Counts and amounts per settlement status as of `today`
    pub fn summarize(
        &self,
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> Result<SettlementSummary> {
        let mut summary = SettlementSummary::default();
        for transaction in transactions {
            let record = self.schedule(transaction)?;
            summary.add(record.status(today), record.amount);
        }
        Ok(summary)
    }
}

fn invalid_capture(transaction: &Transaction) -> Error {
    Error::InvalidCaptureDate {
        transaction_id: transaction.id.to_string(),
        captured_at: transaction.captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use ledger_core::{Amount, Currency, VendorId};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn captured(at: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            vendor_id: VendorId::new("v-1"),
            amount: Amount::from_major(250),
            currency: Currency::INR,
            captured_at: at,
            gateway: "stripe".to_string(),
        }
    }

    #[test]
    fn test_christmas_holiday_scenario() {
        let scheduler = SettlementScheduler::new(BankingCalendar::new([date(2024, 12, 25)]));
        let tx = captured(Utc.with_ymd_and_hms(2024, 12, 24, 15, 30, 0).unwrap());

        let record = scheduler.schedule(&tx).unwrap();
        assert_eq!(record.processing_date, date(2024, 12, 26));
        assert_eq!(record.crediting_date, date(2024, 12, 27));
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        let tx = captured(Utc.with_ymd_and_hms(2024, 3, 8, 23, 59, 59).unwrap());

        assert_eq!(scheduler.schedule(&tx).unwrap(), scheduler.schedule(&tx).unwrap());
    }

    #[test]
    fn test_weekend_capture() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        // Saturday capture: processing Monday, crediting Tuesday
        let tx = captured(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap());

        let record = scheduler.schedule(&tx).unwrap();
        assert_eq!(record.processing_date, date(2024, 3, 11));
        assert_eq!(record.crediting_date, date(2024, 3, 12));
    }

    #[test]
    fn test_zero_timestamp_rejected() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        let tx = captured(Utc.timestamp_opt(0, 0).unwrap());

        assert!(matches!(
            scheduler.schedule(&tx),
            Err(Error::InvalidCaptureDate { .. })
        ));
    }

    #[test]
    fn test_status_progression() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        let tx = captured(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()); // Mon

        assert_eq!(scheduler.status(&tx, date(2024, 3, 4)).unwrap(), SettlementStatus::Pending);
        assert_eq!(scheduler.status(&tx, date(2024, 3, 5)).unwrap(), SettlementStatus::Processing);
        assert_eq!(scheduler.status(&tx, date(2024, 3, 6)).unwrap(), SettlementStatus::Completed);
    }

    #[test]
    fn test_reload_calendar() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        let tx = captured(Utc.with_ymd_and_hms(2024, 12, 24, 9, 0, 0).unwrap());
        assert_eq!(scheduler.schedule(&tx).unwrap().processing_date, date(2024, 12, 25));

        scheduler.reload_calendar(BankingCalendar::new([date(2024, 12, 25), date(2024, 12, 26)]));
        assert_eq!(scheduler.schedule(&tx).unwrap().processing_date, date(2024, 12, 27));
    }

    #[test]
    fn test_summarize_and_completed() {
        let scheduler = SettlementScheduler::new(BankingCalendar::default());
        let txs = vec![
            captured(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()), // credited Tue 5th
            captured(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()), // processing Wed 6th
            captured(Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap()), // pending
        ];
        let today = date(2024, 3, 6);

        let summary = scheduler.summarize(&txs, today).unwrap();
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.processing_count, 1);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.in_flight_amount(), Amount::from_major(500));

        let completed = scheduler.completed(&txs, today).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, txs[0].id);
    }
}
