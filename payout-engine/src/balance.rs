//! Withdrawable balances
//!
//! Reportable revenue counts every captured transaction. The withdrawable
//! balance counts only transactions whose settlement has completed:
//!
//! ```text
//! available = Σ net_revenue(period, settled transactions)
//!           − Σ amount(payouts in pending | processing | paid)
//! ```
//!
//! Periods run month by month from the earlier of the vendor's
//! `billing_start` and its first capture through the month containing today.
//! Nothing is cached; every call recomputes from the store.

use crate::{clock::Clock, Error, Result};
use chrono::NaiveDate;
use ledger_core::{
    Amount, Currency, FeeSchedule, PayoutRequest, PayoutStatus, Store, Transaction, VendorAccount,
    VendorId,
};
use serde::{Deserialize, Serialize};
use settlement::{BillingPeriod, FeeBreakdown, FeeCalculator, SettlementScheduler, SettlementSummary};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Why a payout was not authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Amount exceeds the available balance
    InsufficientBalance,
    /// Amount is zero or negative
    InvalidAmount,
}

impl DenialReason {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::InsufficientBalance => "insufficient_balance",
            DenialReason::InvalidAmount => "invalid_amount",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a payout authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationResult {
    /// `0 < amount <= available`
    Authorized,
    /// Not authorized, with the reason
    Denied(DenialReason),
}

impl AuthorizationResult {
    /// Whether the payout may proceed
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Authorized)
    }
}

/// Balance figures read together with the payout version they depend on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    /// Vendor
    pub vendor_id: VendorId,
    /// Settlement currency
    pub currency: Currency,
    /// Day the figures were computed for
    pub as_of: NaiveDate,
    /// Net revenue over settled transactions
    pub settled_net_revenue: Amount,
    /// Pending + processing payouts
    pub reserved: Amount,
    /// Paid payouts
    pub paid: Amount,
    /// Withdrawable now
    pub available: Amount,
    /// Store payout version observed by this read
    pub version: u64,
}

impl BalanceSnapshot {
    /// Authorize `amount` against these figures
    pub fn authorize(&self, amount: Amount) -> AuthorizationResult {
        if !amount.is_positive() {
            AuthorizationResult::Denied(DenialReason::InvalidAmount)
        } else if amount > self.available {
            AuthorizationResult::Denied(DenialReason::InsufficientBalance)
        } else {
            AuthorizationResult::Authorized
        }
    }
}

/// Everything the reporting layer shows for one vendor
#[derive(Debug, Clone, Serialize)]
pub struct VendorStatement {
    /// Vendor
    pub vendor_id: VendorId,
    /// Settlement currency
    pub currency: Currency,
    /// Day the statement was computed for
    pub as_of: NaiveDate,
    /// Current period over all captured transactions (reportable revenue)
    pub current_period: FeeBreakdown,
    /// Settlement status counts over all captured transactions
    pub settlement: SettlementSummary,
    /// Net revenue over settled transactions
    pub settled_net_revenue: Amount,
    /// Pending + processing payouts
    pub reserved: Amount,
    /// Paid payouts
    pub paid: Amount,
    /// Withdrawable now
    pub available_balance: Amount,
    /// All payout requests, oldest first
    pub payouts: Vec<PayoutRequest>,
}

/// Computes balances and authorizes payouts
#[derive(Debug)]
pub struct BalanceLedger {
    store: Arc<dyn Store>,
    scheduler: Arc<SettlementScheduler>,
    default_fees: FeeSchedule,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    /// Create ledger; `default_fees` applies to vendors without a plan of their own
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Arc<SettlementScheduler>,
        default_fees: FeeSchedule,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settlement::fees::validate_schedule(&default_fees)?;
        Ok(Self {
            store,
            scheduler,
            default_fees,
            clock,
        })
    }

    /// Backing store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Settlement scheduler
    pub fn scheduler(&self) -> &Arc<SettlementScheduler> {
        &self.scheduler
    }

    /// Time source
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Withdrawable balance as of today
    pub fn available_balance(&self, vendor_id: &VendorId) -> Result<Amount> {
        Ok(self.snapshot(vendor_id)?.available)
    }

    /// `Authorized` iff `0 < amount <= available_balance`
    ///
    /// A denial is a value, not an error. Nothing is reserved; use
    /// [`PayoutRequestManager::create`](crate::PayoutRequestManager::create)
    /// to authorize and reserve in one step.
    pub fn authorize_payout(&self, vendor_id: &VendorId, amount: Amount) -> Result<AuthorizationResult> {
        if !amount.is_positive() {
            return Ok(AuthorizationResult::Denied(DenialReason::InvalidAmount));
        }
        Ok(self.snapshot(vendor_id)?.authorize(amount))
    }

    /// Balance figures together with the payout version they were read at
    pub fn snapshot(&self, vendor_id: &VendorId) -> Result<BalanceSnapshot> {
        let today = self.clock.today();
        let account = self.store.vendor(vendor_id).map_err(unavailable)?;
        let ledger = self.store.payout_ledger(vendor_id).map_err(unavailable)?;
        let transactions = self.store.transactions(vendor_id).map_err(unavailable)?;
        check_currency(&account, &transactions)?;

        let settled_net_revenue = self.settled_net_revenue(&account, &transactions, today)?;
        let (reserved, paid) = payout_totals(&ledger.requests)?;
        let available = net_available(settled_net_revenue, reserved, paid)?;

        debug!(
            vendor_id = %vendor_id,
            %today,
            settled = %settled_net_revenue,
            reserved = %reserved,
            paid = %paid,
            available = %available,
            version = ledger.version,
            "Computed balance"
        );

        Ok(BalanceSnapshot {
            vendor_id: vendor_id.clone(),
            currency: account.currency,
            as_of: today,
            settled_net_revenue,
            reserved,
            paid,
            available,
            version: ledger.version,
        })
    }

    /// Full reporting view for one vendor
    pub fn statement(&self, vendor_id: &VendorId) -> Result<VendorStatement> {
        let today = self.clock.today();
        let account = self.store.vendor(vendor_id).map_err(unavailable)?;
        let ledger = self.store.payout_ledger(vendor_id).map_err(unavailable)?;
        let transactions = self.store.transactions(vendor_id).map_err(unavailable)?;
        check_currency(&account, &transactions)?;

        let current = self.current_period(&account, &transactions, today)?;
        let current_period = self.calculator(&account, &current)?.compute_as_of(
            vendor_id,
            &current,
            &transactions,
            today,
        )?;
        let settlement = self.scheduler.summarize(&transactions, today)?;

        let settled_net_revenue = self.settled_net_revenue(&account, &transactions, today)?;
        let (reserved, paid) = payout_totals(&ledger.requests)?;
        let available_balance = net_available(settled_net_revenue, reserved, paid)?;

        Ok(VendorStatement {
            vendor_id: vendor_id.clone(),
            currency: account.currency,
            as_of: today,
            current_period,
            settlement,
            settled_net_revenue,
            reserved,
            paid,
            available_balance,
            payouts: ledger.requests,
        })
    }

    /// Net revenue across all periods over settled transactions only
    pub fn settled_net_revenue(
        &self,
        account: &VendorAccount,
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> Result<Amount> {
        let settled = self.scheduler.completed(transactions, today)?;

        let mut total = Amount::ZERO;
        for period in self.billing_periods(account, transactions, today)? {
            let breakdown = self.calculator(account, &period)?.compute_as_of(
                &account.vendor_id,
                &period,
                settled.iter().copied(),
                today,
            )?;
            total = total.checked_add(breakdown.net_revenue()).ok_or_else(|| {
                Error::Calculation(format!("settled net revenue overflow for {}", account.vendor_id))
            })?;
        }
        Ok(total)
    }

    /// Billing periods from the earlier of `billing_start` and the first capture
    /// through the month containing `today`
    ///
    /// The month containing `billing_start` is split on that day; the part
    /// before it is only emitted when captures reach back that far.
    pub fn billing_periods(
        &self,
        account: &VendorAccount,
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> Result<Vec<BillingPeriod>> {
        let billing_start = account.billing_start;
        let first_capture = transactions.iter().map(Transaction::capture_date).min();
        let first = first_capture.map_or(billing_start, |d| d.min(billing_start));

        let mut periods = Vec::new();
        for period in BillingPeriod::months_between(first, today)? {
            if period.contains(billing_start) && period.start() < billing_start {
                if first < billing_start {
                    periods.push(BillingPeriod::new(period.start(), billing_start)?);
                }
                periods.push(BillingPeriod::new(billing_start, period.end())?);
            } else {
                periods.push(period);
            }
        }
        Ok(periods)
    }

    /// Billing period containing `today`
    ///
    /// Before billing starts this is the unbilled part of today's month, so
    /// no subscription accrues.
    fn current_period(
        &self,
        account: &VendorAccount,
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> Result<BillingPeriod> {
        if let Some(period) = self
            .billing_periods(account, transactions, today)?
            .into_iter()
            .find(|p| p.contains(today))
        {
            return Ok(period);
        }

        let month = BillingPeriod::containing(today)?;
        if month.contains(account.billing_start) && month.start() < account.billing_start {
            return Ok(BillingPeriod::new(month.start(), account.billing_start)?);
        }
        Ok(month)
    }

    /// Vendor's plan, or the default plan; periods ending by `billing_start`
    /// carry no subscription
    fn calculator(&self, account: &VendorAccount, period: &BillingPeriod) -> Result<FeeCalculator> {
        let mut schedule = account
            .fee_schedule
            .clone()
            .unwrap_or_else(|| self.default_fees.clone());
        if period.end() <= account.billing_start {
            schedule.monthly_fee = Amount::ZERO;
        }
        Ok(FeeCalculator::new(schedule)?)
    }
}

/// (pending + processing, paid)
fn payout_totals(requests: &[PayoutRequest]) -> Result<(Amount, Amount)> {
    let mut reserved = Amount::ZERO;
    let mut paid = Amount::ZERO;
    for request in requests {
        let total = match request.status {
            PayoutStatus::Pending | PayoutStatus::Processing => &mut reserved,
            PayoutStatus::Paid => &mut paid,
            PayoutStatus::Failed => continue,
        };
        *total = total
            .checked_add(request.amount)
            .ok_or_else(|| Error::Calculation("payout total overflow".to_string()))?;
    }
    Ok((reserved, paid))
}

/// `settled − reserved − paid`
fn net_available(settled: Amount, reserved: Amount, paid: Amount) -> Result<Amount> {
    settled
        .checked_sub(reserved)
        .and_then(|v| v.checked_sub(paid))
        .ok_or_else(|| Error::Calculation("available balance overflow".to_string()))
}

/// Every capture must be in the account's settlement currency
fn check_currency(account: &VendorAccount, transactions: &[Transaction]) -> Result<()> {
    match transactions.iter().find(|t| t.currency != account.currency) {
        Some(t) => {
            error!(
                vendor_id = %account.vendor_id,
                transaction_id = %t.id,
                expected = %account.currency,
                found = %t.currency,
                "Capture currency differs from account currency"
            );
            Err(Error::CurrencyMismatch {
                vendor_id: account.vendor_id.to_string(),
                transaction_id: t.id.to_string(),
                expected: account.currency,
                found: t.currency,
            })
        }
        None => Ok(()),
    }
}

/// Storage failures and missing account records become `DataUnavailable`
pub(crate) fn unavailable(err: ledger_core::Error) -> Error {
    match err {
        ledger_core::Error::DataUnavailable(msg) | ledger_core::Error::Storage(msg) => {
            Error::DataUnavailable(msg)
        }
        other => Error::Ledger(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};
    use ledger_core::MemoryStore;
    use rust_decimal::Decimal;
    use settlement::BankingCalendar;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn fixture(
        fees: Option<FeeSchedule>,
        billing_start: NaiveDate,
        now: DateTime<Utc>,
    ) -> (Arc<MemoryStore>, BalanceLedger) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_vendor(VendorAccount {
                vendor_id: VendorId::new("v-1"),
                currency: Currency::INR,
                fee_schedule: fees,
                billing_start,
            })
            .unwrap();
        let ledger = BalanceLedger::new(
            store.clone(),
            Arc::new(SettlementScheduler::new(BankingCalendar::default())),
            FeeSchedule::free(),
            Arc::new(FixedClock::new(now)),
        )
        .unwrap();
        (store, ledger)
    }

    fn capture(store: &MemoryStore, minor: i64, captured_at: DateTime<Utc>) {
        store
            .record_transaction(Transaction {
                id: Uuid::new_v4(),
                vendor_id: VendorId::new("v-1"),
                amount: Amount::from_minor(minor),
                currency: Currency::INR,
                captured_at,
                gateway: "razorpay".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_only_settled_transactions_are_withdrawable() {
        // Wed 6 March: Monday's capture is credited, Tuesday's is processing
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 6));
        capture(&store, 10_000, at(2024, 3, 4));
        capture(&store, 20_000, at(2024, 3, 5));
        capture(&store, 40_000, at(2024, 3, 6));

        let vendor = VendorId::new("v-1");
        assert_eq!(ledger.available_balance(&vendor).unwrap(), Amount::from_minor(10_000));

        let statement = ledger.statement(&vendor).unwrap();
        assert_eq!(statement.current_period.gross_revenue(), Amount::from_minor(70_000));
        assert_eq!(statement.settlement.completed_count, 1);
        assert_eq!(statement.settlement.in_flight_amount(), Amount::from_minor(60_000));
        assert_eq!(statement.available_balance, Amount::from_minor(10_000));
    }

    #[test]
    fn test_subscription_accrues_across_periods() {
        // Billing from 22 Jan; today 10 March. 10/31 of Jan, all of Feb, 10/31 of March
        let fees = FeeSchedule {
            monthly_fee: Amount::from_minor(31_000),
            per_transaction_fee: Amount::ZERO,
            processing_rate: Decimal::ZERO,
        };
        let (store, ledger) = fixture(Some(fees), date(2024, 1, 22), at(2024, 3, 10));
        capture(&store, 1_000_000, at(2024, 1, 2));

        let vendor = VendorId::new("v-1");
        let account = store.vendor(&vendor).unwrap();
        let periods = ledger
            .billing_periods(&account, &store.transactions(&vendor).unwrap(), date(2024, 3, 10))
            .unwrap();
        assert_eq!(
            periods.iter().map(|p| p.start()).collect::<Vec<_>>(),
            vec![date(2024, 1, 1), date(2024, 1, 22), date(2024, 2, 1), date(2024, 3, 1)]
        );

        // The 2 Jan capture lands in the unbilled head of January
        let expected = Amount::from_minor(1_000_000 - 10_000 - 31_000 - 10_000);
        assert_eq!(ledger.available_balance(&vendor).unwrap(), expected);
    }

    #[test]
    fn test_payouts_reduce_balance_until_failed() {
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 20));
        capture(&store, 100_000, at(2024, 3, 4));
        let vendor = VendorId::new("v-1");

        let mut request = PayoutRequest::new(vendor.clone(), Amount::from_minor(30_000), Currency::INR, at(2024, 3, 20));
        let version = store.insert_payout(&request, 0).unwrap();
        assert_eq!(ledger.available_balance(&vendor).unwrap(), Amount::from_minor(70_000));

        request.transition(PayoutStatus::Failed, at(2024, 3, 20)).unwrap();
        store.update_payout(&request, version).unwrap();
        assert_eq!(ledger.available_balance(&vendor).unwrap(), Amount::from_minor(100_000));
    }

    #[test]
    fn test_authorize_payout_bounds() {
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 20));
        capture(&store, 50_000, at(2024, 3, 4));
        let vendor = VendorId::new("v-1");

        assert_eq!(
            ledger.authorize_payout(&vendor, Amount::from_minor(50_000)).unwrap(),
            AuthorizationResult::Authorized
        );
        assert_eq!(
            ledger.authorize_payout(&vendor, Amount::from_minor(50_001)).unwrap(),
            AuthorizationResult::Denied(DenialReason::InsufficientBalance)
        );
        assert_eq!(
            ledger.authorize_payout(&vendor, Amount::ZERO).unwrap(),
            AuthorizationResult::Denied(DenialReason::InvalidAmount)
        );
    }

    #[test]
    fn test_current_period_before_billing_start() {
        // Billing starts 25 June; on the 20th the statement covers 1-24 June
        let fees = FeeSchedule {
            monthly_fee: Amount::from_minor(99_900),
            per_transaction_fee: Amount::ZERO,
            processing_rate: Decimal::ZERO,
        };
        let (store, ledger) = fixture(Some(fees), date(2024, 6, 25), at(2024, 6, 20));
        capture(&store, 50_000, at(2024, 6, 3));

        let statement = ledger.statement(&VendorId::new("v-1")).unwrap();
        assert_eq!(
            statement.current_period.period(),
            BillingPeriod::new(date(2024, 6, 1), date(2024, 6, 25)).unwrap()
        );
        assert_eq!(statement.current_period.gross_revenue(), Amount::from_minor(50_000));
        assert_eq!(statement.current_period.subscription_fee_prorated(), Amount::ZERO);
        assert_eq!(statement.available_balance, Amount::from_minor(50_000));
    }

    #[test]
    fn test_no_subscription_before_billing_start_without_captures() {
        let fees = FeeSchedule {
            monthly_fee: Amount::from_minor(99_900),
            per_transaction_fee: Amount::ZERO,
            processing_rate: Decimal::ZERO,
        };
        let (_store, ledger) = fixture(Some(fees.clone()), date(2024, 6, 25), at(2024, 6, 20));

        let statement = ledger.statement(&VendorId::new("v-1")).unwrap();
        assert_eq!(
            statement.current_period.period(),
            BillingPeriod::new(date(2024, 6, 1), date(2024, 6, 25)).unwrap()
        );
        assert_eq!(statement.current_period.subscription_fee_prorated(), Amount::ZERO);
        assert_eq!(statement.available_balance, Amount::ZERO);

        // Billing starting in a later month leaves today's whole month unbilled
        let (_store, ledger) = fixture(Some(fees), date(2024, 8, 1), at(2024, 6, 20));
        let statement = ledger.statement(&VendorId::new("v-1")).unwrap();
        assert_eq!(statement.current_period.period(), BillingPeriod::month(2024, 6).unwrap());
        assert_eq!(statement.current_period.subscription_fee_prorated(), Amount::ZERO);
    }

    #[test]
    fn test_foreign_currency_capture_is_an_error() {
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 20));
        capture(&store, 10_000, at(2024, 3, 4));
        store
            .record_transaction(Transaction {
                id: Uuid::new_v4(),
                vendor_id: VendorId::new("v-1"),
                amount: Amount::from_minor(1_000_000),
                currency: Currency::USD,
                captured_at: at(2024, 3, 4),
                gateway: "stripe".to_string(),
            })
            .unwrap();
        let vendor = VendorId::new("v-1");

        let err = ledger.available_balance(&vendor).unwrap_err();
        assert!(matches!(
            err,
            Error::CurrencyMismatch {
                expected: Currency::INR,
                found: Currency::USD,
                ..
            }
        ));
        assert!(!err.is_retryable());
        assert!(matches!(
            ledger.statement(&vendor),
            Err(Error::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            ledger.authorize_payout(&vendor, Amount::from_minor(100)),
            Err(Error::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_payout_total_overflow_is_an_error() {
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 20));
        let vendor = VendorId::new("v-1");
        for version in 0..2 {
            let request = PayoutRequest::new(
                vendor.clone(),
                Amount::from_minor(i64::MAX),
                Currency::INR,
                at(2024, 3, 20),
            );
            store.insert_payout(&request, version).unwrap();
        }

        assert!(matches!(
            ledger.available_balance(&vendor),
            Err(Error::Calculation(_))
        ));
    }

    #[test]
    fn test_activity_without_account_is_unavailable() {
        let (store, ledger) = fixture(None, date(2024, 3, 1), at(2024, 3, 20));
        store
            .record_transaction(Transaction {
                id: Uuid::new_v4(),
                vendor_id: VendorId::new("v-orphan"),
                amount: Amount::from_minor(100),
                currency: Currency::INR,
                captured_at: at(2024, 3, 4),
                gateway: "razorpay".to_string(),
            })
            .unwrap();

        assert!(matches!(
            ledger.statement(&VendorId::new("v-orphan")),
            Err(Error::DataUnavailable(_))
        ));
        assert!(matches!(
            ledger.available_balance(&VendorId::new("v-nobody")),
            Err(Error::Ledger(ledger_core::Error::VendorNotFound(_)))
        ));
    }
}
