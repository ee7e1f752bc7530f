//! Property-based tests for store and payout invariants
//!
//! These tests use proptest to verify:
//! - Idempotency: duplicate transaction IDs are recorded once
//! - Versioning: every payout write bumps the vendor version, stale writes fail
//! - State machine: terminal payouts never change
//! - Rounding: half-up rounding agrees with integer arithmetic

use chrono::{NaiveDate, TimeZone, Utc};
use ledger_core::{
    Amount, Currency, Error, FeeSchedule, MemoryStore, PayoutRequest, PayoutStatus, Store,
    Transaction, VendorAccount, VendorId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for generating currencies
fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::AED),
        Just(Currency::INR),
    ]
}

/// Strategy for generating vendor IDs
fn vendor_id_strategy() -> impl Strategy<Value = VendorId> {
    "vendor-[a-z]{2}[0-9]{2}".prop_map(VendorId::new)
}

/// Strategy for generating payout statuses
fn status_strategy() -> impl Strategy<Value = PayoutStatus> {
    prop_oneof![
        Just(PayoutStatus::Pending),
        Just(PayoutStatus::Processing),
        Just(PayoutStatus::Paid),
        Just(PayoutStatus::Failed),
    ]
}

fn transaction(vendor_id: VendorId, minor: i64, currency: Currency) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        vendor_id,
        amount: Amount::from_minor(minor),
        currency,
        captured_at: Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(),
        gateway: "adyen".to_string(),
    }
}

fn payout(vendor: &VendorId, minor: i64) -> PayoutRequest {
    PayoutRequest::new(
        vendor.clone(),
        Amount::from_minor(minor),
        Currency::USD,
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: replaying captures never double counts
    #[test]
    fn prop_record_transaction_idempotent(
        vendor in vendor_id_strategy(),
        currency in currency_strategy(),
        amounts in prop::collection::vec(1i64..1_000_000, 1..30),
        replays in 1usize..4,
    ) {
        let store = MemoryStore::new();
        let txs: Vec<Transaction> = amounts
            .iter()
            .map(|minor| transaction(vendor.clone(), *minor, currency))
            .collect();

        for round in 0..replays {
            for tx in &txs {
                let fresh = store.record_transaction(tx.clone()).unwrap();
                prop_assert_eq!(fresh, round == 0);
            }
        }

        let stored = store.transactions(&vendor).unwrap();
        prop_assert_eq!(stored.len(), txs.len());
        let total: Amount = stored.iter().map(|t| t.amount).sum();
        prop_assert_eq!(total, Amount::from_minor(amounts.iter().sum()));
    }

    /// Property: versions increase by one per write and stale writes are rejected
    #[test]
    fn prop_versions_are_monotonic(
        vendor in vendor_id_strategy(),
        amounts in prop::collection::vec(1i64..1_000_000, 1..20),
    ) {
        let store = MemoryStore::new();
        let mut version = store.payout_ledger(&vendor).unwrap().version;
        prop_assert_eq!(version, 0);

        for minor in &amounts {
            let stale = version;
            version = store.insert_payout(&payout(&vendor, *minor), version).unwrap();
            prop_assert_eq!(version, stale + 1);

            let rejected = store.insert_payout(&payout(&vendor, *minor), stale);
            let is_conflict = matches!(rejected, Err(Error::ConcurrencyConflict { .. }));
            prop_assert!(is_conflict);
        }

        let ledger = store.payout_ledger(&vendor).unwrap();
        prop_assert_eq!(ledger.version, amounts.len() as u64);
        prop_assert_eq!(ledger.requests.len(), amounts.len());
    }

    /// Property: a transition succeeds exactly on legal edges and terminal states never move
    #[test]
    fn prop_payout_state_machine(steps in prop::collection::vec(status_strategy(), 1..12)) {
        let vendor = VendorId::new("vendor-sm");
        let mut request = payout(&vendor, 10_000);
        let at = Utc.with_ymd_and_hms(2024, 6, 11, 9, 0, 0).unwrap();

        for next in steps {
            let before = request.clone();
            let result = request.transition(next, at);

            if before.status.can_transition_to(next) {
                prop_assert!(result.is_ok());
                prop_assert_eq!(request.status, next);
            } else {
                let is_invalid = matches!(result, Err(Error::InvalidTransition { .. }));
                prop_assert!(is_invalid);
                prop_assert_eq!(&request, &before);
            }

            if before.status.is_terminal() {
                prop_assert_eq!(request.status, before.status);
            }
        }
    }

    /// Property: half-up rounding of n/2 matches integer arithmetic
    #[test]
    fn prop_round_half_up_halves(n in -1_000_000_000i64..1_000_000_000) {
        let rounded = Amount::round_half_up(Decimal::new(n, 0) / Decimal::new(2, 0)).unwrap();
        let expected = if n >= 0 { (n + 1) / 2 } else { (n - 1) / 2 };
        prop_assert_eq!(rounded, Amount::from_minor(expected));
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn account(id: &str) -> VendorAccount {
        VendorAccount {
            vendor_id: VendorId::new(id),
            currency: Currency::USD,
            fee_schedule: Some(FeeSchedule::default()),
            billing_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_full_payout_lifecycle() {
        let store = MemoryStore::new();
        let vendor = VendorId::new("vendor-1");
        store.upsert_vendor(account("vendor-1")).unwrap();

        let mut request = payout(&vendor, 250_000);
        let v1 = store.insert_payout(&request, 0).unwrap();

        request
            .transition(PayoutStatus::Processing, Utc::now())
            .unwrap();
        let v2 = store.update_payout(&request, v1).unwrap();

        request.transition(PayoutStatus::Paid, Utc::now()).unwrap();
        request.settlement_reference = Some("UTR-0001".to_string());
        let v3 = store.update_payout(&request, v2).unwrap();
        assert_eq!(v3, 3);

        let stored = store.payout(request.id).unwrap();
        assert_eq!(stored.status, PayoutStatus::Paid);
        assert_eq!(stored.settlement_reference.as_deref(), Some("UTR-0001"));

        // Paid is terminal
        let mut again = stored.clone();
        assert!(again.transition(PayoutStatus::Failed, Utc::now()).is_err());
        assert_eq!(again, stored);
    }

    #[test]
    fn test_snapshot_restores_versions() {
        let store = MemoryStore::new();
        let vendor = VendorId::new("vendor-2");
        store.upsert_vendor(account("vendor-2")).unwrap();
        store
            .record_transaction(transaction(vendor.clone(), 5_000, Currency::USD))
            .unwrap();
        store.insert_payout(&payout(&vendor, 1_000), 0).unwrap();
        store.insert_payout(&payout(&vendor, 2_000), 1).unwrap();

        let restored = MemoryStore::from_snapshot(store.snapshot()).unwrap();
        let ledger = restored.payout_ledger(&vendor).unwrap();
        assert_eq!(ledger.version, 2);
        assert_eq!(ledger.requests.len(), 2);
        assert_eq!(restored.transactions(&vendor).unwrap().len(), 1);
        assert_eq!(restored.vendor_ids().unwrap(), vec![vendor]);
    }
}
