//! Payout request lifecycle
//!
//! ```text
//! create ──► pending ──► processing ──► paid
//!               │             │
//!               └─────────────┴──► failed
//! ```
//!
//! `create` authorizes and reserves in one step. Per vendor, an in-process
//! mutex serializes writers, and every store write is conditional on the
//! payout version the balance was read at, so a writer in another process
//! cannot slip a reservation in between. A lost write is re-read and retried.

use crate::{
    balance::{unavailable, AuthorizationResult, BalanceLedger, DenialReason},
    metrics::Metrics,
    Result,
};
use dashmap::DashMap;
use ledger_core::{Amount, PayoutRequest, PayoutStatus, VendorId};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of [`PayoutRequestManager::create`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    /// Request persisted as `pending`; its amount is reserved
    Created(PayoutRequest),
    /// Nothing persisted
    Denied(DenialReason),
}

impl CreateOutcome {
    /// Created request, if any
    pub fn request(&self) -> Option<&PayoutRequest> {
        match self {
            CreateOutcome::Created(request) => Some(request),
            CreateOutcome::Denied(_) => None,
        }
    }

    /// Denial reason, if denied
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            CreateOutcome::Created(_) => None,
            CreateOutcome::Denied(reason) => Some(*reason),
        }
    }
}

/// Creates payout requests and drives them through their lifecycle
#[derive(Debug)]
pub struct PayoutRequestManager {
    ledger: Arc<BalanceLedger>,
    metrics: Metrics,
    locks: DashMap<VendorId, Arc<Mutex<()>>>,
    max_retries: u32,
}

impl PayoutRequestManager {
    /// Create manager; a lost conditional write is retried up to `max_retries` times
    pub fn new(ledger: Arc<BalanceLedger>, metrics: Metrics, max_retries: u32) -> Self {
        Self {
            ledger,
            metrics,
            locks: DashMap::new(),
            max_retries,
        }
    }

    /// Balance ledger
    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Authorize `amount` and, if authorized, persist a `pending` request
    ///
    /// The reservation counts against the balance as soon as this returns.
    /// Two concurrent calls for one vendor can never both reserve against the
    /// same funds.
    pub fn create(&self, vendor_id: &VendorId, amount: Amount) -> Result<CreateOutcome> {
        if !amount.is_positive() {
            return Ok(self.deny(vendor_id, amount, DenialReason::InvalidAmount));
        }

        let lock = self.vendor_lock(vendor_id);
        let _guard = lock.lock();

        let mut attempt = 0;
        loop {
            let snapshot = self.ledger.snapshot(vendor_id)?;
            if let AuthorizationResult::Denied(reason) = snapshot.authorize(amount) {
                return Ok(self.deny(vendor_id, amount, reason));
            }

            let request = PayoutRequest::new(
                vendor_id.clone(),
                amount,
                snapshot.currency,
                self.ledger.clock().now(),
            );

            match self.ledger.store().insert_payout(&request, snapshot.version) {
                Ok(version) => {
                    self.metrics.record_authorized();
                    info!(
                        vendor_id = %vendor_id,
                        payout_id = %request.id,
                        amount = %amount,
                        available = %(snapshot.available - amount),
                        version,
                        "Payout reserved"
                    );
                    return Ok(CreateOutcome::Created(request));
                }
                Err(e) if e.is_retryable() => {
                    self.metrics.record_conflict();
                    if attempt >= self.max_retries {
                        warn!(vendor_id = %vendor_id, attempts = attempt + 1, "Payout reservation kept conflicting");
                        return Err(e.into());
                    }
                    attempt += 1;
                    warn!(vendor_id = %vendor_id, attempt, "Payout version moved, re-reading balance");
                }
                Err(e) => return Err(unavailable(e)),
            }
        }
    }

    /// `pending → processing`
    pub fn begin_processing(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.transition(payout_id, PayoutStatus::Processing, |_| {})
    }

    /// `processing → paid`
    pub fn complete(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        self.transition(payout_id, PayoutStatus::Paid, |_| {})
    }

    /// `processing → paid`, recording the rail or bank reference
    pub fn complete_with_reference(
        &self,
        payout_id: Uuid,
        reference: impl Into<String>,
    ) -> Result<PayoutRequest> {
        let reference = reference.into();
        self.transition(payout_id, PayoutStatus::Paid, move |request| {
            request.settlement_reference = Some(reference.clone());
        })
    }

    /// `pending | processing → failed`, releasing the reserved amount
    pub fn fail(&self, payout_id: Uuid, reason: impl Into<String>) -> Result<PayoutRequest> {
        let reason = reason.into();
        self.transition(payout_id, PayoutStatus::Failed, move |request| {
            request.failure_reason = Some(reason.clone());
        })
    }

    /// Payout request by ID
    pub fn get(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        Ok(self.ledger.store().payout(payout_id)?)
    }

    /// All payout requests for a vendor, oldest first
    pub fn history(&self, vendor_id: &VendorId) -> Result<Vec<PayoutRequest>> {
        let ledger = self
            .ledger
            .store()
            .payout_ledger(vendor_id)
            .map_err(unavailable)?;
        Ok(ledger.requests)
    }

    fn transition(
        &self,
        payout_id: Uuid,
        next: PayoutStatus,
        annotate: impl Fn(&mut PayoutRequest),
    ) -> Result<PayoutRequest> {
        let vendor_id = self.ledger.store().payout(payout_id)?.vendor_id;
        let lock = self.vendor_lock(&vendor_id);
        let _guard = lock.lock();

        let mut attempt = 0;
        loop {
            let ledger = self
                .ledger
                .store()
                .payout_ledger(&vendor_id)
                .map_err(unavailable)?;
            let mut request = ledger
                .requests
                .into_iter()
                .find(|r| r.id == payout_id)
                .ok_or_else(|| ledger_core::Error::PayoutNotFound(payout_id.to_string()))?;

            let from = request.status;
            if let Err(e) = request.transition(next, self.ledger.clock().now()) {
                error!(
                    payout_id = %payout_id,
                    vendor_id = %vendor_id,
                    %from,
                    to = %next,
                    "Rejected payout transition"
                );
                return Err(e.into());
            }
            annotate(&mut request);

            match self.ledger.store().update_payout(&request, ledger.version) {
                Ok(_) => {
                    self.metrics.record_transition(next);
                    info!(
                        payout_id = %payout_id,
                        vendor_id = %vendor_id,
                        %from,
                        to = %next,
                        amount = %request.amount,
                        "Payout transitioned"
                    );
                    return Ok(request);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    self.metrics.record_conflict();
                    attempt += 1;
                    warn!(payout_id = %payout_id, attempt, "Payout version moved, retrying transition");
                }
                Err(e) => return Err(unavailable(e)),
            }
        }
    }

    fn deny(&self, vendor_id: &VendorId, amount: Amount, reason: DenialReason) -> CreateOutcome {
        self.metrics.record_denied(reason);
        info!(vendor_id = %vendor_id, amount = %amount, %reason, "Payout denied");
        CreateOutcome::Denied(reason)
    }

    fn vendor_lock(&self, vendor_id: &VendorId) -> Arc<Mutex<()>> {
        self.locks
            .entry(vendor_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
