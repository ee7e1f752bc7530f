//! Metrics collection for observability
//!
//! Prometheus counters for payout authorization and lifecycle, registered on
//! a registry owned by the engine instance.
//!
//! # Metrics
//!
//! - `payout_requests_authorized_total` - Payout requests created
//! - `payout_requests_denied_total{reason}` - Requests denied at authorization
//! - `payout_transitions_total{to}` - Lifecycle transitions by target status
//! - `payout_reservation_conflicts_total` - Conditional writes lost to a concurrent writer
//! - `vendor_statements_total` - Vendor statements recomputed

use ledger_core::PayoutStatus;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::balance::DenialReason;
use crate::Result;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Payout requests created
    pub authorized_total: IntCounter,

    /// Denied requests by reason
    pub denied_total: IntCounterVec,

    /// Transitions by target status
    pub transitions_total: IntCounterVec,

    /// Version conflicts during reservation
    pub conflicts_total: IntCounter,

    /// Statements recomputed
    pub statements_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let authorized_total = IntCounter::new(
            "payout_requests_authorized_total",
            "Total payout requests authorized and reserved",
        )?;
        registry.register(Box::new(authorized_total.clone()))?;

        let denied_total = IntCounterVec::new(
            Opts::new(
                "payout_requests_denied_total",
                "Total payout requests denied at authorization",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(denied_total.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "payout_transitions_total",
                "Total payout lifecycle transitions",
            ),
            &["to"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "payout_reservation_conflicts_total",
            "Total conditional payout writes lost to a concurrent writer",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let statements_total = IntCounter::new(
            "vendor_statements_total",
            "Total vendor statements recomputed",
        )?;
        registry.register(Box::new(statements_total.clone()))?;

        Ok(Self {
            authorized_total,
            denied_total,
            transitions_total,
            conflicts_total,
            statements_total,
            registry,
        })
    }

    /// Record a created payout
    pub fn record_authorized(&self) {
        self.authorized_total.inc();
    }

    /// Record a denial
    pub fn record_denied(&self, reason: DenialReason) {
        self.denied_total.with_label_values(&[reason.as_str()]).inc();
    }

    /// Record a lifecycle transition
    pub fn record_transition(&self, to: PayoutStatus) {
        self.transitions_total.with_label_values(&[to.as_str()]).inc();
    }

    /// Record a lost conditional write
    pub fn record_conflict(&self) {
        self.conflicts_total.inc();
    }

    /// Record a recomputed statement
    pub fn record_statement(&self) {
        self.statements_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of everything in the registry
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Other(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("authorized_total", &self.authorized_total.get())
            .field("conflicts_total", &self.conflicts_total.get())
            .field("statements_total", &self.statements_total.get())
            .finish_non_exhaustive()
    }
}
