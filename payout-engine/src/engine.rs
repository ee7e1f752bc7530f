//! Payout engine wiring
//!
//! Builds the store, settlement scheduler, balance ledger and payout manager
//! from one [`Config`].

use crate::{
    balance::{BalanceLedger, VendorStatement},
    clock::{Clock, SystemClock},
    config::Config,
    metrics::Metrics,
    payouts::PayoutRequestManager,
    Result,
};
use ledger_core::Store;
use settlement::SettlementScheduler;
use std::sync::Arc;
use tracing::info;

/// Payout engine
#[derive(Debug)]
pub struct PayoutEngine {
    config: Config,
    ledger: Arc<BalanceLedger>,
    payouts: PayoutRequestManager,
    metrics: Metrics,
}

impl PayoutEngine {
    /// Open the configured store and run on the wall clock
    pub fn open(config: Config) -> Result<Self> {
        let store = ledger_core::open_store(&config.store)?;
        Self::new(config, store, Arc::new(SystemClock))
    }

    /// Engine over an existing store and clock
    pub fn new(config: Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let calendar = config.settlement.load_calendar()?;
        let scheduler = Arc::new(SettlementScheduler::new(calendar));
        let ledger = Arc::new(BalanceLedger::new(
            store,
            scheduler,
            config.settlement.default_fees.clone(),
            clock,
        )?);
        let metrics = Metrics::new()?;
        let payouts = PayoutRequestManager::new(
            ledger.clone(),
            metrics.clone(),
            config.payouts.max_reservation_retries,
        );

        info!(
            service = %config.service_name,
            backend = ?config.store.backend,
            holidays = ledger.scheduler().calendar().holidays().count(),
            "Payout engine ready"
        );

        Ok(Self {
            config,
            ledger,
            payouts,
            metrics,
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Balance ledger
    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Payout request manager
    pub fn payouts(&self) -> &PayoutRequestManager {
        &self.payouts
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Re-read the holiday sources and swap the calendar in
    pub fn reload_calendar(&self) -> Result<()> {
        let calendar = self.config.settlement.load_calendar()?;
        self.ledger.scheduler().reload_calendar(calendar);
        Ok(())
    }

    /// Statements for every vendor with an account record
    pub fn statements(&self) -> Result<Vec<VendorStatement>> {
        self.ledger
            .store()
            .vendor_ids()?
            .iter()
            .map(|vendor_id| {
                let statement = self.ledger.statement(vendor_id)?;
                self.metrics.record_statement();
                Ok(statement)
            })
            .collect()
    }
}
