//! Persistence contract for vendor accounts, transactions and payouts
//!
//! The engine only depends on the [`Store`] trait. Every vendor carries a
//! payout `version` that increments on each payout write; `insert_payout` and
//! `update_payout` are conditional on the version the caller observed, which
//! makes "reserve only if the balance I read is still current" expressible
//! against any backend.

use crate::config::{StoreBackend, StoreConfig};
use crate::types::{PayoutRequest, Transaction, VendorAccount, VendorId};
use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A vendor's payout requests together with the version they were read at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayoutLedger {
    /// Version observed by this read
    pub version: u64,

    /// All payout requests for the vendor, oldest first
    pub requests: Vec<PayoutRequest>,
}

/// Storage backend for the engine
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Vendor account record
    fn vendor(&self, vendor_id: &VendorId) -> Result<VendorAccount>;

    /// Insert or replace a vendor account
    fn upsert_vendor(&self, account: VendorAccount) -> Result<()>;

    /// All vendors with an account record
    fn vendor_ids(&self) -> Result<Vec<VendorId>>;

    /// Record a captured transaction; returns `false` if the ID was already seen
    fn record_transaction(&self, transaction: Transaction) -> Result<bool>;

    /// All transactions captured for a vendor
    fn transactions(&self, vendor_id: &VendorId) -> Result<Vec<Transaction>>;

    /// Atomic read of a vendor's payouts and payout version
    fn payout_ledger(&self, vendor_id: &VendorId) -> Result<PayoutLedger>;

    /// Payout request by ID
    fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest>;

    /// Insert a new payout if the vendor's version still equals `expected_version`
    ///
    /// Returns the new version.
    fn insert_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64>;

    /// Replace an existing payout if the vendor's version still equals `expected_version`
    ///
    /// Returns the new version.
    fn update_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64>;
}

/// Open the backend selected by `config`
pub fn open(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "rocksdb")]
        StoreBackend::Rocksdb => Ok(Arc::new(crate::storage::RocksStore::open(config)?)),
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::Rocksdb => Err(Error::Config(
            "rocksdb backend requested but the `rocksdb` feature is disabled".to_string(),
        )),
    }
}

/// Serializable dump of a store, used for reconciliation runs and fixtures
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Vendor accounts
    #[serde(default)]
    pub vendors: Vec<VendorAccount>,

    /// Captured transactions
    #[serde(default)]
    pub transactions: Vec<Transaction>,

    /// Payout requests
    #[serde(default)]
    pub payouts: Vec<PayoutRequest>,
}

impl LedgerSnapshot {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }
}

#[derive(Debug, Default)]
struct Inner {
    vendors: HashMap<VendorId, VendorAccount>,
    transactions: HashMap<VendorId, Vec<Transaction>>,
    transaction_ids: HashSet<Uuid>,
    payouts: HashMap<VendorId, Vec<PayoutRequest>>,
    payout_index: HashMap<Uuid, VendorId>,
    versions: HashMap<VendorId, u64>,
}

impl Inner {
    fn version(&self, vendor_id: &VendorId) -> u64 {
        self.versions.get(vendor_id).copied().unwrap_or(0)
    }

    fn check_version(&self, vendor_id: &VendorId, expected: u64) -> Result<()> {
        let actual = self.version(vendor_id);
        if actual != expected {
            return Err(Error::ConcurrencyConflict {
                vendor_id: vendor_id.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn bump(&mut self, vendor_id: &VendorId) -> u64 {
        let version = self.versions.entry(vendor_id.clone()).or_insert(0);
        *version += 1;
        *version
    }
}

/// In-process store backed by hash maps behind a single lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot
    ///
    /// Duplicate transaction IDs are collapsed; duplicate payout IDs are rejected.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        let store = Self::new();
        for account in snapshot.vendors {
            store.upsert_vendor(account)?;
        }
        for transaction in snapshot.transactions {
            store.record_transaction(transaction)?;
        }
        for request in snapshot.payouts {
            let version = store.inner.read().version(&request.vendor_id);
            store.insert_payout(&request, version)?;
        }
        Ok(store)
    }

    /// Dump current contents
    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.read();
        let mut vendors: Vec<VendorAccount> = inner.vendors.values().cloned().collect();
        vendors.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));

        let mut transactions: Vec<Transaction> =
            inner.transactions.values().flatten().cloned().collect();
        transactions.sort_by_key(|t| (t.captured_at, t.id));

        let mut payouts: Vec<PayoutRequest> = inner.payouts.values().flatten().cloned().collect();
        payouts.sort_by_key(|p| (p.requested_at, p.id));

        LedgerSnapshot {
            vendors,
            transactions,
            payouts,
        }
    }
}

impl Store for MemoryStore {
    fn vendor(&self, vendor_id: &VendorId) -> Result<VendorAccount> {
        let inner = self.inner.read();
        if let Some(account) = inner.vendors.get(vendor_id) {
            return Ok(account.clone());
        }

        // Activity without an account record means the account store has not
        // delivered yet, which is different from an unknown vendor.
        if inner.transactions.contains_key(vendor_id) || inner.payouts.contains_key(vendor_id) {
            return Err(Error::DataUnavailable(format!(
                "account record for vendor {} not loaded",
                vendor_id
            )));
        }

        Err(Error::VendorNotFound(vendor_id.to_string()))
    }

    fn upsert_vendor(&self, account: VendorAccount) -> Result<()> {
        let mut inner = self.inner.write();
        tracing::debug!(vendor_id = %account.vendor_id, "Vendor account stored");
        inner.vendors.insert(account.vendor_id.clone(), account);
        Ok(())
    }

    fn vendor_ids(&self) -> Result<Vec<VendorId>> {
        let inner = self.inner.read();
        let mut ids: Vec<VendorId> = inner.vendors.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn record_transaction(&self, transaction: Transaction) -> Result<bool> {
        transaction.validate()?;
        let mut inner = self.inner.write();
        if !inner.transaction_ids.insert(transaction.id) {
            tracing::debug!(transaction_id = %transaction.id, "Duplicate capture ignored");
            return Ok(false);
        }
        inner
            .transactions
            .entry(transaction.vendor_id.clone())
            .or_default()
            .push(transaction);
        Ok(true)
    }

    fn transactions(&self, vendor_id: &VendorId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read();
        Ok(inner.transactions.get(vendor_id).cloned().unwrap_or_default())
    }

    fn payout_ledger(&self, vendor_id: &VendorId) -> Result<PayoutLedger> {
        let inner = self.inner.read();
        Ok(PayoutLedger {
            version: inner.version(vendor_id),
            requests: inner.payouts.get(vendor_id).cloned().unwrap_or_default(),
        })
    }

    fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let inner = self.inner.read();
        inner
            .payout_index
            .get(&payout_id)
            .and_then(|vendor_id| inner.payouts.get(vendor_id))
            .and_then(|requests| requests.iter().find(|r| r.id == payout_id))
            .cloned()
            .ok_or_else(|| Error::PayoutNotFound(payout_id.to_string()))
    }

    fn insert_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64> {
        let mut inner = self.inner.write();
        inner.check_version(&request.vendor_id, expected_version)?;

        if inner.payout_index.contains_key(&request.id) {
            return Err(Error::Storage(format!(
                "Payout {} already exists",
                request.id
            )));
        }

        inner
            .payout_index
            .insert(request.id, request.vendor_id.clone());
        inner
            .payouts
            .entry(request.vendor_id.clone())
            .or_default()
            .push(request.clone());

        Ok(inner.bump(&request.vendor_id))
    }

    fn update_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64> {
        let mut inner = self.inner.write();
        inner.check_version(&request.vendor_id, expected_version)?;

        let slot = inner
            .payouts
            .get_mut(&request.vendor_id)
            .and_then(|requests| requests.iter_mut().find(|r| r.id == request.id))
            .ok_or_else(|| Error::PayoutNotFound(request.id.to_string()))?;
        *slot = request.clone();

        Ok(inner.bump(&request.vendor_id))
    }
}
