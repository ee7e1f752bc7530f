//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `vendors` - Vendor accounts (key: vendor_id)
//! - `transactions` - Captured transactions (key: vendor_id || 0x00 || transaction_id)
//! - `transaction_ids` - Dedup index (key: transaction_id)
//! - `payouts` - Payout requests (key: payout_id)
//! - `payout_index` - Vendor payouts (key: vendor_id || 0x00 || payout_id)
//! - `versions` - Per-vendor payout version (key: vendor_id, value: u64 BE)

use crate::{
    config::StoreConfig,
    error::{Error, Result},
    store::{PayoutLedger, Store},
    types::{PayoutRequest, Transaction, VendorAccount, VendorId},
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use uuid::Uuid;

const CF_VENDORS: &str = "vendors";
const CF_TRANSACTIONS: &str = "transactions";
const CF_TRANSACTION_IDS: &str = "transaction_ids";
const CF_PAYOUTS: &str = "payouts";
const CF_PAYOUT_INDEX: &str = "payout_index";
const CF_VERSIONS: &str = "versions";

/// RocksDB-backed [`Store`]
pub struct RocksStore {
    db: DB,
    // Serializes check-then-write sequences; reads go straight to the DB
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = [
            CF_VENDORS,
            CF_TRANSACTIONS,
            CF_TRANSACTION_IDS,
            CF_PAYOUTS,
            CF_PAYOUT_INDEX,
            CF_VERSIONS,
        ]
        .into_iter()
        .map(|name| {
            let mut opts = Options::default();
            opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            ColumnFamilyDescriptor::new(name, opts)
        })
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        tracing::info!("Opened RocksDB payout store at {:?}", path);

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn vendor_key(vendor_id: &VendorId, id: Option<Uuid>) -> Vec<u8> {
        let mut key = vendor_id.as_str().as_bytes().to_vec();
        key.push(0);
        if let Some(id) = id {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    fn scan_prefix(&self, cf: &ColumnFamily, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn version(&self, vendor_id: &VendorId) -> Result<u64> {
        let cf = self.cf_handle(CF_VERSIONS)?;
        match self.db.get_cf(cf, vendor_id.as_str().as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    Error::Storage(format!("Corrupt version for vendor {}", vendor_id))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn check_version(&self, vendor_id: &VendorId, expected: u64) -> Result<()> {
        let actual = self.version(vendor_id)?;
        if actual != expected {
            return Err(Error::ConcurrencyConflict {
                vendor_id: vendor_id.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn write_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64> {
        let cf_payouts = self.cf_handle(CF_PAYOUTS)?;
        let cf_index = self.cf_handle(CF_PAYOUT_INDEX)?;
        let cf_versions = self.cf_handle(CF_VERSIONS)?;
        let next_version = expected_version + 1;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_payouts, request.id.as_bytes(), bincode::serialize(request)?);
        batch.put_cf(
            cf_index,
            Self::vendor_key(&request.vendor_id, Some(request.id)),
            b"",
        );
        batch.put_cf(
            cf_versions,
            request.vendor_id.as_str().as_bytes(),
            next_version.to_be_bytes(),
        );
        self.db.write(batch)?;

        Ok(next_version)
    }
}

impl Store for RocksStore {
    fn vendor(&self, vendor_id: &VendorId) -> Result<VendorAccount> {
        let cf = self.cf_handle(CF_VENDORS)?;
        if let Some(value) = self.db.get_cf(cf, vendor_id.as_str().as_bytes())? {
            return Ok(bincode::deserialize(&value)?);
        }

        let prefix = Self::vendor_key(vendor_id, None);
        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_index = self.cf_handle(CF_PAYOUT_INDEX)?;
        if !self.scan_prefix(cf_tx, &prefix)?.is_empty()
            || !self.scan_prefix(cf_index, &prefix)?.is_empty()
        {
            return Err(Error::DataUnavailable(format!(
                "account record for vendor {} not loaded",
                vendor_id
            )));
        }

        Err(Error::VendorNotFound(vendor_id.to_string()))
    }

    fn upsert_vendor(&self, account: VendorAccount) -> Result<()> {
        let cf = self.cf_handle(CF_VENDORS)?;
        self.db.put_cf(
            cf,
            account.vendor_id.as_str().as_bytes(),
            bincode::serialize(&account)?,
        )?;
        Ok(())
    }

    fn vendor_ids(&self) -> Result<Vec<VendorId>> {
        let cf = self.cf_handle(CF_VENDORS)?;
        let mut ids = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            let id = String::from_utf8(key.to_vec())
                .map_err(|e| Error::Storage(format!("Corrupt vendor key: {}", e)))?;
            ids.push(VendorId::new(id));
        }
        Ok(ids)
    }

    fn record_transaction(&self, transaction: Transaction) -> Result<bool> {
        transaction.validate()?;
        let _guard = self.write_lock.lock();
        let cf_ids = self.cf_handle(CF_TRANSACTION_IDS)?;
        if self.db.get_cf(cf_ids, transaction.id.as_bytes())?.is_some() {
            return Ok(false);
        }

        let cf_tx = self.cf_handle(CF_TRANSACTIONS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf_ids, transaction.id.as_bytes(), b"");
        batch.put_cf(
            cf_tx,
            Self::vendor_key(&transaction.vendor_id, Some(transaction.id)),
            bincode::serialize(&transaction)?,
        );
        self.db.write(batch)?;
        Ok(true)
    }

    fn transactions(&self, vendor_id: &VendorId) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        self.scan_prefix(cf, &Self::vendor_key(vendor_id, None))?
            .into_iter()
            .map(|(_, value)| Ok(bincode::deserialize(&value)?))
            .collect()
    }

    fn payout_ledger(&self, vendor_id: &VendorId) -> Result<PayoutLedger> {
        // Hold the write lock so the version matches the rows we return
        let _guard = self.write_lock.lock();
        let version = self.version(vendor_id)?;
        let cf_index = self.cf_handle(CF_PAYOUT_INDEX)?;

        let mut requests = Vec::new();
        for (key, _) in self.scan_prefix(cf_index, &Self::vendor_key(vendor_id, None))? {
            let raw: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Corrupt payout index key".to_string()))?;
            requests.push(self.payout(Uuid::from_bytes(raw))?);
        }
        requests.sort_by_key(|r| (r.requested_at, r.id));

        Ok(PayoutLedger { version, requests })
    }

    fn payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let cf = self.cf_handle(CF_PAYOUTS)?;
        let value = self
            .db
            .get_cf(cf, payout_id.as_bytes())?
            .ok_or_else(|| Error::PayoutNotFound(payout_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    fn insert_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64> {
        let _guard = self.write_lock.lock();
        self.check_version(&request.vendor_id, expected_version)?;

        let cf = self.cf_handle(CF_PAYOUTS)?;
        if self.db.get_cf(cf, request.id.as_bytes())?.is_some() {
            return Err(Error::Storage(format!("Payout {} already exists", request.id)));
        }

        self.write_payout(request, expected_version)
    }

    fn update_payout(&self, request: &PayoutRequest, expected_version: u64) -> Result<u64> {
        let _guard = self.write_lock.lock();
        self.check_version(&request.vendor_id, expected_version)?;

        let existing = self.payout(request.id)?;
        if existing.vendor_id != request.vendor_id {
            return Err(Error::PayoutNotFound(request.id.to_string()));
        }

        self.write_payout(request, expected_version)
    }
}
