use crate::domain::payment::{Identity, PaymentRecord, PaymentToken, Settlement, SettleOutcome};
use crate::domain::ports::{PaymentStore, SessionStore};
use crate::domain::session::AccessSession;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing access sessions.
pub const CF_SESSIONS: &str = "sessions";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for both `PaymentRecord` and `AccessSession` entities using
/// separate Column Families, JSON-encoded.
///
/// Read-modify-write sequences (settle, conditional deletes, purges) run under
/// `write_guard` so that each per-record transition is atomic with respect to
/// other writers in this process. Plain reads never take the guard.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("payments" and "sessions") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_sessions = ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_sessions])?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, encode(value)?)?;
        Ok(())
    }

    fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StoreError(format!("{name} column family not found")))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| PaymentError::StoreError(format!("Serialization error: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PaymentError::StoreError(format!("Deserialization error: {}", e)))
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let key = record.token.as_str().as_bytes();
        if self.read::<PaymentRecord>(CF_PAYMENTS, key)?.is_some() {
            return Err(PaymentError::StoreError(format!(
                "payment {} already exists",
                record.token
            )));
        }
        self.write(CF_PAYMENTS, key, &record)
    }

    async fn get(&self, token: &PaymentToken) -> Result<Option<PaymentRecord>> {
        self.read(CF_PAYMENTS, token.as_str().as_bytes())
    }

    async fn settle(
        &self,
        token: &PaymentToken,
        settlement: Settlement,
        at: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let _guard = self.write_guard.lock().await;
        let key = token.as_str().as_bytes();
        let Some(mut record) = self.read::<PaymentRecord>(CF_PAYMENTS, key)? else {
            return Ok(SettleOutcome::Unknown);
        };
        if !record.settle(settlement, at) {
            return Ok(SettleOutcome::AlreadySettled(record));
        }
        self.write(CF_PAYMENTS, key, &record)?;
        Ok(SettleOutcome::Applied(record))
    }

    async fn claim_activation(&self, token: &PaymentToken, at: DateTime<Utc>) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        let key = token.as_str().as_bytes();
        let Some(mut record) = self.read::<PaymentRecord>(CF_PAYMENTS, key)? else {
            return Ok(false);
        };
        if !record.claim_activation(at) {
            return Ok(false);
        }
        self.write(CF_PAYMENTS, key, &record)?;
        Ok(true)
    }

    async fn release_activation(&self, token: &PaymentToken) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        let key = token.as_str().as_bytes();
        if let Some(mut record) = self.read::<PaymentRecord>(CF_PAYMENTS, key)? {
            record.release_activation();
            self.write(CF_PAYMENTS, key, &record)?;
        }
        Ok(())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentToken>> {
        let _guard = self.write_guard.lock().await;
        let mut purged = Vec::new();
        for record in self.scan::<PaymentRecord>(CF_PAYMENTS)? {
            if record.is_stale(cutoff) {
                self.delete(CF_PAYMENTS, record.token.as_str().as_bytes())?;
                purged.push(record.token);
            }
        }
        Ok(purged)
    }
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn put(&self, session: AccessSession) -> Result<()> {
        let _guard = self.write_guard.lock().await;
        self.write(CF_SESSIONS, session.identity.as_str().as_bytes(), &session)
    }

    async fn get(&self, identity: &Identity) -> Result<Option<AccessSession>> {
        self.read(CF_SESSIONS, identity.as_str().as_bytes())
    }

    async fn remove_if_expired(&self, identity: &Identity, now: DateTime<Utc>) -> Result<bool> {
        let _guard = self.write_guard.lock().await;
        let key = identity.as_str().as_bytes();
        match self.read::<AccessSession>(CF_SESSIONS, key)? {
            Some(session) if !session.is_active(now) => {
                self.delete(CF_SESSIONS, key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<Identity>> {
        let _guard = self.write_guard.lock().await;
        let mut purged = Vec::new();
        for session in self.scan::<AccessSession>(CF_SESSIONS)? {
            if !session.is_active(now) {
                self.delete(CF_SESSIONS, session.identity.as_str().as_bytes())?;
                purged.push(session.identity);
            }
        }
        Ok(purged)
    }
}
