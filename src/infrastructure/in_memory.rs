use crate::domain::payment::{Identity, PaymentRecord, PaymentToken, Settlement, SettleOutcome};
use crate::domain::ports::{PaymentStore, SessionStore};
use crate::domain::session::AccessSession;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for payment records.
///
/// Uses `Arc<RwLock<HashMap<PaymentToken, PaymentRecord>>>` for shared concurrent access.
/// The settle transition runs entirely under the write lock, which makes it the
/// compare-and-set point for concurrent confirmations of the same token.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentToken, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record.
    pub async fn records(&self) -> Vec<PaymentRecord> {
        self.payments.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: PaymentRecord) -> Result<()> {
        let mut payments = self.payments.write().await;
        match payments.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(PaymentError::StoreError(format!(
                "payment {} already exists",
                record.token
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, token: &PaymentToken) -> Result<Option<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.get(token).cloned())
    }

    async fn settle(
        &self,
        token: &PaymentToken,
        settlement: Settlement,
        at: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let mut payments = self.payments.write().await;
        let Some(record) = payments.get_mut(token) else {
            return Ok(SettleOutcome::Unknown);
        };
        if record.settle(settlement, at) {
            Ok(SettleOutcome::Applied(record.clone()))
        } else {
            Ok(SettleOutcome::AlreadySettled(record.clone()))
        }
    }

    async fn claim_activation(&self, token: &PaymentToken, at: DateTime<Utc>) -> Result<bool> {
        let mut payments = self.payments.write().await;
        Ok(payments
            .get_mut(token)
            .is_some_and(|record| record.claim_activation(at)))
    }

    async fn release_activation(&self, token: &PaymentToken) -> Result<()> {
        let mut payments = self.payments.write().await;
        if let Some(record) = payments.get_mut(token) {
            record.release_activation();
        }
        Ok(())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentToken>> {
        let mut payments = self.payments.write().await;
        let stale: Vec<PaymentToken> = payments
            .values()
            .filter(|record| record.is_stale(cutoff))
            .map(|record| record.token.clone())
            .collect();
        for token in &stale {
            payments.remove(token);
        }
        Ok(stale)
    }
}

/// A thread-safe in-memory store for access sessions, one per identity.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Identity, AccessSession>>>,
}

impl InMemorySessionStore {
    /// Creates a new, empty in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: AccessSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.identity.clone(), session);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> Result<Option<AccessSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(identity).cloned())
    }

    async fn remove_if_expired(&self, identity: &Identity, now: DateTime<Utc>) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(identity) {
            Some(session) if !session.is_active(now) => {
                sessions.remove(identity);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<Identity>> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Identity> = sessions
            .values()
            .filter(|session| !session.is_active(now))
            .map(|session| session.identity.clone())
            .collect();
        for identity in &expired {
            sessions.remove(identity);
        }
        Ok(expired)
    }
}
