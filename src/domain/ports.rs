use super::gateway::{ChargeRequest, ConfirmationEvent, ProviderRef};
use super::payment::{Identity, PaymentRecord, PaymentToken, Settlement, SettleOutcome};
use super::session::AccessSession;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Stores a new record. Fails if the token is already present.
    async fn insert(&self, record: PaymentRecord) -> Result<()>;
    async fn get(&self, token: &PaymentToken) -> Result<Option<PaymentRecord>>;
    /// Atomically applies `settlement` iff the record is still pending.
    async fn settle(
        &self,
        token: &PaymentToken,
        settlement: Settlement,
        at: DateTime<Utc>,
    ) -> Result<SettleOutcome>;
    /// Atomically marks a completed, not yet activated record as activated.
    /// Returns `false` when the record is missing, not completed or already claimed.
    async fn claim_activation(&self, token: &PaymentToken, at: DateTime<Utc>) -> Result<bool>;
    /// Clears a claim so a later confirmation can activate again.
    async fn release_activation(&self, token: &PaymentToken) -> Result<()>;
    /// Deletes every non-completed record created before `cutoff`.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentToken>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates or replaces the session for `session.identity`.
    async fn put(&self, session: AccessSession) -> Result<()>;
    async fn get(&self, identity: &Identity) -> Result<Option<AccessSession>>;
    /// Deletes the session only if it is still expired at `now`.
    async fn remove_if_expired(&self, identity: &Identity, now: DateTime<Utc>) -> Result<bool>;
    /// Deletes every session with `expires_at <= now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<Identity>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderRef>;
    /// Parses (and, where the provider supports it, authenticates) a webhook body.
    fn verify_webhook(&self, payload: &[u8]) -> Result<ConfirmationEvent>;
    async fn probe(&self) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type SessionStoreRef = Arc<dyn SessionStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
pub type ClockRef = Arc<dyn Clock>;
