#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use premium_gate::application::lifecycle::{LifecyclePolicy, PaymentLifecycleManager};
use premium_gate::application::sessions::AccessSessionManager;
use premium_gate::application::sweeper::{ReconciliationSweeper, SweeperConfig};
use premium_gate::domain::payment::Identity;
use premium_gate::domain::ports::{ClockRef, PaymentGatewayRef, SessionStore, SessionStoreRef};
use premium_gate::domain::session::AccessSession;
use premium_gate::error::{PaymentError, Result};
use premium_gate::infrastructure::clock::ManualClock;
use premium_gate::infrastructure::gateway::simulated::SimulatedGateway;
use premium_gate::infrastructure::in_memory::{InMemoryPaymentStore, InMemorySessionStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Session store that counts successful writes, used to prove exactly-once
/// activation. It can also be told to reject its next writes.
#[derive(Default, Clone)]
pub struct CountingSessionStore {
    inner: InMemorySessionStore,
    puts: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl CountingSessionStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_next_puts(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for CountingSessionStore {
    async fn put(&self, session: AccessSession) -> Result<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PaymentError::StoreError("transient".to_string()));
        }
        self.inner.put(session).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> Result<Option<AccessSession>> {
        self.inner.get(identity).await
    }

    async fn remove_if_expired(&self, identity: &Identity, now: DateTime<Utc>) -> Result<bool> {
        self.inner.remove_if_expired(identity, now).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<Identity>> {
        self.inner.purge_expired(now).await
    }
}

/// A fully wired service over in-memory stores and a manual clock.
pub struct Stack {
    pub lifecycle: Arc<PaymentLifecycleManager>,
    pub access: Arc<AccessSessionManager>,
    pub sweeper: ReconciliationSweeper,
    pub payments: InMemoryPaymentStore,
    pub sessions: CountingSessionStore,
    pub clock: ManualClock,
}

pub const SESSION_SECS: i64 = 15;
pub const RETENTION_HOURS: i64 = 2;

pub fn stack() -> Stack {
    stack_with(Arc::new(SimulatedGateway))
}

pub fn stack_with(gateway: PaymentGatewayRef) -> Stack {
    let payments = InMemoryPaymentStore::new();
    let sessions = CountingSessionStore::default();
    let clock = ManualClock::default();
    let clock_ref: ClockRef = Arc::new(clock.clone());
    let session_ref: SessionStoreRef = Arc::new(sessions.clone());

    let access = Arc::new(AccessSessionManager::new(
        session_ref.clone(),
        clock_ref.clone(),
    ));
    let lifecycle = Arc::new(PaymentLifecycleManager::new(
        Arc::new(payments.clone()),
        gateway.clone(),
        access.clone(),
        clock_ref.clone(),
        LifecyclePolicy {
            session_duration: chrono::Duration::seconds(SESSION_SECS),
            gateway_timeout: std::time::Duration::from_secs(2),
        },
    ));
    let sweeper = ReconciliationSweeper::new(
        Arc::new(payments.clone()),
        session_ref,
        gateway,
        clock_ref,
        SweeperConfig {
            interval: std::time::Duration::from_secs(10),
            retention: chrono::Duration::hours(RETENTION_HOURS),
            probe_gateway: true,
        },
    );

    Stack {
        lifecycle,
        access,
        sweeper,
        payments,
        sessions,
        clock,
    }
}

pub fn webhook(status: &str, reference: &str) -> Vec<u8> {
    serde_json::json!({ "status": status, "reference": reference })
        .to_string()
        .into_bytes()
}
