use crate::domain::payment::{Amount, Identity};
use crate::domain::ports::{ClockRef, SessionStoreRef};
use crate::domain::session::{AccessSession, AccessStatus};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};

/// Creates, looks up and expires access grants.
///
/// One session per identity: activating again replaces the previous grant, so
/// durations never stack. Expired sessions are removed lazily by `check` and
/// eagerly by the sweeper.
pub struct AccessSessionManager {
    sessions: SessionStoreRef,
    clock: ClockRef,
}

impl AccessSessionManager {
    pub fn new(sessions: SessionStoreRef, clock: ClockRef) -> Self {
        Self { sessions, clock }
    }

    /// Grants access to `identity` until `now + duration`. Last activation wins.
    pub async fn activate(
        &self,
        identity: &Identity,
        amount: Option<Amount>,
        method: &str,
        duration: Duration,
    ) -> Result<DateTime<Utc>> {
        if duration <= Duration::zero() {
            return Err(PaymentError::ValidationError(
                "Session duration must be positive".to_string(),
            ));
        }

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(duration).ok_or_else(|| {
            PaymentError::ValidationError("Session duration is out of range".to_string())
        })?;
        self.sessions
            .put(AccessSession {
                identity: identity.clone(),
                expires_at,
                activated_at: now,
                payment_method: method.to_string(),
                amount,
            })
            .await?;

        tracing::info!(%identity, %expires_at, method, "access session activated");
        Ok(expires_at)
    }

    /// Reports whether `identity` currently has access.
    ///
    /// An expired session found here is deleted before answering.
    pub async fn check(&self, identity: &Identity) -> Result<AccessStatus> {
        let now = self.clock.now();
        let Some(session) = self.sessions.get(identity).await? else {
            return Ok(AccessStatus::DENIED);
        };

        match session.remaining_seconds(now) {
            Some(remaining) => Ok(AccessStatus::granted(remaining)),
            None => {
                if self.sessions.remove_if_expired(identity, now).await? {
                    tracing::debug!(%identity, "expired session removed on lookup");
                }
                Ok(AccessStatus::DENIED)
            }
        }
    }
}
