use super::sessions::AccessSessionManager;
use crate::domain::gateway::{ChargeRequest, ConfirmationEvent, ProviderRef, ProviderStatus};
use crate::domain::payment::{
    Amount, Identity, PaymentRecord, PaymentStatus, PaymentToken, Settlement, SettleOutcome,
};
use crate::domain::ports::{ClockRef, PaymentGatewayRef, PaymentStoreRef};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Tunables for the payment lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    /// Length of the access window granted by a completed payment.
    pub session_duration: Duration,
    /// Upper bound on a single gateway charge call.
    pub gateway_timeout: std::time::Duration,
}

/// Returned by [`PaymentLifecycleManager::initiate`].
#[derive(Debug, Clone, PartialEq)]
pub struct InitiatedPayment {
    pub token: PaymentToken,
    pub status: PaymentStatus,
    pub provider_ref: ProviderRef,
}

/// What a confirmation signal did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationResult {
    /// The payment completed and access was granted.
    Activated {
        identity: Identity,
        expires_at: DateTime<Utc>,
    },
    /// The payment was marked failed.
    Rejected { reason: String },
    /// The payment was already terminal; the signal was a duplicate.
    AlreadyProcessed { status: PaymentStatus },
    /// The provider reported a non-final status; nothing changed.
    StillPending,
}

/// Orchestrates token creation, gateway charges and confirmation handling.
///
/// The stored payment record is the single source of truth for "already
/// processed": the store's atomic settle decides the terminal status, and a
/// second atomic claim on the record decides which caller grants the session.
pub struct PaymentLifecycleManager {
    payments: PaymentStoreRef,
    gateway: PaymentGatewayRef,
    sessions: Arc<AccessSessionManager>,
    clock: ClockRef,
    policy: LifecyclePolicy,
}

impl PaymentLifecycleManager {
    pub fn new(
        payments: PaymentStoreRef,
        gateway: PaymentGatewayRef,
        sessions: Arc<AccessSessionManager>,
        clock: ClockRef,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            payments,
            gateway,
            sessions,
            clock,
            policy,
        }
    }

    /// Records a pending payment and asks the gateway to start the charge.
    ///
    /// Nothing is written when validation fails. A gateway error or timeout
    /// marks the record `failed` and is returned as `GatewayError`.
    pub async fn initiate(
        &self,
        identity: &str,
        amount: Decimal,
        method: &str,
    ) -> Result<InitiatedPayment> {
        let identity = Identity::parse(identity)?;
        let amount = Amount::new(amount)?;
        let method = method.trim();
        if method.is_empty() {
            return Err(PaymentError::ValidationError(
                "Payment method is required".to_string(),
            ));
        }

        let token = PaymentToken::generate();
        let record = PaymentRecord::pending(
            token.clone(),
            identity.clone(),
            amount,
            method.to_string(),
            self.clock.now(),
        );
        self.payments.insert(record).await?;
        tracing::info!(%token, %identity, %amount, method, "payment initiated");

        let request = ChargeRequest {
            token: token.clone(),
            identity,
            amount,
            method: method.to_string(),
        };
        let charge = tokio::time::timeout(self.policy.gateway_timeout, self.gateway.charge(&request))
            .await
            .unwrap_or_else(|_| {
                Err(PaymentError::GatewayError(format!(
                    "gateway did not answer within {:?}",
                    self.policy.gateway_timeout
                )))
            });

        match charge {
            Ok(provider_ref) => Ok(InitiatedPayment {
                token,
                status: PaymentStatus::Pending,
                provider_ref,
            }),
            Err(err) => {
                let reason = match &err {
                    PaymentError::GatewayError(reason) => reason.clone(),
                    other => other.to_string(),
                };
                tracing::warn!(%token, reason = %reason, "gateway charge failed");
                let settlement = Settlement::Failed {
                    reason: reason.clone(),
                };
                if let Err(store_err) = self
                    .payments
                    .settle(&token, settlement, self.clock.now())
                    .await
                {
                    tracing::error!(%token, error = %store_err, "could not mark payment failed");
                }
                Err(PaymentError::GatewayError(reason))
            }
        }
    }

    /// Applies a provider confirmation to the payment behind `token`.
    ///
    /// Idempotent: replays of a confirmation for a terminal payment are
    /// no-ops reporting the existing status. A completed payment whose
    /// activation failed is activated by the next confirmation.
    pub async fn confirm(
        &self,
        token: &PaymentToken,
        provider_status: &ProviderStatus,
    ) -> Result<ActivationResult> {
        let Some(settlement) = provider_status.settlement() else {
            let record = self.status_of(token).await?;
            tracing::debug!(%token, ?provider_status, "non-final provider status ignored");
            return Ok(if record.status.is_terminal() {
                ActivationResult::AlreadyProcessed {
                    status: record.status,
                }
            } else {
                ActivationResult::StillPending
            });
        };

        let completes = settlement == Settlement::Completed;
        let now = self.clock.now();
        match self.payments.settle(token, settlement, now).await? {
            SettleOutcome::Unknown => Err(PaymentError::NotFound(format!("payment {token}"))),
            SettleOutcome::Applied(record) if record.status == PaymentStatus::Completed => {
                self.activate_once(record).await
            }
            SettleOutcome::Applied(record) => {
                let reason = record.failure_reason.unwrap_or_default();
                tracing::info!(%token, reason = %reason, "payment failed");
                Ok(ActivationResult::Rejected { reason })
            }
            SettleOutcome::AlreadySettled(record) if completes && record.awaits_activation() => {
                tracing::info!(%token, "retrying activation for completed payment");
                self.activate_once(record).await
            }
            SettleOutcome::AlreadySettled(record) => {
                tracing::info!(%token, status = %record.status, "duplicate confirmation ignored");
                Ok(ActivationResult::AlreadyProcessed {
                    status: record.status,
                })
            }
        }
    }

    /// Grants the session for a completed payment unless another caller
    /// already holds the activation claim. A failed session write releases
    /// the claim so the next confirmation can try again.
    async fn activate_once(&self, record: PaymentRecord) -> Result<ActivationResult> {
        let token = &record.token;
        if !self.payments.claim_activation(token, self.clock.now()).await? {
            tracing::info!(%token, "duplicate confirmation ignored");
            return Ok(ActivationResult::AlreadyProcessed {
                status: record.status,
            });
        }

        let activated = self
            .sessions
            .activate(
                &record.identity,
                Some(record.amount),
                &record.method,
                self.policy.session_duration,
            )
            .await;
        match activated {
            Ok(expires_at) => Ok(ActivationResult::Activated {
                identity: record.identity,
                expires_at,
            }),
            Err(err) => {
                tracing::error!(
                    %token,
                    identity = %record.identity,
                    error = %err,
                    "payment completed but session activation failed"
                );
                if let Err(release_err) = self.payments.release_activation(token).await {
                    tracing::error!(%token, error = %release_err, "could not release activation claim");
                }
                Err(err)
            }
        }
    }

    /// Parses a raw webhook body into a confirmation via the gateway adapter.
    pub fn parse_confirmation(&self, payload: &[u8]) -> Result<ConfirmationEvent> {
        self.gateway.verify_webhook(payload)
    }

    /// Read-only lookup of a payment.
    pub async fn status_of(&self, token: &PaymentToken) -> Result<PaymentRecord> {
        self.payments
            .get(token)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payment {token}")))
    }
}
