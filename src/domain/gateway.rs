use super::payment::{Amount, Identity, PaymentToken, Settlement};
use serde::{Deserialize, Serialize};

/// What the gateway needs to start a charge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub token: PaymentToken,
    pub identity: Identity,
    pub amount: Amount,
    pub method: String,
}

/// The provider's own reference for an accepted charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRef(pub String);

/// Status reported by the provider for a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Succeeded,
    Failed(String),
    /// Anything the provider reports that is not final yet (`processing`, ...).
    InProgress(String),
}

impl ProviderStatus {
    /// Maps a provider status string onto the lifecycle.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "completed" | "success" | "successful" | "succeeded" | "paid" => {
                ProviderStatus::Succeeded
            }
            "failed" | "failure" | "cancelled" | "canceled" | "rejected" | "declined"
            | "expired" => ProviderStatus::Failed(normalized),
            _ => ProviderStatus::InProgress(normalized),
        }
    }

    /// The terminal outcome this status implies, if any.
    pub fn settlement(&self) -> Option<Settlement> {
        match self {
            ProviderStatus::Succeeded => Some(Settlement::Completed),
            ProviderStatus::Failed(status) => Some(Settlement::Failed {
                reason: format!("provider reported {status}"),
            }),
            ProviderStatus::InProgress(_) => None,
        }
    }
}

/// A confirmation signal extracted from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationEvent {
    pub token: PaymentToken,
    pub status: ProviderStatus,
}
