//! Payment gateway adapters.
//!
//! `E2PaymentsGateway` talks to the real provider over HTTP; `SimulatedGateway`
//! accepts every charge and is used when no API key is configured.

pub mod e2payments;
pub mod simulated;

use crate::domain::gateway::{ConfirmationEvent, ProviderStatus};
use crate::domain::payment::PaymentToken;
use crate::error::{PaymentError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    status: String,
    reference: String,
}

/// Parses the `{status, reference}` webhook body shared by the adapters.
pub(crate) fn parse_webhook_payload(payload: &[u8]) -> Result<ConfirmationEvent> {
    let body: WebhookPayload = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::ValidationError(format!("Malformed webhook payload: {}", e)))?;
    if body.reference.trim().is_empty() {
        return Err(PaymentError::ValidationError(
            "Webhook payload has an empty reference".to_string(),
        ));
    }
    Ok(ConfirmationEvent {
        token: PaymentToken::from(body.reference),
        status: ProviderStatus::parse(&body.status),
    })
}
