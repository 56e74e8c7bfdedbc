use super::parse_webhook_payload;
use crate::domain::gateway::{ChargeRequest, ConfirmationEvent, ProviderRef};
use crate::domain::ports::PaymentGateway;
use crate::error::Result;
use async_trait::async_trait;

/// Gateway used when no provider credentials are configured.
///
/// Every charge is accepted; confirmation still has to arrive through the
/// webhook (or the debug session route), exactly as with a real provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderRef> {
        tracing::info!(
            token = %request.token,
            identity = %request.identity,
            amount = %request.amount,
            "simulated charge accepted"
        );
        Ok(ProviderRef(format!("sim-{}", request.token)))
    }

    fn verify_webhook(&self, payload: &[u8]) -> Result<ConfirmationEvent> {
        parse_webhook_payload(payload)
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}
