use super::parse_webhook_payload;
use crate::domain::gateway::{ChargeRequest, ConfirmationEvent, ProviderRef};
use crate::domain::payment::PaymentToken;
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const C2B_PAYMENT_PATH: &str = "/payments/c2b";
const TEST_PATH: &str = "/test";

/// Connection settings for the e2Payments API.
#[derive(Debug, Clone)]
pub struct E2PaymentsConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct C2bPaymentBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: rust_decimal::Decimal,
    phone_number: &'a str,
    payment_method: &'a str,
    /// Echoed back by the provider as the webhook `reference`.
    reference: &'a str,
}

/// Customer-to-business charges against the e2Payments HTTP API.
pub struct E2PaymentsGateway {
    config: E2PaymentsConfig,
    http_client: reqwest::Client,
}

impl E2PaymentsGateway {
    pub fn new(config: E2PaymentsConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// The provider's own id is informational; correlation uses our token, which
/// also stands in when the response carries no id.
fn provider_ref(data: &serde_json::Value, token: &PaymentToken) -> ProviderRef {
    let id = ["id", "transactionId", "reference"]
        .iter()
        .find_map(|key| data.get(*key).and_then(|v| v.as_str()))
        .unwrap_or(token.as_str());
    ProviderRef(id.to_string())
}

#[async_trait]
impl PaymentGateway for E2PaymentsGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderRef> {
        let body = C2bPaymentBody {
            amount: request.amount.value(),
            phone_number: request.identity.as_str(),
            payment_method: &request.method,
            reference: request.token.as_str(),
        };

        let response = self
            .http_client
            .post(self.url(C2B_PAYMENT_PATH))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, error = %error_text, "e2Payments charge rejected");
            return Err(PaymentError::GatewayError(format!(
                "e2Payments returned {}: {}",
                status, error_text
            )));
        }

        let data = match response.json::<serde_json::Value>().await {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(
                    token = %request.token,
                    error = %e,
                    "e2Payments accepted the charge but its response body did not decode"
                );
                serde_json::Value::Null
            }
        };
        Ok(provider_ref(&data, &request.token))
    }

    fn verify_webhook(&self, payload: &[u8]) -> Result<ConfirmationEvent> {
        // TODO: verify the provider signature header once e2Payments documents its scheme.
        parse_webhook_payload(payload)
    }

    async fn probe(&self) -> Result<()> {
        let response = self
            .http_client
            .post(self.url(TEST_PATH))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaymentError::GatewayError(format!(
                "connectivity probe returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, Identity};
    use rust_decimal_macros::dec;

    fn gateway(base_url: &str) -> E2PaymentsGateway {
        E2PaymentsGateway::new(E2PaymentsConfig {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let gateway = gateway("http://localhost:8000/v1/");
        assert_eq!(
            gateway.url(C2B_PAYMENT_PATH),
            "http://localhost:8000/v1/payments/c2b"
        );
    }

    #[test]
    fn test_charge_body_uses_provider_field_names() {
        let body = C2bPaymentBody {
            amount: dec!(50.00),
            phone_number: "2550001",
            payment_method: "mpesa",
            reference: "tok",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 50.0);
        assert_eq!(json["phoneNumber"], "2550001");
        assert_eq!(json["paymentMethod"], "mpesa");
        assert_eq!(json["reference"], "tok");
    }

    #[test]
    fn test_provider_ref_falls_back_to_token() {
        let token = PaymentToken::from("tok-1");
        assert_eq!(
            provider_ref(&serde_json::json!({"transactionId": "tx-9"}), &token),
            ProviderRef("tx-9".to_string())
        );
        assert_eq!(
            provider_ref(&serde_json::json!({"id": 42}), &token),
            ProviderRef("tok-1".to_string())
        );
        assert_eq!(
            provider_ref(&serde_json::Value::Null, &token),
            ProviderRef("tok-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_gateway_error() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let gateway = gateway("http://127.0.0.1:9");
        let request = ChargeRequest {
            token: PaymentToken::generate(),
            identity: Identity::parse("2550001").unwrap(),
            amount: Amount::new(dec!(50.00)).unwrap(),
            method: "mpesa".to_string(),
        };

        let result = gateway.charge(&request).await;
        assert!(matches!(result, Err(PaymentError::GatewayError(_))));
        assert!(matches!(
            gateway.probe().await,
            Err(PaymentError::GatewayError(_))
        ));
    }
}
