//! Request and response bodies for the HTTP API.
//!
//! All bodies are camelCase JSON. `userNumber` is accepted wherever an
//! identity is expected, for clients of the original check-user API.

use crate::domain::payment::{PaymentStatus, PaymentToken};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Requests

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPaymentRequest {
    #[serde(default, alias = "userNumber")]
    pub identity: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCheckQuery {
    #[serde(default)]
    pub identity: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserRequest {
    #[serde(default)]
    pub user_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionRequest {
    #[serde(alias = "userNumber")]
    pub identity: String,
    #[serde(default)]
    pub seconds: Option<i64>,
}

// Responses

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPaymentResponse {
    pub token: PaymentToken,
    pub status: PaymentStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
    pub identity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotFoundResponse {
    pub status: &'static str,
}

impl NotFoundResponse {
    pub const PAYMENT: Self = Self {
        status: "not_found",
    };
}

/// Body of the legacy `POST /api/check-user` route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserResponse {
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionResponse {
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Standard error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
