//! HTTP handlers. Each one is a thin translation between JSON and the
//! application managers.

use super::dto::{
    CheckUserRequest, CheckUserResponse, ErrorResponse, ExtendSessionRequest,
    ExtendSessionResponse, HealthResponse, InitPaymentRequest, InitPaymentResponse,
    NotFoundResponse, PaymentStatusResponse, SessionCheckQuery, WebhookAck,
};
use crate::application::lifecycle::PaymentLifecycleManager;
use crate::application::sessions::AccessSessionManager;
use crate::domain::payment::{Identity, PaymentToken};
use crate::domain::session::AccessStatus;
use crate::error::PaymentError;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use std::sync::Arc;

const DEBUG_METHOD: &str = "debug";

/// Values applied when a request leaves them out.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub amount: Decimal,
    pub method: String,
    /// Used by the debug extend route when no `seconds` is given.
    pub session_duration: chrono::Duration,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<PaymentLifecycleManager>,
    pub sessions: Arc<AccessSessionManager>,
    pub defaults: Arc<RequestDefaults>,
}

/// Converts `PaymentError` into an HTTP response.
pub struct ApiError(PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            PaymentError::ValidationError(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            PaymentError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            PaymentError::GatewayError(reason) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::with_details("Payment gateway error", reason),
            ),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn init_payment(
    State(state): State<AppState>,
    Json(request): Json<InitPaymentRequest>,
) -> Result<Json<InitPaymentResponse>, ApiError> {
    let amount = request.amount.unwrap_or(state.defaults.amount);
    let method = request
        .method
        .unwrap_or_else(|| state.defaults.method.clone());

    let initiated = state
        .lifecycle
        .initiate(&request.identity, amount, &method)
        .await?;

    Ok(Json(InitPaymentResponse {
        token: initiated.token,
        status: initiated.status,
        message: "Payment request sent. Confirm it on your phone.".to_string(),
    }))
}

/// Provider callback. Anything that parses is acknowledged with 200 so the
/// provider stops retrying; processing errors are only logged.
pub async fn payment_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    let event = match state.lifecycle.parse_confirmation(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "rejected webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response();
        }
    };

    match state.lifecycle.confirm(&event.token, &event.status).await {
        Ok(result) => tracing::info!(token = %event.token, ?result, "webhook processed"),
        Err(e) => tracing::error!(token = %event.token, error = %e, "webhook processing failed"),
    }
    Json(WebhookAck { received: true }).into_response()
}

pub async fn payment_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let token = PaymentToken::from(token);
    match state.lifecycle.status_of(&token).await {
        Ok(record) => Ok(Json(PaymentStatusResponse {
            status: record.status,
            identity: record.identity.to_string(),
        })
        .into_response()),
        Err(PaymentError::NotFound(_)) => {
            Ok((StatusCode::NOT_FOUND, Json(NotFoundResponse::PAYMENT)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn session_check(
    State(state): State<AppState>,
    Query(query): Query<SessionCheckQuery>,
) -> Result<Json<AccessStatus>, ApiError> {
    let identity = Identity::parse(&query.identity)?;
    Ok(Json(state.sessions.check(&identity).await?))
}

pub async fn check_user(
    State(state): State<AppState>,
    Json(request): Json<CheckUserRequest>,
) -> Result<Json<CheckUserResponse>, ApiError> {
    let Some(identity) = request
        .user_number
        .as_deref()
        .and_then(|raw| Identity::parse(raw).ok())
    else {
        return Ok(Json(CheckUserResponse {
            has_access: false,
            remaining_time: None,
            user_number: None,
            message: Some("User number is required".to_string()),
        }));
    };

    let status = state.sessions.check(&identity).await?;
    Ok(Json(CheckUserResponse {
        has_access: status.has_access,
        remaining_time: status.remaining_seconds,
        user_number: Some(identity.to_string()),
        message: None,
    }))
}

/// Grants access without a payment. Only mounted with debug routes enabled.
pub async fn extend_session(
    State(state): State<AppState>,
    Json(request): Json<ExtendSessionRequest>,
) -> Result<Json<ExtendSessionResponse>, ApiError> {
    let identity = Identity::parse(&request.identity)?;
    let duration = match request.seconds {
        Some(seconds) => chrono::Duration::try_seconds(seconds).ok_or_else(|| {
            PaymentError::ValidationError(format!("{seconds} seconds is out of range"))
        })?,
        None => state.defaults.session_duration,
    };

    let expires_at = state
        .sessions
        .activate(&identity, None, DEBUG_METHOD, duration)
        .await?;
    tracing::warn!(%identity, %expires_at, "session granted through debug route");

    Ok(Json(ExtendSessionResponse {
        identity: identity.to_string(),
        expires_at,
    }))
}
