//! HTTP API built on axum.
//!
//! - `POST /api/payment/init` starts a payment and returns its token
//! - `GET /api/payment/status/:token` reports the payment status
//! - `POST <webhook path>` receives provider confirmations
//! - `GET /api/session/check` and the legacy `POST /api/check-user` report access
//! - `POST /api/session/extend` grants access directly (debug builds of the config only)

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AppState, RequestDefaults};
pub use routes::{DEFAULT_WEBHOOK_PATH, RouterOptions, router};
