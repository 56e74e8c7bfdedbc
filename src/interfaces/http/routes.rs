use super::handlers::{
    AppState, check_user, extend_session, health, init_payment, payment_status, payment_webhook,
    session_check,
};
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub const DEFAULT_WEBHOOK_PATH: &str = "/api/webhook/e2payments";

/// Mount options that vary by deployment.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub webhook_path: String,
    /// Mounts `POST /api/session/extend`.
    pub debug_routes: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            debug_routes: false,
        }
    }
}

/// Builds the complete API router.
///
/// # Routes
/// - `GET /health`
/// - `POST /api/payment/init`
/// - `GET /api/payment/status/:token`
/// - `POST <webhook_path>`
/// - `GET /api/session/check?identity=`
/// - `POST /api/check-user`
/// - `POST /api/session/extend` (debug only)
pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/payment/init", post(init_payment))
        .route("/api/payment/status/:token", get(payment_status))
        .route(&options.webhook_path, post(payment_webhook))
        .route("/api/session/check", get(session_check))
        .route("/api/check-user", post(check_user));

    if options.debug_routes {
        router = router.route("/api/session/extend", post(extend_session));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
