mod common;

use common::{RETENTION_HOURS, SESSION_SECS, stack, webhook};
use premium_gate::application::lifecycle::ActivationResult;
use premium_gate::domain::payment::{Identity, PaymentStatus, PaymentToken};
use premium_gate::domain::session::AccessStatus;
use premium_gate::error::PaymentError;
use rust_decimal_macros::dec;

fn identity(raw: &str) -> Identity {
    Identity::parse(raw).unwrap()
}

#[tokio::test]
async fn test_payment_to_expiry_scenario() {
    let s = stack();

    let initiated = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap();
    let token = initiated.token;
    assert_eq!(
        s.lifecycle.status_of(&token).await.unwrap().status,
        PaymentStatus::Pending
    );
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::DENIED
    );

    let event = s
        .lifecycle
        .parse_confirmation(&webhook("completed", token.as_str()))
        .unwrap();
    let result = s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    assert!(matches!(result, ActivationResult::Activated { .. }));

    let record = s.lifecycle.status_of(&token).await.unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert!(record.completed_at.is_some());
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::granted(SESSION_SECS as u64)
    );

    s.clock.advance(chrono::Duration::seconds(SESSION_SECS));
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::DENIED
    );
    assert_eq!(s.sessions.puts(), 1);
}

#[tokio::test]
async fn test_duplicate_webhook_activates_once() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;

    let payload = webhook("completed", token.as_str());
    for _ in 0..3 {
        let event = s.lifecycle.parse_confirmation(&payload).unwrap();
        s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    }

    assert_eq!(s.sessions.puts(), 1);
}

#[tokio::test]
async fn test_replayed_webhook_does_not_extend_access() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let payload = webhook("completed", token.as_str());

    let event = s.lifecycle.parse_confirmation(&payload).unwrap();
    s.lifecycle.confirm(&event.token, &event.status).await.unwrap();

    s.clock.advance(chrono::Duration::seconds(10));
    let replay = s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    assert_eq!(
        replay,
        ActivationResult::AlreadyProcessed {
            status: PaymentStatus::Completed
        }
    );
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::granted((SESSION_SECS - 10) as u64)
    );
}

#[tokio::test]
async fn test_second_payment_replaces_window() {
    let s = stack();
    for _ in 0..2 {
        let token = s
            .lifecycle
            .initiate("2550001", dec!(50.00), "mpesa")
            .await
            .unwrap()
            .token;
        let event = s
            .lifecycle
            .parse_confirmation(&webhook("completed", token.as_str()))
            .unwrap();
        s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
        s.clock.advance(chrono::Duration::seconds(5));
    }

    // The second activation happened 5s ago; durations do not stack.
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::granted((SESSION_SECS - 5) as u64)
    );
    assert_eq!(s.sessions.puts(), 2);
}

#[tokio::test]
async fn test_confirm_retry_activates_after_session_write_failure() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let event = s
        .lifecycle
        .parse_confirmation(&webhook("completed", token.as_str()))
        .unwrap();

    s.sessions.fail_next_puts(1);
    let first = s.lifecycle.confirm(&event.token, &event.status).await;
    assert!(matches!(first, Err(PaymentError::StoreError(_))));
    let record = s.lifecycle.status_of(&token).await.unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert!(record.activated_at.is_none());
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::DENIED
    );

    let retry = s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    assert!(matches!(retry, ActivationResult::Activated { .. }));
    assert_eq!(
        s.access.check(&identity("2550001")).await.unwrap(),
        AccessStatus::granted(SESSION_SECS as u64)
    );

    let replay = s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    assert_eq!(
        replay,
        ActivationResult::AlreadyProcessed {
            status: PaymentStatus::Completed
        }
    );
    assert_eq!(s.sessions.puts(), 1);
}

#[tokio::test]
async fn test_late_failure_signal_does_not_retry_activation() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let success = s
        .lifecycle
        .parse_confirmation(&webhook("completed", token.as_str()))
        .unwrap();
    let failure = s
        .lifecycle
        .parse_confirmation(&webhook("failed", token.as_str()))
        .unwrap();

    s.sessions.fail_next_puts(1);
    assert!(s.lifecycle.confirm(&success.token, &success.status).await.is_err());

    let late = s.lifecycle.confirm(&failure.token, &failure.status).await.unwrap();
    assert_eq!(
        late,
        ActivationResult::AlreadyProcessed {
            status: PaymentStatus::Completed
        }
    );
    assert_eq!(s.sessions.puts(), 0);
    assert!(s.lifecycle.status_of(&token).await.unwrap().awaits_activation());
}

#[tokio::test]
async fn test_failed_webhook_grants_nothing() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let event = s
        .lifecycle
        .parse_confirmation(&webhook("failed", token.as_str()))
        .unwrap();

    let result = s.lifecycle.confirm(&event.token, &event.status).await.unwrap();
    assert!(matches!(result, ActivationResult::Rejected { .. }));

    let record = s.lifecycle.status_of(&token).await.unwrap();
    assert_eq!(record.status, PaymentStatus::Failed);
    assert!(record.failure_reason.is_some());
    assert_eq!(s.sessions.puts(), 0);
}

#[tokio::test]
async fn test_empty_identity_writes_nothing() {
    let s = stack();
    let result = s.lifecycle.initiate("  ", dec!(50.00), "mpesa").await;
    assert!(matches!(result, Err(PaymentError::ValidationError(_))));
    assert!(s.payments.is_empty().await);
}

#[tokio::test]
async fn test_unknown_token_mutates_nothing() {
    let s = stack();
    let event = s
        .lifecycle
        .parse_confirmation(&webhook("completed", "not-a-token"))
        .unwrap();

    let result = s.lifecycle.confirm(&event.token, &event.status).await;
    assert!(matches!(result, Err(PaymentError::NotFound(_))));
    assert!(s.payments.is_empty().await);
    assert_eq!(s.sessions.puts(), 0);
}

#[tokio::test]
async fn test_sweep_purges_abandoned_payment() {
    let s = stack();
    let abandoned = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let paid = s
        .lifecycle
        .initiate("2550002", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let event = s
        .lifecycle
        .parse_confirmation(&webhook("completed", paid.as_str()))
        .unwrap();
    s.lifecycle.confirm(&event.token, &event.status).await.unwrap();

    s.clock
        .advance(chrono::Duration::hours(RETENTION_HOURS) + chrono::Duration::seconds(1));
    let report = s.sweeper.run_once().await;

    assert_eq!(report.payments_purged, 1);
    assert_eq!(report.sessions_expired, 1);
    assert!(report.is_clean());
    assert!(matches!(
        s.lifecycle.status_of(&abandoned).await,
        Err(PaymentError::NotFound(_))
    ));
    assert_eq!(
        s.lifecycle.status_of(&paid).await.unwrap().status,
        PaymentStatus::Completed
    );
}

#[tokio::test]
async fn test_sweep_keeps_live_sessions() {
    let s = stack();
    let token = s
        .lifecycle
        .initiate("2550001", dec!(50.00), "mpesa")
        .await
        .unwrap()
        .token;
    let event = s
        .lifecycle
        .parse_confirmation(&webhook("completed", token.as_str()))
        .unwrap();
    s.lifecycle.confirm(&event.token, &event.status).await.unwrap();

    s.clock.advance(chrono::Duration::seconds(SESSION_SECS - 1));
    let report = s.sweeper.run_once().await;
    assert_eq!(report.sessions_expired, 0);
    assert!(s.access.check(&identity("2550001")).await.unwrap().has_access);

    let unknown = PaymentToken::generate();
    assert!(s.lifecycle.status_of(&unknown).await.is_err());
}
