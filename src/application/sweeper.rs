//! Periodic reconciliation of expired sessions and abandoned payments.
//!
//! Every pass runs three independent steps: purge sessions whose window has
//! closed, purge non-completed payments older than the retention period, and
//! (optionally) probe the gateway. A failing step is logged and recorded in
//! the [`SweepReport`]; it never aborts the other steps or the loop.

use crate::domain::ports::{ClockRef, PaymentGatewayRef, PaymentStoreRef, SessionStoreRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Age after which a non-completed payment is discarded.
    pub retention: chrono::Duration,
    /// Whether each pass also checks gateway reachability.
    pub probe_gateway: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            retention: chrono::Duration::hours(2),
            probe_gateway: true,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: usize,
    pub payments_purged: usize,
    /// `None` when probing is disabled.
    pub gateway_reachable: Option<bool>,
    pub errors: Vec<String>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ReconciliationSweeper {
    payments: PaymentStoreRef,
    sessions: SessionStoreRef,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
    config: SweeperConfig,
}

impl ReconciliationSweeper {
    pub fn new(
        payments: PaymentStoreRef,
        sessions: SessionStoreRef,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
        config: SweeperConfig,
    ) -> Self {
        Self {
            payments,
            sessions,
            gateway,
            clock,
            config,
        }
    }

    /// Runs a single pass and reports what it did.
    pub async fn run_once(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        match self.sessions.purge_expired(now).await {
            Ok(expired) => {
                report.sessions_expired = expired.len();
                for identity in &expired {
                    tracing::info!(%identity, "session expired");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "session sweep failed");
                report.errors.push(format!("sessions: {e}"));
            }
        }

        match now.checked_sub_signed(self.config.retention) {
            Some(cutoff) => match self.payments.purge_stale(cutoff).await {
                Ok(purged) => {
                    report.payments_purged = purged.len();
                    for token in &purged {
                        tracing::info!(%token, "stale payment discarded");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "payment sweep failed");
                    report.errors.push(format!("payments: {e}"));
                }
            },
            None => {
                tracing::error!(retention = %self.config.retention, "payment retention out of range, purge skipped");
                report
                    .errors
                    .push(format!("payments: retention {} is out of range", self.config.retention));
            }
        }

        if self.config.probe_gateway {
            let reachable = match self.gateway.probe().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "gateway probe failed");
                    false
                }
            };
            report.gateway_reachable = Some(reachable);
        }

        tracing::debug!(
            sessions_expired = report.sessions_expired,
            payments_purged = report.payments_purged,
            gateway_reachable = ?report.gateway_reachable,
            "sweep finished"
        );
        report
    }

    /// Runs passes every `interval` until `shutdown` flips to `true` or its
    /// sender is dropped. A pass in flight is always completed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval;
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("sweeper stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }
    }

    /// Moves the sweeper onto its own task.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
