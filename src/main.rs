use clap::Parser;
use miette::{IntoDiagnostic, Result};
use premium_gate::application::lifecycle::PaymentLifecycleManager;
use premium_gate::application::sessions::AccessSessionManager;
use premium_gate::application::sweeper::ReconciliationSweeper;
use premium_gate::config::{Cli, Command, Config};
use premium_gate::domain::ports::{ClockRef, PaymentGatewayRef, PaymentStoreRef, SessionStoreRef};
use premium_gate::infrastructure::clock::SystemClock;
use premium_gate::infrastructure::gateway::e2payments::E2PaymentsGateway;
use premium_gate::infrastructure::gateway::simulated::SimulatedGateway;
use premium_gate::infrastructure::in_memory::{InMemoryPaymentStore, InMemorySessionStore};
#[cfg(feature = "storage-rocksdb")]
use premium_gate::infrastructure::rocksdb::RocksDBStore;
use premium_gate::interfaces::http::{AppState, router};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

struct Stores {
    payments: PaymentStoreRef,
    sessions: SessionStoreRef,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            payments: Arc::new(InMemoryPaymentStore::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing();

    let config = cli.config;
    config.validate().into_diagnostic()?;

    let stores = open_stores(config.db_path.as_deref()).into_diagnostic()?;
    let gateway = build_gateway(&config).into_diagnostic()?;
    let clock: ClockRef = Arc::new(SystemClock);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, stores, gateway, clock).await,
        Command::Sweep => sweep_once(&config, stores, gateway, clock).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_stores(db_path: Option<&Path>) -> premium_gate::error::Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            // Use persistent storage (RocksDB)
            let store = RocksDBStore::open(path)?;
            tracing::info!(path = %path.display(), "using RocksDB storage");
            Ok(Stores {
                payments: Arc::new(store.clone()),
                sessions: Arc::new(store),
            })
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}

fn build_gateway(config: &Config) -> premium_gate::error::Result<PaymentGatewayRef> {
    match config.e2payments() {
        Some(settings) => {
            tracing::info!(base_url = %settings.base_url, "using e2Payments gateway");
            Ok(Arc::new(E2PaymentsGateway::new(settings)?))
        }
        None => {
            tracing::warn!("no gateway API key configured, running in SIMULATION MODE");
            Ok(Arc::new(SimulatedGateway))
        }
    }
}

async fn serve(
    config: &Config,
    stores: Stores,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
) -> Result<()> {
    if !config.no_gateway_probe {
        match gateway.probe().await {
            Ok(()) => tracing::info!("payment gateway ACTIVE"),
            Err(e) => tracing::warn!(error = %e, "payment gateway probe FAILED"),
        }
    }

    let sessions = Arc::new(AccessSessionManager::new(
        stores.sessions.clone(),
        clock.clone(),
    ));
    let lifecycle = Arc::new(PaymentLifecycleManager::new(
        stores.payments.clone(),
        gateway.clone(),
        sessions.clone(),
        clock.clone(),
        config.lifecycle_policy().into_diagnostic()?,
    ));
    let sweeper = Arc::new(ReconciliationSweeper::new(
        stores.payments,
        stores.sessions,
        gateway,
        clock,
        config.sweeper_config().into_diagnostic()?,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = sweeper.spawn(shutdown_rx);

    let state = AppState {
        lifecycle,
        sessions,
        defaults: Arc::new(config.request_defaults().into_diagnostic()?),
    };
    let app = router(state, &config.router_options());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, webhook = %config.webhook_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    // The receiver may already be gone if the sweeper task ended early.
    let _ = shutdown_tx.send(true);
    sweeper_handle.await.into_diagnostic()?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn sweep_once(
    config: &Config,
    stores: Stores,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
) -> Result<()> {
    let sweeper = ReconciliationSweeper::new(
        stores.payments,
        stores.sessions,
        gateway,
        clock,
        config.sweeper_config().into_diagnostic()?,
    );
    let report = sweeper.run_once().await;

    println!("sessions_expired: {}", report.sessions_expired);
    println!("payments_purged: {}", report.payments_purged);
    match report.gateway_reachable {
        Some(reachable) => println!("gateway_reachable: {reachable}"),
        None => println!("gateway_reachable: skipped"),
    }
    for error in &report.errors {
        println!("error: {error}");
    }

    if !report.is_clean() {
        miette::bail!("sweep finished with {} error(s)", report.errors.len());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
