//! Command-line and environment configuration.
//!
//! Every option can also be set through the environment variable named in its
//! help text; a `.env` file in the working directory is loaded first.

use crate::application::lifecycle::LifecyclePolicy;
use crate::application::sweeper::SweeperConfig;
use crate::error::{PaymentError, Result};
use crate::infrastructure::gateway::e2payments::E2PaymentsConfig;
use crate::interfaces::http::{DEFAULT_WEBHOOK_PATH, RequestDefaults, RouterOptions};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Time-limited premium access unlocked by mobile payments", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP service and the background sweeper (default)
    Serve,
    /// Run a single reconciliation pass and print its report
    Sweep,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP listener to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the HTTP listener
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Length of the access window granted by a completed payment
    #[arg(long, env = "SESSION_DURATION_SECS", default_value_t = 3600)]
    pub session_duration_secs: u64,

    /// Time between reconciliation passes
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 10)]
    pub sweep_interval_secs: u64,

    /// Age after which an uncompleted payment is discarded
    #[arg(long, env = "PAYMENT_RETENTION_SECS", default_value_t = 7200)]
    pub payment_retention_secs: u64,

    /// Base URL of the e2Payments API
    #[arg(
        long,
        env = "E2PAYMENTS_BASE_URL",
        default_value = "http://localhost:8000/v1"
    )]
    pub gateway_url: String,

    /// e2Payments API key. Without one, payments run in simulation mode.
    #[arg(long, env = "E2PAYMENTS_API_KEY", hide_env_values = true)]
    pub gateway_api_key: Option<String>,

    /// Upper bound on a single gateway call
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS", default_value_t = 10)]
    pub gateway_timeout_secs: u64,

    /// Route that receives provider confirmations
    #[arg(long, env = "WEBHOOK_PATH", default_value = DEFAULT_WEBHOOK_PATH)]
    pub webhook_path: String,

    /// Amount charged when a request does not specify one
    #[arg(long, env = "DEFAULT_AMOUNT", default_value = "50.00")]
    pub default_amount: Decimal,

    /// Payment method used when a request does not specify one
    #[arg(long, env = "DEFAULT_METHOD", default_value = "mpesa")]
    pub default_method: String,

    /// Mount `POST /api/session/extend`, which grants access without payment
    #[arg(long, env = "ENABLE_DEBUG_ROUTES")]
    pub enable_debug_routes: bool,

    /// Skip gateway connectivity probes at startup and during sweeps
    #[arg(long, env = "NO_GATEWAY_PROBE")]
    pub no_gateway_probe: bool,
}

impl Config {
    /// Rejects combinations that would make the service misbehave.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("session duration", self.session_duration_secs),
            ("sweep interval", self.sweep_interval_secs),
            ("payment retention", self.payment_retention_secs),
            ("gateway timeout", self.gateway_timeout_secs),
        ] {
            if value == 0 {
                return Err(PaymentError::ConfigError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.sweep_interval_secs >= self.session_duration_secs {
            return Err(PaymentError::ConfigError(format!(
                "sweep interval ({}s) must be shorter than the session duration ({}s)",
                self.sweep_interval_secs, self.session_duration_secs
            )));
        }
        if !self.webhook_path.starts_with('/') {
            return Err(PaymentError::ConfigError(format!(
                "webhook path {:?} must start with '/'",
                self.webhook_path
            )));
        }
        if self.default_amount <= Decimal::ZERO {
            return Err(PaymentError::ConfigError(
                "default amount must be positive".to_string(),
            ));
        }
        if self.default_method.trim().is_empty() {
            return Err(PaymentError::ConfigError(
                "default method must not be empty".to_string(),
            ));
        }
        self.session_duration()?;
        self.payment_retention()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_duration(&self) -> Result<chrono::Duration> {
        seconds("session duration", self.session_duration_secs)
    }

    pub fn payment_retention(&self) -> Result<chrono::Duration> {
        seconds("payment retention", self.payment_retention_secs)
    }

    pub fn lifecycle_policy(&self) -> Result<LifecyclePolicy> {
        Ok(LifecyclePolicy {
            session_duration: self.session_duration()?,
            gateway_timeout: Duration::from_secs(self.gateway_timeout_secs),
        })
    }

    pub fn sweeper_config(&self) -> Result<SweeperConfig> {
        Ok(SweeperConfig {
            interval: Duration::from_secs(self.sweep_interval_secs),
            retention: self.payment_retention()?,
            probe_gateway: !self.no_gateway_probe,
        })
    }

    pub fn request_defaults(&self) -> Result<RequestDefaults> {
        Ok(RequestDefaults {
            amount: self.default_amount,
            method: self.default_method.trim().to_string(),
            session_duration: self.session_duration()?,
        })
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            webhook_path: self.webhook_path.clone(),
            debug_routes: self.enable_debug_routes,
        }
    }

    /// Provider settings, or `None` when no API key is configured.
    pub fn e2payments(&self) -> Option<E2PaymentsConfig> {
        let api_key = self.gateway_api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(E2PaymentsConfig {
            base_url: self.gateway_url.clone(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(self.gateway_timeout_secs),
        })
    }
}

/// Longest accepted duration: one hundred years.
const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn seconds(name: &str, secs: u64) -> Result<chrono::Duration> {
    if secs > MAX_DURATION_SECS {
        return Err(PaymentError::ConfigError(format!(
            "{name} of {secs}s exceeds the maximum of {MAX_DURATION_SECS}s"
        )));
    }
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| PaymentError::ConfigError(format!("{name} of {secs}s is out of range")))
}
