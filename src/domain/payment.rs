use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents a positive monetary amount for a payment.
///
/// Ensures that charge amounts are always positive. Currency is not modelled;
/// the gateway decides how to interpret the value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The end-user key (typically a phone number) under which access is granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parses a raw identity, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, PaymentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::ValidationError(
                "Identity is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier correlating a payment initiation with its confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentToken(String);

impl PaymentToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentToken {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

impl From<String> for PaymentToken {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl fmt::Display for PaymentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome applied to a pending payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Failed { reason: String },
}

/// A single payment attempt and its lifecycle status.
///
/// `status` only ever moves from `Pending` to one of the terminal states
/// through [`PaymentRecord::settle`]. A completed record additionally tracks
/// whether its access session has been granted in `activated_at`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRecord {
    pub token: PaymentToken,
    pub identity: Identity,
    pub amount: Amount,
    pub method: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn pending(
        token: PaymentToken,
        identity: Identity,
        amount: Amount,
        method: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            identity,
            amount,
            method,
            status: PaymentStatus::Pending,
            created_at,
            completed_at: None,
            failure_reason: None,
            activated_at: None,
        }
    }

    /// Applies a terminal outcome if the record is still pending.
    ///
    /// Returns `false` and leaves the record untouched when it was already settled.
    pub fn settle(&mut self, settlement: Settlement, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match settlement {
            Settlement::Completed => {
                self.status = PaymentStatus::Completed;
                self.completed_at = Some(at);
            }
            Settlement::Failed { reason } => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason);
            }
        }
        true
    }

    /// Completed, but no session has been granted for it yet.
    pub fn awaits_activation(&self) -> bool {
        self.status == PaymentStatus::Completed && self.activated_at.is_none()
    }

    /// Reserves the activation for the caller. Only one claim succeeds until
    /// it is released.
    pub fn claim_activation(&mut self, at: DateTime<Utc>) -> bool {
        if !self.awaits_activation() {
            return false;
        }
        self.activated_at = Some(at);
        true
    }

    /// Gives a claimed activation back after the session write failed.
    pub fn release_activation(&mut self) {
        self.activated_at = None;
    }

    /// Whether the sweeper may delete this record given a retention cutoff.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status != PaymentStatus::Completed && self.created_at < cutoff
    }
}

/// Result of an atomic settle attempt against a store.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// This call moved the record out of `Pending`.
    Applied(PaymentRecord),
    /// The record was already terminal; nothing changed.
    AlreadySettled(PaymentRecord),
    /// No record exists for the token.
    Unknown,
}
