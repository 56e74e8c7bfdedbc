use super::payment::{Amount, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-limited access grant for one identity.
///
/// Access is granted iff `expires_at > now`; nothing else implies access.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AccessSession {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
    pub activated_at: DateTime<Utc>,
    /// How the grant was obtained (the payment method, or `debug` for grants made through the debug route).
    pub payment_method: String,
    /// `None` for grants that did not come from a payment.
    #[serde(default)]
    pub amount: Option<Amount>,
}

impl AccessSession {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Whole seconds left, rounded up, or `None` once expired.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        if !self.is_active(now) {
            return None;
        }
        let millis = (self.expires_at - now).num_milliseconds().max(0) as u64;
        Some(millis.div_ceil(1000))
    }
}

/// Answer to "does this identity currently have access, and for how long".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

impl AccessStatus {
    pub const DENIED: Self = Self {
        has_access: false,
        remaining_seconds: None,
    };

    pub fn granted(remaining_seconds: u64) -> Self {
        Self {
            has_access: true,
            remaining_seconds: Some(remaining_seconds),
        }
    }
}
