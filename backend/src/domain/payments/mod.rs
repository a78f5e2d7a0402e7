//! Payment audit records shared by both gateways.
//!
//! Each checkout writes one `pending` log row keyed by an external
//! reference. Gateway callbacks later move the row to a terminal status.

pub mod payfast;
pub mod stripe;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::subject::SubjectId;
use super::user::UserId;

/// Purpose recorded for enrollment checkouts.
pub const ENROLLMENT_PURPOSE: &str = "enrollment";

/// Payment gateway that handled a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    PayFast,
    Stripe,
}

impl PaymentProvider {
    /// Stable name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PayFast => "payfast",
            Self::Stripe => "stripe",
        }
    }

    /// Parse a stored provider name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "payfast" => Some(Self::PayFast),
            "stripe" => Some(Self::Stripe),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a logged payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Canceled,
}

impl PaymentStatus {
    /// Stable name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a stored status; `complete` and `cancelled` spellings are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "open" => Some(Self::Pending),
            "paid" | "complete" | "completed" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the payment audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLogEntry {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub subject_id: Option<SubjectId>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider: PaymentProvider,
    pub external_ref: String,
    pub purpose: String,
    pub meta: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Insert request for the payment audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentLog {
    pub user_id: Option<UserId>,
    pub subject_id: Option<SubjectId>,
    pub amount_cents: i64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub external_ref: String,
    pub purpose: String,
    pub meta: Option<Value>,
}

/// Generate an internal payment reference such as `AIT-1a2b3c4d`.
pub fn new_payment_reference() -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("AIT-{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn payment_references_have_fixed_shape() {
        let reference = new_payment_reference();
        let suffix = reference.strip_prefix("AIT-").expect("prefix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[rstest]
    #[case("COMPLETE", Some(PaymentStatus::Paid))]
    #[case("cancelled", Some(PaymentStatus::Canceled))]
    #[case("open", Some(PaymentStatus::Pending))]
    #[case("refunded", None)]
    fn parses_gateway_statuses(#[case] raw: &str, #[case] expected: Option<PaymentStatus>) {
        assert_eq!(PaymentStatus::parse(raw), expected);
    }

    #[rstest]
    fn provider_names_round_trip() {
        for provider in [PaymentProvider::PayFast, PaymentProvider::Stripe] {
            assert_eq!(PaymentProvider::parse(provider.as_str()), Some(provider));
        }
    }
}
