//! Stripe Checkout sessions and webhook verification.
//!
//! Webhooks carry a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The signed payload is
//! `"{t}.{body}"` and the HMAC key is the endpoint's signing secret.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::user::UserId;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
/// Largest accepted gap between the signed timestamp and now.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;
/// Event type that settles a checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Purpose recorded when a session carries none.
pub const DEFAULT_PURPOSE: &str = "checkout";

type HmacSha256 = Hmac<Sha256>;

/// Webhook verification and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StripeWebhookError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("no signature matches the payload")]
    NoMatchingSignature,
    #[error("signature timestamp is outside the tolerance window")]
    TimestampOutsideTolerance,
    #[error("event payload is invalid: {message}")]
    InvalidPayload { message: String },
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature header against the raw payload.
pub fn verify_webhook(
    payload: &str,
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), StripeWebhookError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => candidates.push(value.to_ascii_lowercase()),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(StripeWebhookError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(StripeWebhookError::MalformedHeader);
    }

    let expected = compute_signature(secret, timestamp, payload);
    let matches = candidates
        .iter()
        .any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));
    if !matches {
        return Err(StripeWebhookError::NoMatchingSignature);
    }
    if now.timestamp().abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(StripeWebhookError::TimestampOutsideTolerance);
    }
    Ok(())
}

/// A webhook event envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    /// Decode an event from the raw payload.
    pub fn parse(payload: &str) -> Result<Self, StripeWebhookError> {
        serde_json::from_str(payload).map_err(|err| StripeWebhookError::InvalidPayload {
            message: err.to_string(),
        })
    }

    /// The completed checkout session, for `checkout.session.completed` events.
    pub fn completed_session(&self) -> Option<Result<CheckoutSession, StripeWebhookError>> {
        (self.kind == CHECKOUT_COMPLETED).then(|| {
            serde_json::from_value(self.data.object.clone()).map_err(|err| {
                StripeWebhookError::InvalidPayload {
                    message: err.to_string(),
                }
            })
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// The parts of a Checkout Session object the platform reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Either an id or an expanded object.
    #[serde(default)]
    pub payment_intent: Option<Value>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl CheckoutSession {
    fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Subject slug from metadata, lowercased.
    pub fn subject_slug(&self) -> Option<String> {
        self.metadata("subject").map(str::to_lowercase)
    }

    /// User id from metadata, if it parses.
    pub fn metadata_user_id(&self) -> Option<UserId> {
        self.metadata("user_id").and_then(|raw| UserId::new(raw).ok())
    }

    /// Buyer email, preferring the customer details Stripe collected.
    pub fn email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_lowercase)
    }

    /// Payment intent id whether or not the object was expanded.
    pub fn payment_intent_id(&self) -> Option<String> {
        match self.payment_intent.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Object(object) => object.get("id").and_then(Value::as_str).map(str::to_owned),
            _ => None,
        }
    }

    /// Build the stored payment record for this session.
    pub fn to_record(&self, user_id: Option<UserId>, now: DateTime<Utc>) -> StripePaymentRecord {
        let status = self
            .payment_status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .unwrap_or("paid")
            .to_ascii_lowercase();
        StripePaymentRecord {
            session_id: self.id.clone(),
            user_id,
            payment_intent_id: self.payment_intent_id(),
            customer_id: self.customer.clone(),
            email: self.email(),
            amount_total_cents: Some(self.amount_total.unwrap_or(0)),
            currency: Some(
                self.currency
                    .as_deref()
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .unwrap_or("ZAR")
                    .to_uppercase(),
            ),
            paid_at: (status == "paid").then_some(now),
            status,
            purpose: Some(
                self.metadata("purpose")
                    .unwrap_or(DEFAULT_PURPOSE)
                    .to_owned(),
            ),
            receipt_url: self.receipt_url.clone(),
        }
    }
}

/// Upsert for the `stripe_payment` table, keyed by session id.
///
/// `None` fields keep whatever value is already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripePaymentRecord {
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub email: Option<String>,
    pub amount_total_cents: Option<i64>,
    pub currency: Option<String>,
    pub status: String,
    pub purpose: Option<String>,
    pub receipt_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A stored Stripe payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripePayment {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<UserId>,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub email: Option<String>,
    pub amount_total_cents: Option<i64>,
    pub currency: Option<String>,
    pub status: String,
    pub purpose: Option<String>,
    pub receipt_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for a new hosted Checkout Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub user_id: UserId,
    pub email: String,
    pub subject_slug: String,
    pub item_name: String,
    pub currency: String,
    pub amount_cents: i64,
    pub reference: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Form parameters for `POST /v1/checkout/sessions`.
    pub fn form_params(&self) -> Vec<(String, String)> {
        [
            ("mode", "payment".to_owned()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("customer_email", self.email.clone()),
            ("client_reference_id", self.reference.clone()),
            ("line_items[0][quantity]", "1".to_owned()),
            (
                "line_items[0][price_data][currency]",
                self.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                self.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.item_name.clone(),
            ),
            ("metadata[purpose]", super::ENROLLMENT_PURPOSE.to_owned()),
            ("metadata[subject]", self.subject_slug.clone()),
            ("metadata[user_id]", self.user_id.to_string()),
            ("metadata[reference]", self.reference.clone()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
    }
}

/// A session created by Stripe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    //! Webhook verification and session decoding.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_762_000_000, 0).single().expect("valid timestamp")
    }

    fn header(timestamp: i64, payload: &str) -> String {
        format!("t={timestamp},v1={}", compute_signature(SECRET, timestamp, payload))
    }

    #[rstest]
    fn accepts_fresh_signed_payload(now: DateTime<Utc>) {
        let payload = r#"{"id":"evt_1"}"#;
        let header = header(now.timestamp() - 10, payload);
        assert_eq!(verify_webhook(payload, &header, SECRET, now), Ok(()));
    }

    #[rstest]
    fn accepts_any_matching_v1(now: DateTime<Utc>) {
        let payload = "{}";
        let t = now.timestamp();
        let header = format!("t={t},v1=deadbeef,v1={}", compute_signature(SECRET, t, payload));
        assert_eq!(verify_webhook(payload, &header, SECRET, now), Ok(()));
    }

    #[rstest]
    fn rejects_stale_timestamp(now: DateTime<Utc>) {
        let payload = "{}";
        let header = header(now.timestamp() - WEBHOOK_TOLERANCE_SECS - 1, payload);
        assert_eq!(
            verify_webhook(payload, &header, SECRET, now),
            Err(StripeWebhookError::TimestampOutsideTolerance)
        );
    }

    #[rstest]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    fn rejects_extreme_timestamps(now: DateTime<Utc>, #[case] timestamp: i64) {
        let payload = "{}";
        assert_eq!(
            verify_webhook(payload, &header(timestamp, payload), SECRET, now),
            Err(StripeWebhookError::TimestampOutsideTolerance)
        );
    }

    #[rstest]
    fn rejects_modified_payload(now: DateTime<Utc>) {
        let header = header(now.timestamp(), r#"{"amount":100}"#);
        assert_eq!(
            verify_webhook(r#"{"amount":1}"#, &header, SECRET, now),
            Err(StripeWebhookError::NoMatchingSignature)
        );
    }

    #[rstest]
    #[case("")]
    #[case("v1=abc")]
    #[case("t=notanumber,v1=abc")]
    #[case("t=1762000000")]
    fn rejects_malformed_headers(now: DateTime<Utc>, #[case] header: &str) {
        assert_eq!(
            verify_webhook("{}", header, SECRET, now),
            Err(StripeWebhookError::MalformedHeader)
        );
    }

    #[rstest]
    fn completed_session_builds_record(now: DateTime<Utc>) {
        let user = UserId::random();
        let payload = json!({
            "id": "evt_1",
            "type": CHECKOUT_COMPLETED,
            "data": {"object": {
                "id": "cs_test_1",
                "payment_intent": {"id": "pi_1"},
                "customer": "cus_1",
                "customer_details": {"email": "Learner@Example.com"},
                "amount_total": 17250,
                "currency": "zar",
                "payment_status": "paid",
                "metadata": {"subject": " LOSS ", "user_id": user.to_string()}
            }}
        })
        .to_string();
        let event = StripeEvent::parse(&payload).expect("event");
        let session = event.completed_session().expect("completed").expect("session");
        assert_eq!(session.subject_slug().as_deref(), Some("loss"));
        assert_eq!(session.metadata_user_id(), Some(user));

        let record = session.to_record(Some(user), now);
        assert_eq!(record.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(record.email.as_deref(), Some("learner@example.com"));
        assert_eq!(record.currency.as_deref(), Some("ZAR"));
        assert_eq!(record.purpose.as_deref(), Some(DEFAULT_PURPOSE));
        assert_eq!(record.paid_at, Some(now));
    }

    #[rstest]
    fn other_events_have_no_session() {
        let event = StripeEvent::parse(
            r#"{"id":"evt_2","type":"payment_intent.created","data":{"object":{}}}"#,
        )
        .expect("event");
        assert!(event.completed_session().is_none());
    }

    #[rstest]
    fn session_params_carry_metadata() {
        let user = UserId::random();
        let request = CheckoutSessionRequest {
            user_id: user,
            email: "learner@example.com".to_owned(),
            subject_slug: "loss".to_owned(),
            item_name: "Loss Enrollment".to_owned(),
            currency: "ZAR".to_owned(),
            amount_cents: 17_250,
            reference: "AIT-0000beef".to_owned(),
            success_url: "https://ait.example/ok".to_owned(),
            cancel_url: "https://ait.example/cancel".to_owned(),
        };
        let params = request.form_params();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("zar"));
        assert_eq!(get("metadata[user_id]"), Some(user.to_string().as_str()));
        assert_eq!(get("metadata[purpose]"), Some("enrollment"));
    }
}
