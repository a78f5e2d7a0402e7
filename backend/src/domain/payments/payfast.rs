//! PayFast checkout signing and ITN (instant transaction notification)
//! verification.
//!
//! Checkout fields are signed by sorting the non-empty fields, form-encoding
//! them, appending the merchant passphrase and taking the MD5 hex digest.
//! Notifications are verified against the raw body exactly as PayFast sent
//! it, with only the `signature` pair removed.

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use md5::{Digest, Md5};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use subtle::ConstantTimeEq;
use url::form_urlencoded;
use zeroize::Zeroizing;

use crate::domain::pricing::format_decimal_amount;

const SANDBOX_HOST: &str = "https://sandbox.payfast.co.za";
const LIVE_HOST: &str = "https://www.payfast.co.za";
const SIGNATURE_FIELD: &str = "signature";

/// Networks PayFast sends notifications from.
const SOURCE_NETWORKS: [(Ipv4Addr, u32); 3] = [
    (Ipv4Addr::new(154, 66, 197, 0), 24),
    (Ipv4Addr::new(154, 72, 56, 0), 21),
    (Ipv4Addr::new(196, 7, 0, 0), 16),
];

/// Errors raised while handling PayFast data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayFastError {
    #[error("notification signature is missing")]
    MissingSignature,
    #[error("notification signature does not match")]
    SignatureMismatch,
    #[error("notification field {field} is missing")]
    MissingField { field: &'static str },
    #[error("notification amount {value} is not a valid amount")]
    InvalidAmount { value: String },
}

/// Merchant credentials.
#[derive(Debug, Clone)]
pub struct PayFastMerchant {
    pub merchant_id: String,
    pub merchant_key: String,
    pub passphrase: Option<Zeroizing<String>>,
    pub sandbox: bool,
}

impl PayFastMerchant {
    fn host(&self) -> &'static str {
        if self.sandbox { SANDBOX_HOST } else { LIVE_HOST }
    }

    /// URL the buyer's browser posts the checkout form to.
    pub fn process_url(&self) -> String {
        format!("{}/eng/process", self.host())
    }

    /// URL used for server-to-server notification validation.
    pub fn validate_url(&self) -> String {
        format!("{}/eng/query/validate", self.host())
    }

    /// Passphrase, if the merchant account has one.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase
            .as_deref()
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Inputs for a PayFast checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFastCheckout {
    pub return_url: String,
    pub cancel_url: String,
    pub notify_url: String,
    pub reference: String,
    pub amount_cents: i64,
    pub item_name: String,
    pub email: String,
    pub subject_slug: String,
    pub user_id: String,
}

/// Signed form the browser posts to PayFast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFastForm {
    pub action_url: String,
    pub fields: Vec<(String, String)>,
}

/// Build the signed checkout form.
pub fn checkout_form(merchant: &PayFastMerchant, checkout: &PayFastCheckout) -> PayFastForm {
    let mut fields: Vec<(String, String)> = [
        ("merchant_id", merchant.merchant_id.clone()),
        ("merchant_key", merchant.merchant_key.clone()),
        ("return_url", checkout.return_url.clone()),
        ("cancel_url", checkout.cancel_url.clone()),
        ("notify_url", checkout.notify_url.clone()),
        ("email_address", checkout.email.clone()),
        ("m_payment_id", checkout.reference.clone()),
        ("amount", format_decimal_amount(checkout.amount_cents)),
        ("item_name", checkout.item_name.clone()),
        ("custom_str1", checkout.subject_slug.clone()),
        ("custom_str2", checkout.user_id.clone()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_owned(), value))
    .collect();
    let signature = sign_fields(&fields, merchant.passphrase());
    fields.push((SIGNATURE_FIELD.to_owned(), signature));
    PayFastForm {
        action_url: merchant.process_url(),
        fields,
    }
}

/// Sign checkout fields.
///
/// Empty values and any existing `signature` are dropped and the rest are
/// sorted by key before encoding.
pub fn sign_fields(fields: &[(String, String)], passphrase: Option<&str>) -> String {
    let mut signed: Vec<&(String, String)> = fields
        .iter()
        .filter(|(key, value)| key != SIGNATURE_FIELD && !value.is_empty())
        .collect();
    signed.sort_by(|left, right| left.0.cmp(&right.0));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in signed {
        serializer.append_pair(key, value);
    }
    let payload = append_passphrase(serializer.finish(), passphrase);
    md5_hex(&payload)
}

fn append_passphrase(mut payload: String, passphrase: Option<&str>) -> String {
    if let Some(passphrase) = passphrase.filter(|value| !value.is_empty()) {
        payload.push_str("&passphrase=");
        payload.extend(form_urlencoded::byte_serialize(passphrase.as_bytes()));
    }
    payload
}

fn md5_hex(payload: &str) -> String {
    hex::encode(Md5::digest(payload.as_bytes()))
}

/// PayFast's view of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayFastPaymentStatus {
    Complete,
    Failed,
    Cancelled,
    Other,
}

impl PayFastPaymentStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" => Self::Complete,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

/// A verified notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFastNotification {
    pub reference: String,
    pub pf_payment_id: Option<String>,
    pub status: PayFastPaymentStatus,
    pub amount_gross_cents: i64,
    pub subject_slug: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Every decoded field, in the order received, for re-posting to the
    /// validation endpoint.
    pub fields: Vec<(String, String)>,
}

/// Verify the signature on a raw notification body and decode it.
pub fn verify_notification(
    raw_body: &str,
    passphrase: Option<&str>,
) -> Result<PayFastNotification, PayFastError> {
    let fields: Vec<(String, String)> = form_urlencoded::parse(raw_body.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let received = field(&fields, SIGNATURE_FIELD)
        .map(str::to_ascii_lowercase)
        .ok_or(PayFastError::MissingSignature)?;

    let unsigned = raw_body
        .split('&')
        .filter(|pair| !pair.starts_with("signature="))
        .collect::<Vec<_>>()
        .join("&");
    let expected = md5_hex(&append_passphrase(unsigned, passphrase));
    if !bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
        return Err(PayFastError::SignatureMismatch);
    }

    let reference = field(&fields, "m_payment_id")
        .ok_or(PayFastError::MissingField { field: "m_payment_id" })?
        .to_owned();
    let status = field(&fields, "payment_status")
        .map(PayFastPaymentStatus::parse)
        .ok_or(PayFastError::MissingField {
            field: "payment_status",
        })?;
    let amount = field(&fields, "amount_gross").ok_or(PayFastError::MissingField {
        field: "amount_gross",
    })?;
    let amount_gross_cents = parse_amount_cents(amount)?;
    let optional = |name: &str| field(&fields, name).filter(|v| !v.is_empty()).map(str::to_owned);

    Ok(PayFastNotification {
        reference,
        pf_payment_id: optional("pf_payment_id"),
        status,
        amount_gross_cents,
        subject_slug: optional("custom_str1"),
        user_id: optional("custom_str2"),
        email: optional("email_address"),
        fields: fields.clone(),
    })
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Parse a decimal amount such as `150.00` into cents.
pub fn parse_amount_cents(raw: &str) -> Result<i64, PayFastError> {
    let invalid = || PayFastError::InvalidAmount {
        value: raw.to_owned(),
    };
    let amount = Decimal::from_str(raw.trim()).map_err(|_| invalid())?;
    if amount.is_sign_negative() || amount.scale() > 2 {
        return Err(invalid());
    }
    (amount * Decimal::ONE_HUNDRED).to_i64().ok_or_else(invalid)
}

/// Whether a notification came from PayFast's published networks.
pub fn is_trusted_source(ip: IpAddr) -> bool {
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4,
            None => return false,
        },
    };
    SOURCE_NETWORKS
        .iter()
        .any(|(network, prefix)| in_network(v4, *network, *prefix))
}

fn in_network(ip: Ipv4Addr, network: Ipv4Addr, prefix: u32) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
    (u32::from(ip) & mask) == (u32::from(network) & mask)
}

#[cfg(test)]
mod tests {
    //! Regression coverage for PayFast signing and verification.
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn merchant() -> PayFastMerchant {
        PayFastMerchant {
            merchant_id: "10000100".to_owned(),
            merchant_key: "46f0cd694581a".to_owned(),
            passphrase: Some(Zeroizing::new("jt7NOE43FZPn".to_owned())),
            sandbox: true,
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn signature_ignores_order_empty_values_and_existing_signature() {
        let a = pairs(&[("b", "2"), ("a", "1"), ("c", "")]);
        let b = pairs(&[("a", "1"), ("signature", "zzz"), ("b", "2")]);
        assert_eq!(sign_fields(&a, None), sign_fields(&b, None));
        assert_eq!(sign_fields(&a, None), md5_hex("a=1&b=2"));
    }

    #[rstest]
    fn signature_encodes_values_and_passphrase() {
        let fields = pairs(&[("item_name", "Loss Enrollment"), ("amount", "150.00")]);
        let expected = md5_hex("amount=150.00&item_name=Loss+Enrollment&passphrase=my+secret");
        assert_eq!(sign_fields(&fields, Some("my secret")), expected);
    }

    #[rstest]
    fn checkout_form_is_signed_and_targets_sandbox(merchant: PayFastMerchant) {
        let form = checkout_form(
            &merchant,
            &PayFastCheckout {
                return_url: "https://ait.example/return".to_owned(),
                cancel_url: "https://ait.example/cancel".to_owned(),
                notify_url: "https://ait.example/notify".to_owned(),
                reference: "AIT-0000beef".to_owned(),
                amount_cents: 17_250,
                item_name: "Loss Enrollment".to_owned(),
                email: "learner@example.com".to_owned(),
                subject_slug: "loss".to_owned(),
                user_id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_owned(),
            },
        );
        assert_eq!(form.action_url, "https://sandbox.payfast.co.za/eng/process");
        let amount = form.fields.iter().find(|(k, _)| k == "amount").expect("amount");
        assert_eq!(amount.1, "172.50");
        let (last_key, last_value) = form.fields.last().expect("signature");
        assert_eq!(last_key, "signature");
        assert_eq!(
            last_value,
            &sign_fields(&form.fields, merchant.passphrase())
        );
    }

    fn signed_body(body: &str, passphrase: Option<&str>) -> String {
        let signature = md5_hex(&append_passphrase(body.to_owned(), passphrase));
        format!("{body}&signature={signature}")
    }

    #[rstest]
    fn verifies_notification_in_received_order() {
        let body = "m_payment_id=AIT-0000beef&pf_payment_id=1089250&payment_status=COMPLETE\
                    &item_name=Loss+Enrollment&amount_gross=172.50&custom_str1=loss";
        let raw = signed_body(body, Some("secret"));
        let notification = verify_notification(&raw, Some("secret")).expect("valid");
        assert_eq!(notification.reference, "AIT-0000beef");
        assert_eq!(notification.status, PayFastPaymentStatus::Complete);
        assert_eq!(notification.amount_gross_cents, 17_250);
        assert_eq!(notification.subject_slug.as_deref(), Some("loss"));
        assert_eq!(notification.pf_payment_id.as_deref(), Some("1089250"));
    }

    #[rstest]
    fn rejects_tampered_notification() {
        let raw = signed_body("m_payment_id=A&payment_status=COMPLETE&amount_gross=1.00", None);
        let tampered = raw.replace("amount_gross=1.00", "amount_gross=0.01");
        assert_eq!(
            verify_notification(&tampered, None),
            Err(PayFastError::SignatureMismatch)
        );
    }

    #[rstest]
    fn rejects_wrong_passphrase() {
        let raw = signed_body("m_payment_id=A&payment_status=COMPLETE&amount_gross=1.00", Some("a"));
        assert_eq!(
            verify_notification(&raw, Some("b")),
            Err(PayFastError::SignatureMismatch)
        );
    }

    #[rstest]
    fn missing_signature_is_reported() {
        assert_eq!(
            verify_notification("m_payment_id=A", None),
            Err(PayFastError::MissingSignature)
        );
    }

    #[rstest]
    #[case("150.00", Ok(15_000))]
    #[case("0.5", Ok(50))]
    #[case("-1.00", Err(()))]
    #[case("1.005", Err(()))]
    #[case("abc", Err(()))]
    fn parses_amounts(#[case] raw: &str, #[case] expected: Result<i64, ()>) {
        assert_eq!(parse_amount_cents(raw).map_err(|_| ()), expected);
    }

    #[rstest]
    #[case("154.66.197.10", true)]
    #[case("154.72.63.255", true)]
    #[case("154.72.64.1", false)]
    #[case("196.7.200.1", true)]
    #[case("10.0.0.1", false)]
    #[case("::ffff:196.7.0.1", true)]
    #[case("2001:db8::1", false)]
    fn trusted_source_networks(#[case] ip: &str, #[case] expected: bool) {
        let ip: IpAddr = ip.parse().expect("valid ip");
        assert_eq!(is_trusted_source(ip), expected);
    }
}
