//! Gateway callbacks and the admin payment log.
//!
//! ```text
//! POST /api/v1/payments/payfast/notify   (form body, from PayFast)
//! POST /api/v1/payments/stripe/webhook   (JSON body + Stripe-Signature)
//! GET  /api/v1/admin/payments?limit=50
//! ```
//!
//! Callbacks carry no session. The raw body is passed through untouched
//! because both gateways sign the exact bytes they sent.

use std::net::IpAddr;

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{CallbackOutcome, PayFastNotificationRequest, StripeWebhookRequest};
use crate::domain::visit::client_ip;
use crate::domain::{PAYMENT_LIST_MAX, PaymentLogEntry, PaymentProvider, PaymentStatus};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::map_all;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldCode, field_error};

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
const FORWARDED_FOR: &str = "x-forwarded-for";
const DEFAULT_PAYMENT_LIMIT: i64 = 50;

/// Acknowledgement returned to Stripe.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    /// `settled`, `recorded` or `ignored`.
    pub outcome: &'static str,
    pub reference: Option<String>,
}

impl From<CallbackOutcome> for WebhookAck {
    fn from(outcome: CallbackOutcome) -> Self {
        let (outcome, reference) = match outcome {
            CallbackOutcome::Settled { reference, .. } => ("settled", Some(reference)),
            CallbackOutcome::Recorded { reference, .. } => ("recorded", Some(reference)),
            CallbackOutcome::Ignored { .. } => ("ignored", None),
        };
        Self {
            received: true,
            outcome,
            reference,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaymentListQuery {
    /// Rows to return, newest first.
    pub limit: Option<i64>,
}

/// Payment log row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLogDto {
    pub id: i64,
    pub user_id: Option<String>,
    pub subject_id: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    #[schema(value_type = String, example = "paid")]
    pub status: PaymentStatus,
    #[schema(value_type = String, example = "payfast")]
    pub provider: PaymentProvider,
    pub external_ref: String,
    pub purpose: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<&PaymentLogEntry> for PaymentLogDto {
    fn from(entry: &PaymentLogEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id.as_ref().map(ToString::to_string),
            subject_id: entry.subject_id,
            amount_cents: entry.amount_cents,
            currency: entry.currency.clone(),
            status: entry.status,
            provider: entry.provider,
            external_ref: entry.external_ref.clone(),
            purpose: entry.purpose.clone(),
            meta: entry.meta.clone(),
            created_at: entry.created_at,
        }
    }
}

fn source_ip(req: &HttpRequest) -> Option<IpAddr> {
    let forwarded = req
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok());
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    client_ip(forwarded, peer.as_deref()).and_then(|ip| ip.parse().ok())
}

/// PayFast instant payment notification.
///
/// Answers `OK` once the notification is verified, whether or not it
/// settles anything.
#[utoipa::path(
    post,
    path = "/api/v1/payments/payfast/notify",
    request_body(content = String, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Notification accepted", body = String),
        (status = 400, description = "Signature or amount mismatch", body = ErrorSchema),
        (status = 403, description = "Untrusted source", body = ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "payFastNotify",
    security([])
)]
#[post("/payments/payfast/notify")]
pub async fn payfast_notify(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: String,
) -> ApiResult<HttpResponse> {
    let outcome = state
        .checkout
        .handle_payfast_notification(PayFastNotificationRequest {
            raw_body: body,
            source_ip: source_ip(&req),
        })
        .await?;
    info!(?outcome, "payfast notification handled");
    Ok(HttpResponse::Ok().content_type("text/plain").body("OK"))
}

/// Stripe webhook.
#[utoipa::path(
    post,
    path = "/api/v1/payments/stripe/webhook",
    request_body(content = String, content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<ts>,v1=<hmac>")),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Bad signature or payload", body = ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "stripeWebhook",
    security([])
)]
#[post("/payments/stripe/webhook")]
pub async fn stripe_webhook(
    state: web::Data<HttpState>,
    req: HttpRequest,
    body: String,
) -> ApiResult<web::Json<WebhookAck>> {
    let signature_header = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            field_error(
                STRIPE_SIGNATURE_HEADER,
                FieldCode::Missing,
                "Stripe-Signature header is required",
            )
        })?
        .to_owned();
    let outcome = state
        .checkout
        .handle_stripe_webhook(StripeWebhookRequest {
            payload: body,
            signature_header,
        })
        .await?;
    Ok(web::Json(outcome.into()))
}

/// Recent payment log rows.
#[utoipa::path(
    get,
    path = "/api/v1/admin/payments",
    params(PaymentListQuery),
    responses(
        (status = 200, description = "Payment log", body = [PaymentLogDto]),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListPayments"
)]
#[get("/admin/payments")]
pub async fn admin_list_payments(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<PaymentListQuery>,
) -> ApiResult<web::Json<Vec<PaymentLogDto>>> {
    session.require_admin()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAYMENT_LIMIT)
        .clamp(1, PAYMENT_LIST_MAX);
    let entries = state.checkout.list_payments(limit).await?;
    Ok(web::Json(map_all(&entries)))
}
