//! Checkout handlers for PayFast and Stripe.
//!
//! ```text
//! POST /api/v1/checkout/payfast       {"subject":"loss"}
//! POST /api/v1/checkout/stripe        {"subject":"loss","country":"US"}
//! POST /api/v1/checkout/stripe/cancel {"sessionId":"cs_test_123"}
//! ```
//!
//! Both start endpoints lock the quote on a pending enrollment before the
//! learner leaves for the gateway.

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::UserId;
use crate::domain::ports::{CheckoutRequest, PayFastCheckoutStarted, StripeCheckoutStarted};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{EnrollmentDto, QuoteDto, SubjectDto};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{buyer_country, required};

/// Subject to buy and the buyer's country (`ZA` when omitted).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    #[schema(example = "loss")]
    pub subject: String,
    #[schema(example = "ZA")]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelStripeRequest {
    #[schema(example = "cs_test_123")]
    pub session_id: String,
}

/// One hidden input of the PayFast form.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// Form the browser posts to PayFast, fields in signing order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayFastFormDto {
    #[schema(example = "https://sandbox.payfast.co.za/eng/process")]
    pub action_url: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayFastCheckoutResponse {
    #[schema(example = "AIT-0badc0de")]
    pub reference: String,
    pub subject: SubjectDto,
    pub quote: QuoteDto,
    pub enrollment: EnrollmentDto,
    pub form: PayFastFormDto,
}

impl From<PayFastCheckoutStarted> for PayFastCheckoutResponse {
    fn from(started: PayFastCheckoutStarted) -> Self {
        Self {
            subject: SubjectDto::from(&started.subject),
            quote: QuoteDto::from(&started.quote),
            enrollment: EnrollmentDto::from(&started.enrollment),
            form: PayFastFormDto {
                action_url: started.form.action_url,
                fields: started
                    .form
                    .fields
                    .into_iter()
                    .map(|(name, value)| FormField { name, value })
                    .collect(),
            },
            reference: started.reference,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StripeCheckoutResponse {
    pub reference: String,
    pub subject: SubjectDto,
    pub quote: QuoteDto,
    pub enrollment: EnrollmentDto,
    #[schema(example = "cs_test_123")]
    pub session_id: String,
    /// Hosted checkout page to redirect the learner to.
    pub checkout_url: Option<String>,
}

impl From<StripeCheckoutStarted> for StripeCheckoutResponse {
    fn from(started: StripeCheckoutStarted) -> Self {
        Self {
            subject: SubjectDto::from(&started.subject),
            quote: QuoteDto::from(&started.quote),
            enrollment: EnrollmentDto::from(&started.enrollment),
            reference: started.reference,
            session_id: started.session_id,
            checkout_url: started.checkout_url,
        }
    }
}

async fn checkout_request(
    req: &HttpRequest,
    state: &HttpState,
    user_id: UserId,
    body: StartCheckoutRequest,
) -> ApiResult<CheckoutRequest> {
    let subject_key = required("subject", Some(&body.subject))?.to_owned();
    let user = state.accounts.current_user(&user_id).await?;
    Ok(CheckoutRequest {
        user_id,
        email: user.email,
        role: user.role,
        subject_key,
        country_code: buyer_country(req, body.country.as_deref()),
    })
}

/// Start a PayFast checkout.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payfast",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Signed PayFast form", body = PayFastCheckoutResponse),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown subject", body = ErrorSchema),
        (status = 409, description = "Already enrolled", body = ErrorSchema),
        (status = 503, description = "PayFast not configured", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "startPayFastCheckout"
)]
#[post("/checkout/payfast")]
pub async fn start_payfast(
    req: HttpRequest,
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<StartCheckoutRequest>,
) -> ApiResult<web::Json<PayFastCheckoutResponse>> {
    let user_id = session.require_user_id()?;
    let request = checkout_request(&req, &state, user_id, payload.into_inner()).await?;
    let started = state.checkout.start_payfast(request).await?;
    Ok(web::Json(started.into()))
}

/// Start a Stripe Checkout Session.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/stripe",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = StripeCheckoutResponse),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown subject", body = ErrorSchema),
        (status = 409, description = "Already enrolled", body = ErrorSchema),
        (status = 503, description = "Stripe unavailable", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "startStripeCheckout"
)]
#[post("/checkout/stripe")]
pub async fn start_stripe(
    req: HttpRequest,
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<StartCheckoutRequest>,
) -> ApiResult<web::Json<StripeCheckoutResponse>> {
    let user_id = session.require_user_id()?;
    let request = checkout_request(&req, &state, user_id, payload.into_inner()).await?;
    let started = state.checkout.start_stripe(request).await?;
    Ok(web::Json(started.into()))
}

/// Mark an abandoned Stripe session as canceled.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/stripe/cancel",
    request_body = CancelStripeRequest,
    responses(
        (status = 204, description = "Session canceled"),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown session", body = ErrorSchema)
    ),
    tags = ["checkout"],
    operation_id = "cancelStripeCheckout"
)]
#[post("/checkout/stripe/cancel")]
pub async fn cancel_stripe(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CancelStripeRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let session_id = required("sessionId", Some(&payload.session_id))?.to_owned();
    state.checkout.cancel_stripe(user_id, session_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
