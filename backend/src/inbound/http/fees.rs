//! School fee ledger handlers. Every route is admin-only.
//!
//! ```text
//! GET  /api/v1/admin/fees/balances
//! POST /api/v1/admin/fees/learners      {"fullName":"Thandi M","className":"7B"}
//! GET  /api/v1/admin/fees/learners/{id}
//! POST /api/v1/admin/fees/accounts      {"learnerId":1,"schoolYear":2025,"annualFeeCents":1200000}
//! POST /api/v1/admin/fees/payments      {"accountId":1,"paidCents":50000,"paidOn":"2025-02-01"}
//! ```

use actix_web::{HttpResponse, get, post, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::fees::{
    AccountBalance, FeeAccountId, FeePayment, Learner, LearnerDetail, LearnerId, NewFeeAccount,
    NewFeePayment, NewLearner,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::map_all;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{fee_error, parse_date};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LearnerDto {
    pub id: LearnerId,
    pub full_name: String,
    pub class_name: String,
}

impl From<&Learner> for LearnerDto {
    fn from(learner: &Learner) -> Self {
        Self {
            id: learner.id,
            full_name: learner.full_name.clone(),
            class_name: learner.class_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceDto {
    pub account_id: FeeAccountId,
    pub learner_id: LearnerId,
    pub learner_name: String,
    pub class_name: String,
    pub school_year: i32,
    pub annual_fee_cents: i64,
    pub total_paid_cents: i64,
    /// Negative when the account is in credit.
    pub outstanding_cents: i64,
}

impl From<&AccountBalance> for AccountBalanceDto {
    fn from(balance: &AccountBalance) -> Self {
        Self {
            account_id: balance.account_id,
            learner_id: balance.learner_id,
            learner_name: balance.learner_name.clone(),
            class_name: balance.class_name.clone(),
            school_year: balance.school_year,
            annual_fee_cents: balance.annual_fee_cents,
            total_paid_cents: balance.total_paid_cents,
            outstanding_cents: balance.outstanding_cents(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeePaymentDto {
    pub id: i32,
    pub account_id: FeeAccountId,
    pub paid_cents: i64,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
}

impl From<&FeePayment> for FeePaymentDto {
    fn from(payment: &FeePayment) -> Self {
        Self {
            id: payment.id,
            account_id: payment.account_id,
            paid_cents: payment.paid_cents,
            paid_on: payment.paid_on,
            method: payment.method.clone(),
            reference: payment.reference.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LearnerDetailDto {
    pub learner: LearnerDto,
    pub accounts: Vec<AccountBalanceDto>,
    /// Payments on the most recent account, newest first.
    pub payments: Vec<FeePaymentDto>,
}

impl From<&LearnerDetail> for LearnerDetailDto {
    fn from(detail: &LearnerDetail) -> Self {
        Self {
            learner: LearnerDto::from(&detail.learner),
            accounts: map_all(&detail.accounts),
            payments: map_all(&detail.payments),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddLearnerRequest {
    pub full_name: String,
    pub class_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenAccountRequest {
    pub learner_id: LearnerId,
    #[schema(example = 2025)]
    pub school_year: i32,
    pub annual_fee_cents: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub account_id: FeeAccountId,
    pub paid_cents: i64,
    #[schema(example = "2025-02-01")]
    pub paid_on: String,
    #[schema(example = "EFT")]
    pub method: Option<String>,
    pub reference: Option<String>,
}

/// Fee, paid and outstanding per account.
#[utoipa::path(
    get,
    path = "/api/v1/admin/fees/balances",
    responses(
        (status = 200, description = "Balances in ledger order", body = [AccountBalanceDto]),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminFeeBalances"
)]
#[get("/admin/fees/balances")]
pub async fn fee_balances(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<AccountBalanceDto>>> {
    session.require_admin()?;
    let balances = state.fee_ledger.balances().await?;
    Ok(web::Json(map_all(&balances)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/fees/learners",
    request_body = AddLearnerRequest,
    responses(
        (status = 201, description = "Learner added", body = LearnerDto),
        (status = 400, description = "Invalid learner", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminAddLearner"
)]
#[post("/admin/fees/learners")]
pub async fn add_learner(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<AddLearnerRequest>,
) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let learner =
        NewLearner::try_new(&payload.full_name, &payload.class_name).map_err(fee_error)?;
    let created = state.fee_ledger.add_learner(learner).await?;
    Ok(HttpResponse::Created().json(LearnerDto::from(&created)))
}

/// A learner with their accounts and latest payments.
#[utoipa::path(
    get,
    path = "/api/v1/admin/fees/learners/{id}",
    params(("id" = i32, Path, description = "Learner id")),
    responses(
        (status = 200, description = "Learner detail", body = LearnerDetailDto),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown learner", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminLearnerDetail"
)]
#[get("/admin/fees/learners/{id}")]
pub async fn learner_detail(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<LearnerId>,
) -> ApiResult<web::Json<LearnerDetailDto>> {
    session.require_admin()?;
    let detail = state.fee_ledger.learner_detail(path.into_inner()).await?;
    Ok(web::Json(LearnerDetailDto::from(&detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/fees/accounts",
    request_body = OpenAccountRequest,
    responses(
        (status = 201, description = "Account opened", body = AccountBalanceDto),
        (status = 400, description = "Invalid account", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown learner", body = ErrorSchema),
        (status = 409, description = "Account exists for that year", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminOpenFeeAccount"
)]
#[post("/admin/fees/accounts")]
pub async fn open_account(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<OpenAccountRequest>,
) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let account = NewFeeAccount::try_new(
        payload.learner_id,
        payload.school_year,
        payload.annual_fee_cents,
    )
    .map_err(fee_error)?;
    let opened = state.fee_ledger.open_account(account).await?;
    Ok(HttpResponse::Created().json(AccountBalanceDto::from(&opened)))
}

/// Record a payment. Only positive amounts are accepted.
#[utoipa::path(
    post,
    path = "/api/v1/admin/fees/payments",
    request_body = RecordPaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = FeePaymentDto),
        (status = 400, description = "Invalid payment", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown account", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminRecordFeePayment"
)]
#[post("/admin/fees/payments")]
pub async fn record_payment(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<RecordPaymentRequest>,
) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let body = payload.into_inner();
    let paid_on = parse_date("paidOn", &body.paid_on)?;
    let payment = NewFeePayment::try_new(
        body.account_id,
        body.paid_cents,
        paid_on,
        body.method.as_deref(),
        body.reference.as_deref(),
    )
    .map_err(fee_error)?;
    let recorded = state.fee_ledger.record_payment(payment).await?;
    Ok(HttpResponse::Created().json(FeePaymentDto::from(&recorded)))
}
