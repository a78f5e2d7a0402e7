//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every `/api/v1` handler, the health probes, the
//! error wrappers from [`crate::inbound::http::schemas`] and the session
//! cookie security scheme. Swagger UI serves it in debug builds and
//! `openapi-dump` writes it for external tooling.

use crate::inbound::http::assessments::{
    AnswerRecordedDto, AnswerRequest, LossReportDto, LossResultDto, LossRunDto, RunSummaryDto,
};
use crate::inbound::http::auth::{LoginRequest, RegisterRequest};
use crate::inbound::http::checkout::{
    CancelStripeRequest, PayFastCheckoutResponse, StartCheckoutRequest, StripeCheckoutResponse,
};
use crate::inbound::http::dto::{EnrollmentDto, QuoteDto, SubjectDto, UserDto};
use crate::inbound::http::enrollments::{AdminEventRequest, DecisionResponse};
use crate::inbound::http::fees::{
    AccountBalanceDto, AddLearnerRequest, FeePaymentDto, LearnerDetailDto, LearnerDto,
    OpenAccountRequest, RecordPaymentRequest,
};
use crate::inbound::http::payments::{PaymentLogDto, WebhookAck};
use crate::inbound::http::pricing::{
    BasePriceDto, CountryPriceDto, CreatePriceRequest, QuoteResponse, UpsertCountryPriceRequest,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::visits::VisitReportDto;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/auth/login or /auth/register.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "AIT Platform API",
        description = "Accounts, subject enrollment, checkout, assessments and school fee administration."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::auth::register,
        crate::inbound::http::auth::login,
        crate::inbound::http::auth::logout,
        crate::inbound::http::auth::current_user,
        crate::inbound::http::subjects::list_subjects,
        crate::inbound::http::enrollments::my_enrollments,
        crate::inbound::http::enrollments::enrollment_decision,
        crate::inbound::http::pricing::quote,
        crate::inbound::http::checkout::start_payfast,
        crate::inbound::http::checkout::start_stripe,
        crate::inbound::http::checkout::cancel_stripe,
        crate::inbound::http::payments::payfast_notify,
        crate::inbound::http::payments::stripe_webhook,
        crate::inbound::http::assessments::list_own_runs,
        crate::inbound::http::assessments::start_run,
        crate::inbound::http::assessments::record_answer,
        crate::inbound::http::assessments::finalize_run,
        crate::inbound::http::assessments::loss_report,
        crate::inbound::http::assessments::reset_run,
        crate::inbound::http::pricing::admin_list_prices,
        crate::inbound::http::pricing::admin_create_price,
        crate::inbound::http::pricing::admin_list_country_prices,
        crate::inbound::http::pricing::admin_upsert_country_price,
        crate::inbound::http::enrollments::admin_list_enrollments,
        crate::inbound::http::enrollments::admin_enrollment_event,
        crate::inbound::http::payments::admin_list_payments,
        crate::inbound::http::assessments::admin_list_runs,
        crate::inbound::http::visits::visit_report,
        crate::inbound::http::fees::fee_balances,
        crate::inbound::http::fees::add_learner,
        crate::inbound::http::fees::learner_detail,
        crate::inbound::http::fees::open_account,
        crate::inbound::http::fees::record_payment,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        UserDto,
        RegisterRequest,
        LoginRequest,
        SubjectDto,
        EnrollmentDto,
        DecisionResponse,
        AdminEventRequest,
        QuoteDto,
        QuoteResponse,
        BasePriceDto,
        CountryPriceDto,
        CreatePriceRequest,
        UpsertCountryPriceRequest,
        StartCheckoutRequest,
        CancelStripeRequest,
        PayFastCheckoutResponse,
        StripeCheckoutResponse,
        WebhookAck,
        PaymentLogDto,
        LossRunDto,
        RunSummaryDto,
        AnswerRequest,
        AnswerRecordedDto,
        LossResultDto,
        LossReportDto,
        VisitReportDto,
        LearnerDto,
        AccountBalanceDto,
        FeePaymentDto,
        LearnerDetailDto,
        AddLearnerRequest,
        OpenAccountRequest,
        RecordPaymentRequest,
    )),
    tags(
        (name = "auth", description = "Registration and session sign-in"),
        (name = "subjects", description = "Subject catalogue"),
        (name = "enrollments", description = "Learner enrollments and registration decisions"),
        (name = "pricing", description = "Price quotes"),
        (name = "checkout", description = "Gateway checkouts"),
        (name = "payments", description = "Gateway callbacks"),
        (name = "assessments", description = "Loss & Adaptation assessment"),
        (name = "admin", description = "Administrator operations"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
