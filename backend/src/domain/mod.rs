//! Domain primitives, aggregates and services.
//!
//! Purpose: define the strongly typed entities of the learning platform
//! (accounts, subjects, enrollments, prices, payments, assessments, visits
//! and the fee ledger) and the services that implement the driving ports.
//! Adapters live in `inbound` and `outbound`; nothing here touches HTTP or
//! SQL directly.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - User (alias to `user::User`) — account identity, email and role.
//! - Enrollment (alias to `enrollment::Enrollment`) — a learner's place on a
//!   subject, driven by the transition table in [`enrollment::transition`].
//! - Quote (alias to `pricing::Quote`) — the amount a learner is charged.

pub mod assessment;
pub mod auth;
pub mod enrollment;
pub mod error;
pub mod fees;
pub mod payments;
pub mod ports;
pub mod pricing;
pub mod subject;
pub mod trace_id;
pub mod user;
pub mod visit;

mod account_service;
mod assessment_service;
mod checkout_service;
mod enrollment_service;
mod fee_ledger_service;
mod pricing_service;
mod subject_service;
mod visit_service;

#[cfg(test)]
pub(crate) mod fixture_clock;

pub use self::account_service::AccountService;
pub use self::assessment_service::AssessmentService;
pub use self::auth::{
    LoginCredentials, LoginValidationError, PASSWORD_MIN_LEN, Registration, hash_password,
    verify_password,
};
pub use self::checkout_service::{
    CheckoutCollaborators, CheckoutService, CheckoutSettings, PAYMENT_LIST_MAX,
};
pub use self::enrollment::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus, EnrollmentWrite, LockedQuote,
    PRICE_VERSION, RegistrationDecision, TransitionRejected, transition,
};
pub use self::enrollment_service::EnrollmentService;
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::fee_ledger_service::FeeLedgerService;
pub use self::payments::{NewPaymentLog, PaymentLogEntry, PaymentProvider, PaymentStatus};
pub use self::pricing::{
    BasePrice, CountryCurrency, CountryPrice, NewBasePrice, Quote, QuoteSource, format_money,
};
pub use self::pricing_service::PricingService;
pub use self::subject::{Subject, SubjectId};
pub use self::subject_service::SubjectService;
pub use self::trace_id::TraceId;
pub use self::user::{DisplayName, EmailAddress, Role, User, UserId, UserValidationError};
pub use self::visit_service::VisitService;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use ait_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
