//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`Accounts`, `Checkout`, ...) are implemented by the domain
//! services and called by inbound adapters. Driven ports (`*Repository`,
//! gateways) are implemented by outbound adapters; each ships a fixture
//! implementation so the server can run without a database.

mod macros;
pub(crate) use macros::define_port_error;

mod accounts;
mod assessment_repository;
mod assessments;
mod checkout;
mod enrollment_repository;
mod enrollments;
mod fee_ledger;
mod fee_ledger_repository;
mod payment_gateways;
mod payment_repository;
mod pricing;
mod pricing_repository;
mod subject_repository;
mod subjects;
mod user_repository;
mod visit_repository;
mod visits;

#[cfg(test)]
pub use accounts::MockAccounts;
pub use accounts::Accounts;
#[cfg(test)]
pub use assessment_repository::MockAssessmentRepository;
pub use assessment_repository::{
    AssessmentRepository, AssessmentRepositoryError, FixtureAssessmentRepository,
};
#[cfg(test)]
pub use assessments::MockAssessments;
pub use assessments::{AnswerRecorded, Assessments};
#[cfg(test)]
pub use checkout::MockCheckout;
pub use checkout::{
    CallbackOutcome, Checkout, CheckoutRequest, PayFastCheckoutStarted,
    PayFastNotificationRequest, StripeCheckoutStarted, StripeWebhookRequest,
};
#[cfg(test)]
pub use enrollment_repository::MockEnrollmentRepository;
pub use enrollment_repository::{
    EnrollmentRepository, EnrollmentRepositoryError, FixtureEnrollmentRepository,
};
#[cfg(test)]
pub use enrollments::MockEnrollments;
pub use enrollments::{EnrollmentDecision, Enrollments};
#[cfg(test)]
pub use fee_ledger::MockFeeLedger;
pub use fee_ledger::FeeLedger;
#[cfg(test)]
pub use fee_ledger_repository::MockFeeLedgerRepository;
pub use fee_ledger_repository::{
    FeeLedgerRepository, FeeLedgerRepositoryError, FixtureFeeLedgerRepository,
};
#[cfg(test)]
pub use payment_gateways::{MockPayFastValidator, MockStripeGateway};
pub use payment_gateways::{
    PayFastValidator, PaymentGatewayError, SkipPayFastValidation, StripeGateway,
    UnconfiguredStripeGateway,
};
#[cfg(test)]
pub use payment_repository::MockPaymentRepository;
pub use payment_repository::{FixturePaymentRepository, PaymentRepository, PaymentRepositoryError};
#[cfg(test)]
pub use pricing::MockPricing;
pub use pricing::{CountryPriceRequest, Pricing, QuoteRequest, SubjectQuote};
#[cfg(test)]
pub use pricing_repository::MockPricingRepository;
pub use pricing_repository::{FixturePricingRepository, PricingRepository, PricingRepositoryError};
#[cfg(test)]
pub use subject_repository::MockSubjectRepository;
pub use subject_repository::{
    FixtureSubjectRepository, SubjectRepository, SubjectRepositoryError,
};
#[cfg(test)]
pub use subjects::MockSubjects;
pub use subjects::Subjects;
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{
    FixtureUserRepository, NewUser, StoredCredentials, UserPersistenceError, UserRepository,
};
#[cfg(test)]
pub use visit_repository::MockVisitRepository;
pub use visit_repository::{
    FixtureVisitRepository, VisitCounts, VisitRepository, VisitRepositoryError,
};
#[cfg(test)]
pub use visits::MockVisits;
pub use visits::Visits;
