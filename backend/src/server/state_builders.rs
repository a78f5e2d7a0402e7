//! Builders for HTTP state: domain services over Diesel or fixture
//! repositories.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};

use ait_backend::domain::ports::{
    AssessmentRepository, EnrollmentRepository, FeeLedgerRepository, FixtureAssessmentRepository,
    FixtureEnrollmentRepository, FixtureFeeLedgerRepository, FixturePaymentRepository,
    FixturePricingRepository, FixtureSubjectRepository, FixtureUserRepository,
    FixtureVisitRepository, PaymentRepository, PricingRepository, SubjectRepository,
    UserRepository, VisitRepository,
};
use ait_backend::domain::{
    AccountService, AssessmentService, CheckoutCollaborators, CheckoutService, EnrollmentService,
    FeeLedgerService, PricingService, SubjectService, VisitService,
};
use ait_backend::inbound::http::state::HttpState;
use ait_backend::outbound::persistence::{
    DbPool, DieselAssessmentRepository, DieselEnrollmentRepository, DieselFeeLedgerRepository,
    DieselPaymentRepository, DieselPricingRepository, DieselSubjectRepository,
    DieselUserRepository, DieselVisitRepository,
};

use super::ServerConfig;

/// One repository per driven port.
struct Repositories<U, S, E, P, M, A, V, F> {
    users: Arc<U>,
    subjects: Arc<S>,
    enrollments: Arc<E>,
    prices: Arc<P>,
    payments: Arc<M>,
    assessments: Arc<A>,
    visits: Arc<V>,
    fees: Arc<F>,
}

type DieselRepositories = Repositories<
    DieselUserRepository,
    DieselSubjectRepository,
    DieselEnrollmentRepository,
    DieselPricingRepository,
    DieselPaymentRepository,
    DieselAssessmentRepository,
    DieselVisitRepository,
    DieselFeeLedgerRepository,
>;

type FixtureRepositories = Repositories<
    FixtureUserRepository,
    FixtureSubjectRepository,
    FixtureEnrollmentRepository,
    FixturePricingRepository,
    FixturePaymentRepository,
    FixtureAssessmentRepository,
    FixtureVisitRepository,
    FixtureFeeLedgerRepository,
>;

impl DieselRepositories {
    fn diesel(pool: &DbPool) -> Self {
        Self {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            subjects: Arc::new(DieselSubjectRepository::new(pool.clone())),
            enrollments: Arc::new(DieselEnrollmentRepository::new(pool.clone())),
            prices: Arc::new(DieselPricingRepository::new(pool.clone())),
            payments: Arc::new(DieselPaymentRepository::new(pool.clone())),
            assessments: Arc::new(DieselAssessmentRepository::new(pool.clone())),
            visits: Arc::new(DieselVisitRepository::new(pool.clone())),
            fees: Arc::new(DieselFeeLedgerRepository::new(pool.clone())),
        }
    }
}

impl FixtureRepositories {
    fn fixtures() -> Self {
        Self {
            users: Arc::new(FixtureUserRepository),
            subjects: Arc::new(FixtureSubjectRepository),
            enrollments: Arc::new(FixtureEnrollmentRepository),
            prices: Arc::new(FixturePricingRepository),
            payments: Arc::new(FixturePaymentRepository),
            assessments: Arc::new(FixtureAssessmentRepository),
            visits: Arc::new(FixtureVisitRepository),
            fees: Arc::new(FixtureFeeLedgerRepository),
        }
    }
}

/// Compose every driving port from one repository set.
fn assemble<U, S, E, P, M, A, V, F>(
    repos: Repositories<U, S, E, P, M, A, V, F>,
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> HttpState
where
    U: UserRepository + 'static,
    S: SubjectRepository + 'static,
    E: EnrollmentRepository + 'static,
    P: PricingRepository + 'static,
    M: PaymentRepository + 'static,
    A: AssessmentRepository + 'static,
    V: VisitRepository + 'static,
    F: FeeLedgerRepository + 'static,
{
    let Repositories {
        users,
        subjects,
        enrollments,
        prices,
        payments,
        assessments,
        visits,
        fees,
    } = repos;

    let subject_service = Arc::new(SubjectService::new(subjects.clone()));
    let enrollment_service = Arc::new(EnrollmentService::new(
        enrollments,
        subjects.clone(),
        clock.clone(),
    ));
    let pricing_service = Arc::new(PricingService::new(prices, subjects, clock.clone()));
    let checkout = CheckoutService::new(
        payments,
        users.clone(),
        config.payfast_validator.clone(),
        config.stripe.clone(),
        CheckoutCollaborators {
            pricing: pricing_service.clone(),
            enrollments: enrollment_service.clone(),
            subjects: subject_service.clone(),
        },
        config.checkout.clone(),
        clock.clone(),
    );

    HttpState {
        accounts: Arc::new(AccountService::new(users, config.approved_admins.clone())),
        subjects: subject_service,
        enrollments: enrollment_service,
        pricing: pricing_service,
        checkout: Arc::new(checkout),
        assessments: Arc::new(AssessmentService::new(assessments, clock)),
        visits: Arc::new(VisitService::new(visits)),
        fee_ledger: Arc::new(FeeLedgerService::new(fees)),
    }
}

/// Build the shared HTTP state, using Diesel repositories when a pool is
/// configured and fixtures otherwise.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let state = match &config.db_pool {
        Some(pool) => assemble(DieselRepositories::diesel(pool), config, clock),
        None => assemble(FixtureRepositories::fixtures(), config, clock),
    };
    web::Data::new(state)
}
