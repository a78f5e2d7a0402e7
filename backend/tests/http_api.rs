//! End-to-end checks of the `/api/v1` surface over fixture repositories.
//!
//! The app is assembled the way the server does it: real domain services,
//! the shared route table, cookie sessions, the visit log and tracing.

use std::sync::Arc;

use actix_session::SessionMiddleware;
use actix_session::storage::CookieSessionStore;
use actix_web::cookie::{Cookie, Key};
use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use mockable::{Clock, DefaultClock};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use ait_backend::Trace;
use ait_backend::domain::ports::{
    FixtureAssessmentRepository, FixtureEnrollmentRepository, FixtureFeeLedgerRepository,
    FixturePaymentRepository, FixturePricingRepository, FixtureSubjectRepository,
    FixtureUserRepository, FixtureVisitRepository, SkipPayFastValidation,
    UnconfiguredStripeGateway,
};
use ait_backend::domain::{
    AccountService, AssessmentService, CheckoutCollaborators, CheckoutService, CheckoutSettings,
    EmailAddress, EnrollmentService, FeeLedgerService, PricingService, SubjectService,
    TRACE_ID_HEADER, VisitService,
};
use ait_backend::inbound::http::configure_api;
use ait_backend::inbound::http::state::HttpState;
use ait_backend::middleware::VisitLog;

const APPROVED_ADMIN: &str = "head@ait.example";

#[fixture]
fn state() -> web::Data<HttpState> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let users = Arc::new(FixtureUserRepository);
    let subjects = Arc::new(FixtureSubjectRepository);
    let subject_service = Arc::new(SubjectService::new(subjects.clone()));
    let enrollment_service = Arc::new(EnrollmentService::new(
        Arc::new(FixtureEnrollmentRepository),
        subjects.clone(),
        clock.clone(),
    ));
    let pricing_service = Arc::new(PricingService::new(
        Arc::new(FixturePricingRepository),
        subjects,
        clock.clone(),
    ));
    let checkout = CheckoutService::new(
        Arc::new(FixturePaymentRepository),
        users.clone(),
        Arc::new(SkipPayFastValidation),
        Arc::new(UnconfiguredStripeGateway),
        CheckoutCollaborators {
            pricing: pricing_service.clone(),
            enrollments: enrollment_service.clone(),
            subjects: subject_service.clone(),
        },
        CheckoutSettings::default(),
        clock.clone(),
    );
    let admins = vec![EmailAddress::parse(APPROVED_ADMIN).expect("admin email")];

    web::Data::new(HttpState {
        accounts: Arc::new(AccountService::new(users, admins)),
        subjects: subject_service,
        enrollments: enrollment_service,
        pricing: pricing_service,
        checkout: Arc::new(checkout),
        assessments: Arc::new(AssessmentService::new(
            Arc::new(FixtureAssessmentRepository),
            clock,
        )),
        visits: Arc::new(VisitService::new(Arc::new(FixtureVisitRepository))),
        fee_ledger: Arc::new(FeeLedgerService::new(Arc::new(FixtureFeeLedgerRepository))),
    })
}

macro_rules! api_app {
    ($state:expr) => {{
        let state: web::Data<HttpState> = $state;
        let session = SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
            .cookie_name("session".to_owned())
            .cookie_secure(false)
            .build();
        test::init_service(
            App::new().app_data(state.clone()).wrap(Trace).service(
                web::scope("/api/v1")
                    .configure(configure_api)
                    .wrap(VisitLog::new(state.visits.clone()))
                    .wrap(session),
            ),
        )
        .await
    }};
}

fn session_cookie(res: &actix_web::dev::ServiceResponse) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

#[rstest]
#[actix_rt::test]
async fn subjects_are_listed_with_a_trace_id(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/subjects").to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key(TRACE_ID_HEADER));
    let body: Value = test::read_body_json(res).await;
    let slugs: Vec<&str> = body
        .as_array()
        .expect("subject array")
        .iter()
        .filter_map(|subject| subject.get("slug").and_then(Value::as_str))
        .collect();
    assert_eq!(slugs, ["loss", "reading"]);
}

#[rstest]
#[actix_rt::test]
async fn approved_admin_registers_and_reads_the_payment_log(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "email": "Head@AIT.example",
                "password": "correct horse battery",
                "role": "learner"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let cookie = session_cookie(&res);
    let user: Value = test::read_body_json(res).await;
    assert_eq!(user.get("role").and_then(Value::as_str), Some("admin"));
    assert_eq!(user.get("email").and_then(Value::as_str), Some(APPROVED_ADMIN));

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/admin/payments?limit=10")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let log: Value = test::read_body_json(res).await;
    assert_eq!(log, json!([]));
}

#[rstest]
#[actix_rt::test]
async fn self_requested_admin_role_is_downgraded(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({
                "email": "eve@ait.example",
                "password": "correct horse battery",
                "role": "admin"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let cookie = session_cookie(&res);
    let user: Value = test::read_body_json(res).await;
    assert_eq!(user.get("role").and_then(Value::as_str), Some("user"));

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/admin/payments")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[rstest]
#[case("/api/v1/admin/payments")]
#[case("/api/v1/admin/fees/balances")]
#[case("/api/v1/admin/visits/report")]
#[case("/api/v1/enrollments/me")]
#[actix_rt::test]
async fn protected_routes_need_a_session(state: web::Data<HttpState>, #[case] uri: &str) {
    let app = api_app!(state);

    let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(
        body.get("code").and_then(Value::as_str),
        Some("unauthorized")
    );
}

#[rstest]
#[actix_rt::test]
async fn unknown_credentials_are_rejected(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({
                "email": "nobody@ait.example",
                "password": "correct horse battery"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_rt::test]
async fn anonymous_quote_uses_the_rand_fallback(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/pricing/quote?subject=loss")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    let quote = body.get("quote").expect("quote");
    assert_eq!(quote.get("currency").and_then(Value::as_str), Some("ZAR"));
    assert_eq!(quote.get("countryCode").and_then(Value::as_str), Some("ZA"));
    let amount = quote.get("amountCents").and_then(Value::as_i64);
    let total = quote.get("totalCents").and_then(Value::as_i64);
    assert!(total >= amount);
}

#[rstest]
#[actix_rt::test]
async fn quote_requires_a_subject(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/pricing/quote")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[actix_rt::test]
async fn stripe_webhook_without_signature_is_rejected(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/payments/stripe/webhook")
            .set_payload(r#"{"type":"checkout.session.completed"}"#)
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[actix_rt::test]
async fn logout_clears_the_session(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/logout")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[rstest]
#[actix_rt::test]
async fn malformed_json_uses_the_error_envelope(state: web::Data<HttpState>) {
    let app = api_app!(state);

    let res = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"email\":")
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let trace_id = res
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(
        body.get("code").and_then(Value::as_str),
        Some("invalid_request")
    );
    assert_eq!(
        body.get("traceId").and_then(Value::as_str).map(str::to_owned),
        trace_id
    );
}
