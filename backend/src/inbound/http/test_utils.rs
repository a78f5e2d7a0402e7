//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpResponse, web};
use chrono::{TimeZone, Utc};

use crate::domain::ports::{
    MockAccounts, MockAssessments, MockCheckout, MockEnrollments, MockFeeLedger, MockPricing,
    MockSubjects, MockVisits,
};
use crate::domain::{DisplayName, EmailAddress, Error, Role, User, UserId};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

pub const FIXTURE_USER_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

/// Build a session middleware configured for tests.
///
/// Generates a fresh key per invocation, names the cookie `session` and
/// disables the `Secure` flag for plain HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// A user with the fixture id and the given role.
pub fn fixture_user(role: Role) -> User {
    User {
        id: fixture_user_id(),
        email: EmailAddress::parse("ada@example.com").expect("fixture email"),
        display_name: DisplayName::new("Ada Lovelace").expect("fixture name"),
        role,
        active: true,
        created_at: Utc
            .with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
            .single()
            .expect("fixture timestamp"),
    }
}

pub fn fixture_user_id() -> UserId {
    UserId::new(FIXTURE_USER_ID).expect("fixture id")
}

/// Mocks for each driving port; unset ports get a mock with no
/// expectations, so any call fails the test.
#[derive(Default)]
pub struct TestPorts {
    pub accounts: Option<MockAccounts>,
    pub subjects: Option<MockSubjects>,
    pub enrollments: Option<MockEnrollments>,
    pub pricing: Option<MockPricing>,
    pub checkout: Option<MockCheckout>,
    pub assessments: Option<MockAssessments>,
    pub visits: Option<MockVisits>,
    pub fee_ledger: Option<MockFeeLedger>,
}

impl TestPorts {
    pub fn into_state(self) -> web::Data<HttpState> {
        web::Data::new(HttpState {
            accounts: Arc::new(self.accounts.unwrap_or_default()),
            subjects: Arc::new(self.subjects.unwrap_or_default()),
            enrollments: Arc::new(self.enrollments.unwrap_or_default()),
            pricing: Arc::new(self.pricing.unwrap_or_default()),
            checkout: Arc::new(self.checkout.unwrap_or_default()),
            assessments: Arc::new(self.assessments.unwrap_or_default()),
            visits: Arc::new(self.visits.unwrap_or_default()),
            fee_ledger: Arc::new(self.fee_ledger.unwrap_or_default()),
        })
    }
}

async fn sign_in(session: SessionContext, role: web::Path<String>) -> Result<HttpResponse, Error> {
    session.persist_user(&fixture_user(Role::normalise(&role)))?;
    Ok(HttpResponse::Ok().finish())
}

/// App with test sessions, the given state, and `GET /test-login/{role}`
/// which signs in the fixture user with that role.
pub fn test_app(
    state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state)
        .wrap(test_session_middleware())
        .route("/test-login/{role}", web::get().to(sign_in))
}

/// The `session` cookie set by a response.
pub fn session_cookie(res: &ServiceResponse) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Sign in through `/test-login/{role}` and return the cookie.
pub async fn login_as<S>(app: &S, role: Role) -> Cookie<'static>
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let res = actix_web::test::call_service(
        app,
        actix_web::test::TestRequest::get()
            .uri(&format!("/test-login/{role}"))
            .to_request(),
    )
    .await;
    session_cookie(&res)
}
