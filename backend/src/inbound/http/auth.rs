//! Account handlers.
//!
//! ```text
//! POST /api/v1/auth/register {"email":"ada@example.com","password":"correct horse"}
//! POST /api/v1/auth/login    {"email":"ada@example.com","password":"correct horse"}
//! POST /api/v1/auth/logout
//! GET  /api/v1/auth/me
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{LoginCredentials, Registration};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::UserDto;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::login_error;

/// Registration body. `role` is advisory; admin is never self-assigned.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "correct horse")]
    pub password: String,
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    #[schema(example = "learner")]
    pub role: Option<String>,
}

/// Login body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "correct horse")]
    pub password: String,
}

/// Create an account and sign it in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserDto),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Email already registered", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let body = payload.into_inner();
    let registration = Registration::try_from_parts(
        &body.email,
        &body.password,
        body.name.as_deref(),
        body.role.as_deref(),
    )
    .map_err(login_error)?;
    let user = state.accounts.register(registration).await?;
    session.persist_user(&user)?;
    info!(user_id = %user.id, role = %user.role, "account registered");
    Ok(HttpResponse::Created().json(UserDto::from(&user)))
}

/// Authenticate and establish a session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login success", body = UserDto,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 401, description = "Invalid credentials", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let credentials = LoginCredentials::try_from_parts(&payload.email, &payload.password)
        .map_err(login_error)?;
    let user = state.accounts.authenticate(&credentials).await?;
    session.persist_user(&user)?;
    Ok(HttpResponse::Ok().json(UserDto::from(&user)))
}

/// Clear the session cookie.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Session cleared")),
    tags = ["auth"],
    operation_id = "logout"
)]
#[post("/auth/logout")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.clear();
    HttpResponse::NoContent().finish()
}

/// The signed-in user.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Not signed in", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "currentUser"
)]
#[get("/auth/me")]
pub async fn current_user(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<UserDto>> {
    let user_id = session.require_user_id()?;
    let user = state.accounts.current_user(&user_id).await?;
    Ok(web::Json(UserDto::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use rstest::rstest;
    use serde_json::{Value, json};

    use crate::domain::Role;
    use crate::domain::ports::MockAccounts;
    use crate::inbound::http::test_utils::{TestPorts, fixture_user, session_cookie};

    fn app_state(accounts: MockAccounts) -> web::Data<HttpState> {
        TestPorts {
            accounts: Some(accounts),
            ..TestPorts::default()
        }
        .into_state()
    }

    #[actix_web::test]
    async fn login_sets_a_session_for_me() {
        let mut accounts = MockAccounts::new();
        accounts
            .expect_authenticate()
            .withf(|creds| creds.email().as_ref() == "ada@example.com")
            .returning(|_| Ok(fixture_user(Role::Learner)));
        accounts
            .expect_current_user()
            .returning(|_| Ok(fixture_user(Role::Learner)));
        let app = test::init_service(
            crate::inbound::http::test_utils::test_app(app_state(accounts))
                .service(login)
                .service(current_user),
        )
        .await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .set_json(json!({ "email": "Ada@Example.com", "password": "secret-pass" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = session_cookie(&res);

        let me = test::call_service(
            &app,
            test::TestRequest::get().uri("/auth/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(me.status(), StatusCode::OK);
        let body: Value = test::read_body_json(me).await;
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["role"], "learner");
    }

    #[rstest]
    #[case(json!({ "email": "nope", "password": "secret-pass" }), "email")]
    #[case(json!({ "email": "ada@example.com", "password": "short" }), "password")]
    #[actix_rt::test]
    async fn register_validates_before_calling_the_port(
        #[case] payload: Value,
        #[case] field: &str,
    ) {
        let mut accounts = MockAccounts::new();
        accounts.expect_register().times(0);
        let app = test::init_service(
            crate::inbound::http::test_utils::test_app(app_state(accounts)).service(register),
        )
        .await;
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .set_json(payload)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["details"]["field"], field);
    }

    #[actix_web::test]
    async fn me_requires_a_session() {
        let app = test::init_service(
            crate::inbound::http::test_utils::test_app(app_state(MockAccounts::new()))
                .service(current_user),
        )
        .await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/auth/me").to_request())
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
