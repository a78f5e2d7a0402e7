//! Enrollment handlers for learners and administrators.
//!
//! ```text
//! GET  /api/v1/enrollments/me
//! GET  /api/v1/enrollments/decision?subject=loss
//! GET  /api/v1/admin/enrollments?status=pending
//! POST /api/v1/admin/enrollments/{id}/events {"event":"revoked"}
//! ```

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{EnrollmentEvent, EnrollmentStatus, RegistrationDecision};
use crate::domain::ports::EnrollmentDecision;
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{EnrollmentDto, SubjectDto, map_all};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldCode, field_error};

/// What the learner should do next for a subject.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    #[schema(value_type = String, example = "start_checkout")]
    pub decision: RegistrationDecision,
    pub subject: Option<SubjectDto>,
    pub enrollment: Option<EnrollmentDto>,
}

impl From<EnrollmentDecision> for DecisionResponse {
    fn from(value: EnrollmentDecision) -> Self {
        Self {
            decision: value.decision,
            subject: value.subject.as_ref().map(SubjectDto::from),
            enrollment: value.enrollment.as_ref().map(EnrollmentDto::from),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DecisionQuery {
    /// Subject slug or name.
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// `pending`, `active` or `inactive`.
    pub status: Option<String>,
}

/// Administrative transition request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminEventRequest {
    /// `free_grant`, `revoked` or `reinstated`.
    #[schema(value_type = String, example = "revoked")]
    pub event: EnrollmentEvent,
}

/// Enrollments of the signed-in user.
#[utoipa::path(
    get,
    path = "/api/v1/enrollments/me",
    responses(
        (status = 200, description = "Own enrollments", body = [EnrollmentDto]),
        (status = 401, description = "Not signed in", body = ErrorSchema)
    ),
    tags = ["enrollments"],
    operation_id = "listMyEnrollments"
)]
#[get("/enrollments/me")]
pub async fn my_enrollments(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<EnrollmentDto>>> {
    let user_id = session.require_user_id()?;
    let enrollments = state.enrollments.list_for_user(&user_id).await?;
    Ok(web::Json(map_all(&enrollments)))
}

/// Registration decision for the requested subject.
#[utoipa::path(
    get,
    path = "/api/v1/enrollments/decision",
    params(DecisionQuery),
    responses(
        (status = 200, description = "Next step", body = DecisionResponse),
        (status = 401, description = "Not signed in", body = ErrorSchema)
    ),
    tags = ["enrollments"],
    operation_id = "enrollmentDecision"
)]
#[get("/enrollments/decision")]
pub async fn enrollment_decision(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<DecisionQuery>,
) -> ApiResult<web::Json<DecisionResponse>> {
    let user_id = session.require_user_id()?;
    let decision = state
        .enrollments
        .decide(&user_id, query.into_inner().subject)
        .await?;
    Ok(web::Json(decision.into()))
}

/// All enrollments, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/v1/admin/enrollments",
    params(StatusQuery),
    responses(
        (status = 200, description = "Enrollments", body = [EnrollmentDto]),
        (status = 400, description = "Unknown status", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListEnrollments"
)]
#[get("/admin/enrollments")]
pub async fn admin_list_enrollments(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<StatusQuery>,
) -> ApiResult<web::Json<Vec<EnrollmentDto>>> {
    session.require_admin()?;
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(EnrollmentStatus::parse(raw).ok_or_else(|| {
            field_error("status", FieldCode::Invalid, format!("unknown status: {raw}"))
        })?),
    };
    let enrollments = state.enrollments.list(status).await?;
    Ok(web::Json(map_all(&enrollments)))
}

/// Grant, revoke or reinstate an enrollment.
#[utoipa::path(
    post,
    path = "/api/v1/admin/enrollments/{id}/events",
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = AdminEventRequest,
    responses(
        (status = 200, description = "Updated enrollment", body = EnrollmentDto),
        (status = 400, description = "Event not allowed", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown enrollment", body = ErrorSchema),
        (status = 409, description = "Transition rejected", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminEnrollmentEvent"
)]
#[post("/admin/enrollments/{id}/events")]
pub async fn admin_enrollment_event(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
    payload: web::Json<AdminEventRequest>,
) -> ApiResult<web::Json<EnrollmentDto>> {
    session.require_admin()?;
    let enrollment = state
        .enrollments
        .apply_admin_event(path.into_inner(), payload.event)
        .await?;
    Ok(web::Json(EnrollmentDto::from(&enrollment)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use serde_json::{Value, json};

    use crate::domain::Role;
    use crate::domain::ports::MockEnrollments;
    use crate::domain::{Enrollment, Subject};
    use crate::inbound::http::test_utils::{TestPorts, fixture_user_id, login_as, test_app};

    fn enrollment(status: EnrollmentStatus) -> Enrollment {
        let at = Utc
            .with_ymd_and_hms(2025, 2, 1, 8, 0, 0)
            .single()
            .expect("timestamp");
        Enrollment {
            id: 7,
            user_id: fixture_user_id(),
            subject_id: 1,
            status,
            payment_pending: status == EnrollmentStatus::Pending,
            quote: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn state(enrollments: MockEnrollments) -> actix_web::web::Data<HttpState> {
        TestPorts {
            enrollments: Some(enrollments),
            ..TestPorts::default()
        }
        .into_state()
    }

    #[actix_web::test]
    async fn decision_reports_resume_checkout() {
        let mut enrollments = MockEnrollments::new();
        enrollments
            .expect_decide()
            .withf(|_, subject| subject.as_deref() == Some("loss"))
            .returning(|_, _| {
                Ok(EnrollmentDecision {
                    decision: RegistrationDecision::ResumeCheckout,
                    subject: Some(Subject {
                        id: 1,
                        slug: "loss".to_owned(),
                        name: "Loss and Adaptation".to_owned(),
                        active: true,
                        sort_order: 1,
                    }),
                    enrollment: Some(enrollment(EnrollmentStatus::Pending)),
                })
            });
        let app = test::init_service(test_app(state(enrollments)).service(enrollment_decision)).await;
        let cookie = login_as(&app, Role::Learner).await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/enrollments/decision?subject=loss")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(body["decision"], "resume_checkout");
        assert_eq!(body["enrollment"]["status"], "pending");
        assert_eq!(body["enrollment"]["paymentPending"], true);
    }

    #[actix_web::test]
    async fn admin_routes_reject_learners() {
        let mut enrollments = MockEnrollments::new();
        enrollments.expect_list().times(0);
        let app =
            test::init_service(test_app(state(enrollments)).service(admin_list_enrollments)).await;
        let cookie = login_as(&app, Role::Learner).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/admin/enrollments")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn admin_status_filter_is_parsed() {
        let mut enrollments = MockEnrollments::new();
        enrollments
            .expect_list()
            .with(eq(Some(EnrollmentStatus::Active)))
            .returning(|_| Ok(vec![enrollment(EnrollmentStatus::Active)]));
        let app =
            test::init_service(test_app(state(enrollments)).service(admin_list_enrollments)).await;
        let cookie = login_as(&app, Role::Admin).await;
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/admin/enrollments?status=paid")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(body[0]["status"], "active");
    }

    #[actix_web::test]
    async fn admin_events_are_forwarded() {
        let mut enrollments = MockEnrollments::new();
        enrollments
            .expect_apply_admin_event()
            .with(eq(7_i64), eq(EnrollmentEvent::Revoked))
            .returning(|_, _| Ok(enrollment(EnrollmentStatus::Inactive)));
        let app =
            test::init_service(test_app(state(enrollments)).service(admin_enrollment_event)).await;
        let cookie = login_as(&app, Role::Admin).await;
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/admin/enrollments/7/events")
                .cookie(cookie)
                .set_json(json!({ "event": "revoked" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["status"], "inactive");
    }
}
