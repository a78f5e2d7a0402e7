//! Subject catalogue.

use actix_web::{get, web};

use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{SubjectDto, map_all};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Active subjects in display order.
#[utoipa::path(
    get,
    path = "/api/v1/subjects",
    responses(
        (status = 200, description = "Active subjects", body = [SubjectDto]),
        (status = 503, description = "Catalogue unavailable", body = ErrorSchema)
    ),
    tags = ["subjects"],
    operation_id = "listSubjects",
    security([])
)]
#[get("/subjects")]
pub async fn list_subjects(state: web::Data<HttpState>) -> ApiResult<web::Json<Vec<SubjectDto>>> {
    let subjects = state.subjects.list_active().await?;
    Ok(web::Json(map_all(&subjects)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    use crate::domain::Subject;
    use crate::domain::ports::MockSubjects;
    use crate::inbound::http::test_utils::{TestPorts, test_app};

    #[actix_web::test]
    async fn lists_subjects_without_a_session() {
        let mut subjects = MockSubjects::new();
        subjects.expect_list_active().returning(|| {
            Ok(vec![Subject {
                id: 1,
                slug: "loss".to_owned(),
                name: "Loss and Adaptation".to_owned(),
                active: true,
                sort_order: 1,
            }])
        });
        let state = TestPorts {
            subjects: Some(subjects),
            ..TestPorts::default()
        }
        .into_state();
        let app = test::init_service(test_app(state).service(list_subjects)).await;

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/subjects").to_request(),
        )
        .await;
        assert_eq!(body[0]["slug"], "loss");
        assert_eq!(body[0]["name"], "Loss and Adaptation");
    }
}
