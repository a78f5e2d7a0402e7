//! Daily visit report for administrators.
//!
//! ```text
//! GET /api/v1/admin/visits/report?date=2025-03-04
//! ```

use actix_web::{get, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::visit::VisitReport;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::parse_date;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// UTC day as `YYYY-MM-DD`; today when omitted.
    pub date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PathHitsDto {
    #[schema(example = "/api/v1/subjects")]
    pub path: String,
    pub hits: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitReportDto {
    pub date: NaiveDate,
    pub total_hits: i64,
    pub unique_visitors: i64,
    pub top_paths: Vec<PathHitsDto>,
}

impl From<VisitReport> for VisitReportDto {
    fn from(report: VisitReport) -> Self {
        Self {
            date: report.date,
            total_hits: report.total_hits,
            unique_visitors: report.unique_visitors,
            top_paths: report
                .top_paths
                .into_iter()
                .map(|row| PathHitsDto {
                    path: row.path,
                    hits: row.hits,
                })
                .collect(),
        }
    }
}

/// Hits, unique visitors and the busiest paths for one day.
#[utoipa::path(
    get,
    path = "/api/v1/admin/visits/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Visit report", body = VisitReportDto),
        (status = 400, description = "Malformed date", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminVisitReport"
)]
#[get("/admin/visits/report")]
pub async fn visit_report(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<ReportQuery>,
) -> ApiResult<web::Json<VisitReportDto>> {
    session.require_admin()?;
    let date = match query.date.as_deref().map(str::trim) {
        None | Some("") => Utc::now().date_naive(),
        Some(raw) => parse_date("date", raw)?,
    };
    let report = state.visits.daily_report(date).await?;
    Ok(web::Json(report.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use mockall::predicate::eq;
    use serde_json::Value;

    use crate::domain::Role;
    use crate::domain::ports::MockVisits;
    use crate::domain::visit::PathHits;
    use crate::inbound::http::test_utils::{TestPorts, login_as, test_app};

    fn state(visits: MockVisits) -> actix_web::web::Data<HttpState> {
        TestPorts {
            visits: Some(visits),
            ..TestPorts::default()
        }
        .into_state()
    }

    #[actix_web::test]
    async fn reports_the_requested_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 4).expect("date");
        let mut visits = MockVisits::new();
        visits.expect_daily_report().with(eq(day)).returning(|date| {
            Ok(VisitReport {
                date,
                total_hits: 12,
                unique_visitors: 5,
                top_paths: vec![PathHits {
                    path: "/api/v1/subjects".to_owned(),
                    hits: 7,
                }],
            })
        });
        let app = test::init_service(test_app(state(visits)).service(visit_report)).await;
        let cookie = login_as(&app, Role::Admin).await;
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/admin/visits/report?date=2025-03-04")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(body["date"], "2025-03-04");
        assert_eq!(body["uniqueVisitors"], 5);
        assert_eq!(body["topPaths"][0]["hits"], 7);
    }

    #[actix_web::test]
    async fn malformed_dates_are_rejected() {
        let mut visits = MockVisits::new();
        visits.expect_daily_report().times(0);
        let app = test::init_service(test_app(state(visits)).service(visit_report)).await;
        let cookie = login_as(&app, Role::Admin).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/admin/visits/report?date=04/03/2025")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
