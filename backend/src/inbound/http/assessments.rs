//! Loss & Adaptation assessment handlers.
//!
//! ```text
//! GET    /api/v1/assessments/loss/runs
//! POST   /api/v1/assessments/loss/runs
//! POST   /api/v1/assessments/loss/runs/{id}/answers {"questionId":3,"answer":"yes"}
//! POST   /api/v1/assessments/loss/runs/{id}/finalize
//! GET    /api/v1/assessments/loss/runs/{id}/report
//! DELETE /api/v1/assessments/loss/runs/{id}
//! GET    /api/v1/admin/assessments/loss/runs
//! ```

use actix_web::{HttpResponse, delete, get, post, web};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::assessment::{
    Answer, Band, CopingLabel, LossReport, LossResult, LossRun, OverallBand, PHASE_COUNT,
    PhaseReport, QuestionId, RunId, RunStatus, RunSummary, Tone,
};
use crate::domain::ports::AnswerRecorded;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldCode, field_error};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LossRunDto {
    pub id: RunId,
    #[schema(example = "LOSS")]
    pub subject: String,
    #[schema(value_type = String, example = "in_progress")]
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&LossRun> for LossRunDto {
    fn from(run: &LossRun) -> Self {
        Self {
            id: run.id,
            subject: run.subject.clone(),
            status: run.status,
            created_at: run.created_at,
            finished_at: run.finished_at,
        }
    }
}

/// A run in a listing, with its running total.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryDto {
    pub id: RunId,
    pub user_id: String,
    #[schema(value_type = String, example = "finished")]
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[schema(example = 17)]
    pub total: i32,
}

impl From<&RunSummary> for RunSummaryDto {
    fn from(summary: &RunSummary) -> Self {
        Self {
            id: summary.run.id,
            user_id: summary.run.user_id.to_string(),
            status: summary.run.status,
            created_at: summary.run.created_at,
            finished_at: summary.run.finished_at,
            total: summary.total,
        }
    }
}

fn summaries(runs: &[RunSummary]) -> Vec<RunSummaryDto> {
    runs.iter().map(RunSummaryDto::from).collect()
}

/// One yes/no answer.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[schema(example = 3)]
    pub question_id: QuestionId,
    /// `yes` or `no`.
    #[schema(example = "yes")]
    pub answer: String,
}

/// Phase totals after the answer was scored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecordedDto {
    pub run_id: RunId,
    pub question_id: QuestionId,
    #[schema(value_type = String, example = "yes")]
    pub answer: Answer,
    pub totals: [i32; PHASE_COUNT],
    pub total: i32,
}

impl From<AnswerRecorded> for AnswerRecordedDto {
    fn from(recorded: AnswerRecorded) -> Self {
        Self {
            run_id: recorded.run_id,
            question_id: recorded.question_id,
            answer: recorded.answer,
            totals: recorded.totals.0,
            total: recorded.totals.total(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LossResultDto {
    pub run_id: RunId,
    pub totals: [i32; PHASE_COUNT],
    pub maxima: Option<[i32; PHASE_COUNT]>,
    pub total: i32,
    pub max_total: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<&LossResult> for LossResultDto {
    fn from(result: &LossResult) -> Self {
        Self {
            run_id: result.run_id,
            totals: result.totals.0,
            maxima: result.maxima.map(|maxima| maxima.0),
            total: result.total,
            max_total: result.max_total,
            created_at: result.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNoteDto {
    #[schema(value_type = String, example = "slightly_positive")]
    pub tone: Tone,
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReportDto {
    #[schema(example = 1)]
    pub phase: u8,
    pub label: &'static str,
    /// Percentage of the phase maximum, one decimal place.
    #[schema(example = 44.4)]
    pub pct: f64,
    #[schema(value_type = String, example = "mid")]
    pub band: Band,
    #[schema(example = "Medium")]
    pub level: &'static str,
    #[schema(value_type = String, example = "Slightly Coping")]
    pub coping: CopingLabel,
    pub items: Vec<String>,
    pub progress: Vec<ProgressNoteDto>,
}

impl From<&PhaseReport> for PhaseReportDto {
    fn from(phase: &PhaseReport) -> Self {
        Self {
            phase: phase.phase,
            label: phase.label,
            pct: phase.pct.to_f64().unwrap_or_default(),
            band: phase.band,
            level: phase.band.level(),
            coping: phase.coping,
            items: phase.items.clone(),
            progress: phase
                .progress
                .iter()
                .map(|note| ProgressNoteDto {
                    tone: note.tone,
                    body: note.body.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverallAssessmentDto {
    #[schema(value_type = String, example = "high")]
    pub band: OverallBand,
    pub label: String,
    pub pct: u8,
    pub summary: String,
    pub bullets: Vec<String>,
    pub key_need: Option<String>,
}

/// Report for a finished run.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LossReportDto {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub phases: Vec<PhaseReportDto>,
    #[schema(value_type = String, example = "Coping")]
    pub adaptive_vector: CopingLabel,
    pub overall: OverallAssessmentDto,
    pub disclaimer: &'static str,
}

impl From<&LossReport> for LossReportDto {
    fn from(report: &LossReport) -> Self {
        let overall = &report.overall;
        Self {
            run_id: report.run_id,
            created_at: report.created_at,
            phases: report.phases.iter().map(PhaseReportDto::from).collect(),
            adaptive_vector: report.adaptive_vector,
            overall: OverallAssessmentDto {
                band: overall.band,
                label: overall.label.clone(),
                pct: overall.pct,
                summary: overall.summary.clone(),
                bullets: overall.bullets.clone(),
                key_need: overall.key_need.clone(),
            },
            disclaimer: report.disclaimer,
        }
    }
}

/// The signed-in user's recent runs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/assessments/loss/runs",
    responses(
        (status = 200, description = "Runs", body = [RunSummaryDto]),
        (status = 401, description = "Not signed in", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "listLossRuns"
)]
#[get("/assessments/loss/runs")]
pub async fn list_own_runs(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<RunSummaryDto>>> {
    let user_id = session.require_user_id()?;
    let runs = state.assessments.list_runs(&user_id).await?;
    Ok(web::Json(summaries(&runs)))
}

/// Recent runs across every user.
#[utoipa::path(
    get,
    path = "/api/v1/admin/assessments/loss/runs",
    responses(
        (status = 200, description = "Runs", body = [RunSummaryDto]),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListLossRuns"
)]
#[get("/admin/assessments/loss/runs")]
pub async fn admin_list_runs(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<RunSummaryDto>>> {
    session.require_admin()?;
    let runs = state.assessments.list_all_runs().await?;
    Ok(web::Json(summaries(&runs)))
}

/// Start a new run for the signed-in user.
#[utoipa::path(
    post,
    path = "/api/v1/assessments/loss/runs",
    responses(
        (status = 201, description = "Run started", body = LossRunDto),
        (status = 401, description = "Not signed in", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "startLossRun"
)]
#[post("/assessments/loss/runs")]
pub async fn start_run(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let run = state.assessments.start_run(&user_id).await?;
    Ok(HttpResponse::Created().json(LossRunDto::from(&run)))
}

/// Score one answer on a run.
#[utoipa::path(
    post,
    path = "/api/v1/assessments/loss/runs/{id}/answers",
    params(("id" = i64, Path, description = "Run id")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerRecordedDto),
        (status = 400, description = "Invalid answer or unknown question", body = ErrorSchema),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown run", body = ErrorSchema),
        (status = 409, description = "Run already finished", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "recordLossAnswer"
)]
#[post("/assessments/loss/runs/{id}/answers")]
pub async fn record_answer(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<RunId>,
    payload: web::Json<AnswerRequest>,
) -> ApiResult<web::Json<AnswerRecordedDto>> {
    let user_id = session.require_user_id()?;
    let body = payload.into_inner();
    let answer = Answer::parse(&body.answer).ok_or_else(|| {
        field_error("answer", FieldCode::Invalid, "answer must be yes or no")
    })?;
    let recorded = state
        .assessments
        .record_answer(&user_id, path.into_inner(), body.question_id, answer)
        .await?;
    Ok(web::Json(recorded.into()))
}

/// Close a run and fix its per-phase maxima.
#[utoipa::path(
    post,
    path = "/api/v1/assessments/loss/runs/{id}/finalize",
    params(("id" = i64, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run finished", body = LossResultDto),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown run", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "finalizeLossRun"
)]
#[post("/assessments/loss/runs/{id}/finalize")]
pub async fn finalize_run(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<RunId>,
) -> ApiResult<web::Json<LossResultDto>> {
    let user_id = session.require_user_id()?;
    let result = state
        .assessments
        .finalize_run(&user_id, path.into_inner())
        .await?;
    Ok(web::Json(LossResultDto::from(&result)))
}

/// Report for a run.
#[utoipa::path(
    get,
    path = "/api/v1/assessments/loss/runs/{id}/report",
    params(("id" = i64, Path, description = "Run id")),
    responses(
        (status = 200, description = "Assessment report", body = LossReportDto),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown run or no result yet", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "lossReport"
)]
#[get("/assessments/loss/runs/{id}/report")]
pub async fn loss_report(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<RunId>,
) -> ApiResult<web::Json<LossReportDto>> {
    let user_id = session.require_user_id()?;
    let report = state.assessments.report(&user_id, path.into_inner()).await?;
    Ok(web::Json(LossReportDto::from(&report)))
}

/// Discard every answer on a run.
#[utoipa::path(
    delete,
    path = "/api/v1/assessments/loss/runs/{id}",
    params(("id" = i64, Path, description = "Run id")),
    responses(
        (status = 204, description = "Run reset"),
        (status = 401, description = "Not signed in", body = ErrorSchema),
        (status = 404, description = "Unknown run", body = ErrorSchema)
    ),
    tags = ["assessments"],
    operation_id = "resetLossRun"
)]
#[delete("/assessments/loss/runs/{id}")]
pub async fn reset_run(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<RunId>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    state
        .assessments
        .reset_run(&user_id, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
