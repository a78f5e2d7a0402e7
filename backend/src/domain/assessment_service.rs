//! Loss & Adaptation assessment service.
//!
//! Scores answers through the scoring table, closes runs with their
//! per-phase maxima and renders reports. Every use-case checks that the run
//! belongs to the caller; other users' runs read as missing.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info};

use crate::domain::assessment::{
    Answer, LossReport, LossResult, LossRun, QuestionId, RUN_LIST_LIMIT, ReportContentImport,
    RunId, RunStatus, RunSummary, ScoringRow, build_report, phase_maxima, weights_for,
};
use crate::domain::ports::{
    AnswerRecorded, AssessmentRepository, AssessmentRepositoryError, Assessments,
};
use crate::domain::{Error, UserId};

fn map_assessment_error(error: AssessmentRepositoryError) -> Error {
    match error {
        AssessmentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("assessment repository unavailable: {message}"))
        }
        AssessmentRepositoryError::Query { message } => {
            Error::internal(format!("assessment repository error: {message}"))
        }
        AssessmentRepositoryError::Contention { message } => Error::conflict(format!(
            "the run is being updated elsewhere, try again: {message}"
        )),
    }
}

/// Assessment service implementing the [`Assessments`] port.
#[derive(Clone)]
pub struct AssessmentService<A> {
    runs: Arc<A>,
    clock: Arc<dyn Clock>,
}

impl<A> AssessmentService<A> {
    pub fn new(runs: Arc<A>, clock: Arc<dyn Clock>) -> Self {
        Self { runs, clock }
    }
}

impl<A> AssessmentService<A>
where
    A: AssessmentRepository,
{
    async fn owned_run(&self, user_id: &UserId, run_id: RunId) -> Result<LossRun, Error> {
        self.runs
            .find_run(run_id)
            .await
            .map_err(map_assessment_error)?
            .filter(|run| run.user_id == *user_id)
            .ok_or_else(|| Error::not_found(format!("assessment run {run_id} not found")))
    }
}

#[async_trait]
impl<A> Assessments for AssessmentService<A>
where
    A: AssessmentRepository,
{
    async fn start_run(&self, user_id: &UserId) -> Result<LossRun, Error> {
        let run = self
            .runs
            .create_run(user_id)
            .await
            .map_err(map_assessment_error)?;
        info!(run_id = run.id, %user_id, "assessment run started");
        Ok(run)
    }

    async fn list_runs(&self, user_id: &UserId) -> Result<Vec<RunSummary>, Error> {
        self.runs
            .list_runs(Some(*user_id), RUN_LIST_LIMIT)
            .await
            .map_err(map_assessment_error)
    }

    async fn list_all_runs(&self) -> Result<Vec<RunSummary>, Error> {
        self.runs
            .list_runs(None, RUN_LIST_LIMIT)
            .await
            .map_err(map_assessment_error)
    }

    async fn record_answer(
        &self,
        user_id: &UserId,
        run_id: RunId,
        question_id: QuestionId,
        answer: Answer,
    ) -> Result<AnswerRecorded, Error> {
        let run = self.owned_run(user_id, run_id).await?;
        if run.status == RunStatus::Finished {
            return Err(Error::conflict("the run is finished; reset it to answer again"));
        }
        let rows = self
            .runs
            .scoring_rows(question_id)
            .await
            .map_err(map_assessment_error)?;
        let weights = weights_for(&rows, question_id, answer).ok_or_else(|| {
            Error::invalid_request(format!("question {question_id} has no scoring for {answer}"))
        })?;

        let totals = self
            .runs
            .record_answer(&run, question_id, answer, weights)
            .await
            .map_err(map_assessment_error)?;
        debug!(run_id, question_id, %answer, "answer recorded");
        Ok(AnswerRecorded {
            run_id,
            question_id,
            answer,
            totals,
        })
    }

    async fn finalize_run(&self, user_id: &UserId, run_id: RunId) -> Result<LossResult, Error> {
        let run = self.owned_run(user_id, run_id).await?;
        if run.status == RunStatus::Finished
            && let Some(result) = self.runs.result(run_id).await.map_err(map_assessment_error)?
        {
            return Ok(result);
        }

        let rows = self
            .runs
            .answered_scoring_rows(run_id)
            .await
            .map_err(map_assessment_error)?;
        if rows.is_empty() {
            return Err(Error::conflict("answer at least one question before finishing"));
        }
        let result = self
            .runs
            .finalize(&run, phase_maxima(&rows), self.clock.utc())
            .await
            .map_err(map_assessment_error)?;
        info!(run_id, total = result.total, max_total = ?result.max_total, "assessment run finished");
        Ok(result)
    }

    async fn reset_run(&self, user_id: &UserId, run_id: RunId) -> Result<(), Error> {
        self.owned_run(user_id, run_id).await?;
        self.runs.reset(run_id).await.map_err(map_assessment_error)?;
        info!(run_id, "assessment run reset");
        Ok(())
    }

    async fn report(&self, user_id: &UserId, run_id: RunId) -> Result<LossReport, Error> {
        self.owned_run(user_id, run_id).await?;
        let result = self
            .runs
            .result(run_id)
            .await
            .map_err(map_assessment_error)?
            .ok_or_else(|| Error::not_found(format!("run {run_id} has no answers yet")))?;
        let content = self
            .runs
            .report_content()
            .await
            .map_err(map_assessment_error)?;
        Ok(build_report(&result, &content))
    }

    async fn import_scoring_map(&self, rows: Vec<ScoringRow>) -> Result<usize, Error> {
        if rows.is_empty() {
            return Err(Error::invalid_request("the scoring map has no rows"));
        }
        let stored = self
            .runs
            .replace_scoring_map(&rows)
            .await
            .map_err(map_assessment_error)?;
        info!(rows = stored, "scoring map replaced");
        Ok(stored)
    }

    async fn import_report_content(&self, content: ReportContentImport) -> Result<usize, Error> {
        if content.is_empty() {
            return Err(Error::invalid_request("no report copy was supplied"));
        }
        let stored = self
            .runs
            .replace_report_content(&content)
            .await
            .map_err(map_assessment_error)?;
        info!(rows = stored, "report copy replaced");
        Ok(stored)
    }
}
