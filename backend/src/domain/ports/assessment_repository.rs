//! Port for Loss assessment runs, scorecards and report copy.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::assessment::{
    Answer, LOSS_SUBJECT, LossResult, LossRun, PhaseScores, QuestionId, ReportContent,
    ReportContentImport, RunId, RunStatus, RunSummary, ScoringRow,
};
use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by assessment repository adapters.
    pub enum AssessmentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "assessment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "assessment repository query failed: {message}",
        /// The transaction lost a lock or serialization race.
        Contention { message: String } =>
            "assessment repository contention: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Open a new run for a user.
    async fn create_run(&self, user_id: &UserId) -> Result<LossRun, AssessmentRepositoryError>;

    /// Fetch a run.
    async fn find_run(&self, run_id: RunId) -> Result<Option<LossRun>, AssessmentRepositoryError>;

    /// Newest runs first, limited to one user when `user_id` is set.
    async fn list_runs(
        &self,
        user_id: Option<UserId>,
        limit: i64,
    ) -> Result<Vec<RunSummary>, AssessmentRepositoryError>;

    /// Scoring rows (both answers) for one question.
    async fn scoring_rows(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError>;

    /// Record an answer in one transaction.
    ///
    /// Upserts the response and the scorecard row for the question, then
    /// recomputes the run's totals as the sum over its scorecard and
    /// returns them.
    async fn record_answer(
        &self,
        run: &LossRun,
        question_id: QuestionId,
        answer: Answer,
        weights: PhaseScores,
    ) -> Result<PhaseScores, AssessmentRepositoryError>;

    /// Scoring rows (both answers) for every question the run has answered.
    async fn answered_scoring_rows(
        &self,
        run_id: RunId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError>;

    /// Store per-phase maxima and mark the run finished.
    async fn finalize(
        &self,
        run: &LossRun,
        maxima: PhaseScores,
        finished_at: DateTime<Utc>,
    ) -> Result<LossResult, AssessmentRepositoryError>;

    /// Delete the run's responses, scorecards and result.
    async fn reset(&self, run_id: RunId) -> Result<(), AssessmentRepositoryError>;

    /// Accumulated result for a run.
    async fn result(&self, run_id: RunId) -> Result<Option<LossResult>, AssessmentRepositoryError>;

    /// Active report copy.
    async fn report_content(&self) -> Result<ReportContent, AssessmentRepositoryError>;

    /// Replace the whole scoring table, returning the number of rows stored.
    async fn replace_scoring_map(
        &self,
        rows: &[ScoringRow],
    ) -> Result<usize, AssessmentRepositoryError>;

    /// Replace the report copy tables named in `content` in one
    /// transaction, returning the number of rows stored.
    async fn replace_report_content(
        &self,
        content: &ReportContentImport,
    ) -> Result<usize, AssessmentRepositoryError>;
}

/// Fixture repository with no scoring table and no stored runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAssessmentRepository;

#[async_trait]
impl AssessmentRepository for FixtureAssessmentRepository {
    async fn create_run(&self, user_id: &UserId) -> Result<LossRun, AssessmentRepositoryError> {
        Ok(LossRun {
            id: 0,
            user_id: *user_id,
            subject: LOSS_SUBJECT.to_owned(),
            status: RunStatus::InProgress,
            created_at: Utc::now(),
            finished_at: None,
        })
    }

    async fn find_run(&self, _run_id: RunId) -> Result<Option<LossRun>, AssessmentRepositoryError> {
        Ok(None)
    }

    async fn list_runs(
        &self,
        _user_id: Option<UserId>,
        _limit: i64,
    ) -> Result<Vec<RunSummary>, AssessmentRepositoryError> {
        Ok(Vec::new())
    }

    async fn scoring_rows(
        &self,
        _question_id: QuestionId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError> {
        Ok(Vec::new())
    }

    async fn record_answer(
        &self,
        _run: &LossRun,
        _question_id: QuestionId,
        _answer: Answer,
        weights: PhaseScores,
    ) -> Result<PhaseScores, AssessmentRepositoryError> {
        Ok(weights)
    }

    async fn answered_scoring_rows(
        &self,
        _run_id: RunId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError> {
        Ok(Vec::new())
    }

    async fn finalize(
        &self,
        run: &LossRun,
        maxima: PhaseScores,
        finished_at: DateTime<Utc>,
    ) -> Result<LossResult, AssessmentRepositoryError> {
        Ok(LossResult {
            run_id: run.id,
            user_id: run.user_id,
            totals: PhaseScores::default(),
            maxima: Some(maxima),
            total: 0,
            max_total: Some(maxima.total()),
            created_at: finished_at,
        })
    }

    async fn reset(&self, _run_id: RunId) -> Result<(), AssessmentRepositoryError> {
        Ok(())
    }

    async fn result(&self, _run_id: RunId) -> Result<Option<LossResult>, AssessmentRepositoryError> {
        Ok(None)
    }

    async fn report_content(&self) -> Result<ReportContent, AssessmentRepositoryError> {
        Ok(ReportContent::default())
    }

    async fn replace_scoring_map(
        &self,
        rows: &[ScoringRow],
    ) -> Result<usize, AssessmentRepositoryError> {
        Ok(rows.len())
    }

    async fn replace_report_content(
        &self,
        content: &ReportContentImport,
    ) -> Result<usize, AssessmentRepositoryError> {
        Ok(content.row_count())
    }
}
