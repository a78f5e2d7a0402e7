//! Driving port for the Loss & Adaptation assessment.

use async_trait::async_trait;

use crate::domain::assessment::{
    Answer, LossReport, LossResult, LossRun, PhaseScores, QuestionId, ReportContentImport, RunId,
    RunSummary, ScoringRow,
};
use crate::domain::{Error, UserId};

/// Running totals after an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecorded {
    pub run_id: RunId,
    pub question_id: QuestionId,
    pub answer: Answer,
    pub totals: PhaseScores,
}

/// Assessment use-cases. Runs are only visible to the user who owns them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Assessments: Send + Sync {
    async fn start_run(&self, user_id: &UserId) -> Result<LossRun, Error>;

    /// The caller's most recent runs, newest first.
    async fn list_runs(&self, user_id: &UserId) -> Result<Vec<RunSummary>, Error>;

    /// Most recent runs across every user. Admin only.
    async fn list_all_runs(&self) -> Result<Vec<RunSummary>, Error>;

    /// Score one answer and return the run's new totals.
    async fn record_answer(
        &self,
        user_id: &UserId,
        run_id: RunId,
        question_id: QuestionId,
        answer: Answer,
    ) -> Result<AnswerRecorded, Error>;

    /// Compute per-phase maxima and close the run.
    async fn finalize_run(&self, user_id: &UserId, run_id: RunId) -> Result<LossResult, Error>;

    /// Discard every answer on the run.
    async fn reset_run(&self, user_id: &UserId, run_id: RunId) -> Result<(), Error>;

    /// Build the report for a run.
    async fn report(&self, user_id: &UserId, run_id: RunId) -> Result<LossReport, Error>;

    /// Replace the scoring table used for new answers.
    async fn import_scoring_map(&self, rows: Vec<ScoringRow>) -> Result<usize, Error>;

    /// Replace the report copy tables present in `content`.
    async fn import_report_content(&self, content: ReportContentImport) -> Result<usize, Error>;
}
