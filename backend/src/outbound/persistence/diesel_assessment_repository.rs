//! PostgreSQL-backed Loss assessment storage.
//!
//! Answers lock their run row, replace the scorecard entry for the question
//! and rewrite the running totals. Lock contention is retried with backoff
//! before surfacing as [`AssessmentRepositoryError::Contention`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::UserId;
use crate::domain::assessment::{
    Answer, Band, LOSS_SUBJECT, LossResult, LossRun, OverallBand, OverallItem, OverallItemKind,
    PhaseItem, PhaseScores, ProgressItem, QuestionId, ReportContent, ReportContentImport, RunId,
    RunStatus, RunSummary, ScoringRow, Tone,
};
use crate::domain::ports::{AssessmentRepository, AssessmentRepositoryError};

use super::diesel_helpers::{DbFailure, classify_diesel_error, collect_rows, pool_error_message};
use super::models::{
    NewRunRow, OverallItemRow, PhaseItemRow, ProgressItemRow, ResultRow, RunRow, ScorecardRow,
    ScoringRowRecord,
};
use super::pool::{DbPool, PoolError};
use super::retry::{RetryPolicy, with_retry};
use super::schema::{
    lca_overall_item, lca_phase_item, lca_progress_item, lca_question_phase_map, lca_response,
    lca_result, lca_run, lca_scorecard,
};

/// Diesel-backed implementation of the [`AssessmentRepository`] port.
#[derive(Clone)]
pub struct DieselAssessmentRepository {
    pool: DbPool,
    retry: RetryPolicy,
}

impl DieselAssessmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }
}

fn map_pool_error(error: PoolError) -> AssessmentRepositoryError {
    AssessmentRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> AssessmentRepositoryError {
    match classify_diesel_error(error, "assessment") {
        DbFailure::Connection(message) => AssessmentRepositoryError::connection(message),
        DbFailure::Contention(message) => AssessmentRepositoryError::contention(message),
        DbFailure::UniqueViolation { constraint } | DbFailure::ForeignKeyViolation { constraint } => {
            AssessmentRepositoryError::query(format!(
                "assessment constraint violated ({})",
                constraint.unwrap_or_default()
            ))
        }
        DbFailure::Other(message) => AssessmentRepositoryError::query(message),
    }
}

fn is_contention(error: &AssessmentRepositoryError) -> bool {
    matches!(error, AssessmentRepositoryError::Contention { .. })
}

fn row_to_run(row: RunRow) -> Result<LossRun, String> {
    let status = RunStatus::parse(&row.status)
        .ok_or_else(|| format!("run {} has unknown status {:?}", row.id, row.status))?;
    Ok(LossRun {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        subject: row.subject,
        status,
        created_at: row.created_at,
        finished_at: row.finished_at,
    })
}

fn row_to_summary((row, total): (RunRow, Option<i32>)) -> Result<RunSummary, String> {
    Ok(RunSummary {
        run: row_to_run(row)?,
        total: total.unwrap_or(0),
    })
}

fn record_to_scoring_row(record: ScoringRowRecord) -> Result<ScoringRow, String> {
    let answer = Answer::parse(&record.answer_type).ok_or_else(|| {
        format!(
            "question {} has unknown answer type {:?}",
            record.question_id, record.answer_type
        )
    })?;
    Ok(ScoringRow {
        question_id: record.question_id,
        answer,
        weights: PhaseScores([record.phase_1, record.phase_2, record.phase_3, record.phase_4]),
    })
}

fn scorecard_totals(rows: &[ScorecardRow]) -> PhaseScores {
    rows.iter().fold(PhaseScores::default(), |acc, row| {
        acc + PhaseScores([row.phase_1, row.phase_2, row.phase_3, row.phase_4])
    })
}

fn row_to_result(row: ResultRow) -> LossResult {
    let maxima = match (row.phase_1_max, row.phase_2_max, row.phase_3_max, row.phase_4_max) {
        (Some(p1), Some(p2), Some(p3), Some(p4)) => Some(PhaseScores([p1, p2, p3, p4])),
        _ => None,
    };
    LossResult {
        run_id: row.run_id,
        user_id: UserId::from_uuid(row.user_id),
        totals: PhaseScores([row.phase_1, row.phase_2, row.phase_3, row.phase_4]),
        maxima,
        total: row.total,
        max_total: row.max_total,
        created_at: row.created_at,
    }
}

fn phase_number(raw: i16) -> Result<u8, String> {
    u8::try_from(raw)
        .ok()
        .filter(|phase| (1..=4).contains(phase))
        .ok_or_else(|| format!("report item has invalid phase {raw}"))
}

fn row_to_phase_item(row: PhaseItemRow) -> Result<PhaseItem, String> {
    Ok(PhaseItem {
        phase: phase_number(row.phase)?,
        ordinal: row.ordinal,
        body: row.body,
    })
}

fn row_to_progress_item(row: ProgressItemRow) -> Result<ProgressItem, String> {
    let band =
        Band::parse(&row.band).ok_or_else(|| format!("progress item has unknown band {:?}", row.band))?;
    let tone =
        Tone::parse(&row.tone).ok_or_else(|| format!("progress item has unknown tone {:?}", row.tone))?;
    Ok(ProgressItem {
        phase: phase_number(row.phase)?,
        band,
        tone,
        ordinal: row.ordinal,
        body: row.body,
    })
}

fn phase_item_row(item: &PhaseItem) -> PhaseItemRow {
    PhaseItemRow {
        phase: i16::from(item.phase),
        ordinal: item.ordinal,
        body: item.body.clone(),
    }
}

fn progress_item_row(item: &ProgressItem) -> ProgressItemRow {
    ProgressItemRow {
        phase: i16::from(item.phase),
        band: item.band.as_str().to_owned(),
        tone: item.tone.as_str().to_owned(),
        ordinal: item.ordinal,
        body: item.body.clone(),
    }
}

fn overall_item_row(item: &OverallItem) -> OverallItemRow {
    OverallItemRow {
        band: item.band.as_str().to_owned(),
        kind: item.kind.as_str().to_owned(),
        label: item.label.clone(),
        body: item.body.clone(),
        key_need: item.key_need.clone(),
        ordinal: item.ordinal,
    }
}

fn row_to_overall_item(row: OverallItemRow) -> Result<OverallItem, String> {
    let band = OverallBand::parse(&row.band)
        .ok_or_else(|| format!("overall item has unknown band {:?}", row.band))?;
    let kind = OverallItemKind::parse(&row.kind)
        .ok_or_else(|| format!("overall item has unknown kind {:?}", row.kind))?;
    Ok(OverallItem {
        band,
        kind,
        label: row.label,
        body: row.body,
        key_need: row.key_need,
        ordinal: row.ordinal,
    })
}

impl DieselAssessmentRepository {
    async fn record_answer_once(
        &self,
        run: &LossRun,
        question_id: QuestionId,
        answer: Answer,
        weights: PhaseScores,
    ) -> Result<PhaseScores, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let run_id = run.id;
        let user_id = *run.user_id.as_uuid();
        let PhaseScores([p1, p2, p3, p4]) = weights;

        conn.transaction(|conn| {
            async move {
                // Serialises concurrent answers to the same run.
                lca_run::table
                    .find(run_id)
                    .select(lca_run::id)
                    .for_update()
                    .first::<i64>(conn)
                    .await?;

                diesel::insert_into(lca_response::table)
                    .values((
                        lca_response::run_id.eq(run_id),
                        lca_response::question_id.eq(question_id),
                        lca_response::answer.eq(answer.as_str()),
                    ))
                    .on_conflict((lca_response::run_id, lca_response::question_id))
                    .do_update()
                    .set((
                        lca_response::answer.eq(excluded(lca_response::answer)),
                        lca_response::created_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await?;

                let card = ScorecardRow {
                    run_id,
                    question_id,
                    phase_1: p1,
                    phase_2: p2,
                    phase_3: p3,
                    phase_4: p4,
                };
                diesel::insert_into(lca_scorecard::table)
                    .values(&card)
                    .on_conflict((lca_scorecard::run_id, lca_scorecard::question_id))
                    .do_update()
                    .set((
                        lca_scorecard::phase_1.eq(excluded(lca_scorecard::phase_1)),
                        lca_scorecard::phase_2.eq(excluded(lca_scorecard::phase_2)),
                        lca_scorecard::phase_3.eq(excluded(lca_scorecard::phase_3)),
                        lca_scorecard::phase_4.eq(excluded(lca_scorecard::phase_4)),
                    ))
                    .execute(conn)
                    .await?;

                let cards: Vec<ScorecardRow> = lca_scorecard::table
                    .filter(lca_scorecard::run_id.eq(run_id))
                    .select(ScorecardRow::as_select())
                    .load(conn)
                    .await?;
                let totals = scorecard_totals(&cards);
                let PhaseScores([t1, t2, t3, t4]) = totals;

                diesel::insert_into(lca_result::table)
                    .values((
                        lca_result::run_id.eq(run_id),
                        lca_result::user_id.eq(user_id),
                        lca_result::phase_1.eq(t1),
                        lca_result::phase_2.eq(t2),
                        lca_result::phase_3.eq(t3),
                        lca_result::phase_4.eq(t4),
                        lca_result::total.eq(totals.total()),
                    ))
                    .on_conflict(lca_result::run_id)
                    .do_update()
                    .set((
                        lca_result::phase_1.eq(excluded(lca_result::phase_1)),
                        lca_result::phase_2.eq(excluded(lca_result::phase_2)),
                        lca_result::phase_3.eq(excluded(lca_result::phase_3)),
                        lca_result::phase_4.eq(excluded(lca_result::phase_4)),
                        lca_result::total.eq(excluded(lca_result::total)),
                    ))
                    .execute(conn)
                    .await?;
                Ok(totals)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}

#[async_trait]
impl AssessmentRepository for DieselAssessmentRepository {
    async fn create_run(&self, user_id: &UserId) -> Result<LossRun, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: RunRow = diesel::insert_into(lca_run::table)
            .values(&NewRunRow {
                user_id: *user_id.as_uuid(),
                subject: LOSS_SUBJECT,
                status: RunStatus::InProgress.as_str(),
            })
            .returning(RunRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_run(row).map_err(AssessmentRepositoryError::query)
    }

    async fn find_run(&self, run_id: RunId) -> Result<Option<LossRun>, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RunRow> = lca_run::table
            .find(run_id)
            .select(RunRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_run)
            .transpose()
            .map_err(AssessmentRepositoryError::query)
    }

    async fn list_runs(
        &self,
        user_id: Option<UserId>,
        limit: i64,
    ) -> Result<Vec<RunSummary>, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = lca_run::table
            .left_join(lca_result::table)
            .filter(lca_run::subject.eq(LOSS_SUBJECT))
            .into_boxed();
        if let Some(user_id) = user_id {
            query = query.filter(lca_run::user_id.eq(*user_id.as_uuid()));
        }
        let rows: Vec<(RunRow, Option<i32>)> = query
            .order(lca_run::id.desc())
            .limit(limit)
            .select((RunRow::as_select(), lca_result::total.nullable()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_summary), AssessmentRepositoryError::query)
    }

    async fn scoring_rows(
        &self,
        question_id: QuestionId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let records: Vec<ScoringRowRecord> = lca_question_phase_map::table
            .filter(lca_question_phase_map::question_id.eq(question_id))
            .select(ScoringRowRecord::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(
            records.into_iter().map(record_to_scoring_row),
            AssessmentRepositoryError::query,
        )
    }

    async fn record_answer(
        &self,
        run: &LossRun,
        question_id: QuestionId,
        answer: Answer,
        weights: PhaseScores,
    ) -> Result<PhaseScores, AssessmentRepositoryError> {
        with_retry(self.retry, is_contention, || {
            self.record_answer_once(run, question_id, answer, weights)
        })
        .await
    }

    async fn answered_scoring_rows(
        &self,
        run_id: RunId,
    ) -> Result<Vec<ScoringRow>, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let answered = lca_response::table
            .filter(lca_response::run_id.eq(run_id))
            .select(lca_response::question_id);
        let records: Vec<ScoringRowRecord> = lca_question_phase_map::table
            .filter(lca_question_phase_map::question_id.eq_any(answered))
            .select(ScoringRowRecord::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(
            records.into_iter().map(record_to_scoring_row),
            AssessmentRepositoryError::query,
        )
    }

    async fn finalize(
        &self,
        run: &LossRun,
        maxima: PhaseScores,
        finished_at: DateTime<Utc>,
    ) -> Result<LossResult, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let run_id = run.id;
        let user_id = *run.user_id.as_uuid();
        let PhaseScores([m1, m2, m3, m4]) = maxima;

        let row: ResultRow = conn
            .transaction(|conn| {
                async move {
                    diesel::update(lca_run::table.find(run_id))
                        .set((
                            lca_run::status.eq(RunStatus::Finished.as_str()),
                            lca_run::finished_at.eq(Some(finished_at)),
                        ))
                        .execute(conn)
                        .await?;

                    diesel::insert_into(lca_result::table)
                        .values((
                            lca_result::run_id.eq(run_id),
                            lca_result::user_id.eq(user_id),
                            lca_result::phase_1_max.eq(Some(m1)),
                            lca_result::phase_2_max.eq(Some(m2)),
                            lca_result::phase_3_max.eq(Some(m3)),
                            lca_result::phase_4_max.eq(Some(m4)),
                            lca_result::max_total.eq(Some(maxima.total())),
                        ))
                        .on_conflict(lca_result::run_id)
                        .do_update()
                        .set((
                            lca_result::phase_1_max.eq(excluded(lca_result::phase_1_max)),
                            lca_result::phase_2_max.eq(excluded(lca_result::phase_2_max)),
                            lca_result::phase_3_max.eq(excluded(lca_result::phase_3_max)),
                            lca_result::phase_4_max.eq(excluded(lca_result::phase_4_max)),
                            lca_result::max_total.eq(excluded(lca_result::max_total)),
                        ))
                        .returning(ResultRow::as_returning())
                        .get_result(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_result(row))
    }

    async fn reset(&self, run_id: RunId) -> Result<(), AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                diesel::delete(lca_response::table.filter(lca_response::run_id.eq(run_id)))
                    .execute(conn)
                    .await?;
                diesel::delete(lca_scorecard::table.filter(lca_scorecard::run_id.eq(run_id)))
                    .execute(conn)
                    .await?;
                diesel::delete(lca_result::table.find(run_id))
                    .execute(conn)
                    .await?;
                diesel::update(lca_run::table.find(run_id))
                    .set((
                        lca_run::status.eq(RunStatus::InProgress.as_str()),
                        lca_run::finished_at.eq(None::<DateTime<Utc>>),
                    ))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn result(&self, run_id: RunId) -> Result<Option<LossResult>, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ResultRow> = lca_result::table
            .find(run_id)
            .select(ResultRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_result))
    }

    async fn report_content(&self) -> Result<ReportContent, AssessmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let phase_rows: Vec<PhaseItemRow> = lca_phase_item::table
            .filter(lca_phase_item::active.eq(true))
            .order((lca_phase_item::phase.asc(), lca_phase_item::ordinal.asc()))
            .select(PhaseItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let progress_rows: Vec<ProgressItemRow> = lca_progress_item::table
            .filter(lca_progress_item::active.eq(true))
            .order((
                lca_progress_item::phase.asc(),
                lca_progress_item::band.asc(),
                lca_progress_item::ordinal.asc(),
            ))
            .select(ProgressItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let overall_rows: Vec<OverallItemRow> = lca_overall_item::table
            .filter(lca_overall_item::active.eq(true))
            .order((lca_overall_item::band.asc(), lca_overall_item::ordinal.asc()))
            .select(OverallItemRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(ReportContent {
            phase_items: collect_rows(
                phase_rows.into_iter().map(row_to_phase_item),
                AssessmentRepositoryError::query,
            )?,
            progress_items: collect_rows(
                progress_rows.into_iter().map(row_to_progress_item),
                AssessmentRepositoryError::query,
            )?,
            overall_items: collect_rows(
                overall_rows.into_iter().map(row_to_overall_item),
                AssessmentRepositoryError::query,
            )?,
        })
    }

    async fn replace_scoring_map(
        &self,
        rows: &[ScoringRow],
    ) -> Result<usize, AssessmentRepositoryError> {
        let records: Vec<ScoringRowRecord> = rows
            .iter()
            .map(|row| {
                let PhaseScores([phase_1, phase_2, phase_3, phase_4]) = row.weights;
                ScoringRowRecord {
                    question_id: row.question_id,
                    answer_type: row.answer.as_str().to_owned(),
                    phase_1,
                    phase_2,
                    phase_3,
                    phase_4,
                }
            })
            .collect();

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let stored = conn
            .transaction(|conn| {
                async move {
                    let removed = diesel::delete(lca_question_phase_map::table)
                        .execute(conn)
                        .await?;
                    debug!(removed, "scoring map cleared");
                    diesel::insert_into(lca_question_phase_map::table)
                        .values(&records)
                        .execute(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(stored)
    }

    async fn replace_report_content(
        &self,
        content: &ReportContentImport,
    ) -> Result<usize, AssessmentRepositoryError> {
        let phase_rows: Option<Vec<PhaseItemRow>> = content
            .phase_items
            .as_ref()
            .map(|items| items.iter().map(phase_item_row).collect());
        let progress_rows: Option<Vec<ProgressItemRow>> = content
            .progress_items
            .as_ref()
            .map(|items| items.iter().map(progress_item_row).collect());
        let overall_rows: Option<Vec<OverallItemRow>> = content
            .overall_items
            .as_ref()
            .map(|items| items.iter().map(overall_item_row).collect());

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let stored = conn
            .transaction(|conn| {
                async move {
                    let mut stored = 0;
                    if let Some(rows) = &phase_rows {
                        diesel::delete(lca_phase_item::table).execute(conn).await?;
                        stored += diesel::insert_into(lca_phase_item::table)
                            .values(rows)
                            .execute(conn)
                            .await?;
                    }
                    if let Some(rows) = &progress_rows {
                        diesel::delete(lca_progress_item::table).execute(conn).await?;
                        stored += diesel::insert_into(lca_progress_item::table)
                            .values(rows)
                            .execute(conn)
                            .await?;
                    }
                    if let Some(rows) = &overall_rows {
                        diesel::delete(lca_overall_item::table).execute(conn).await?;
                        stored += diesel::insert_into(lca_overall_item::table)
                            .values(rows)
                            .execute(conn)
                            .await?;
                    }
                    Ok(stored)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        debug!(stored, "report copy replaced");
        Ok(stored)
    }
}
