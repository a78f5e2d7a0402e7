//! PostgreSQL-backed enrollment repository.
//!
//! `apply_event` locks the (user, subject) row, runs the transition table
//! and writes the outcome inside one transaction. When two requests create
//! the same row at once, the loser's insert is skipped and its transaction
//! is retried against the winner's row.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{EnrollmentRepository, EnrollmentRepositoryError};
use crate::domain::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus, EnrollmentWrite, LockedQuote,
    SubjectId, TransitionRejected, UserId,
};

use super::diesel_helpers::{DbFailure, classify_diesel_error, collect_rows, pool_error_message};
use super::models::{EnrollmentRow, EnrollmentWriteRow};
use super::pool::{DbPool, PoolError};
use super::retry::{RetryPolicy, with_retry};
use super::schema::user_enrollment;

/// Diesel-backed implementation of the [`EnrollmentRepository`] port.
#[derive(Clone)]
pub struct DieselEnrollmentRepository {
    pool: DbPool,
    retry: RetryPolicy,
}

impl DieselEnrollmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }
}

/// Failure inside the `apply_event` transaction.
#[derive(Debug)]
enum ApplyError {
    Diesel(diesel::result::Error),
    Rejected(TransitionRejected),
    Corrupt(String),
    /// Another transaction inserted the row after our read.
    Raced,
}

impl From<diesel::result::Error> for ApplyError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

fn map_pool_error(error: PoolError) -> EnrollmentRepositoryError {
    EnrollmentRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> EnrollmentRepositoryError {
    match classify_diesel_error(error, "enrollments") {
        DbFailure::Connection(message) => EnrollmentRepositoryError::connection(message),
        DbFailure::UniqueViolation { .. } => {
            EnrollmentRepositoryError::contention("enrollment created concurrently")
        }
        DbFailure::Contention(message) => EnrollmentRepositoryError::contention(message),
        DbFailure::ForeignKeyViolation { constraint } => EnrollmentRepositoryError::query(format!(
            "enrollment references a missing row ({})",
            constraint.unwrap_or_default()
        )),
        DbFailure::Other(message) => EnrollmentRepositoryError::query(message),
    }
}

fn map_apply_error(error: ApplyError) -> EnrollmentRepositoryError {
    match error {
        ApplyError::Diesel(error) => map_diesel_error(error),
        ApplyError::Rejected(rejected) => {
            EnrollmentRepositoryError::rejected(rejected.from, rejected.event)
        }
        ApplyError::Corrupt(message) => EnrollmentRepositoryError::query(message),
        ApplyError::Raced => EnrollmentRepositoryError::contention("enrollment created concurrently"),
    }
}

fn is_contention(error: &EnrollmentRepositoryError) -> bool {
    matches!(error, EnrollmentRepositoryError::Contention { .. })
}

fn row_to_enrollment(row: EnrollmentRow) -> Result<Enrollment, String> {
    let status = EnrollmentStatus::parse(&row.status)
        .ok_or_else(|| format!("enrollment {} has unknown status {:?}", row.id, row.status))?;
    let quote = match (
        row.quote_country,
        row.quote_currency,
        row.quote_amount_cents,
        row.price_version,
        row.quote_locked_at,
    ) {
        (Some(country_code), Some(currency), Some(amount_cents), Some(price_version), Some(locked_at)) => {
            Some(LockedQuote {
                country_code,
                currency,
                amount_cents,
                price_version,
                locked_at,
            })
        }
        _ => None,
    };
    Ok(Enrollment {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        subject_id: row.subject_id,
        status,
        payment_pending: row.payment_pending,
        quote,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn write_row(write: &EnrollmentWrite) -> EnrollmentWriteRow<'_> {
    let quote = write.quote.as_ref();
    EnrollmentWriteRow {
        user_id: *write.user_id.as_uuid(),
        subject_id: write.subject_id,
        status: write.status.as_str(),
        payment_pending: write.payment_pending,
        quote_country: quote.map(|q| q.country_code.as_str()),
        quote_currency: quote.map(|q| q.currency.as_str()),
        quote_amount_cents: quote.map(|q| q.amount_cents),
        price_version: quote.map(|q| q.price_version.as_str()),
        quote_locked_at: quote.map(|q| q.locked_at),
        updated_at: Utc::now(),
    }
}

impl DieselEnrollmentRepository {
    async fn apply_once(
        &self,
        user_id: UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
        quote: Option<LockedQuote>,
    ) -> Result<EnrollmentRow, EnrollmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let current: Option<EnrollmentRow> = user_enrollment::table
                    .filter(user_enrollment::user_id.eq(user_id.as_uuid()))
                    .filter(user_enrollment::subject_id.eq(subject_id))
                    .select(EnrollmentRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let current = current
                    .map(row_to_enrollment)
                    .transpose()
                    .map_err(ApplyError::Corrupt)?;

                let mut write = EnrollmentWrite::after(
                    user_id,
                    subject_id,
                    current.as_ref().map(|enrollment| enrollment.status),
                    event,
                    quote,
                )
                .map_err(ApplyError::Rejected)?;
                if write.quote.is_none() {
                    write.quote = current.as_ref().and_then(|enrollment| enrollment.quote.clone());
                }
                let values = write_row(&write);

                let stored: EnrollmentRow = match current {
                    Some(existing) => {
                        diesel::update(user_enrollment::table.find(existing.id))
                            .set(&values)
                            .returning(EnrollmentRow::as_returning())
                            .get_result(conn)
                            .await?
                    }
                    None => diesel::insert_into(user_enrollment::table)
                        .values(&values)
                        .on_conflict((user_enrollment::user_id, user_enrollment::subject_id))
                        .do_nothing()
                        .returning(EnrollmentRow::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?
                        .ok_or(ApplyError::Raced)?,
                };
                Ok(stored)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_apply_error)
    }
}

#[async_trait]
impl EnrollmentRepository for DieselEnrollmentRepository {
    async fn find(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<EnrollmentRow> = user_enrollment::table
            .filter(user_enrollment::user_id.eq(user_id.as_uuid()))
            .filter(user_enrollment::subject_id.eq(subject_id))
            .select(EnrollmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_enrollment)
            .transpose()
            .map_err(EnrollmentRepositoryError::query)
    }

    async fn find_by_id(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<EnrollmentRow> = user_enrollment::table
            .find(id)
            .select(EnrollmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_enrollment)
            .transpose()
            .map_err(EnrollmentRepositoryError::query)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<EnrollmentRow> = user_enrollment::table
            .filter(user_enrollment::user_id.eq(user_id.as_uuid()))
            .order(user_enrollment::created_at.asc())
            .select(EnrollmentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_enrollment), EnrollmentRepositoryError::query)
    }

    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = user_enrollment::table
            .select(EnrollmentRow::as_select())
            .order(user_enrollment::updated_at.desc())
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(user_enrollment::status.eq(status.as_str()));
        }
        let rows: Vec<EnrollmentRow> = query.load(&mut conn).await.map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_enrollment), EnrollmentRepositoryError::query)
    }

    async fn apply_event(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
        quote: Option<LockedQuote>,
    ) -> Result<Enrollment, EnrollmentRepositoryError> {
        let row = with_retry(self.retry, is_contention, || {
            self.apply_once(*user_id, subject_id, event, quote.clone())
        })
        .await?;
        debug!(enrollment_id = row.id, status = %row.status, ?event, "enrollment event applied");
        row_to_enrollment(row).map_err(EnrollmentRepositoryError::query)
    }
}
