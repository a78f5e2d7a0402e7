//! PostgreSQL-backed subject catalogue.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SubjectRepository, SubjectRepositoryError};
use crate::domain::subject::normalise_subject_key;
use crate::domain::{Subject, SubjectId};

use super::diesel_helpers::{DbFailure, classify_diesel_error, pool_error_message};
use super::models::SubjectRow;
use super::pool::{DbPool, PoolError};
use super::schema::auth_subject;

diesel::define_sql_function!(fn lower(value: Text) -> Text);

/// Diesel-backed implementation of the [`SubjectRepository`] port.
#[derive(Clone)]
pub struct DieselSubjectRepository {
    pool: DbPool,
}

impl DieselSubjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SubjectRepositoryError {
    SubjectRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> SubjectRepositoryError {
    match classify_diesel_error(error, "subjects") {
        DbFailure::Connection(message) => SubjectRepositoryError::connection(message),
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            SubjectRepositoryError::query(message)
        }
        DbFailure::UniqueViolation { .. } | DbFailure::ForeignKeyViolation { .. } => {
            SubjectRepositoryError::query("subject constraint violated")
        }
    }
}

fn row_to_subject(row: SubjectRow) -> Subject {
    Subject {
        id: row.id,
        slug: row.slug,
        name: row.name,
        active: row.active,
        sort_order: row.sort_order,
    }
}

#[async_trait]
impl SubjectRepository for DieselSubjectRepository {
    async fn list_active(&self) -> Result<Vec<Subject>, SubjectRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SubjectRow> = auth_subject::table
            .filter(auth_subject::active.eq(true))
            .order((auth_subject::sort_order.asc(), auth_subject::name.asc()))
            .select(SubjectRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_subject).collect())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Subject>, SubjectRepositoryError> {
        let Some(key) = normalise_subject_key(key) else {
            return Ok(None);
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let by_slug: Option<SubjectRow> = auth_subject::table
            .filter(lower(auth_subject::slug).eq(&key))
            .select(SubjectRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        if let Some(row) = by_slug {
            return Ok(Some(row_to_subject(row)));
        }

        let by_name: Option<SubjectRow> = auth_subject::table
            .filter(lower(auth_subject::name).eq(&key))
            .order(auth_subject::id.asc())
            .select(SubjectRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(by_name.map(row_to_subject))
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, SubjectRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubjectRow> = auth_subject::table
            .find(id)
            .select(SubjectRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_subject))
    }
}
