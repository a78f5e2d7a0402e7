//! PostgreSQL-backed visit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::sql_types::{BigInt, Timestamptz};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{VisitCounts, VisitRepository, VisitRepositoryError};
use crate::domain::visit::{NewVisit, PathHits};

use super::diesel_helpers::{DbFailure, classify_diesel_error, pool_error_message};
use super::models::{NewVisitRow, PathHitsRow, VisitTotalsRow};
use super::pool::{DbPool, PoolError};
use super::schema::visit_log;

const TOTALS_SQL: &str = r"
SELECT COUNT(*) AS total_hits,
       COUNT(DISTINCT ip_hash) AS unique_visitors
FROM visit_log
WHERE ts >= $1 AND ts < $2";

const TOP_PATHS_SQL: &str = r"
SELECT path, COUNT(*) AS hits
FROM visit_log
WHERE ts >= $1 AND ts < $2
GROUP BY path
ORDER BY hits DESC, path ASC
LIMIT $3";

/// Diesel-backed implementation of the [`VisitRepository`] port.
#[derive(Clone)]
pub struct DieselVisitRepository {
    pool: DbPool,
}

impl DieselVisitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> VisitRepositoryError {
    VisitRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> VisitRepositoryError {
    match classify_diesel_error(error, "visits") {
        DbFailure::Connection(message) => VisitRepositoryError::connection(message),
        DbFailure::UniqueViolation { constraint } | DbFailure::ForeignKeyViolation { constraint } => {
            VisitRepositoryError::query(format!(
                "visit constraint violated ({})",
                constraint.unwrap_or_default()
            ))
        }
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            VisitRepositoryError::query(message)
        }
    }
}

#[async_trait]
impl VisitRepository for DieselVisitRepository {
    async fn record(&self, visit: &NewVisit) -> Result<(), VisitRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewVisitRow {
            ts: visit.ts,
            path: &visit.path,
            user_id: visit.user_id.map(|id| *id.as_uuid()),
            ip_hash: &visit.ip_hash,
            user_agent: visit.user_agent.as_deref(),
        };
        diesel::insert_into(visit_log::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn counts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        top_limit: i64,
    ) -> Result<VisitCounts, VisitRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let totals: VisitTotalsRow = diesel::sql_query(TOTALS_SQL)
            .bind::<Timestamptz, _>(start)
            .bind::<Timestamptz, _>(end)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let paths: Vec<PathHitsRow> = diesel::sql_query(TOP_PATHS_SQL)
            .bind::<Timestamptz, _>(start)
            .bind::<Timestamptz, _>(end)
            .bind::<BigInt, _>(top_limit)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(VisitCounts {
            total_hits: totals.total_hits,
            unique_visitors: totals.unique_visitors,
            top_paths: paths
                .into_iter()
                .map(|row| PathHits {
                    path: row.path,
                    hits: row.hits,
                })
                .collect(),
        })
    }
}
