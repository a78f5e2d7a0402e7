//! Port for the visit log.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::visit::{NewVisit, PathHits};

use super::define_port_error;

define_port_error! {
    /// Errors raised by visit repository adapters.
    pub enum VisitRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "visit repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "visit repository query failed: {message}",
    }
}

/// Raw counts for a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitCounts {
    pub total_hits: i64,
    pub unique_visitors: i64,
    pub top_paths: Vec<PathHits>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Store one hit.
    async fn record(&self, visit: &NewVisit) -> Result<(), VisitRepositoryError>;

    /// Hits, distinct fingerprints and the busiest paths in `[start, end)`.
    async fn counts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        top_limit: i64,
    ) -> Result<VisitCounts, VisitRepositoryError>;
}

/// Fixture repository that discards hits and reports an empty day.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureVisitRepository;

#[async_trait]
impl VisitRepository for FixtureVisitRepository {
    async fn record(&self, _visit: &NewVisit) -> Result<(), VisitRepositoryError> {
        Ok(())
    }

    async fn counts(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _top_limit: i64,
    ) -> Result<VisitCounts, VisitRepositoryError> {
        Ok(VisitCounts::default())
    }
}
