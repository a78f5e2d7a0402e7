//! Visit log service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::Error;
use crate::domain::ports::{VisitCounts, VisitRepository, VisitRepositoryError, Visits};
use crate::domain::visit::{NewVisit, TOP_PATH_LIMIT, VisitReport, day_window};

fn map_visit_error(error: VisitRepositoryError) -> Error {
    match error {
        VisitRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("visit repository unavailable: {message}"))
        }
        VisitRepositoryError::Query { message } => {
            Error::internal(format!("visit repository error: {message}"))
        }
    }
}

/// Visit service implementing the [`Visits`] port.
#[derive(Clone)]
pub struct VisitService<V> {
    visits: Arc<V>,
}

impl<V> VisitService<V> {
    pub fn new(visits: Arc<V>) -> Self {
        Self { visits }
    }
}

#[async_trait]
impl<V> Visits for VisitService<V>
where
    V: VisitRepository,
{
    async fn record(&self, visit: NewVisit) -> Result<(), Error> {
        self.visits.record(&visit).await.map_err(map_visit_error)
    }

    async fn daily_report(&self, date: NaiveDate) -> Result<VisitReport, Error> {
        let (start, end) = day_window(date);
        let VisitCounts {
            total_hits,
            unique_visitors,
            top_paths,
        } = self
            .visits
            .counts(start, end, TOP_PATH_LIMIT)
            .await
            .map_err(map_visit_error)?;
        Ok(VisitReport {
            date,
            total_hits,
            unique_visitors,
            top_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockVisitRepository;
    use crate::domain::visit::PathHits;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn daily_report_queries_the_utc_day() {
        let mut repo = MockVisitRepository::new();
        repo.expect_counts()
            .withf(|start, end, limit| {
                Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).single() == Some(*start)
                    && Utc.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).single() == Some(*end)
                    && *limit == TOP_PATH_LIMIT
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(VisitCounts {
                    total_hits: 12,
                    unique_visitors: 4,
                    top_paths: vec![PathHits {
                        path: "/".to_owned(),
                        hits: 9,
                    }],
                })
            });

        let date = NaiveDate::from_ymd_opt(2025, 11, 1).expect("date");
        let report = VisitService::new(Arc::new(repo))
            .daily_report(date)
            .await
            .expect("report");
        assert_eq!(report.date, date);
        assert_eq!(report.unique_visitors, 4);
        assert_eq!(report.top_paths.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn storage_outage_is_service_unavailable() {
        let mut repo = MockVisitRepository::new();
        repo.expect_record()
            .returning(|_| Err(VisitRepositoryError::connection("pool closed")));

        let visit = NewVisit::from_request(Utc::now(), "/", None, Some("10.0.0.1"), None);
        let err = VisitService::new(Arc::new(repo))
            .record(visit)
            .await
            .expect_err("outage");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
