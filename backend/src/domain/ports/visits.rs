//! Driving port for the visit log.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::Error;
use crate::domain::visit::{NewVisit, VisitReport};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Visits: Send + Sync {
    /// Store one hit.
    async fn record(&self, visit: NewVisit) -> Result<(), Error>;

    /// Traffic summary for one UTC day.
    async fn daily_report(&self, date: NaiveDate) -> Result<VisitReport, Error>;
}
