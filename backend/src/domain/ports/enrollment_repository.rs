//! Port for enrollment persistence.
//!
//! Adapters apply events atomically: they read the current row, run it
//! through [`crate::domain::transition`], and write the result in the same
//! transaction. A rejected transition surfaces as
//! [`EnrollmentRepositoryError::Rejected`].

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus, EnrollmentWrite, LockedQuote,
    SubjectId, UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by enrollment repository adapters.
    pub enum EnrollmentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "enrollment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "enrollment repository query failed: {message}",
        /// The transition table does not allow the event.
        Rejected { from: Option<EnrollmentStatus>, event: EnrollmentEvent } =>
            "cannot apply {event:?} to enrollment in state {from:?}",
        /// A concurrent writer held or created the row; retrying may succeed.
        Contention { message: String } =>
            "enrollment repository contention: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Fetch the enrollment for a (user, subject) pair.
    async fn find(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError>;

    /// Fetch an enrollment by identifier.
    async fn find_by_id(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError>;

    /// Enrollments belonging to one user, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError>;

    /// All enrollments, optionally filtered by status, newest first.
    async fn list(
        &self,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError>;

    /// Apply an event to the (user, subject) enrollment and return the row
    /// as written. `quote` replaces the locked quote when present.
    async fn apply_event(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
        quote: Option<LockedQuote>,
    ) -> Result<Enrollment, EnrollmentRepositoryError>;
}

/// Fixture repository that keeps no rows.
///
/// Every event is applied as if no enrollment existed yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEnrollmentRepository;

#[async_trait]
impl EnrollmentRepository for FixtureEnrollmentRepository {
    async fn find(
        &self,
        _user_id: &UserId,
        _subject_id: SubjectId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError> {
        Ok(None)
    }

    async fn find_by_id(
        &self,
        _id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentRepositoryError> {
        Ok(None)
    }

    async fn list_for_user(
        &self,
        _user_id: &UserId,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError> {
        Ok(Vec::new())
    }

    async fn list(
        &self,
        _status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, EnrollmentRepositoryError> {
        Ok(Vec::new())
    }

    async fn apply_event(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
        quote: Option<LockedQuote>,
    ) -> Result<Enrollment, EnrollmentRepositoryError> {
        let write = EnrollmentWrite::after(*user_id, subject_id, None, event, quote)
            .map_err(|rejected| EnrollmentRepositoryError::rejected(rejected.from, rejected.event))?;
        let now = Utc::now();
        Ok(Enrollment {
            id: 0,
            user_id: write.user_id,
            subject_id: write.subject_id,
            status: write.status,
            payment_pending: write.payment_pending,
            quote: write.quote,
            created_at: now,
            updated_at: now,
        })
    }
}
