//! Driving port for enrollment state.
//!
//! Every mutation funnels through the transition table in
//! [`crate::domain::transition`]; callers only choose the event.

use async_trait::async_trait;

use crate::domain::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus, Error, Quote,
    RegistrationDecision, Subject, SubjectId, UserId,
};

/// Outcome of the registration decision for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentDecision {
    pub decision: RegistrationDecision,
    /// The resolved subject, when the key matched one.
    pub subject: Option<Subject>,
    /// The learner's current enrollment for that subject.
    pub enrollment: Option<Enrollment>,
}

/// Enrollment use-cases shared by learners, gateways and administrators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enrollments: Send + Sync {
    /// Decide what registration should do next for `subject_key`.
    async fn decide(
        &self,
        user_id: &UserId,
        subject_key: Option<String>,
    ) -> Result<EnrollmentDecision, Error>;

    /// The learner's enrollments, newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>, Error>;

    /// Create or refresh the pending row and lock the quote onto it.
    async fn begin_checkout(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        quote: &Quote,
    ) -> Result<Enrollment, Error>;

    /// Apply a settlement event such as a confirmed payment.
    async fn settle(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
    ) -> Result<Enrollment, Error>;

    /// Every enrollment, optionally filtered by status.
    async fn list(&self, status: Option<EnrollmentStatus>) -> Result<Vec<Enrollment>, Error>;

    /// Apply an administrator event to an existing enrollment.
    async fn apply_admin_event(
        &self,
        enrollment_id: EnrollmentId,
        event: EnrollmentEvent,
    ) -> Result<Enrollment, Error>;
}
