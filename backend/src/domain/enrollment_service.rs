//! Enrollment domain service.
//!
//! Implements the [`Enrollments`] driving port. The service never decides a
//! status itself: it picks the event and the repository applies it through
//! the transition table inside one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;

use crate::domain::enrollment::{PRICE_VERSION, decide};
use crate::domain::ports::{
    EnrollmentDecision, EnrollmentRepository, EnrollmentRepositoryError, Enrollments,
    SubjectRepository,
};
use crate::domain::subject_service::resolve_subject;
use crate::domain::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentStatus, Error, LockedQuote, Quote,
    RegistrationDecision, SubjectId, UserId,
};

pub(crate) fn map_enrollment_error(error: EnrollmentRepositoryError) -> Error {
    match error {
        EnrollmentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("enrollment repository unavailable: {message}"))
        }
        EnrollmentRepositoryError::Query { message } => {
            Error::internal(format!("enrollment repository error: {message}"))
        }
        EnrollmentRepositoryError::Contention { message } => Error::conflict(format!(
            "the enrollment is being updated elsewhere, try again: {message}"
        )),
        EnrollmentRepositoryError::Rejected { from, event } => {
            Error::conflict("enrollment cannot make that transition").with_details(json!({
                "from": from.map(EnrollmentStatus::as_str),
                "event": event,
                "code": "transition_rejected",
            }))
        }
    }
}

/// Enrollment service implementing the [`Enrollments`] port.
#[derive(Clone)]
pub struct EnrollmentService<E, S> {
    enrollments: Arc<E>,
    subjects: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<E, S> EnrollmentService<E, S> {
    pub fn new(enrollments: Arc<E>, subjects: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            enrollments,
            subjects,
            clock,
        }
    }
}

#[async_trait]
impl<E, S> Enrollments for EnrollmentService<E, S>
where
    E: EnrollmentRepository,
    S: SubjectRepository,
{
    async fn decide(
        &self,
        user_id: &UserId,
        subject_key: Option<String>,
    ) -> Result<EnrollmentDecision, Error> {
        let subject = match subject_key.as_deref() {
            Some(key) => resolve_subject(self.subjects.as_ref(), key).await?,
            None => None,
        };
        let Some(subject) = subject else {
            return Ok(EnrollmentDecision {
                decision: RegistrationDecision::ChooseSubject,
                subject: None,
                enrollment: None,
            });
        };

        let enrollment = self
            .enrollments
            .find(user_id, subject.id)
            .await
            .map_err(map_enrollment_error)?;
        Ok(EnrollmentDecision {
            decision: decide(true, enrollment.as_ref().map(|row| row.status)),
            subject: Some(subject),
            enrollment,
        })
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Enrollment>, Error> {
        self.enrollments
            .list_for_user(user_id)
            .await
            .map_err(map_enrollment_error)
    }

    async fn begin_checkout(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        quote: &Quote,
    ) -> Result<Enrollment, Error> {
        let locked = LockedQuote {
            country_code: quote.country_code.clone(),
            currency: quote.currency.clone(),
            amount_cents: quote.total_cents,
            price_version: PRICE_VERSION.to_owned(),
            locked_at: self.clock.utc(),
        };
        self.enrollments
            .apply_event(
                user_id,
                subject_id,
                EnrollmentEvent::CheckoutStarted,
                Some(locked),
            )
            .await
            .map_err(map_enrollment_error)
    }

    async fn settle(
        &self,
        user_id: &UserId,
        subject_id: SubjectId,
        event: EnrollmentEvent,
    ) -> Result<Enrollment, Error> {
        self.enrollments
            .apply_event(user_id, subject_id, event, None)
            .await
            .map_err(map_enrollment_error)
    }

    async fn list(&self, status: Option<EnrollmentStatus>) -> Result<Vec<Enrollment>, Error> {
        self.enrollments
            .list(status)
            .await
            .map_err(map_enrollment_error)
    }

    async fn apply_admin_event(
        &self,
        enrollment_id: EnrollmentId,
        event: EnrollmentEvent,
    ) -> Result<Enrollment, Error> {
        if !event.is_admin_event() {
            return Err(Error::invalid_request(
                "administrators may only grant, revoke or reinstate enrollments",
            ));
        }
        let current = self
            .enrollments
            .find_by_id(enrollment_id)
            .await
            .map_err(map_enrollment_error)?
            .ok_or_else(|| Error::not_found(format!("enrollment {enrollment_id} not found")))?;
        self.enrollments
            .apply_event(&current.user_id, current.subject_id, event, None)
            .await
            .map_err(map_enrollment_error)
    }
}
