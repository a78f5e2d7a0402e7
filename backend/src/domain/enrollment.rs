//! Enrollment state and its single transition table.
//!
//! Every path that changes an enrollment (checkout, gateway settlement,
//! free grants, admin actions) goes through [`transition`]. Registration
//! decisions are derived from the same table so they cannot disagree with
//! what a later write will accept.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subject::SubjectId;
use super::user::UserId;

/// Database identifier of an enrollment row.
pub type EnrollmentId = i64;

/// Version tag stored with every locked quote.
pub const PRICE_VERSION: &str = "2025-11";

/// Payment/access state of a (user, subject) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Inactive,
}

impl EnrollmentStatus {
    /// Parse a stored status. Legacy `paid` and `enrolled` values mean active.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" | "paid" | "enrolled" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Stable lowercase name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentEvent {
    /// The learner started (or restarted) a gateway checkout.
    CheckoutStarted,
    /// A gateway confirmed payment.
    PaymentSettled,
    /// Access granted without payment.
    FreeGrant,
    /// Access withdrawn by an administrator.
    Revoked,
    /// A revoked enrollment restored by an administrator.
    Reinstated,
}

impl EnrollmentEvent {
    /// Events an administrator may apply directly.
    pub fn is_admin_event(self) -> bool {
        matches!(self, Self::FreeGrant | Self::Revoked | Self::Reinstated)
    }
}

/// A transition the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event:?} to enrollment in state {from:?}")]
pub struct TransitionRejected {
    pub from: Option<EnrollmentStatus>,
    pub event: EnrollmentEvent,
}

/// The authoritative transition table.
///
/// `None` stands for "no enrollment row yet".
///
/// # Examples
/// ```
/// use ait_backend::domain::{transition, EnrollmentEvent, EnrollmentStatus};
///
/// assert_eq!(
///     transition(Some(EnrollmentStatus::Pending), EnrollmentEvent::PaymentSettled),
///     Ok(EnrollmentStatus::Active)
/// );
/// assert!(transition(Some(EnrollmentStatus::Active), EnrollmentEvent::CheckoutStarted).is_err());
/// ```
pub fn transition(
    from: Option<EnrollmentStatus>,
    event: EnrollmentEvent,
) -> Result<EnrollmentStatus, TransitionRejected> {
    use EnrollmentEvent as E;
    use EnrollmentStatus as S;

    let next = match (from, event) {
        (None | Some(S::Pending | S::Inactive), E::CheckoutStarted) => Some(S::Pending),
        (_, E::PaymentSettled | E::FreeGrant) => Some(S::Active),
        (Some(S::Pending | S::Active | S::Inactive), E::Revoked) => Some(S::Inactive),
        (Some(S::Inactive), E::Reinstated) => Some(S::Active),
        (Some(S::Active), E::CheckoutStarted) | (None, E::Revoked | E::Reinstated) => None,
        (Some(S::Pending | S::Active), E::Reinstated) => None,
    };
    next.ok_or(TransitionRejected { from, event })
}

/// What the registration flow should do next for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationDecision {
    /// No usable subject was supplied; show the subject picker.
    ChooseSubject,
    /// The learner already has access.
    AlreadyEnrolled,
    /// A checkout is in flight; resume it rather than starting another.
    ResumeCheckout,
    /// Start a new checkout.
    StartCheckout,
}

/// Derive the registration decision from the transition table.
pub fn decide(subject_known: bool, current: Option<EnrollmentStatus>) -> RegistrationDecision {
    if !subject_known {
        return RegistrationDecision::ChooseSubject;
    }
    match (current, transition(current, EnrollmentEvent::CheckoutStarted)) {
        (_, Err(_)) => RegistrationDecision::AlreadyEnrolled,
        (Some(EnrollmentStatus::Pending), Ok(_)) => RegistrationDecision::ResumeCheckout,
        (_, Ok(_)) => RegistrationDecision::StartCheckout,
    }
}

/// Price locked onto an enrollment when checkout starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedQuote {
    pub country_code: String,
    pub currency: String,
    pub amount_cents: i64,
    pub price_version: String,
    pub locked_at: DateTime<Utc>,
}

/// A (user, subject) enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub status: EnrollmentStatus,
    pub payment_pending: bool,
    pub quote: Option<LockedQuote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write request produced once a transition has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentWrite {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub status: EnrollmentStatus,
    pub payment_pending: bool,
    /// Replaces the stored quote when present; an absent quote keeps it.
    pub quote: Option<LockedQuote>,
}

impl EnrollmentWrite {
    /// Build the write that results from applying `event`.
    pub fn after(
        user_id: UserId,
        subject_id: SubjectId,
        current: Option<EnrollmentStatus>,
        event: EnrollmentEvent,
        quote: Option<LockedQuote>,
    ) -> Result<Self, TransitionRejected> {
        let status = transition(current, event)?;
        Ok(Self {
            user_id,
            subject_id,
            status,
            payment_pending: matches!(event, EnrollmentEvent::CheckoutStarted),
            quote,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Exhaustive coverage of the transition table.
    use super::*;
    use rstest::rstest;

    use EnrollmentEvent as E;
    use EnrollmentStatus as S;

    #[rstest]
    #[case(None, E::CheckoutStarted, Some(S::Pending))]
    #[case(None, E::PaymentSettled, Some(S::Active))]
    #[case(None, E::FreeGrant, Some(S::Active))]
    #[case(None, E::Revoked, None)]
    #[case(None, E::Reinstated, None)]
    #[case(Some(S::Pending), E::CheckoutStarted, Some(S::Pending))]
    #[case(Some(S::Pending), E::PaymentSettled, Some(S::Active))]
    #[case(Some(S::Pending), E::FreeGrant, Some(S::Active))]
    #[case(Some(S::Pending), E::Revoked, Some(S::Inactive))]
    #[case(Some(S::Pending), E::Reinstated, None)]
    #[case(Some(S::Active), E::CheckoutStarted, None)]
    #[case(Some(S::Active), E::PaymentSettled, Some(S::Active))]
    #[case(Some(S::Active), E::FreeGrant, Some(S::Active))]
    #[case(Some(S::Active), E::Revoked, Some(S::Inactive))]
    #[case(Some(S::Active), E::Reinstated, None)]
    #[case(Some(S::Inactive), E::CheckoutStarted, Some(S::Pending))]
    #[case(Some(S::Inactive), E::PaymentSettled, Some(S::Active))]
    #[case(Some(S::Inactive), E::FreeGrant, Some(S::Active))]
    #[case(Some(S::Inactive), E::Revoked, Some(S::Inactive))]
    #[case(Some(S::Inactive), E::Reinstated, Some(S::Active))]
    fn transition_table(
        #[case] from: Option<EnrollmentStatus>,
        #[case] event: EnrollmentEvent,
        #[case] expected: Option<EnrollmentStatus>,
    ) {
        assert_eq!(transition(from, event).ok(), expected);
    }

    #[rstest]
    #[case(false, Some(S::Active), RegistrationDecision::ChooseSubject)]
    #[case(true, None, RegistrationDecision::StartCheckout)]
    #[case(true, Some(S::Pending), RegistrationDecision::ResumeCheckout)]
    #[case(true, Some(S::Active), RegistrationDecision::AlreadyEnrolled)]
    #[case(true, Some(S::Inactive), RegistrationDecision::StartCheckout)]
    fn decisions_follow_the_table(
        #[case] subject_known: bool,
        #[case] current: Option<EnrollmentStatus>,
        #[case] expected: RegistrationDecision,
    ) {
        assert_eq!(decide(subject_known, current), expected);
    }

    #[rstest]
    #[case("pending", Some(S::Pending))]
    #[case("PAID", Some(S::Active))]
    #[case("enrolled", Some(S::Active))]
    #[case(" inactive ", Some(S::Inactive))]
    #[case("refunded", None)]
    fn legacy_statuses_parse(#[case] raw: &str, #[case] expected: Option<EnrollmentStatus>) {
        assert_eq!(EnrollmentStatus::parse(raw), expected);
    }

    #[rstest]
    fn checkout_write_marks_payment_pending() {
        let write = EnrollmentWrite::after(UserId::random(), 3, None, E::CheckoutStarted, None)
            .expect("allowed");
        assert_eq!(write.status, S::Pending);
        assert!(write.payment_pending);
    }

    #[rstest]
    fn settlement_clears_payment_pending() {
        let write = EnrollmentWrite::after(
            UserId::random(),
            3,
            Some(S::Pending),
            E::PaymentSettled,
            None,
        )
        .expect("allowed");
        assert_eq!(write.status, S::Active);
        assert!(!write.payment_pending);
    }

    #[rstest]
    fn rejected_transition_reports_context() {
        let err = transition(Some(S::Active), E::CheckoutStarted).expect_err("rejected");
        assert_eq!(err.from, Some(S::Active));
        assert_eq!(err.event, E::CheckoutStarted);
    }
}
