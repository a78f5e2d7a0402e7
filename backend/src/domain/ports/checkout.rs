//! Driving port for gateway checkouts and their callbacks.
//!
//! Starting a checkout quotes the subject, moves the enrollment to pending
//! and writes a `pending` payment log row. Gateway callbacks are verified
//! before they settle anything.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::domain::payments::payfast::PayFastForm;
use crate::domain::{
    EmailAddress, Enrollment, Error, PaymentLogEntry, PaymentStatus, Quote, Role, Subject, UserId,
};

/// The signed-in learner starting a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub role: Role,
    pub subject_key: String,
    pub country_code: String,
}

/// A PayFast checkout ready for the browser to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFastCheckoutStarted {
    pub reference: String,
    pub subject: Subject,
    pub quote: Quote,
    pub enrollment: Enrollment,
    pub form: PayFastForm,
}

/// A Stripe Checkout Session created for the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeCheckoutStarted {
    pub reference: String,
    pub subject: Subject,
    pub quote: Quote,
    pub enrollment: Enrollment,
    pub session_id: String,
    /// Hosted checkout page, when Stripe returned one.
    pub checkout_url: Option<String>,
}

/// An instant payment notification as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayFastNotificationRequest {
    /// Undecoded form body; the signature covers it byte for byte.
    pub raw_body: String,
    /// First forwarded hop, else the peer address.
    pub source_ip: Option<IpAddr>,
}

/// A Stripe webhook delivery as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeWebhookRequest {
    pub payload: String,
    pub signature_header: String,
}

/// What a verified gateway callback changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The payment settled and the enrollment is active.
    Settled { reference: String, enrollment: Enrollment },
    /// The log row moved to a non-settling status.
    Recorded { reference: String, status: PaymentStatus },
    /// Nothing to do for this callback.
    Ignored { reason: String },
}

/// Checkout and payment callback use-cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Quote in rand, lock the quote and build the signed PayFast form.
    async fn start_payfast(&self, request: CheckoutRequest)
    -> Result<PayFastCheckoutStarted, Error>;

    /// Verify and apply a PayFast notification.
    ///
    /// Bad signatures are `invalid_request`; untrusted sources are
    /// `forbidden`.
    async fn handle_payfast_notification(
        &self,
        request: PayFastNotificationRequest,
    ) -> Result<CallbackOutcome, Error>;

    /// Quote, lock the quote and create a Stripe Checkout Session.
    async fn start_stripe(&self, request: CheckoutRequest) -> Result<StripeCheckoutStarted, Error>;

    /// Verify and apply a Stripe webhook event.
    async fn handle_stripe_webhook(
        &self,
        request: StripeWebhookRequest,
    ) -> Result<CallbackOutcome, Error>;

    /// Mark the buyer's abandoned Stripe session canceled.
    ///
    /// Sessions that are not open or belong to another user are
    /// `not_found`.
    async fn cancel_stripe(&self, user_id: UserId, session_id: String) -> Result<(), Error>;

    /// Recent payment log rows.
    async fn list_payments(&self, limit: i64) -> Result<Vec<PaymentLogEntry>, Error>;
}
