//! Checkout domain service.
//!
//! Implements the [`Checkout`] driving port. A checkout quotes the subject,
//! moves the enrollment to pending, then hands the buyer to a gateway. The
//! gateway's callback is verified (signature, source, amount) before the
//! enrollment is settled and the payment log row is closed.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::domain::enrollment::PRICE_VERSION;
use crate::domain::payments::payfast::{
    PayFastCheckout, PayFastMerchant, PayFastNotification, PayFastPaymentStatus, checkout_form,
    is_trusted_source, verify_notification,
};
use crate::domain::payments::stripe::{
    CheckoutSession, CheckoutSessionRequest, StripeEvent, StripePaymentRecord, verify_webhook,
};
use crate::domain::payments::{ENROLLMENT_PURPOSE, new_payment_reference};
use crate::domain::ports::{
    CallbackOutcome, Checkout, CheckoutRequest, Enrollments, PayFastCheckoutStarted,
    PayFastNotificationRequest, PayFastValidator, PaymentGatewayError, PaymentRepository,
    PaymentRepositoryError, Pricing, QuoteRequest, StripeCheckoutStarted, StripeGateway,
    StripeWebhookRequest, SubjectQuote, Subjects, UserPersistenceError, UserRepository,
};
use crate::domain::pricing::{BASE_CURRENCY, DEFAULT_COUNTRY};
use crate::domain::{
    EmailAddress, EnrollmentEvent, Error, NewPaymentLog, PaymentLogEntry, PaymentProvider,
    PaymentStatus,
    SubjectId, UserId,
};

/// Largest page of payment log rows an admin can request.
pub const PAYMENT_LIST_MAX: i64 = 500;

fn map_payment_error(error: PaymentRepositoryError) -> Error {
    match error {
        PaymentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("payment repository unavailable: {message}"))
        }
        PaymentRepositoryError::Query { message } => {
            Error::internal(format!("payment repository error: {message}"))
        }
    }
}

fn map_gateway_error(error: PaymentGatewayError) -> Error {
    match error {
        PaymentGatewayError::Unavailable { message } => {
            Error::service_unavailable(format!("payment gateway unavailable: {message}"))
        }
        PaymentGatewayError::NotConfigured { gateway } => {
            Error::service_unavailable(format!("{gateway} payments are not configured"))
        }
        PaymentGatewayError::Rejected { status, message } => {
            Error::internal(format!("payment gateway rejected request ({status}): {message}"))
        }
    }
}

fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserPersistenceError::Query { message }
        | UserPersistenceError::DuplicateEmail { email: message } => {
            Error::internal(format!("user repository error: {message}"))
        }
    }
}

/// Outcome for a redelivered callback on a payment that is already paid.
/// The enrollment is left as it is, even if an admin has revoked it since.
fn already_settled() -> CallbackOutcome {
    CallbackOutcome::Ignored {
        reason: "payment already settled".to_owned(),
    }
}

/// Gateway credentials and URLs used to build checkouts.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    /// PayFast merchant account; `None` disables PayFast checkout.
    pub payfast: Option<PayFastMerchant>,
    /// Reject notifications from outside PayFast's networks.
    pub verify_payfast_source: bool,
    /// Stripe webhook signing secret; `None` rejects every webhook.
    pub stripe_webhook_secret: Option<Zeroizing<String>>,
    /// External base URL used for return, cancel and notify links.
    pub public_base_url: String,
}

impl CheckoutSettings {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.public_base_url.trim_end_matches('/'))
    }
}

/// Driving ports the checkout flow composes.
#[derive(Clone)]
pub struct CheckoutCollaborators {
    pub pricing: Arc<dyn Pricing>,
    pub enrollments: Arc<dyn Enrollments>,
    pub subjects: Arc<dyn Subjects>,
}

/// Checkout service implementing the [`Checkout`] port.
#[derive(Clone)]
pub struct CheckoutService<P, U, V: ?Sized, G: ?Sized> {
    payments: Arc<P>,
    users: Arc<U>,
    payfast_validator: Arc<V>,
    stripe: Arc<G>,
    collaborators: CheckoutCollaborators,
    settings: Arc<CheckoutSettings>,
    clock: Arc<dyn Clock>,
}

impl<P, U, V: ?Sized, G: ?Sized> CheckoutService<P, U, V, G> {
    pub fn new(
        payments: Arc<P>,
        users: Arc<U>,
        payfast_validator: Arc<V>,
        stripe: Arc<G>,
        collaborators: CheckoutCollaborators,
        settings: CheckoutSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payments,
            users,
            payfast_validator,
            stripe,
            collaborators,
            settings: Arc::new(settings),
            clock,
        }
    }
}

impl<P, U, V, G> CheckoutService<P, U, V, G>
where
    P: PaymentRepository,
    U: UserRepository,
    V: PayFastValidator + ?Sized,
    G: StripeGateway + ?Sized,
{
    async fn quote(&self, request: &CheckoutRequest, country_code: &str) -> Result<SubjectQuote, Error> {
        self.collaborators
            .pricing
            .quote(QuoteRequest {
                subject_key: request.subject_key.clone(),
                role: request.role,
                country_code: country_code.to_owned(),
            })
            .await
    }

    async fn log_pending(&self, entry: NewPaymentLog) -> Result<PaymentLogEntry, Error> {
        self.payments.record(&entry).await.map_err(map_payment_error)
    }

    async fn find_log(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<PaymentLogEntry>, Error> {
        self.payments
            .find_by_reference(provider, reference)
            .await
            .map_err(map_payment_error)
    }

    async fn mark(
        &self,
        provider: PaymentProvider,
        reference: &str,
        status: PaymentStatus,
        meta: serde_json::Value,
    ) -> Result<(), Error> {
        let updated = self
            .payments
            .set_status(provider, reference, status, Some(meta))
            .await
            .map_err(map_payment_error)?;
        if !updated {
            warn!(%provider, reference, %status, "no payment log row to update");
        }
        Ok(())
    }

    async fn subject_from_slug(&self, slug: Option<String>) -> Result<Option<SubjectId>, Error> {
        match slug {
            Some(slug) => Ok(self
                .collaborators
                .subjects
                .find(&slug)
                .await?
                .map(|subject| subject.id)),
            None => Ok(None),
        }
    }

    fn check_payfast_source(&self, source_ip: Option<IpAddr>) -> Result<(), Error> {
        if !self.settings.verify_payfast_source {
            return Ok(());
        }
        match source_ip {
            Some(ip) if is_trusted_source(ip) => Ok(()),
            other => {
                warn!(source = ?other, "payfast notification from untrusted source");
                Err(Error::forbidden("notification source is not trusted"))
            }
        }
    }

    async fn settle_payfast(
        &self,
        notification: PayFastNotification,
        log: PaymentLogEntry,
    ) -> Result<CallbackOutcome, Error> {
        let user_id = log
            .user_id
            .or_else(|| notification.user_id.as_deref().and_then(|raw| UserId::new(raw).ok()));
        let subject_id = match log.subject_id {
            Some(id) => Some(id),
            None => self.subject_from_slug(notification.subject_slug.clone()).await?,
        };
        let (Some(user_id), Some(subject_id)) = (user_id, subject_id) else {
            return Err(Error::invalid_request(
                "notification does not identify a learner and subject",
            ));
        };

        let enrollment = self
            .collaborators
            .enrollments
            .settle(&user_id, subject_id, EnrollmentEvent::PaymentSettled)
            .await?;
        self.mark(
            PaymentProvider::PayFast,
            &notification.reference,
            PaymentStatus::Paid,
            json!({ "pf_payment_id": notification.pf_payment_id }),
        )
        .await?;
        info!(reference = %notification.reference, %user_id, subject_id, "payfast payment settled");
        Ok(CallbackOutcome::Settled {
            reference: notification.reference,
            enrollment,
        })
    }

    async fn resolve_stripe_user(
        &self,
        session: &CheckoutSession,
        log: Option<&PaymentLogEntry>,
    ) -> Result<Option<UserId>, Error> {
        if let Some(user_id) = session.metadata_user_id().or_else(|| log.and_then(|row| row.user_id)) {
            return Ok(Some(user_id));
        }
        let Some(email) = session
            .email()
            .and_then(|raw| EmailAddress::parse(&raw).ok())
        else {
            return Ok(None);
        };
        Ok(self
            .users
            .find_credentials(&email)
            .await
            .map_err(map_user_error)?
            .map(|stored| stored.user.id))
    }

    async fn complete_stripe_session(
        &self,
        session: CheckoutSession,
    ) -> Result<CallbackOutcome, Error> {
        let log = self.find_log(PaymentProvider::Stripe, &session.id).await?;
        if log.as_ref().is_some_and(|row| row.status == PaymentStatus::Paid) {
            info!(session_id = %session.id, "stripe event for a settled payment");
            return Ok(already_settled());
        }
        let user_id = self.resolve_stripe_user(&session, log.as_ref()).await?;
        let record = session.to_record(user_id, self.clock.utc());
        self.payments
            .upsert_stripe_payment(&record)
            .await
            .map_err(map_payment_error)?;

        if record.paid_at.is_none() {
            info!(session_id = %session.id, status = %record.status, "stripe session not yet paid");
            return Ok(CallbackOutcome::Recorded {
                reference: session.id,
                status: PaymentStatus::Pending,
            });
        }

        let subject_id = match log.as_ref().and_then(|row| row.subject_id) {
            Some(id) => Some(id),
            None => self.subject_from_slug(session.subject_slug()).await?,
        };
        let meta = json!({ "payment_intent": record.payment_intent_id });
        let (Some(user_id), Some(subject_id)) = (user_id, subject_id) else {
            warn!(session_id = %session.id, "stripe payment without learner or subject");
            self.mark(PaymentProvider::Stripe, &session.id, PaymentStatus::Paid, meta)
                .await?;
            return Ok(CallbackOutcome::Recorded {
                reference: session.id,
                status: PaymentStatus::Paid,
            });
        };

        let enrollment = self
            .collaborators
            .enrollments
            .settle(&user_id, subject_id, EnrollmentEvent::PaymentSettled)
            .await?;
        self.mark(PaymentProvider::Stripe, &session.id, PaymentStatus::Paid, meta)
            .await?;
        info!(session_id = %session.id, %user_id, subject_id, "stripe payment settled");
        Ok(CallbackOutcome::Settled {
            reference: session.id,
            enrollment,
        })
    }
}

#[async_trait]
impl<P, U, V, G> Checkout for CheckoutService<P, U, V, G>
where
    P: PaymentRepository,
    U: UserRepository,
    V: PayFastValidator + ?Sized,
    G: StripeGateway + ?Sized,
{
    async fn start_payfast(
        &self,
        request: CheckoutRequest,
    ) -> Result<PayFastCheckoutStarted, Error> {
        let merchant = self
            .settings
            .payfast
            .as_ref()
            .ok_or_else(|| Error::service_unavailable("PayFast payments are not configured"))?;
        let SubjectQuote { subject, quote } = self.quote(&request, DEFAULT_COUNTRY).await?;
        if quote.currency != BASE_CURRENCY {
            return Err(Error::invalid_request("PayFast only accepts payments in rand"));
        }

        let enrollment = self
            .collaborators
            .enrollments
            .begin_checkout(&request.user_id, subject.id, &quote)
            .await?;
        let reference = new_payment_reference();
        self.log_pending(NewPaymentLog {
            user_id: Some(request.user_id),
            subject_id: Some(subject.id),
            amount_cents: quote.total_cents,
            currency: quote.currency.clone(),
            provider: PaymentProvider::PayFast,
            external_ref: reference.clone(),
            purpose: ENROLLMENT_PURPOSE.to_owned(),
            meta: Some(json!({
                "country": request.country_code,
                "subject": subject.slug,
                "price_version": PRICE_VERSION,
            })),
        })
        .await?;

        let form = checkout_form(
            merchant,
            &PayFastCheckout {
                return_url: self.settings.url(&format!("/checkout/return?ref={reference}")),
                cancel_url: self.settings.url(&format!("/checkout/cancel?ref={reference}")),
                notify_url: self.settings.url("/api/v1/payments/payfast/notify"),
                reference: reference.clone(),
                amount_cents: quote.total_cents,
                item_name: subject.item_name(),
                email: request.email.to_string(),
                subject_slug: subject.slug.clone(),
                user_id: request.user_id.to_string(),
            },
        );
        info!(%reference, user_id = %request.user_id, subject = %subject.slug, "payfast checkout started");
        Ok(PayFastCheckoutStarted {
            reference,
            subject,
            quote,
            enrollment,
            form,
        })
    }

    async fn handle_payfast_notification(
        &self,
        request: PayFastNotificationRequest,
    ) -> Result<CallbackOutcome, Error> {
        let passphrase = self
            .settings
            .payfast
            .as_ref()
            .and_then(PayFastMerchant::passphrase);
        let notification = verify_notification(&request.raw_body, passphrase).map_err(|err| {
            warn!(error = %err, "payfast notification rejected");
            Error::invalid_request(err.to_string())
        })?;
        self.check_payfast_source(request.source_ip)?;

        let valid = self
            .payfast_validator
            .validate(&notification.fields)
            .await
            .map_err(map_gateway_error)?;
        if !valid {
            warn!(reference = %notification.reference, "payfast did not confirm notification");
            return Err(Error::invalid_request("PayFast did not confirm the notification"));
        }

        let log = self
            .find_log(PaymentProvider::PayFast, &notification.reference)
            .await?
            .ok_or_else(|| {
                Error::invalid_request(format!(
                    "unknown payment reference {}",
                    notification.reference
                ))
            })?;
        if log.amount_cents != notification.amount_gross_cents {
            warn!(
                reference = %notification.reference,
                expected = log.amount_cents,
                received = notification.amount_gross_cents,
                "payfast amount mismatch"
            );
            return Err(Error::invalid_request("notification amount does not match"));
        }
        if log.status == PaymentStatus::Paid {
            info!(reference = %notification.reference, "payfast notification for a settled payment");
            return Ok(already_settled());
        }

        let status = match notification.status {
            PayFastPaymentStatus::Complete => return self.settle_payfast(notification, log).await,
            PayFastPaymentStatus::Failed => PaymentStatus::Failed,
            PayFastPaymentStatus::Cancelled => PaymentStatus::Canceled,
            PayFastPaymentStatus::Other => {
                return Ok(CallbackOutcome::Ignored {
                    reason: "payment status needs no action".to_owned(),
                });
            }
        };
        self.mark(
            PaymentProvider::PayFast,
            &notification.reference,
            status,
            json!({ "pf_payment_id": notification.pf_payment_id }),
        )
        .await?;
        Ok(CallbackOutcome::Recorded {
            reference: notification.reference,
            status,
        })
    }

    async fn start_stripe(&self, request: CheckoutRequest) -> Result<StripeCheckoutStarted, Error> {
        let SubjectQuote { subject, quote } = self.quote(&request, &request.country_code).await?;
        let enrollment = self
            .collaborators
            .enrollments
            .begin_checkout(&request.user_id, subject.id, &quote)
            .await?;
        let reference = new_payment_reference();
        let session = self
            .stripe
            .create_checkout_session(&CheckoutSessionRequest {
                user_id: request.user_id,
                email: request.email.to_string(),
                subject_slug: subject.slug.clone(),
                item_name: subject.item_name(),
                currency: quote.currency.clone(),
                amount_cents: quote.total_cents,
                reference: reference.clone(),
                success_url: self
                    .settings
                    .url("/checkout/stripe/success?session_id={CHECKOUT_SESSION_ID}"),
                cancel_url: self.settings.url("/checkout/stripe/cancel"),
            })
            .await
            .map_err(map_gateway_error)?;

        self.payments
            .upsert_stripe_payment(&StripePaymentRecord {
                session_id: session.id.clone(),
                user_id: Some(request.user_id),
                payment_intent_id: None,
                customer_id: None,
                email: Some(request.email.to_string()),
                amount_total_cents: Some(quote.total_cents),
                currency: Some(quote.currency.clone()),
                status: "open".to_owned(),
                purpose: Some(ENROLLMENT_PURPOSE.to_owned()),
                receipt_url: None,
                paid_at: None,
            })
            .await
            .map_err(map_payment_error)?;
        self.log_pending(NewPaymentLog {
            user_id: Some(request.user_id),
            subject_id: Some(subject.id),
            amount_cents: quote.total_cents,
            currency: quote.currency.clone(),
            provider: PaymentProvider::Stripe,
            external_ref: session.id.clone(),
            purpose: ENROLLMENT_PURPOSE.to_owned(),
            meta: Some(json!({
                "reference": reference,
                "country": quote.country_code,
                "price_version": PRICE_VERSION,
            })),
        })
        .await?;

        info!(session_id = %session.id, user_id = %request.user_id, subject = %subject.slug, "stripe checkout started");
        Ok(StripeCheckoutStarted {
            reference,
            subject,
            quote,
            enrollment,
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    async fn handle_stripe_webhook(
        &self,
        request: StripeWebhookRequest,
    ) -> Result<CallbackOutcome, Error> {
        let secret = self
            .settings
            .stripe_webhook_secret
            .as_ref()
            .ok_or_else(|| Error::service_unavailable("Stripe webhooks are not configured"))?;
        verify_webhook(
            &request.payload,
            &request.signature_header,
            secret.as_str(),
            self.clock.utc(),
        )
        .map_err(|err| {
            warn!(error = %err, "stripe webhook rejected");
            Error::invalid_request(err.to_string())
        })?;

        let event = StripeEvent::parse(&request.payload)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        match event.completed_session() {
            Some(Ok(session)) => self.complete_stripe_session(session).await,
            Some(Err(err)) => Err(Error::invalid_request(err.to_string())),
            None => Ok(CallbackOutcome::Ignored {
                reason: format!("event {} needs no action", event.kind),
            }),
        }
    }

    async fn cancel_stripe(&self, user_id: UserId, session_id: String) -> Result<(), Error> {
        let canceled = self
            .payments
            .cancel_stripe_payment(&session_id, &user_id, self.clock.utc())
            .await
            .map_err(map_payment_error)?;
        if !canceled {
            return Err(Error::not_found(format!(
                "no open stripe session {session_id}"
            )));
        }
        self.mark(
            PaymentProvider::Stripe,
            &session_id,
            PaymentStatus::Canceled,
            json!({ "canceled_by": "buyer" }),
        )
        .await
    }

    async fn list_payments(&self, limit: i64) -> Result<Vec<PaymentLogEntry>, Error> {
        self.payments
            .list(limit.clamp(1, PAYMENT_LIST_MAX))
            .await
            .map_err(map_payment_error)
    }
}

#[cfg(test)]
#[path = "checkout_service_tests.rs"]
mod tests;
