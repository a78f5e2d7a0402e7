//! Port for the payment audit log and Stripe payment records.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::payments::stripe::{StripePayment, StripePaymentRecord};
use crate::domain::{NewPaymentLog, PaymentLogEntry, PaymentProvider, PaymentStatus, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by payment repository adapters.
    pub enum PaymentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "payment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "payment repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Write a `pending` audit row.
    async fn record(&self, entry: &NewPaymentLog) -> Result<PaymentLogEntry, PaymentRepositoryError>;

    /// Fetch an audit row by gateway and external reference.
    async fn find_by_reference(
        &self,
        provider: PaymentProvider,
        external_ref: &str,
    ) -> Result<Option<PaymentLogEntry>, PaymentRepositoryError>;

    /// Move an audit row to `status`, merging `meta` into the stored
    /// metadata. Returns whether a row was updated.
    async fn set_status(
        &self,
        provider: PaymentProvider,
        external_ref: &str,
        status: PaymentStatus,
        meta: Option<Value>,
    ) -> Result<bool, PaymentRepositoryError>;

    /// Most recent audit rows, newest first.
    async fn list(&self, limit: i64) -> Result<Vec<PaymentLogEntry>, PaymentRepositoryError>;

    /// Insert or update a Stripe payment keyed by session id. Absent fields
    /// keep their stored values.
    async fn upsert_stripe_payment(
        &self,
        record: &StripePaymentRecord,
    ) -> Result<StripePayment, PaymentRepositoryError>;

    /// Mark `user_id`'s open Stripe payment canceled at `at`. Returns
    /// whether a row was updated; sessions owned by someone else are left
    /// alone.
    async fn cancel_stripe_payment(
        &self,
        session_id: &str,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, PaymentRepositoryError>;
}

/// Fixture repository that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePaymentRepository;

#[async_trait]
impl PaymentRepository for FixturePaymentRepository {
    async fn record(&self, entry: &NewPaymentLog) -> Result<PaymentLogEntry, PaymentRepositoryError> {
        Ok(PaymentLogEntry {
            id: 0,
            user_id: entry.user_id,
            subject_id: entry.subject_id,
            amount_cents: entry.amount_cents,
            currency: entry.currency.clone(),
            status: PaymentStatus::Pending,
            provider: entry.provider,
            external_ref: entry.external_ref.clone(),
            purpose: entry.purpose.clone(),
            meta: entry.meta.clone(),
            created_at: Utc::now(),
        })
    }

    async fn find_by_reference(
        &self,
        _provider: PaymentProvider,
        _external_ref: &str,
    ) -> Result<Option<PaymentLogEntry>, PaymentRepositoryError> {
        Ok(None)
    }

    async fn set_status(
        &self,
        _provider: PaymentProvider,
        _external_ref: &str,
        _status: PaymentStatus,
        _meta: Option<Value>,
    ) -> Result<bool, PaymentRepositoryError> {
        Ok(false)
    }

    async fn list(&self, _limit: i64) -> Result<Vec<PaymentLogEntry>, PaymentRepositoryError> {
        Ok(Vec::new())
    }

    async fn upsert_stripe_payment(
        &self,
        record: &StripePaymentRecord,
    ) -> Result<StripePayment, PaymentRepositoryError> {
        let now = Utc::now();
        Ok(StripePayment {
            id: 0,
            session_id: record.session_id.clone(),
            user_id: record.user_id,
            payment_intent_id: record.payment_intent_id.clone(),
            customer_id: record.customer_id.clone(),
            email: record.email.clone(),
            amount_total_cents: record.amount_total_cents,
            currency: record.currency.clone(),
            status: record.status.clone(),
            purpose: record.purpose.clone(),
            receipt_url: record.receipt_url.clone(),
            paid_at: record.paid_at,
            created_at: now,
            updated_at: now,
        })
    }

    async fn cancel_stripe_payment(
        &self,
        _session_id: &str,
        _user_id: &UserId,
        _at: DateTime<Utc>,
    ) -> Result<bool, PaymentRepositoryError> {
        Ok(false)
    }
}
