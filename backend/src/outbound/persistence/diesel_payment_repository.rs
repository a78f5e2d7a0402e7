//! PostgreSQL-backed payment audit log and Stripe session records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz, Uuid as SqlUuid};
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde_json::Value;

use crate::domain::payments::stripe::{StripePayment, StripePaymentRecord};
use crate::domain::ports::{PaymentRepository, PaymentRepositoryError};
use crate::domain::{NewPaymentLog, PaymentLogEntry, PaymentProvider, PaymentStatus, UserId};

use super::diesel_helpers::{DbFailure, classify_diesel_error, collect_rows, pool_error_message};
use super::models::{NewPaymentLogRow, PaymentLogRow, StripePaymentRow};
use super::pool::{DbPool, PoolError};
use super::schema::{auth_payment_log, stripe_payment};

/// Status stored when a buyer abandons a Stripe session.
const STRIPE_CANCELED: &str = "canceled";
/// Status of a session that can still be paid or cancelled.
const STRIPE_OPEN: &str = "open";

// Fields the caller leaves empty keep their stored value.
const UPSERT_STRIPE_SQL: &str = r#"
INSERT INTO stripe_payment (
    session_id, user_id, payment_intent_id, customer_id, email,
    amount_total_cents, currency, status, purpose, receipt_url, paid_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (session_id)
DO UPDATE SET
    user_id = COALESCE(EXCLUDED.user_id, stripe_payment.user_id),
    payment_intent_id = COALESCE(EXCLUDED.payment_intent_id, stripe_payment.payment_intent_id),
    customer_id = COALESCE(EXCLUDED.customer_id, stripe_payment.customer_id),
    email = COALESCE(EXCLUDED.email, stripe_payment.email),
    amount_total_cents = COALESCE(EXCLUDED.amount_total_cents, stripe_payment.amount_total_cents),
    currency = COALESCE(EXCLUDED.currency, stripe_payment.currency),
    status = EXCLUDED.status,
    purpose = COALESCE(EXCLUDED.purpose, stripe_payment.purpose),
    receipt_url = COALESCE(EXCLUDED.receipt_url, stripe_payment.receipt_url),
    paid_at = COALESCE(EXCLUDED.paid_at, stripe_payment.paid_at),
    updated_at = now()
RETURNING *
"#;

/// Diesel-backed implementation of the [`PaymentRepository`] port.
#[derive(Clone)]
pub struct DieselPaymentRepository {
    pool: DbPool,
}

impl DieselPaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PaymentRepositoryError {
    PaymentRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> PaymentRepositoryError {
    match classify_diesel_error(error, "payments") {
        DbFailure::Connection(message) => PaymentRepositoryError::connection(message),
        DbFailure::ForeignKeyViolation { constraint } => PaymentRepositoryError::query(format!(
            "payment references a missing row ({})",
            constraint.unwrap_or_default()
        )),
        DbFailure::UniqueViolation { constraint } => PaymentRepositoryError::query(format!(
            "duplicate payment ({})",
            constraint.unwrap_or_default()
        )),
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            PaymentRepositoryError::query(message)
        }
    }
}

fn row_to_entry(row: PaymentLogRow) -> Result<PaymentLogEntry, String> {
    let status = PaymentStatus::parse(&row.status)
        .ok_or_else(|| format!("payment {} has unknown status {:?}", row.id, row.status))?;
    let provider = PaymentProvider::parse(&row.provider)
        .ok_or_else(|| format!("payment {} has unknown provider {:?}", row.id, row.provider))?;
    Ok(PaymentLogEntry {
        id: row.id,
        user_id: row.user_id.map(UserId::from_uuid),
        subject_id: row.subject_id,
        amount_cents: row.amount_cents,
        currency: row.currency,
        status,
        provider,
        external_ref: row.external_ref,
        purpose: row.purpose,
        meta: row.meta,
        created_at: row.created_at,
    })
}

fn row_to_stripe_payment(row: StripePaymentRow) -> StripePayment {
    StripePayment {
        id: row.id,
        session_id: row.session_id,
        user_id: row.user_id.map(UserId::from_uuid),
        payment_intent_id: row.payment_intent_id,
        customer_id: row.customer_id,
        email: row.email,
        amount_total_cents: row.amount_total_cents,
        currency: row.currency,
        status: row.status,
        purpose: row.purpose,
        receipt_url: row.receipt_url,
        paid_at: row.paid_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// Shallow-merge `patch` into `current`; non-object values replace it.
fn merge_meta(current: Option<Value>, patch: Option<Value>) -> Option<Value> {
    match (current, patch) {
        (Some(Value::Object(mut base)), Some(Value::Object(extra))) => {
            base.extend(extra);
            Some(Value::Object(base))
        }
        (current, None) => current,
        (_, patch) => patch,
    }
}

#[async_trait]
impl PaymentRepository for DieselPaymentRepository {
    async fn record(&self, entry: &NewPaymentLog) -> Result<PaymentLogEntry, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewPaymentLogRow {
            user_id: entry.user_id.map(|id| *id.as_uuid()),
            subject_id: entry.subject_id,
            amount_cents: entry.amount_cents,
            currency: &entry.currency,
            status: PaymentStatus::Pending.as_str(),
            provider: entry.provider.as_str(),
            external_ref: &entry.external_ref,
            purpose: &entry.purpose,
            meta: entry.meta.as_ref(),
        };
        let row: PaymentLogRow = diesel::insert_into(auth_payment_log::table)
            .values(&new_row)
            .on_conflict((auth_payment_log::provider, auth_payment_log::external_ref))
            .do_update()
            .set((
                auth_payment_log::amount_cents.eq(excluded(auth_payment_log::amount_cents)),
                auth_payment_log::currency.eq(excluded(auth_payment_log::currency)),
                auth_payment_log::meta.eq(excluded(auth_payment_log::meta)),
            ))
            .returning(PaymentLogRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_entry(row).map_err(PaymentRepositoryError::query)
    }

    async fn find_by_reference(
        &self,
        provider: PaymentProvider,
        external_ref: &str,
    ) -> Result<Option<PaymentLogEntry>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PaymentLogRow> = auth_payment_log::table
            .filter(auth_payment_log::provider.eq(provider.as_str()))
            .filter(auth_payment_log::external_ref.eq(external_ref))
            .select(PaymentLogRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_entry)
            .transpose()
            .map_err(PaymentRepositoryError::query)
    }

    async fn set_status(
        &self,
        provider: PaymentProvider,
        external_ref: &str,
        status: PaymentStatus,
        meta: Option<Value>,
    ) -> Result<bool, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let current: Option<(i64, Option<Value>)> = auth_payment_log::table
                    .filter(auth_payment_log::provider.eq(provider.as_str()))
                    .filter(auth_payment_log::external_ref.eq(external_ref))
                    .select((auth_payment_log::id, auth_payment_log::meta))
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let Some((id, current_meta)) = current else {
                    return Ok(false);
                };

                diesel::update(auth_payment_log::table.find(id))
                    .set((
                        auth_payment_log::status.eq(status.as_str()),
                        auth_payment_log::meta.eq(merge_meta(current_meta, meta)),
                    ))
                    .execute(conn)
                    .await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn list(&self, limit: i64) -> Result<Vec<PaymentLogEntry>, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PaymentLogRow> = auth_payment_log::table
            .order((auth_payment_log::created_at.desc(), auth_payment_log::id.desc()))
            .limit(limit)
            .select(PaymentLogRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        collect_rows(rows.into_iter().map(row_to_entry), PaymentRepositoryError::query)
    }

    async fn upsert_stripe_payment(
        &self,
        record: &StripePaymentRecord,
    ) -> Result<StripePayment, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: StripePaymentRow = sql_query(UPSERT_STRIPE_SQL)
            .bind::<Text, _>(&record.session_id)
            .bind::<Nullable<SqlUuid>, _>(record.user_id.map(|id| *id.as_uuid()))
            .bind::<Nullable<Text>, _>(record.payment_intent_id.as_deref())
            .bind::<Nullable<Text>, _>(record.customer_id.as_deref())
            .bind::<Nullable<Text>, _>(record.email.as_deref())
            .bind::<Nullable<BigInt>, _>(record.amount_total_cents)
            .bind::<Nullable<Text>, _>(record.currency.as_deref())
            .bind::<Text, _>(&record.status)
            .bind::<Nullable<Text>, _>(record.purpose.as_deref())
            .bind::<Nullable<Text>, _>(record.receipt_url.as_deref())
            .bind::<Nullable<Timestamptz>, _>(record.paid_at)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_stripe_payment(row))
    }

    async fn cancel_stripe_payment(
        &self,
        session_id: &str,
        user_id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, PaymentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            stripe_payment::table
                .filter(stripe_payment::session_id.eq(session_id))
                .filter(stripe_payment::user_id.eq(user_id.as_uuid()))
                .filter(stripe_payment::status.eq(STRIPE_OPEN)),
        )
        .set((
            stripe_payment::status.eq(STRIPE_CANCELED),
            stripe_payment::updated_at.eq(at),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Some(json!({"a": 1})), Some(json!({"b": 2})), Some(json!({"a": 1, "b": 2})))]
    #[case(Some(json!({"a": 1})), Some(json!({"a": 3})), Some(json!({"a": 3})))]
    #[case(Some(json!({"a": 1})), None, Some(json!({"a": 1})))]
    #[case(None, Some(json!({"b": 2})), Some(json!({"b": 2})))]
    fn meta_is_shallow_merged(
        #[case] current: Option<Value>,
        #[case] patch: Option<Value>,
        #[case] expected: Option<Value>,
    ) {
        assert_eq!(merge_meta(current, patch), expected);
    }

    #[rstest]
    fn log_rows_with_unknown_providers_are_corrupt() {
        let err = row_to_entry(PaymentLogRow {
            id: 7,
            user_id: None,
            subject_id: None,
            amount_cents: 100,
            currency: "ZAR".to_owned(),
            status: "paid".to_owned(),
            provider: "paypal".to_owned(),
            external_ref: "AIT-1".to_owned(),
            purpose: "enrollment".to_owned(),
            meta: None,
            created_at: Utc::now(),
        })
        .expect_err("unknown provider");
        assert!(err.contains("paypal"));
    }
}
