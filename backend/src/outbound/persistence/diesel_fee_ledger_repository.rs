//! PostgreSQL-backed school fee ledger.
//!
//! Balances are computed in SQL by summing payments per account, so an
//! account with no payments reports zero paid.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;

use crate::domain::fees::{
    AccountBalance, FeeAccountId, FeePayment, Learner, LearnerId, NewFeeAccount, NewFeePayment,
    NewLearner,
};
use crate::domain::ports::{FeeLedgerRepository, FeeLedgerRepositoryError};

use super::diesel_helpers::{DbFailure, classify_diesel_error, pool_error_message};
use super::models::{
    AccountBalanceRow, FeePaymentRow, LearnerRow, NewFeeAccountRow, NewFeePaymentRow,
    NewLearnerRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{fee_account, fee_learner, fee_payment};

const BALANCE_SELECT: &str = r"
SELECT a.id AS account_id,
       l.id AS learner_id,
       l.full_name::TEXT AS learner_name,
       l.class_name::TEXT AS class_name,
       a.school_year,
       a.annual_fee_cents,
       CAST(COALESCE(SUM(p.paid_cents), 0) AS BIGINT) AS total_paid_cents
FROM fee_account a
JOIN fee_learner l ON l.id = a.learner_id
LEFT JOIN fee_payment p ON p.account_id = a.id";

const BALANCE_GROUP: &str =
    "GROUP BY a.id, l.id, l.full_name, l.class_name, a.school_year, a.annual_fee_cents";

/// Diesel-backed implementation of the [`FeeLedgerRepository`] port.
#[derive(Clone)]
pub struct DieselFeeLedgerRepository {
    pool: DbPool,
}

impl DieselFeeLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> FeeLedgerRepositoryError {
    FeeLedgerRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> FeeLedgerRepositoryError {
    match classify_diesel_error(error, "fee ledger") {
        DbFailure::Connection(message) => FeeLedgerRepositoryError::connection(message),
        DbFailure::ForeignKeyViolation { constraint } => {
            FeeLedgerRepositoryError::missing_reference(
                constraint.unwrap_or_else(|| "unknown reference".to_owned()),
            )
        }
        DbFailure::UniqueViolation { constraint } => FeeLedgerRepositoryError::query(format!(
            "duplicate ledger row ({})",
            constraint.unwrap_or_default()
        )),
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            FeeLedgerRepositoryError::query(message)
        }
    }
}

fn balance_sql(filter: &str) -> String {
    format!("{BALANCE_SELECT} {filter} {BALANCE_GROUP} ORDER BY a.school_year DESC, l.class_name, l.full_name")
}

fn row_to_balance(row: AccountBalanceRow) -> AccountBalance {
    AccountBalance {
        account_id: row.account_id,
        learner_id: row.learner_id,
        learner_name: row.learner_name,
        class_name: row.class_name,
        school_year: row.school_year,
        annual_fee_cents: row.annual_fee_cents,
        total_paid_cents: row.total_paid_cents,
    }
}

fn row_to_payment(row: FeePaymentRow) -> FeePayment {
    FeePayment {
        id: row.id,
        account_id: row.account_id,
        paid_cents: row.paid_cents,
        paid_on: row.paid_on,
        method: row.method,
        reference: row.reference,
    }
}

#[async_trait]
impl FeeLedgerRepository for DieselFeeLedgerRepository {
    async fn balances(&self) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AccountBalanceRow> = diesel::sql_query(balance_sql(""))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_balance).collect())
    }

    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<LearnerRow> = fee_learner::table
            .find(id)
            .select(LearnerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| Learner {
            id: row.id,
            full_name: row.full_name,
            class_name: row.class_name,
        }))
    }

    async fn learner_balances(
        &self,
        id: LearnerId,
    ) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AccountBalanceRow> = diesel::sql_query(balance_sql("WHERE l.id = $1"))
            .bind::<Integer, _>(id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_balance).collect())
    }

    async fn payments(
        &self,
        account_id: FeeAccountId,
    ) -> Result<Vec<FeePayment>, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<FeePaymentRow> = fee_payment::table
            .filter(fee_payment::account_id.eq(account_id))
            .order((fee_payment::paid_on.desc(), fee_payment::id.desc()))
            .select(FeePaymentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn add_learner(&self, learner: &NewLearner) -> Result<Learner, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: LearnerRow = diesel::insert_into(fee_learner::table)
            .values(&NewLearnerRow {
                full_name: learner.full_name(),
                class_name: learner.class_name(),
            })
            .returning(LearnerRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(Learner {
            id: row.id,
            full_name: row.full_name,
            class_name: row.class_name,
        })
    }

    async fn open_account(
        &self,
        account: &NewFeeAccount,
    ) -> Result<AccountBalance, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted = diesel::insert_into(fee_account::table)
            .values(&NewFeeAccountRow {
                learner_id: account.learner_id,
                school_year: account.school_year,
                annual_fee_cents: account.annual_fee_cents,
            })
            .returning(fee_account::id)
            .get_result::<i32>(&mut conn)
            .await;
        let account_id = match inserted {
            Ok(id) => id,
            Err(error) => {
                return Err(match classify_diesel_error(error, "fee ledger") {
                    DbFailure::UniqueViolation { .. } => FeeLedgerRepositoryError::duplicate_account(
                        account.learner_id,
                        account.school_year,
                    ),
                    DbFailure::ForeignKeyViolation { .. } => {
                        FeeLedgerRepositoryError::missing_reference(format!(
                            "learner {} not found",
                            account.learner_id
                        ))
                    }
                    DbFailure::Connection(message) => FeeLedgerRepositoryError::connection(message),
                    DbFailure::Contention(message) | DbFailure::Other(message) => {
                        FeeLedgerRepositoryError::query(message)
                    }
                });
            }
        };

        let row: AccountBalanceRow = diesel::sql_query(balance_sql("WHERE a.id = $1"))
            .bind::<Integer, _>(account_id)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_balance(row))
    }

    async fn record_payment(
        &self,
        payment: &NewFeePayment,
    ) -> Result<FeePayment, FeeLedgerRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: FeePaymentRow = diesel::insert_into(fee_payment::table)
            .values(&NewFeePaymentRow {
                account_id: payment.account_id,
                paid_cents: payment.paid_cents,
                paid_on: payment.paid_on,
                method: payment.method.as_deref(),
                reference: payment.reference.as_deref(),
            })
            .returning(FeePaymentRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|error| match classify_diesel_error(error, "fee ledger") {
                DbFailure::ForeignKeyViolation { .. } => FeeLedgerRepositoryError::missing_reference(
                    format!("account {} not found", payment.account_id),
                ),
                DbFailure::Connection(message) => FeeLedgerRepositoryError::connection(message),
                DbFailure::UniqueViolation { constraint } => FeeLedgerRepositoryError::query(
                    format!("duplicate payment ({})", constraint.unwrap_or_default()),
                ),
                DbFailure::Contention(message) | DbFailure::Other(message) => {
                    FeeLedgerRepositoryError::query(message)
                }
            })?;
        Ok(row_to_payment(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn balance_sql_places_filters_before_grouping() {
        let sql = balance_sql("WHERE l.id = $1");
        let filter = sql.find("WHERE l.id").expect("filter present");
        let group = sql.find("GROUP BY").expect("group present");
        assert!(filter < group);
        assert!(sql.ends_with("ORDER BY a.school_year DESC, l.class_name, l.full_name"));
    }

    #[rstest]
    fn unpaid_balances_map_through() {
        let balance = row_to_balance(AccountBalanceRow {
            account_id: 2,
            learner_id: 1,
            learner_name: "Thandi M".to_owned(),
            class_name: "Grade 4".to_owned(),
            school_year: 2025,
            annual_fee_cents: 120_000,
            total_paid_cents: 0,
        });
        assert_eq!(balance.outstanding_cents(), 120_000);
    }
}
