//! School fee ledger service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::Error;
use crate::domain::fees::{
    AccountBalance, FeePayment, Learner, LearnerDetail, LearnerId, NewFeeAccount, NewFeePayment,
    NewLearner,
};
use crate::domain::ports::{FeeLedger, FeeLedgerRepository, FeeLedgerRepositoryError};

fn map_fee_error(error: FeeLedgerRepositoryError) -> Error {
    match error {
        FeeLedgerRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("fee ledger unavailable: {message}"))
        }
        FeeLedgerRepositoryError::Query { message } => {
            Error::internal(format!("fee ledger error: {message}"))
        }
        FeeLedgerRepositoryError::MissingReference { message } => Error::not_found(message),
        FeeLedgerRepositoryError::DuplicateAccount {
            learner_id,
            school_year,
        } => Error::conflict(format!(
            "learner {learner_id} already has an account for {school_year}"
        )),
    }
}

/// Fee ledger service implementing the [`FeeLedger`] port.
#[derive(Clone)]
pub struct FeeLedgerService<F> {
    ledger: Arc<F>,
}

impl<F> FeeLedgerService<F> {
    pub fn new(ledger: Arc<F>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<F> FeeLedger for FeeLedgerService<F>
where
    F: FeeLedgerRepository,
{
    async fn balances(&self) -> Result<Vec<AccountBalance>, Error> {
        let mut rows = self.ledger.balances().await.map_err(map_fee_error)?;
        rows.sort_by(AccountBalance::ledger_order);
        Ok(rows)
    }

    async fn learner_detail(&self, id: LearnerId) -> Result<LearnerDetail, Error> {
        let learner = self
            .ledger
            .learner(id)
            .await
            .map_err(map_fee_error)?
            .ok_or_else(|| Error::not_found(format!("learner {id} not found")))?;
        let mut accounts = self
            .ledger
            .learner_balances(id)
            .await
            .map_err(map_fee_error)?;
        accounts.sort_by(AccountBalance::ledger_order);
        let payments = match accounts.first() {
            Some(latest) => self
                .ledger
                .payments(latest.account_id)
                .await
                .map_err(map_fee_error)?,
            None => Vec::new(),
        };
        Ok(LearnerDetail {
            learner,
            accounts,
            payments,
        })
    }

    async fn add_learner(&self, learner: NewLearner) -> Result<Learner, Error> {
        let created = self
            .ledger
            .add_learner(&learner)
            .await
            .map_err(map_fee_error)?;
        info!(learner_id = created.id, "learner added");
        Ok(created)
    }

    async fn open_account(&self, account: NewFeeAccount) -> Result<AccountBalance, Error> {
        self.ledger
            .open_account(&account)
            .await
            .map_err(map_fee_error)
    }

    async fn record_payment(&self, payment: NewFeePayment) -> Result<FeePayment, Error> {
        let stored = self
            .ledger
            .record_payment(&payment)
            .await
            .map_err(map_fee_error)?;
        info!(account_id = stored.account_id, paid_cents = stored.paid_cents, "fee payment recorded");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{FixtureFeeLedgerRepository, MockFeeLedgerRepository};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn balance(account_id: i32, school_year: i32) -> AccountBalance {
        AccountBalance {
            account_id,
            learner_id: 1,
            learner_name: "Thandi Mokoena".to_owned(),
            class_name: "7A".to_owned(),
            school_year,
            annual_fee_cents: 1_200_000,
            total_paid_cents: 300_000,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn detail_lists_payments_for_latest_account() {
        let mut repo = MockFeeLedgerRepository::new();
        repo.expect_learner().returning(|id| {
            Ok(Some(Learner {
                id,
                full_name: "Thandi Mokoena".to_owned(),
                class_name: "7A".to_owned(),
            }))
        });
        repo.expect_learner_balances()
            .returning(|_| Ok(vec![balance(1, 2024), balance(2, 2025)]));
        repo.expect_payments()
            .withf(|account_id| *account_id == 2)
            .times(1)
            .returning(|account_id| {
                Ok(vec![FeePayment {
                    id: 9,
                    account_id,
                    paid_cents: 300_000,
                    paid_on: NaiveDate::from_ymd_opt(2025, 2, 1).expect("date"),
                    method: Some("EFT".to_owned()),
                    reference: None,
                }])
            });

        let detail = FeeLedgerService::new(Arc::new(repo))
            .learner_detail(1)
            .await
            .expect("detail");
        assert_eq!(
            detail.accounts.iter().map(|a| a.school_year).collect::<Vec<_>>(),
            [2025, 2024]
        );
        assert_eq!(detail.payments.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_learner_is_not_found() {
        let err = FeeLedgerService::new(Arc::new(FixtureFeeLedgerRepository))
            .learner_detail(42)
            .await
            .expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_accounts_conflict() {
        let mut repo = MockFeeLedgerRepository::new();
        repo.expect_open_account()
            .returning(|account| {
                Err(FeeLedgerRepositoryError::duplicate_account(
                    account.learner_id,
                    account.school_year,
                ))
            });
        let account = NewFeeAccount::try_new(1, 2025, 1_200_000).expect("account");

        let err = FeeLedgerService::new(Arc::new(repo))
            .open_account(account)
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[tokio::test]
    async fn payments_against_missing_accounts_are_not_found() {
        let payment = NewFeePayment::try_new(
            77,
            50_000,
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("date"),
            None,
            None,
        )
        .expect("payment");

        let err = FeeLedgerService::new(Arc::new(FixtureFeeLedgerRepository))
            .record_payment(payment)
            .await
            .expect_err("missing account");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
