//! Port for the school fee ledger.
use async_trait::async_trait;

use crate::domain::fees::{
    AccountBalance, FeeAccountId, FeePayment, Learner, LearnerId, NewFeeAccount, NewFeePayment,
    NewLearner,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by fee ledger adapters.
    pub enum FeeLedgerRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "fee ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "fee ledger query failed: {message}",
        /// A referenced learner or account does not exist.
        MissingReference { message: String } => "fee ledger reference missing: {message}",
        /// The learner already has an account for that school year.
        DuplicateAccount { learner_id: LearnerId, school_year: i32 } =>
            "learner {learner_id} already has an account for {school_year}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeLedgerRepository: Send + Sync {
    /// Balance per account, newest year first, then class and name.
    async fn balances(&self) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError>;

    /// Fetch a learner.
    async fn learner(&self, id: LearnerId) -> Result<Option<Learner>, FeeLedgerRepositoryError>;

    /// Balances for one learner's accounts, newest year first.
    async fn learner_balances(
        &self,
        id: LearnerId,
    ) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError>;

    /// Payments on one account, newest first.
    async fn payments(
        &self,
        account_id: FeeAccountId,
    ) -> Result<Vec<FeePayment>, FeeLedgerRepositoryError>;

    async fn add_learner(&self, learner: &NewLearner) -> Result<Learner, FeeLedgerRepositoryError>;

    async fn open_account(
        &self,
        account: &NewFeeAccount,
    ) -> Result<AccountBalance, FeeLedgerRepositoryError>;

    async fn record_payment(
        &self,
        payment: &NewFeePayment,
    ) -> Result<FeePayment, FeeLedgerRepositoryError>;
}

/// Fixture ledger with no learners.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureFeeLedgerRepository;

#[async_trait]
impl FeeLedgerRepository for FixtureFeeLedgerRepository {
    async fn balances(&self) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError> {
        Ok(Vec::new())
    }

    async fn learner(&self, _id: LearnerId) -> Result<Option<Learner>, FeeLedgerRepositoryError> {
        Ok(None)
    }

    async fn learner_balances(
        &self,
        _id: LearnerId,
    ) -> Result<Vec<AccountBalance>, FeeLedgerRepositoryError> {
        Ok(Vec::new())
    }

    async fn payments(
        &self,
        _account_id: FeeAccountId,
    ) -> Result<Vec<FeePayment>, FeeLedgerRepositoryError> {
        Ok(Vec::new())
    }

    async fn add_learner(&self, learner: &NewLearner) -> Result<Learner, FeeLedgerRepositoryError> {
        Ok(Learner {
            id: 0,
            full_name: learner.full_name().to_owned(),
            class_name: learner.class_name().to_owned(),
        })
    }

    async fn open_account(
        &self,
        account: &NewFeeAccount,
    ) -> Result<AccountBalance, FeeLedgerRepositoryError> {
        Err(FeeLedgerRepositoryError::missing_reference(format!(
            "learner {} not found",
            account.learner_id
        )))
    }

    async fn record_payment(
        &self,
        payment: &NewFeePayment,
    ) -> Result<FeePayment, FeeLedgerRepositoryError> {
        Err(FeeLedgerRepositoryError::missing_reference(format!(
            "account {} not found",
            payment.account_id
        )))
    }
}
