//! Driving port for the school fee ledger.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::fees::{
    AccountBalance, FeePayment, Learner, LearnerDetail, LearnerId, NewFeeAccount, NewFeePayment,
    NewLearner,
};

/// Fee ledger use-cases for administrators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeLedger: Send + Sync {
    /// Fee, paid and outstanding per account.
    async fn balances(&self) -> Result<Vec<AccountBalance>, Error>;

    /// A learner with their accounts and payments.
    async fn learner_detail(&self, id: LearnerId) -> Result<LearnerDetail, Error>;

    async fn add_learner(&self, learner: NewLearner) -> Result<Learner, Error>;

    async fn open_account(&self, account: NewFeeAccount) -> Result<AccountBalance, Error>;

    async fn record_payment(&self, payment: NewFeePayment) -> Result<FeePayment, Error>;
}
