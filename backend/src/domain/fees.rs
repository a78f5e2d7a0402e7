//! School fee ledger: learners, yearly fee accounts and the payments made
//! against them.

use std::cmp::Ordering;

use chrono::NaiveDate;

/// Database identifier of a learner.
pub type LearnerId = i32;
/// Database identifier of a fee account.
pub type FeeAccountId = i32;

const NAME_MAX_CHARS: usize = 120;

/// Validation errors for ledger writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeValidationError {
    #[error("learner name must not be empty")]
    EmptyName,
    #[error("class name must not be empty")]
    EmptyClass,
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("school year {year} is out of range")]
    InvalidYear { year: i32 },
    #[error("annual fee must not be negative")]
    NegativeFee,
    #[error("payment amount must be positive")]
    NonPositivePayment,
}

fn required(raw: &str, field: &'static str, empty: FeeValidationError) -> Result<String, FeeValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(empty);
    }
    if value.chars().count() > NAME_MAX_CHARS {
        return Err(FeeValidationError::TooLong {
            field,
            max: NAME_MAX_CHARS,
        });
    }
    Ok(value.to_owned())
}

/// A learner on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub id: LearnerId,
    pub full_name: String,
    pub class_name: String,
}

/// Validated learner insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLearner {
    full_name: String,
    class_name: String,
}

impl NewLearner {
    pub fn try_new(full_name: &str, class_name: &str) -> Result<Self, FeeValidationError> {
        Ok(Self {
            full_name: required(full_name, "full name", FeeValidationError::EmptyName)?,
            class_name: required(class_name, "class name", FeeValidationError::EmptyClass)?,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

/// Validated fee account insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFeeAccount {
    pub learner_id: LearnerId,
    pub school_year: i32,
    pub annual_fee_cents: i64,
}

impl NewFeeAccount {
    pub fn try_new(
        learner_id: LearnerId,
        school_year: i32,
        annual_fee_cents: i64,
    ) -> Result<Self, FeeValidationError> {
        if !(2000..=2100).contains(&school_year) {
            return Err(FeeValidationError::InvalidYear { year: school_year });
        }
        if annual_fee_cents < 0 {
            return Err(FeeValidationError::NegativeFee);
        }
        Ok(Self {
            learner_id,
            school_year,
            annual_fee_cents,
        })
    }
}

/// A payment recorded against an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePayment {
    pub id: i32,
    pub account_id: FeeAccountId,
    pub paid_cents: i64,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
}

/// Validated payment insert. Only positive amounts are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeePayment {
    pub account_id: FeeAccountId,
    pub paid_cents: i64,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
}

impl NewFeePayment {
    pub fn try_new(
        account_id: FeeAccountId,
        paid_cents: i64,
        paid_on: NaiveDate,
        method: Option<&str>,
        reference: Option<&str>,
    ) -> Result<Self, FeeValidationError> {
        if paid_cents <= 0 {
            return Err(FeeValidationError::NonPositivePayment);
        }
        let tidy = |raw: Option<&str>| raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned);
        Ok(Self {
            account_id,
            paid_cents,
            paid_on,
            method: tidy(method),
            reference: tidy(reference),
        })
    }
}

/// Fee, paid and outstanding amounts for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub account_id: FeeAccountId,
    pub learner_id: LearnerId,
    pub learner_name: String,
    pub class_name: String,
    pub school_year: i32,
    pub annual_fee_cents: i64,
    pub total_paid_cents: i64,
}

impl AccountBalance {
    /// Amount still owed; negative when the account is in credit.
    pub fn outstanding_cents(&self) -> i64 {
        self.annual_fee_cents.saturating_sub(self.total_paid_cents)
    }

    /// Ledger order: newest year first, then class, then learner name.
    pub fn ledger_order(&self, other: &Self) -> Ordering {
        other
            .school_year
            .cmp(&self.school_year)
            .then_with(|| self.class_name.cmp(&other.class_name))
            .then_with(|| self.learner_name.cmp(&other.learner_name))
    }
}

/// Everything shown on a learner's page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerDetail {
    pub learner: Learner,
    /// Accounts, newest school year first.
    pub accounts: Vec<AccountBalance>,
    /// Payments on the most recent account, newest first.
    pub payments: Vec<FeePayment>,
}
