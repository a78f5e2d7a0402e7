//! Driving port for quotes and price administration.

use async_trait::async_trait;

use crate::domain::{
    BasePrice, CountryPrice, Error, NewBasePrice, Quote, Role, Subject,
};

/// Inputs for a learner quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub subject_key: String,
    pub role: Role,
    /// Two-letter country code, already detected by the caller.
    pub country_code: String,
}

/// A quote together with the subject it prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectQuote {
    pub subject: Subject,
    pub quote: Quote,
}

/// Admin request to set a country tier.
///
/// `local_amount_cents` wins when given. Otherwise the local amount is the
/// anchor (`zar_amount_cents`, or the subject's base price) converted with
/// `fx_rate_ppm`, or with the stored rate for the country's currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryPriceRequest {
    pub subject_key: String,
    pub country_code: String,
    pub local_amount_cents: Option<i64>,
    pub zar_amount_cents: Option<i64>,
    pub fx_rate_ppm: Option<i64>,
    pub active: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pricing: Send + Sync {
    /// Price a subject for a role and country.
    async fn quote(&self, request: QuoteRequest) -> Result<SubjectQuote, Error>;

    /// Every base price row.
    async fn list_prices(&self) -> Result<Vec<BasePrice>, Error>;

    /// Add a base price row.
    async fn create_price(&self, price: NewBasePrice) -> Result<BasePrice, Error>;

    /// Country tiers for one subject.
    async fn list_country_prices(&self, subject_key: String) -> Result<Vec<CountryPrice>, Error>;

    /// Insert or replace a country tier.
    async fn upsert_country_price(&self, request: CountryPriceRequest)
    -> Result<CountryPrice, Error>;

    /// Load the built-in currency reference rows; returns how many were written.
    async fn seed_currencies(&self) -> Result<usize, Error>;
}
