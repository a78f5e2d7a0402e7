//! Port for price tables and country currency reference data.
use async_trait::async_trait;

use crate::domain::{BasePrice, CountryCurrency, CountryPrice, NewBasePrice, SubjectId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by pricing repository adapters.
    pub enum PricingRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "pricing repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "pricing repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingRepository: Send + Sync {
    /// Base price rows for one subject, live or not.
    async fn base_prices(&self, subject_id: SubjectId)
    -> Result<Vec<BasePrice>, PricingRepositoryError>;

    /// Every base price row, newest first.
    async fn all_base_prices(&self) -> Result<Vec<BasePrice>, PricingRepositoryError>;

    /// Insert a base price row.
    async fn create_base_price(
        &self,
        price: &NewBasePrice,
    ) -> Result<BasePrice, PricingRepositoryError>;

    /// Country tier for a subject.
    async fn country_price(
        &self,
        subject_id: SubjectId,
        country_code: &str,
    ) -> Result<Option<CountryPrice>, PricingRepositoryError>;

    /// Every country tier for a subject, ordered by country code.
    async fn country_prices(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<CountryPrice>, PricingRepositoryError>;

    /// Insert or replace the tier for `(subject_id, country_code)`.
    async fn upsert_country_price(
        &self,
        price: &CountryPrice,
    ) -> Result<CountryPrice, PricingRepositoryError>;

    /// Currency reference data for a country.
    async fn currency(
        &self,
        country_code: &str,
    ) -> Result<Option<CountryCurrency>, PricingRepositoryError>;

    /// Insert or replace currency rows, returning how many were written.
    async fn upsert_currencies(
        &self,
        currencies: &[CountryCurrency],
    ) -> Result<usize, PricingRepositoryError>;
}

/// Fixture repository with empty tables, so every quote falls back to the
/// default price.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePricingRepository;

#[async_trait]
impl PricingRepository for FixturePricingRepository {
    async fn base_prices(
        &self,
        _subject_id: SubjectId,
    ) -> Result<Vec<BasePrice>, PricingRepositoryError> {
        Ok(Vec::new())
    }

    async fn all_base_prices(&self) -> Result<Vec<BasePrice>, PricingRepositoryError> {
        Ok(Vec::new())
    }

    async fn create_base_price(
        &self,
        price: &NewBasePrice,
    ) -> Result<BasePrice, PricingRepositoryError> {
        Ok(BasePrice {
            id: 0,
            subject_id: price.subject_id,
            role: price.role,
            plan: price.plan.clone(),
            currency: price.currency.clone(),
            amount_cents: price.amount_cents,
            active: true,
            active_from: price.active_from,
            active_to: price.active_to,
        })
    }

    async fn country_price(
        &self,
        _subject_id: SubjectId,
        _country_code: &str,
    ) -> Result<Option<CountryPrice>, PricingRepositoryError> {
        Ok(None)
    }

    async fn country_prices(
        &self,
        _subject_id: SubjectId,
    ) -> Result<Vec<CountryPrice>, PricingRepositoryError> {
        Ok(Vec::new())
    }

    async fn upsert_country_price(
        &self,
        price: &CountryPrice,
    ) -> Result<CountryPrice, PricingRepositoryError> {
        Ok(price.clone())
    }

    async fn currency(
        &self,
        _country_code: &str,
    ) -> Result<Option<CountryCurrency>, PricingRepositoryError> {
        Ok(None)
    }

    async fn upsert_currencies(
        &self,
        currencies: &[CountryCurrency],
    ) -> Result<usize, PricingRepositoryError> {
        Ok(currencies.len())
    }
}
