//! PostgreSQL-backed price tables and currency reference data.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{PricingRepository, PricingRepositoryError};
use crate::domain::{BasePrice, CountryCurrency, CountryPrice, NewBasePrice, Role, SubjectId};

use super::diesel_helpers::{DbFailure, classify_diesel_error, pool_error_message};
use super::models::{
    BasePriceRow, CountryCurrencyRow, CountryPriceRow, NewBasePriceRow, NewCountryCurrencyRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{auth_pricing, ref_country_currency, subject_country_price};

/// Diesel-backed implementation of the [`PricingRepository`] port.
#[derive(Clone)]
pub struct DieselPricingRepository {
    pool: DbPool,
}

impl DieselPricingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PricingRepositoryError {
    PricingRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> PricingRepositoryError {
    match classify_diesel_error(error, "pricing") {
        DbFailure::Connection(message) => PricingRepositoryError::connection(message),
        DbFailure::ForeignKeyViolation { .. } => {
            PricingRepositoryError::query("price references an unknown subject")
        }
        DbFailure::UniqueViolation { constraint } => PricingRepositoryError::query(format!(
            "duplicate price ({})",
            constraint.unwrap_or_default()
        )),
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            PricingRepositoryError::query(message)
        }
    }
}

fn row_to_base_price(row: BasePriceRow) -> BasePrice {
    BasePrice {
        id: row.id,
        subject_id: row.subject_id,
        // Rows without a role apply to everyone.
        role: row.role.as_deref().map(Role::normalise),
        plan: row.plan,
        currency: row.currency,
        amount_cents: row.amount_cents,
        active: row.active,
        active_from: row.active_from,
        active_to: row.active_to,
    }
}

fn row_to_country_price(row: CountryPriceRow) -> CountryPrice {
    CountryPrice {
        subject_id: row.subject_id,
        country_code: row.country_code,
        local_amount_cents: row.local_amount_cents,
        zar_amount_cents: row.zar_amount_cents,
        active: row.active,
    }
}

fn row_to_currency(row: CountryCurrencyRow) -> CountryCurrency {
    CountryCurrency {
        alpha2: row.alpha2,
        currency: row.currency,
        name: row.name,
        fx_rate_ppm: row.fx_rate_ppm,
        active: row.active,
    }
}

#[async_trait]
impl PricingRepository for DieselPricingRepository {
    async fn base_prices(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<BasePrice>, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<BasePriceRow> = auth_pricing::table
            .filter(auth_pricing::subject_id.eq(subject_id))
            .order(auth_pricing::id.desc())
            .select(BasePriceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_base_price).collect())
    }

    async fn all_base_prices(&self) -> Result<Vec<BasePrice>, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<BasePriceRow> = auth_pricing::table
            .order((auth_pricing::subject_id.asc(), auth_pricing::id.desc()))
            .select(BasePriceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_base_price).collect())
    }

    async fn create_base_price(
        &self,
        price: &NewBasePrice,
    ) -> Result<BasePrice, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewBasePriceRow {
            subject_id: price.subject_id,
            role: price.role.map(Role::as_str),
            plan: &price.plan,
            currency: &price.currency,
            amount_cents: price.amount_cents,
            active: true,
            active_from: price.active_from,
            active_to: price.active_to,
        };
        let row: BasePriceRow = diesel::insert_into(auth_pricing::table)
            .values(&new_row)
            .returning(BasePriceRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_base_price(row))
    }

    async fn country_price(
        &self,
        subject_id: SubjectId,
        country_code: &str,
    ) -> Result<Option<CountryPrice>, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CountryPriceRow> = subject_country_price::table
            .find((subject_id, country_code))
            .select(CountryPriceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_country_price))
    }

    async fn country_prices(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<CountryPrice>, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CountryPriceRow> = subject_country_price::table
            .filter(subject_country_price::subject_id.eq(subject_id))
            .order(subject_country_price::country_code.asc())
            .select(CountryPriceRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(row_to_country_price).collect())
    }

    async fn upsert_country_price(
        &self,
        price: &CountryPrice,
    ) -> Result<CountryPrice, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = CountryPriceRow {
            subject_id: price.subject_id,
            country_code: price.country_code.clone(),
            local_amount_cents: price.local_amount_cents,
            zar_amount_cents: price.zar_amount_cents,
            active: price.active,
        };
        let row: CountryPriceRow = diesel::insert_into(subject_country_price::table)
            .values(&new_row)
            .on_conflict((
                subject_country_price::subject_id,
                subject_country_price::country_code,
            ))
            .do_update()
            .set((
                subject_country_price::local_amount_cents
                    .eq(excluded(subject_country_price::local_amount_cents)),
                subject_country_price::zar_amount_cents
                    .eq(excluded(subject_country_price::zar_amount_cents)),
                subject_country_price::active.eq(excluded(subject_country_price::active)),
            ))
            .returning(CountryPriceRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_country_price(row))
    }

    async fn currency(
        &self,
        country_code: &str,
    ) -> Result<Option<CountryCurrency>, PricingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CountryCurrencyRow> = ref_country_currency::table
            .find(country_code)
            .filter(ref_country_currency::active.eq(true))
            .select(CountryCurrencyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_currency))
    }

    async fn upsert_currencies(
        &self,
        currencies: &[CountryCurrency],
    ) -> Result<usize, PricingRepositoryError> {
        if currencies.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let rows: Vec<NewCountryCurrencyRow<'_>> = currencies
            .iter()
            .map(|currency| NewCountryCurrencyRow {
                alpha2: &currency.alpha2,
                currency: &currency.currency,
                name: &currency.name,
                fx_rate_ppm: currency.fx_rate_ppm,
                active: currency.active,
                updated_at: now,
            })
            .collect();

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(ref_country_currency::table)
            .values(&rows)
            .on_conflict(ref_country_currency::alpha2)
            .do_update()
            .set((
                ref_country_currency::currency.eq(excluded(ref_country_currency::currency)),
                ref_country_currency::name.eq(excluded(ref_country_currency::name)),
                ref_country_currency::fx_rate_ppm.eq(excluded(ref_country_currency::fx_rate_ppm)),
                ref_country_currency::active.eq(excluded(ref_country_currency::active)),
                ref_country_currency::updated_at.eq(excluded(ref_country_currency::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None)]
    #[case(Some("learner"), Some(Role::Learner))]
    #[case(Some("student"), Some(Role::Learner))]
    fn base_price_roles_are_normalised(#[case] raw: Option<&str>, #[case] expected: Option<Role>) {
        let price = row_to_base_price(BasePriceRow {
            id: 1,
            subject_id: 1,
            role: raw.map(str::to_owned),
            plan: "enrollment".to_owned(),
            currency: "ZAR".to_owned(),
            amount_cents: 45_000,
            active: true,
            active_from: None,
            active_to: None,
        });
        assert_eq!(price.role, expected);
    }
}
