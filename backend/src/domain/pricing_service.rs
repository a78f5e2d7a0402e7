//! Pricing domain service.
//!
//! Implements the [`Pricing`] driving port: learner quotes through the
//! fallback chain in [`crate::domain::pricing`], plus the admin price tables.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use rust_decimal::Decimal;

use crate::domain::ports::{
    CountryPriceRequest, Pricing, PricingRepository, PricingRepositoryError, QuoteRequest,
    SubjectQuote, SubjectRepository,
};
use crate::domain::pricing::{
    BASE_CURRENCY, ENROLLMENT_PLAN, FX_SCALE, QuoteInputs, build_quote, convert_from_zar,
    parse_country_code, seed_currencies, select_base_price,
};
use crate::domain::subject_service::{map_subject_error, require_subject};
use crate::domain::{BasePrice, CountryPrice, Error, NewBasePrice, Role};

pub(crate) fn map_pricing_error(error: PricingRepositoryError) -> Error {
    match error {
        PricingRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("pricing repository unavailable: {message}"))
        }
        PricingRepositoryError::Query { message } => {
            Error::internal(format!("pricing repository error: {message}"))
        }
    }
}

fn require_country(raw: &str) -> Result<String, Error> {
    parse_country_code(raw)
        .ok_or_else(|| Error::invalid_request(format!("invalid country code: {}", raw.trim())))
}

fn validate_new_price(price: NewBasePrice) -> Result<NewBasePrice, Error> {
    if price.amount_cents <= 0 {
        return Err(Error::invalid_request("amount must be positive"));
    }
    let currency = price.currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(Error::invalid_request("currency must be a three-letter code"));
    }
    if let (Some(from), Some(to)) = (price.active_from, price.active_to)
        && to <= from
    {
        return Err(Error::invalid_request("active_to must be after active_from"));
    }
    let plan = match price.plan.trim() {
        "" => ENROLLMENT_PLAN.to_owned(),
        plan => plan.to_lowercase(),
    };
    Ok(NewBasePrice {
        currency,
        plan,
        ..price
    })
}

/// Pricing service implementing the [`Pricing`] port.
#[derive(Clone)]
pub struct PricingService<P, S> {
    prices: Arc<P>,
    subjects: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<P, S> PricingService<P, S> {
    pub fn new(prices: Arc<P>, subjects: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            prices,
            subjects,
            clock,
        }
    }
}

impl<P, S> PricingService<P, S>
where
    P: PricingRepository,
    S: SubjectRepository,
{
    async fn live_base_price(
        &self,
        subject_id: i32,
        role: Role,
    ) -> Result<Option<BasePrice>, Error> {
        let rows = self
            .prices
            .base_prices(subject_id)
            .await
            .map_err(map_pricing_error)?;
        Ok(select_base_price(&rows, role, self.clock.utc()).cloned())
    }

    async fn fx_rate_ppm(&self, request: &CountryPriceRequest, country: &str) -> Result<i64, Error> {
        if let Some(ppm) = request.fx_rate_ppm {
            return Ok(ppm);
        }
        self.prices
            .currency(country)
            .await
            .map_err(map_pricing_error)?
            .filter(|currency| currency.active)
            .map(|currency| currency.fx_rate_ppm)
            .ok_or_else(|| {
                Error::invalid_request(format!(
                    "no local amount given and no exchange rate known for {country}"
                ))
            })
    }
}

#[async_trait]
impl<P, S> Pricing for PricingService<P, S>
where
    P: PricingRepository,
    S: SubjectRepository,
{
    async fn quote(&self, request: QuoteRequest) -> Result<SubjectQuote, Error> {
        let subject = require_subject(self.subjects.as_ref(), &request.subject_key).await?;
        let country_code = require_country(&request.country_code)?;
        let base = self.live_base_price(subject.id, request.role).await?;
        let tier = self
            .prices
            .country_price(subject.id, &country_code)
            .await
            .map_err(map_pricing_error)?;
        let currency = self
            .prices
            .currency(&country_code)
            .await
            .map_err(map_pricing_error)?;

        let quote = build_quote(QuoteInputs {
            subject_id: subject.id,
            country_code: &country_code,
            base: base.as_ref(),
            tier: tier.as_ref(),
            currency: currency.as_ref(),
        });
        Ok(SubjectQuote { subject, quote })
    }

    async fn list_prices(&self) -> Result<Vec<BasePrice>, Error> {
        self.prices
            .all_base_prices()
            .await
            .map_err(map_pricing_error)
    }

    async fn create_price(&self, price: NewBasePrice) -> Result<BasePrice, Error> {
        let price = validate_new_price(price)?;
        self.subjects
            .find_by_id(price.subject_id)
            .await
            .map_err(map_subject_error)?
            .ok_or_else(|| Error::not_found(format!("subject {} not found", price.subject_id)))?;
        self.prices
            .create_base_price(&price)
            .await
            .map_err(map_pricing_error)
    }

    async fn list_country_prices(&self, subject_key: String) -> Result<Vec<CountryPrice>, Error> {
        let subject = require_subject(self.subjects.as_ref(), &subject_key).await?;
        self.prices
            .country_prices(subject.id)
            .await
            .map_err(map_pricing_error)
    }

    async fn upsert_country_price(
        &self,
        request: CountryPriceRequest,
    ) -> Result<CountryPrice, Error> {
        let subject = require_subject(self.subjects.as_ref(), &request.subject_key).await?;
        let country_code = require_country(&request.country_code)?;
        if [request.local_amount_cents, request.zar_amount_cents, request.fx_rate_ppm]
            .into_iter()
            .flatten()
            .any(|value| value <= 0)
        {
            return Err(Error::invalid_request("amounts and rates must be positive"));
        }

        let anchor = match request.zar_amount_cents {
            Some(cents) => Some(cents),
            None => self
                .live_base_price(subject.id, Role::User)
                .await?
                .filter(|base| base.currency == BASE_CURRENCY)
                .map(|base| base.amount_cents),
        };
        let local_amount_cents = match (request.local_amount_cents, anchor) {
            (Some(local), _) => local,
            (None, Some(anchor)) => {
                let ppm = self.fx_rate_ppm(&request, &country_code).await?;
                convert_from_zar(anchor, Decimal::new(ppm, FX_SCALE))
                    .ok_or_else(|| Error::invalid_request("converted amount is out of range"))?
            }
            (None, None) => {
                return Err(Error::invalid_request(
                    "give a local amount, or a rand anchor to convert",
                ));
            }
        };

        self.prices
            .upsert_country_price(&CountryPrice {
                subject_id: subject.id,
                country_code,
                local_amount_cents: Some(local_amount_cents),
                zar_amount_cents: anchor,
                active: request.active,
            })
            .await
            .map_err(map_pricing_error)
    }

    async fn seed_currencies(&self) -> Result<usize, Error> {
        self.prices
            .upsert_currencies(&seed_currencies())
            .await
            .map_err(map_pricing_error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for quotes and price administration.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::fixture_clock::{FixtureClock, fixture_timestamp};
    use crate::domain::ports::{FixtureSubjectRepository, MockPricingRepository};
    use crate::domain::pricing::{CountryCurrency, QuoteSource};
    use rstest::rstest;

    fn service(repo: MockPricingRepository) -> PricingService<MockPricingRepository, FixtureSubjectRepository> {
        PricingService::new(
            Arc::new(repo),
            Arc::new(FixtureSubjectRepository),
            Arc::new(FixtureClock::at(fixture_timestamp())),
        )
    }

    fn base(amount_cents: i64) -> BasePrice {
        BasePrice {
            id: 1,
            subject_id: 1,
            role: None,
            plan: ENROLLMENT_PLAN.to_owned(),
            currency: "ZAR".to_owned(),
            amount_cents,
            active: true,
            active_from: None,
            active_to: None,
        }
    }

    fn usd() -> CountryCurrency {
        CountryCurrency {
            alpha2: "US".to_owned(),
            currency: "USD".to_owned(),
            name: "United States".to_owned(),
            fx_rate_ppm: 55_000,
            active: true,
        }
    }

    fn quote_request(country: &str) -> QuoteRequest {
        QuoteRequest {
            subject_key: "loss".to_owned(),
            role: Role::Learner,
            country_code: country.to_owned(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn quote_converts_the_base_price_for_foreign_buyers() {
        let mut repo = MockPricingRepository::new();
        repo.expect_base_prices().returning(|_| Ok(vec![base(100_000)]));
        repo.expect_country_price().returning(|_, _| Ok(None));
        repo.expect_currency().returning(|_| Ok(Some(usd())));

        let priced = service(repo).quote(quote_request("us")).await.expect("quote");
        assert_eq!(priced.subject.slug, "loss");
        assert_eq!(priced.quote.currency, "USD");
        assert_eq!(priced.quote.amount_cents, 5_500);
        assert_eq!(priced.quote.source, QuoteSource::FxConverted);
    }

    #[rstest]
    #[tokio::test]
    async fn quote_without_prices_uses_the_fallback() {
        let mut repo = MockPricingRepository::new();
        repo.expect_base_prices().returning(|_| Ok(Vec::new()));
        repo.expect_country_price().returning(|_, _| Ok(None));
        repo.expect_currency().returning(|_| Ok(None));

        let priced = service(repo).quote(quote_request("ZA")).await.expect("quote");
        assert_eq!(priced.quote.total_cents, 5_750);
        assert_eq!(priced.quote.display, "R 57.50");
    }

    #[rstest]
    #[tokio::test]
    async fn quote_for_unknown_subject_is_not_found() {
        let service = service(MockPricingRepository::new());
        let mut request = quote_request("ZA");
        request.subject_key = "woodwork".to_owned();

        let err = service.quote(request).await.expect_err("unknown");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn country_price_derives_local_amount_from_anchor() {
        let mut repo = MockPricingRepository::new();
        repo.expect_currency().returning(|_| Ok(Some(usd())));
        repo.expect_upsert_country_price()
            .withf(|price| {
                price.country_code == "US"
                    && price.local_amount_cents == Some(1_100)
                    && price.zar_amount_cents == Some(20_000)
            })
            .times(1)
            .returning(|price| Ok(price.clone()));

        let stored = service(repo)
            .upsert_country_price(CountryPriceRequest {
                subject_key: "loss".to_owned(),
                country_code: "us".to_owned(),
                local_amount_cents: None,
                zar_amount_cents: Some(20_000),
                fx_rate_ppm: None,
                active: true,
            })
            .await
            .expect("stored");
        assert_eq!(stored.local_amount_cents, Some(1_100));
    }

    #[rstest]
    #[tokio::test]
    async fn country_price_needs_an_amount_or_a_rate() {
        let mut repo = MockPricingRepository::new();
        repo.expect_currency().returning(|_| Ok(None));
        repo.expect_upsert_country_price().times(0);

        let err = service(repo)
            .upsert_country_price(CountryPriceRequest {
                subject_key: "loss".to_owned(),
                country_code: "KE".to_owned(),
                local_amount_cents: None,
                zar_amount_cents: Some(20_000),
                fx_rate_ppm: None,
                active: true,
            })
            .await
            .expect_err("no rate");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[case(0, "ZAR")]
    #[case(100, "RAND")]
    #[tokio::test]
    async fn invalid_base_prices_are_rejected(#[case] cents: i64, #[case] currency: &str) {
        let mut repo = MockPricingRepository::new();
        repo.expect_create_base_price().times(0);

        let err = service(repo)
            .create_price(NewBasePrice {
                subject_id: 1,
                role: None,
                plan: String::new(),
                currency: currency.to_owned(),
                amount_cents: cents,
                active_from: None,
                active_to: None,
            })
            .await
            .expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn seeding_writes_every_reference_currency() {
        let mut repo = MockPricingRepository::new();
        repo.expect_upsert_currencies()
            .withf(|rows| rows.iter().any(|row| row.alpha2 == "ZA" && row.fx_rate_ppm == 1_000_000))
            .returning(|rows| Ok(rows.len()));

        let written = service(repo).seed_currencies().await.expect("seeded");
        assert_eq!(written, 5);
    }
}
