//! Quotes and the admin price list.
//!
//! ```text
//! GET  /api/v1/pricing/quote?subject=loss&country=US
//! GET  /api/v1/admin/pricing
//! POST /api/v1/admin/pricing {"subjectId":1,"currency":"ZAR","amountCents":100000}
//! GET  /api/v1/admin/pricing/countries?subject=loss
//! PUT  /api/v1/admin/pricing/countries {"subject":"loss","countryCode":"US","localAmountCents":5500}
//! ```

use actix_web::{HttpRequest, HttpResponse, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{CountryPriceRequest, QuoteRequest};
use crate::domain::{BasePrice, CountryPrice, NewBasePrice, Role};
use crate::inbound::http::ApiResult;
use crate::inbound::http::dto::{QuoteDto, SubjectDto, map_all};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{buyer_country, required};

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuoteQuery {
    /// Subject slug or name.
    pub subject: Option<String>,
    /// ISO alpha-2 country; defaults to `ZA`.
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SubjectQuery {
    /// Subject slug or name.
    pub subject: Option<String>,
}

/// A subject with its quote.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub subject: SubjectDto,
    pub quote: QuoteDto,
}

/// Base price row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasePriceDto {
    pub id: i32,
    pub subject_id: i32,
    /// Role the price applies to; absent means every role.
    pub role: Option<String>,
    pub plan: String,
    pub currency: String,
    pub amount_cents: i64,
    pub active: bool,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

impl From<&BasePrice> for BasePriceDto {
    fn from(price: &BasePrice) -> Self {
        Self {
            id: price.id,
            subject_id: price.subject_id,
            role: price.role.map(|role| role.as_str().to_owned()),
            plan: price.plan.clone(),
            currency: price.currency.clone(),
            amount_cents: price.amount_cents,
            active: price.active,
            active_from: price.active_from,
            active_to: price.active_to,
        }
    }
}

/// Per-country price tier.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CountryPriceDto {
    pub subject_id: i32,
    pub country_code: String,
    pub local_amount_cents: Option<i64>,
    pub zar_amount_cents: Option<i64>,
    pub active: bool,
}

impl From<&CountryPrice> for CountryPriceDto {
    fn from(price: &CountryPrice) -> Self {
        Self {
            subject_id: price.subject_id,
            country_code: price.country_code.clone(),
            local_amount_cents: price.local_amount_cents,
            zar_amount_cents: price.zar_amount_cents,
            active: price.active,
        }
    }
}

/// New base price.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePriceRequest {
    pub subject_id: i32,
    pub role: Option<String>,
    #[serde(default = "default_plan")]
    pub plan: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub amount_cents: i64,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

fn default_plan() -> String {
    "standard".to_owned()
}

fn default_currency() -> String {
    "ZAR".to_owned()
}

impl From<CreatePriceRequest> for NewBasePrice {
    fn from(value: CreatePriceRequest) -> Self {
        Self {
            subject_id: value.subject_id,
            role: value.role.as_deref().map(Role::normalise),
            plan: value.plan,
            currency: value.currency,
            amount_cents: value.amount_cents,
            active_from: value.active_from,
            active_to: value.active_to,
        }
    }
}

/// Country tier upsert. Give a local amount, or a ZAR anchor plus an
/// exchange rate in parts per million.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCountryPriceRequest {
    pub subject: String,
    pub country_code: String,
    pub local_amount_cents: Option<i64>,
    pub zar_amount_cents: Option<i64>,
    pub fx_rate_ppm: Option<i64>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl From<UpsertCountryPriceRequest> for CountryPriceRequest {
    fn from(value: UpsertCountryPriceRequest) -> Self {
        Self {
            subject_key: value.subject,
            country_code: value.country_code,
            local_amount_cents: value.local_amount_cents,
            zar_amount_cents: value.zar_amount_cents,
            fx_rate_ppm: value.fx_rate_ppm,
            active: value.active,
        }
    }
}

/// Quote a subject for the caller's role and country.
#[utoipa::path(
    get,
    path = "/api/v1/pricing/quote",
    params(QuoteQuery),
    responses(
        (status = 200, description = "Quote", body = QuoteResponse),
        (status = 400, description = "Invalid country or subject", body = ErrorSchema),
        (status = 404, description = "Unknown subject", body = ErrorSchema)
    ),
    tags = ["pricing"],
    operation_id = "quote",
    security([])
)]
#[get("/pricing/quote")]
pub async fn quote(
    req: HttpRequest,
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<QuoteQuery>,
) -> ApiResult<web::Json<QuoteResponse>> {
    let subject_key = required("subject", query.subject.as_deref())?.to_owned();
    let role = session.role()?.unwrap_or(Role::User);
    let priced = state
        .pricing
        .quote(QuoteRequest {
            subject_key,
            role,
            country_code: buyer_country(&req, query.country.as_deref()),
        })
        .await?;
    Ok(web::Json(QuoteResponse {
        subject: SubjectDto::from(&priced.subject),
        quote: QuoteDto::from(&priced.quote),
    }))
}

/// Every base price.
#[utoipa::path(
    get,
    path = "/api/v1/admin/pricing",
    responses(
        (status = 200, description = "Base prices", body = [BasePriceDto]),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListPrices"
)]
#[get("/admin/pricing")]
pub async fn admin_list_prices(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<Vec<BasePriceDto>>> {
    session.require_admin()?;
    let prices = state.pricing.list_prices().await?;
    Ok(web::Json(map_all(&prices)))
}

/// Add a base price.
#[utoipa::path(
    post,
    path = "/api/v1/admin/pricing",
    request_body = CreatePriceRequest,
    responses(
        (status = 201, description = "Created", body = BasePriceDto),
        (status = 400, description = "Invalid price", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown subject", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminCreatePrice"
)]
#[post("/admin/pricing")]
pub async fn admin_create_price(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreatePriceRequest>,
) -> ApiResult<HttpResponse> {
    session.require_admin()?;
    let price = state.pricing.create_price(payload.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(BasePriceDto::from(&price)))
}

/// Country tiers for a subject.
#[utoipa::path(
    get,
    path = "/api/v1/admin/pricing/countries",
    params(SubjectQuery),
    responses(
        (status = 200, description = "Country tiers", body = [CountryPriceDto]),
        (status = 403, description = "Admin role required", body = ErrorSchema),
        (status = 404, description = "Unknown subject", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminListCountryPrices"
)]
#[get("/admin/pricing/countries")]
pub async fn admin_list_country_prices(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<SubjectQuery>,
) -> ApiResult<web::Json<Vec<CountryPriceDto>>> {
    session.require_admin()?;
    let subject = required("subject", query.subject.as_deref())?.to_owned();
    let tiers = state.pricing.list_country_prices(subject).await?;
    Ok(web::Json(map_all(&tiers)))
}

/// Create or replace a country tier.
#[utoipa::path(
    put,
    path = "/api/v1/admin/pricing/countries",
    request_body = UpsertCountryPriceRequest,
    responses(
        (status = 200, description = "Stored tier", body = CountryPriceDto),
        (status = 400, description = "Invalid tier", body = ErrorSchema),
        (status = 403, description = "Admin role required", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "adminUpsertCountryPrice"
)]
#[put("/admin/pricing/countries")]
pub async fn admin_upsert_country_price(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<UpsertCountryPriceRequest>,
) -> ApiResult<web::Json<CountryPriceDto>> {
    session.require_admin()?;
    let tier = state
        .pricing
        .upsert_country_price(payload.into_inner().into())
        .await?;
    Ok(web::Json(CountryPriceDto::from(&tier)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::domain::ports::{MockPricing, SubjectQuote};
    use crate::domain::{Quote, QuoteSource, Subject};
    use crate::inbound::http::test_utils::{TestPorts, login_as, test_app};

    fn state(pricing: MockPricing) -> actix_web::web::Data<HttpState> {
        TestPorts {
            pricing: Some(pricing),
            ..TestPorts::default()
        }
        .into_state()
    }

    fn priced(country: &str) -> SubjectQuote {
        SubjectQuote {
            subject: Subject {
                id: 1,
                slug: "loss".to_owned(),
                name: "Loss and Adaptation".to_owned(),
                active: true,
                sort_order: 1,
            },
            quote: Quote {
                subject_id: 1,
                country_code: country.to_owned(),
                currency: "ZAR".to_owned(),
                amount_cents: 100_000,
                vat_cents: 15_000,
                total_cents: 115_000,
                display: "R 1,150.00".to_owned(),
                source: QuoteSource::BasePrice,
            },
        }
    }

    #[actix_web::test]
    async fn anonymous_quotes_default_to_south_africa() {
        let mut pricing = MockPricing::new();
        pricing
            .expect_quote()
            .withf(|request| {
                request.country_code == "ZA"
                    && request.role == Role::User
                    && request.subject_key == "loss"
            })
            .returning(|request| Ok(priced(&request.country_code)));
        let app = test::init_service(test_app(state(pricing)).service(quote)).await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/pricing/quote?subject=loss")
                .to_request(),
        )
        .await;
        assert_eq!(body["quote"]["totalCents"], 115_000);
        assert_eq!(body["quote"]["source"], "base_price");
        assert_eq!(body["subject"]["slug"], "loss");
    }

    #[actix_web::test]
    async fn cdn_country_header_overrides_the_query() {
        let mut pricing = MockPricing::new();
        pricing
            .expect_quote()
            .withf(|request| request.country_code == "GB")
            .returning(|request| Ok(priced(&request.country_code)));
        let app = test::init_service(test_app(state(pricing)).service(quote)).await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/pricing/quote?subject=loss&country=US")
                .insert_header(("CF-IPCountry", "gb"))
                .to_request(),
        )
        .await;
        assert_eq!(body["quote"]["countryCode"], "GB");
    }

    #[actix_web::test]
    async fn quotes_use_the_session_role() {
        let mut pricing = MockPricing::new();
        pricing
            .expect_quote()
            .withf(|request| request.role == Role::Tutor)
            .returning(|request| Ok(priced(&request.country_code)));
        let app = test::init_service(test_app(state(pricing)).service(quote)).await;
        let cookie = login_as(&app, Role::Tutor).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/pricing/quote?subject=loss&country=za")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn quote_requires_a_subject() {
        let mut pricing = MockPricing::new();
        pricing.expect_quote().times(0);
        let app = test::init_service(test_app(state(pricing)).service(quote)).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/pricing/quote").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn admins_upsert_country_tiers() {
        let mut pricing = MockPricing::new();
        pricing
            .expect_upsert_country_price()
            .withf(|request| {
                request.subject_key == "loss"
                    && request.local_amount_cents == Some(5_500)
                    && request.active
            })
            .returning(|request| {
                Ok(CountryPrice {
                    subject_id: 1,
                    country_code: request.country_code.to_uppercase(),
                    local_amount_cents: request.local_amount_cents,
                    zar_amount_cents: None,
                    active: true,
                })
            });
        let app =
            test::init_service(test_app(state(pricing)).service(admin_upsert_country_price)).await;
        let cookie = login_as(&app, Role::Admin).await;
        let res = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/admin/pricing/countries")
                .cookie(cookie)
                .set_json(json!({ "subject": "loss", "countryCode": "us", "localAmountCents": 5500 }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["countryCode"], "US");
    }
}
