//! Country-aware pricing.
//!
//! A quote is resolved through one fallback chain:
//!
//! 1. an explicit local price for the subject and country,
//! 2. the ZAR anchor (country tier or base price) converted with the
//!    country's FX rate,
//! 3. the subject's base price,
//! 4. [`FALLBACK_PRICE_CENTS`] in ZAR.
//!
//! Amounts are integer minor units; FX and VAT use [`Decimal`] so no float
//! arithmetic touches money.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::subject::SubjectId;
use super::user::Role;

/// Price used when a subject has no configured price.
pub const FALLBACK_PRICE_CENTS: i64 = 5000;
/// Currency of base prices and anchors.
pub const BASE_CURRENCY: &str = "ZAR";
/// Country assumed when none can be detected.
pub const DEFAULT_COUNTRY: &str = "ZA";
/// Plan name used for enrollment prices.
pub const ENROLLMENT_PLAN: &str = "enrollment";
/// FX rates are stored as parts per million.
pub const FX_SCALE: u32 = 6;

/// South African VAT (15%).
pub fn vat_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// Smallest amount a gateway will accept for a currency, in minor units.
pub fn minimum_charge_cents(currency: &str) -> i64 {
    match currency {
        "ZAR" => 900,
        _ => 50,
    }
}

/// Database identifier of a base price row.
pub type PriceId = i32;

/// A row of the base price table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePrice {
    pub id: PriceId,
    pub subject_id: SubjectId,
    /// `None` applies to every role.
    pub role: Option<Role>,
    pub plan: String,
    pub currency: String,
    pub amount_cents: i64,
    pub active: bool,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

impl BasePrice {
    /// Whether the row is active and `now` falls inside its window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.active_from.is_none_or(|from| from <= now)
            && self.active_to.is_none_or(|to| to > now)
    }
}

/// New base price submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBasePrice {
    pub subject_id: SubjectId,
    pub role: Option<Role>,
    pub plan: String,
    pub currency: String,
    pub amount_cents: i64,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

/// Pick the live base price for a role.
///
/// Rows for the exact role win over role-agnostic rows; within a group the
/// newest `active_from` wins.
pub fn select_base_price<'a>(
    rows: &'a [BasePrice],
    role: Role,
    now: DateTime<Utc>,
) -> Option<&'a BasePrice> {
    let newest = |exact: bool| {
        rows.iter()
            .filter(|row| row.plan == ENROLLMENT_PLAN && row.is_live(now))
            .filter(|row| if exact { row.role == Some(role) } else { row.role.is_none() })
            .max_by_key(|row| row.active_from)
    };
    newest(true).or_else(|| newest(false))
}

/// Per-country price tier for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryPrice {
    pub subject_id: SubjectId,
    pub country_code: String,
    pub local_amount_cents: Option<i64>,
    pub zar_amount_cents: Option<i64>,
    pub active: bool,
}

/// Currency reference data for a country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCurrency {
    pub alpha2: String,
    pub currency: String,
    pub name: String,
    /// Local units per ZAR, scaled by 10^6.
    pub fx_rate_ppm: i64,
    pub active: bool,
}

impl CountryCurrency {
    /// Local units per ZAR.
    pub fn fx_rate(&self) -> Decimal {
        Decimal::new(self.fx_rate_ppm, FX_SCALE)
    }
}

/// Reference currencies loaded by `seed-currencies`.
pub fn seed_currencies() -> Vec<CountryCurrency> {
    [
        ("ZA", "ZAR", "South Africa", 1_000_000),
        ("US", "USD", "United States", 55_000),
        ("GB", "GBP", "United Kingdom", 43_000),
        ("IN", "INR", "India", 4_600_000),
        ("IE", "EUR", "Ireland", 50_000),
    ]
    .into_iter()
    .map(|(alpha2, currency, name, fx_rate_ppm)| CountryCurrency {
        alpha2: alpha2.to_owned(),
        currency: currency.to_owned(),
        name: name.to_owned(),
        fx_rate_ppm,
        active: true,
    })
    .collect()
}

/// Which step of the fallback chain produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    CountryPrice,
    FxConverted,
    BasePrice,
    Fallback,
}

/// Price offered to a learner for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub subject_id: SubjectId,
    pub country_code: String,
    pub currency: String,
    /// Price before VAT.
    pub amount_cents: i64,
    pub vat_cents: i64,
    /// Amount charged by the gateway.
    pub total_cents: i64,
    pub display: String,
    pub source: QuoteSource,
}

/// Inputs gathered by the pricing service for one quote.
#[derive(Debug, Clone, Copy)]
pub struct QuoteInputs<'a> {
    pub subject_id: SubjectId,
    pub country_code: &'a str,
    pub base: Option<&'a BasePrice>,
    pub tier: Option<&'a CountryPrice>,
    pub currency: Option<&'a CountryCurrency>,
}

/// Resolve a quote through the fallback chain.
pub fn build_quote(inputs: QuoteInputs<'_>) -> Quote {
    let QuoteInputs {
        subject_id,
        country_code,
        base,
        tier,
        currency,
    } = inputs;
    let tier = tier.filter(|tier| tier.active);
    let local_currency = currency.filter(|currency| currency.active);

    let explicit = tier
        .and_then(|tier| tier.local_amount_cents)
        .filter(|cents| *cents > 0)
        .and_then(|cents| local_currency.map(|currency| (currency.currency.clone(), cents)));

    let anchor = tier
        .and_then(|tier| tier.zar_amount_cents)
        .filter(|cents| *cents > 0)
        .or_else(|| {
            base.filter(|base| base.currency == BASE_CURRENCY)
                .map(|base| base.amount_cents)
        });
    let converted = anchor.zip(local_currency).and_then(|(zar_cents, currency)| {
        convert_from_zar(zar_cents, currency.fx_rate()).map(|cents| (currency.currency.clone(), cents))
    });

    let (currency_code, amount_cents, source) = if let Some((code, cents)) = explicit {
        (code, cents, QuoteSource::CountryPrice)
    } else if let Some((code, cents)) = converted {
        (code, cents, QuoteSource::FxConverted)
    } else if let Some(base) = base {
        (base.currency.clone(), base.amount_cents, QuoteSource::BasePrice)
    } else {
        (BASE_CURRENCY.to_owned(), FALLBACK_PRICE_CENTS, QuoteSource::Fallback)
    };

    price_with_vat(subject_id, country_code, currency_code, amount_cents, source)
}

/// Build a quote for a fixed amount, adding VAT and the minimum charge.
pub fn price_with_vat(
    subject_id: SubjectId,
    country_code: &str,
    currency: String,
    amount_cents: i64,
    source: QuoteSource,
) -> Quote {
    let currency = currency.trim().to_uppercase();
    let amount_cents = amount_cents.max(0);
    let vat_cents = round_cents(Decimal::from(amount_cents) * vat_rate()).unwrap_or(0);
    let total_cents = amount_cents
        .saturating_add(vat_cents)
        .max(minimum_charge_cents(&currency));
    Quote {
        subject_id,
        country_code: country_code.to_owned(),
        display: format_money(total_cents, &currency),
        currency,
        amount_cents,
        vat_cents,
        total_cents,
        source,
    }
}

/// Convert a ZAR amount into local minor units.
pub fn convert_from_zar(zar_cents: i64, fx_rate: Decimal) -> Option<i64> {
    if fx_rate <= Decimal::ZERO {
        return None;
    }
    round_cents(Decimal::from(zar_cents) * fx_rate)
}

fn round_cents(value: Decimal) -> Option<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
}

/// Format minor units for display: `R 1,150.00` for rand, `USD 11.50` otherwise.
///
/// # Examples
/// ```
/// use ait_backend::domain::format_money;
///
/// assert_eq!(format_money(115_000, "ZAR"), "R 1,150.00");
/// assert_eq!(format_money(1_150, "USD"), "USD 11.50");
/// ```
pub fn format_money(cents: i64, currency: &str) -> String {
    let cents = cents.max(0);
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let prefix = if currency == BASE_CURRENCY { "R" } else { currency };
    format!("{prefix} {grouped}.{fraction:02}")
}

/// Format minor units as a plain decimal with two places (`150.00`).
pub fn format_decimal_amount(cents: i64) -> String {
    Decimal::new(cents, 2).round_dp(2).to_string()
}

/// Detect the buyer's country.
///
/// The CDN country header wins when it carries a real two-letter code;
/// otherwise an explicit request value is used, then [`DEFAULT_COUNTRY`].
pub fn detect_country(header: Option<&str>, explicit: Option<&str>) -> String {
    header
        .and_then(parse_country_code)
        .or_else(|| explicit.and_then(parse_country_code))
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_owned())
}

/// Uppercase two-letter country code, rejecting the CDN's `XX` (unknown)
/// and `T1` (Tor) placeholders.
pub fn parse_country_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let is_code = code.len() == 2 && code.chars().all(|ch| ch.is_ascii_alphabetic());
    (is_code && code != "XX").then_some(code)
}
