//! Shared validation helpers for inbound HTTP adapters.
//!
//! Every validation failure becomes `invalid_request` with
//! `details: {"field": ..., "code": ...}` so clients can highlight inputs.

use actix_web::HttpRequest;
use chrono::NaiveDate;
use serde_json::json;

use crate::domain::fees::FeeValidationError;
use crate::domain::pricing::detect_country;
use crate::domain::{Error, LoginValidationError};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldCode {
    Missing,
    Invalid,
    TooShort,
    TooLong,
    OutOfRange,
}

impl FieldCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing_field",
            Self::Invalid => "invalid_value",
            Self::TooShort => "too_short",
            Self::TooLong => "too_long",
            Self::OutOfRange => "out_of_range",
        }
    }
}

/// Build an `invalid_request` error naming the offending field.
pub(crate) fn field_error(field: &str, code: FieldCode, message: impl Into<String>) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field,
        "code": code.as_str(),
    }))
}

pub(crate) fn login_error(err: LoginValidationError) -> Error {
    let message = err.to_string();
    match err {
        LoginValidationError::Email(_) => field_error("email", FieldCode::Invalid, message),
        LoginValidationError::EmptyPassword => field_error("password", FieldCode::Missing, message),
        LoginValidationError::PasswordTooShort { .. } => {
            field_error("password", FieldCode::TooShort, message)
        }
        LoginValidationError::DisplayName(_) => field_error("name", FieldCode::Invalid, message),
    }
}

pub(crate) fn fee_error(err: FeeValidationError) -> Error {
    let message = err.to_string();
    match err {
        FeeValidationError::EmptyName => field_error("fullName", FieldCode::Missing, message),
        FeeValidationError::EmptyClass => field_error("className", FieldCode::Missing, message),
        FeeValidationError::TooLong { field, .. } => {
            let field = if field == "class name" { "className" } else { "fullName" };
            field_error(field, FieldCode::TooLong, message)
        }
        FeeValidationError::InvalidYear { .. } => {
            field_error("schoolYear", FieldCode::OutOfRange, message)
        }
        FeeValidationError::NegativeFee => {
            field_error("annualFeeCents", FieldCode::OutOfRange, message)
        }
        FeeValidationError::NonPositivePayment => {
            field_error("paidCents", FieldCode::OutOfRange, message)
        }
    }
}

/// A non-blank value for a required field.
pub(crate) fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, Error> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| field_error(field, FieldCode::Missing, format!("{field} is required")))
}

/// Country header set by the CDN in front of the API.
pub(crate) const COUNTRY_HEADER: &str = "cf-ipcountry";

/// Buyer country: a real CDN header code, else the explicit value, else `ZA`.
pub(crate) fn buyer_country(req: &HttpRequest, explicit: Option<&str>) -> String {
    let header = req
        .headers()
        .get(COUNTRY_HEADER)
        .and_then(|value| value.to_str().ok());
    detect_country(header, explicit)
}

/// Parse an ISO `YYYY-MM-DD` date.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        field_error(
            field,
            FieldCode::Invalid,
            format!("{field} must be a YYYY-MM-DD date"),
        )
    })
}
