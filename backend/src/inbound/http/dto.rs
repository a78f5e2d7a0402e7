//! Response payloads shared by several handler modules.
//!
//! Domain types stay free of serde and utoipa derives; these DTOs define the
//! camelCase wire shape and borrow nothing from the domain at runtime.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    Enrollment, EnrollmentStatus, LockedQuote, Quote, QuoteSource, Subject, User,
};

/// Signed-in user.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub id: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub display_name: String,
    #[schema(example = "learner")]
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.as_ref().to_owned(),
            display_name: user.display_name.as_ref().to_owned(),
            role: user.role.as_str().to_owned(),
            created_at: user.created_at,
        }
    }
}

/// Catalogue entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDto {
    pub id: i32,
    #[schema(example = "loss")]
    pub slug: String,
    #[schema(example = "Loss and Adaptation")]
    pub name: String,
}

impl From<&Subject> for SubjectDto {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id,
            slug: subject.slug.clone(),
            name: subject.name.clone(),
        }
    }
}

/// Price charged to a learner.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDto {
    pub subject_id: i32,
    #[schema(example = "ZA")]
    pub country_code: String,
    #[schema(example = "ZAR")]
    pub currency: String,
    pub amount_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
    #[schema(example = "R 1,150.00")]
    pub display: String,
    #[schema(value_type = String, example = "base_price")]
    pub source: QuoteSource,
}

impl From<&Quote> for QuoteDto {
    fn from(quote: &Quote) -> Self {
        Self {
            subject_id: quote.subject_id,
            country_code: quote.country_code.clone(),
            currency: quote.currency.clone(),
            amount_cents: quote.amount_cents,
            vat_cents: quote.vat_cents,
            total_cents: quote.total_cents,
            display: quote.display.clone(),
            source: quote.source,
        }
    }
}

/// Quote frozen on an enrollment when checkout started.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockedQuoteDto {
    pub country_code: String,
    pub currency: String,
    pub amount_cents: i64,
    pub price_version: String,
    pub locked_at: DateTime<Utc>,
}

impl From<&LockedQuote> for LockedQuoteDto {
    fn from(quote: &LockedQuote) -> Self {
        Self {
            country_code: quote.country_code.clone(),
            currency: quote.currency.clone(),
            amount_cents: quote.amount_cents,
            price_version: quote.price_version.clone(),
            locked_at: quote.locked_at,
        }
    }
}

/// A learner's enrollment on one subject.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDto {
    pub id: i64,
    pub user_id: String,
    pub subject_id: i32,
    #[schema(value_type = String, example = "pending")]
    pub status: EnrollmentStatus,
    pub payment_pending: bool,
    pub quote: Option<LockedQuoteDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Enrollment> for EnrollmentDto {
    fn from(enrollment: &Enrollment) -> Self {
        Self {
            id: enrollment.id,
            user_id: enrollment.user_id.to_string(),
            subject_id: enrollment.subject_id,
            status: enrollment.status,
            payment_pending: enrollment.payment_pending,
            quote: enrollment.quote.as_ref().map(LockedQuoteDto::from),
            created_at: enrollment.created_at,
            updated_at: enrollment.updated_at,
        }
    }
}

/// Map a slice of domain values to DTOs.
pub(crate) fn map_all<'a, T: 'a, D: From<&'a T>>(items: &'a [T]) -> Vec<D> {
    items.iter().map(D::from).collect()
}
