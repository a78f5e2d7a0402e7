//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Repositories convert them with their own
//! `row_to_*` helpers.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text, Varchar};
use uuid::Uuid;

use super::schema::{
    auth_payment_log, auth_pricing, auth_subject, fee_account, fee_learner, fee_payment,
    lca_overall_item, lca_phase_item, lca_progress_item, lca_question_phase_map, lca_result,
    lca_run, lca_scorecard, ref_country_currency, stripe_payment, subject_country_price,
    user_enrollment, users, visit_log,
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub display_name: &'a str,
    pub role: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = auth_subject)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubjectRow {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub sort_order: i32,
}

// ---------------------------------------------------------------------------
// Enrollments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_enrollment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EnrollmentRow {
    pub id: i64,
    pub user_id: Uuid,
    pub subject_id: i32,
    pub status: String,
    pub payment_pending: bool,
    pub quote_country: Option<String>,
    pub quote_currency: Option<String>,
    pub quote_amount_cents: Option<i64>,
    pub price_version: Option<String>,
    pub quote_locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full column set written on every transition.
///
/// Quote columns are written as NULL when the merged write has no quote.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = user_enrollment)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct EnrollmentWriteRow<'a> {
    pub user_id: Uuid,
    pub subject_id: i32,
    pub status: &'a str,
    pub payment_pending: bool,
    pub quote_country: Option<&'a str>,
    pub quote_currency: Option<&'a str>,
    pub quote_amount_cents: Option<i64>,
    pub price_version: Option<&'a str>,
    pub quote_locked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = auth_pricing)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BasePriceRow {
    pub id: i32,
    pub subject_id: i32,
    pub role: Option<String>,
    pub plan: String,
    pub currency: String,
    pub amount_cents: i64,
    pub active: bool,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = auth_pricing)]
pub(crate) struct NewBasePriceRow<'a> {
    pub subject_id: i32,
    pub role: Option<&'a str>,
    pub plan: &'a str,
    pub currency: &'a str,
    pub amount_cents: i64,
    pub active: bool,
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = subject_country_price)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CountryPriceRow {
    pub subject_id: i32,
    pub country_code: String,
    pub local_amount_cents: Option<i64>,
    pub zar_amount_cents: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ref_country_currency)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CountryCurrencyRow {
    pub alpha2: String,
    pub currency: String,
    pub name: String,
    pub fx_rate_ppm: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ref_country_currency)]
pub(crate) struct NewCountryCurrencyRow<'a> {
    pub alpha2: &'a str,
    pub currency: &'a str,
    pub name: &'a str,
    pub fx_rate_ppm: i64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = auth_payment_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PaymentLogRow {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub subject_id: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider: String,
    pub external_ref: String,
    pub purpose: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = auth_payment_log)]
pub(crate) struct NewPaymentLogRow<'a> {
    pub user_id: Option<Uuid>,
    pub subject_id: Option<i32>,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub status: &'a str,
    pub provider: &'a str,
    pub external_ref: &'a str,
    pub purpose: &'a str,
    pub meta: Option<&'a serde_json::Value>,
}

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = stripe_payment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StripePaymentRow {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<Uuid>,
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
    pub email: Option<String>,
    pub amount_total_cents: Option<i64>,
    pub currency: Option<String>,
    pub status: String,
    pub purpose: Option<String>,
    pub receipt_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lca_question_phase_map)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ScoringRowRecord {
    pub question_id: i32,
    pub answer_type: String,
    pub phase_1: i32,
    pub phase_2: i32,
    pub phase_3: i32,
    pub phase_4: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = lca_run)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RunRow {
    pub id: i64,
    pub user_id: Uuid,
    pub subject: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = lca_run)]
pub(crate) struct NewRunRow<'a> {
    pub user_id: Uuid,
    pub subject: &'a str,
    pub status: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lca_scorecard)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ScorecardRow {
    pub run_id: i64,
    pub question_id: i32,
    pub phase_1: i32,
    pub phase_2: i32,
    pub phase_3: i32,
    pub phase_4: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = lca_result)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ResultRow {
    pub run_id: i64,
    pub user_id: Uuid,
    pub phase_1: i32,
    pub phase_2: i32,
    pub phase_3: i32,
    pub phase_4: i32,
    pub total: i32,
    pub phase_1_max: Option<i32>,
    pub phase_2_max: Option<i32>,
    pub phase_3_max: Option<i32>,
    pub phase_4_max: Option<i32>,
    pub max_total: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lca_phase_item)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PhaseItemRow {
    pub phase: i16,
    pub ordinal: i32,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lca_progress_item)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProgressItemRow {
    pub phase: i16,
    pub band: String,
    pub tone: String,
    pub ordinal: i32,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lca_overall_item)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OverallItemRow {
    pub band: String,
    pub kind: String,
    pub label: Option<String>,
    pub body: String,
    pub key_need: Option<String>,
    pub ordinal: i32,
}

// ---------------------------------------------------------------------------
// Visits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = visit_log)]
pub(crate) struct NewVisitRow<'a> {
    pub ts: DateTime<Utc>,
    pub path: &'a str,
    pub user_id: Option<Uuid>,
    pub ip_hash: &'a str,
    pub user_agent: Option<&'a str>,
}

/// Aggregate row for the daily totals query.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct VisitTotalsRow {
    #[diesel(sql_type = BigInt)]
    pub total_hits: i64,
    #[diesel(sql_type = BigInt)]
    pub unique_visitors: i64,
}

#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct PathHitsRow {
    #[diesel(sql_type = Varchar)]
    pub path: String,
    #[diesel(sql_type = BigInt)]
    pub hits: i64,
}

// ---------------------------------------------------------------------------
// Fee ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = fee_learner)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LearnerRow {
    pub id: i32,
    pub full_name: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fee_learner)]
pub(crate) struct NewLearnerRow<'a> {
    pub full_name: &'a str,
    pub class_name: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fee_account)]
pub(crate) struct NewFeeAccountRow {
    pub learner_id: i32,
    pub school_year: i32,
    pub annual_fee_cents: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = fee_payment)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FeePaymentRow {
    pub id: i32,
    pub account_id: i32,
    pub paid_cents: i64,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = fee_payment)]
pub(crate) struct NewFeePaymentRow<'a> {
    pub account_id: i32,
    pub paid_cents: i64,
    pub paid_on: NaiveDate,
    pub method: Option<&'a str>,
    pub reference: Option<&'a str>,
}

/// Account joined with its learner and summed payments.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct AccountBalanceRow {
    #[diesel(sql_type = Integer)]
    pub account_id: i32,
    #[diesel(sql_type = Integer)]
    pub learner_id: i32,
    #[diesel(sql_type = Text)]
    pub learner_name: String,
    #[diesel(sql_type = Text)]
    pub class_name: String,
    #[diesel(sql_type = Integer)]
    pub school_year: i32,
    #[diesel(sql_type = BigInt)]
    pub annual_fee_cents: i64,
    #[diesel(sql_type = BigInt)]
    pub total_paid_cents: i64,
}
