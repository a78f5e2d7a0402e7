//! HTTP inbound adapter exposing REST endpoints under `/api/v1`.

pub mod assessments;
pub mod auth;
pub mod checkout;
pub mod dto;
pub mod enrollments;
pub mod error;
pub mod fees;
pub mod health;
pub mod payments;
pub mod pricing;
pub mod schemas;
pub mod session;
pub mod session_config;
pub mod state;
pub mod subjects;
#[cfg(test)]
pub mod test_utils;
pub mod validation;
pub mod visits;

use actix_web::web;

pub use error::ApiResult;

const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Register every `/api/v1` handler on a scope.
///
/// The caller owns the scope prefix and its middleware (session, visit log).
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(error::json_error_handler),
    )
    .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
    .app_data(web::PathConfig::default().error_handler(error::path_error_handler));

    cfg.service(auth::register)
        .service(auth::login)
        .service(auth::logout)
        .service(auth::current_user)
        .service(subjects::list_subjects)
        .service(enrollments::my_enrollments)
        .service(enrollments::enrollment_decision)
        .service(pricing::quote)
        .service(checkout::start_payfast)
        .service(checkout::start_stripe)
        .service(checkout::cancel_stripe)
        .service(payments::payfast_notify)
        .service(payments::stripe_webhook)
        .service(assessments::list_own_runs)
        .service(assessments::start_run)
        .service(assessments::record_answer)
        .service(assessments::finalize_run)
        .service(assessments::loss_report)
        .service(assessments::reset_run)
        .service(pricing::admin_list_prices)
        .service(pricing::admin_create_price)
        .service(pricing::admin_list_country_prices)
        .service(pricing::admin_upsert_country_price)
        .service(enrollments::admin_list_enrollments)
        .service(enrollments::admin_enrollment_event)
        .service(payments::admin_list_payments)
        .service(assessments::admin_list_runs)
        .service(visits::visit_report)
        .service(fees::fee_balances)
        .service(fees::add_learner)
        .service(fees::learner_detail)
        .service(fees::open_account)
        .service(fees::record_payment);
}
