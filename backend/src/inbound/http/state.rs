//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they depend only
//! on driving ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    Accounts, Assessments, Checkout, Enrollments, FeeLedger, Pricing, Subjects, Visits,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: Arc<dyn Accounts>,
    pub subjects: Arc<dyn Subjects>,
    pub enrollments: Arc<dyn Enrollments>,
    pub pricing: Arc<dyn Pricing>,
    pub checkout: Arc<dyn Checkout>,
    pub assessments: Arc<dyn Assessments>,
    pub visits: Arc<dyn Visits>,
    pub fee_ledger: Arc<dyn FeeLedger>,
}
