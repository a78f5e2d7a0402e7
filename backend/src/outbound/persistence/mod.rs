//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each repository implements one driven port from `domain::ports` on top of
//! a shared `bb8` pool of `diesel-async` connections.
//!
//! - **Thin adapters**: repositories translate between Diesel rows and
//!   domain types. Business rules stay in the domain services.
//! - **Internal models**: row structs (`models.rs`) and the schema
//!   (`schema.rs`) never leave this module.
//! - **Typed errors**: Diesel failures are classified once in
//!   `diesel_helpers` and mapped onto each port's error enum.
//!
//! # Example
//!
//! ```ignore
//! use ait_backend::outbound::persistence::{DbPool, DieselUserRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/ait")).await?;
//! let users = DieselUserRepository::new(pool);
//! ```

pub(crate) mod diesel_helpers;
mod diesel_assessment_repository;
mod diesel_enrollment_repository;
mod diesel_fee_ledger_repository;
mod diesel_payment_repository;
mod diesel_pricing_repository;
mod diesel_subject_repository;
mod diesel_user_repository;
mod diesel_visit_repository;
mod migrations;
mod models;
mod pool;
mod retry;
mod schema;

pub use diesel_assessment_repository::DieselAssessmentRepository;
pub use diesel_enrollment_repository::DieselEnrollmentRepository;
pub use diesel_fee_ledger_repository::DieselFeeLedgerRepository;
pub use diesel_payment_repository::DieselPaymentRepository;
pub use diesel_pricing_repository::DieselPricingRepository;
pub use diesel_subject_repository::DieselSubjectRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use diesel_visit_repository::DieselVisitRepository;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
