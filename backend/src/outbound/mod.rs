//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL repositories using Diesel ORM
//! - **payfast**: PayFast notification validation over HTTP
//! - **stripe**: Stripe Checkout Sessions over HTTP
//!
//! Adapters translate between domain types and infrastructure
//! representations and contain no business logic.

pub(crate) mod gateway_http;
pub mod payfast;
pub mod persistence;
pub mod stripe;
