//! Stripe outbound adapters.

mod http_gateway;

pub use http_gateway::StripeHttpGateway;
