//! PayFast outbound adapters.

mod http_validator;

pub use http_validator::PayFastHttpValidator;
