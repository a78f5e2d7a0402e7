//! Driven ports for the two payment gateways' server-to-server APIs.
use async_trait::async_trait;

use crate::domain::payments::stripe::{CheckoutSessionRequest, CreatedCheckoutSession};

use super::define_port_error;

define_port_error! {
    /// Errors raised by gateway adapters.
    pub enum PaymentGatewayError {
        /// The gateway could not be reached or timed out.
        Unavailable { message: String } => "payment gateway unavailable: {message}",
        /// The gateway answered with an error.
        Rejected { status: u16, message: String } =>
            "payment gateway rejected the request ({status}): {message}",
        /// The gateway is not configured.
        NotConfigured { gateway: String } => "{gateway} is not configured",
    }
}

/// PayFast's notification validation endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayFastValidator: Send + Sync {
    /// Post the notification fields back to PayFast. `true` means PayFast
    /// answered `VALID`.
    async fn validate(&self, fields: &[(String, String)]) -> Result<bool, PaymentGatewayError>;
}

/// Validator that trusts every signed notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipPayFastValidation;

#[async_trait]
impl PayFastValidator for SkipPayFastValidation {
    async fn validate(&self, _fields: &[(String, String)]) -> Result<bool, PaymentGatewayError> {
        Ok(true)
    }
}

/// Stripe's Checkout Sessions API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession, PaymentGatewayError>;
}

/// Gateway used when no Stripe secret key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredStripeGateway;

#[async_trait]
impl StripeGateway for UnconfiguredStripeGateway {
    async fn create_checkout_session(
        &self,
        _request: &CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession, PaymentGatewayError> {
        Err(PaymentGatewayError::not_configured("stripe"))
    }
}
