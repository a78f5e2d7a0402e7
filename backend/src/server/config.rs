//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::sync::Arc;

use ait_backend::domain::ports::{
    PayFastValidator, SkipPayFastValidation, StripeGateway, UnconfiguredStripeGateway,
};
use ait_backend::domain::{CheckoutSettings, EmailAddress};
use ait_backend::inbound::http::session_config::SessionSettings;
use ait_backend::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
///
/// Starts with fixture persistence and unconfigured gateways; `main` swaps
/// in real adapters as settings allow.
pub struct ServerConfig {
    pub(crate) session: SessionSettings,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) approved_admins: Vec<EmailAddress>,
    pub(crate) checkout: CheckoutSettings,
    pub(crate) payfast_validator: Arc<dyn PayFastValidator>,
    pub(crate) stripe: Arc<dyn StripeGateway>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(session: SessionSettings, bind_addr: SocketAddr) -> Self {
        Self {
            session,
            bind_addr,
            db_pool: None,
            approved_admins: Vec::new(),
            checkout: CheckoutSettings::default(),
            payfast_validator: Arc::new(SkipPayFastValidation),
            stripe: Arc::new(UnconfiguredStripeGateway),
        }
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// Without one every repository falls back to its fixture.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Emails allowed to register with the admin role.
    #[must_use]
    pub fn with_approved_admins(mut self, admins: Vec<EmailAddress>) -> Self {
        self.approved_admins = admins;
        self
    }

    #[must_use]
    pub fn with_checkout(mut self, checkout: CheckoutSettings) -> Self {
        self.checkout = checkout;
        self
    }

    #[must_use]
    pub fn with_payfast_validator(mut self, validator: Arc<dyn PayFastValidator>) -> Self {
        self.payfast_validator = validator;
        self
    }

    #[must_use]
    pub fn with_stripe_gateway(mut self, gateway: Arc<dyn StripeGateway>) -> Self {
        self.stripe = gateway;
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
