//! Backend entry-point: loads settings, connects persistence and gateways,
//! then serves the REST API.

mod server;

use std::ffi::OsString;
use std::sync::Arc;

use actix_web::web;
use mockable::DefaultEnv;
use ortho_config::OrthoConfig;
use reqwest::Url;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use ait_backend::domain::CheckoutSettings;
use ait_backend::inbound::http::health::HealthState;
use ait_backend::inbound::http::session_config::{BuildMode, session_settings_from_env};
use ait_backend::outbound::payfast::PayFastHttpValidator;
use ait_backend::outbound::persistence::{DbPool, PoolConfig, run_migrations};
use ait_backend::outbound::stripe::StripeHttpGateway;
use ait_backend::settings::{
    AccountSettings, GATEWAY_TIMEOUT, PayFastSettings, ServerSettings, StripeSettings,
};
use server::{ServerConfig, create_server};

fn io_error(context: &str, error: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {error}"))
}

/// Settings come from the environment and config files only; the server
/// takes no flags.
fn program_args() -> [OsString; 1] {
    [OsString::from(env!("CARGO_PKG_NAME"))]
}

async fn connect_database(settings: &ServerSettings) -> std::io::Result<Option<DbPool>> {
    let Some(url) = settings.database_url.as_deref() else {
        warn!("no database configured; serving fixture data");
        return Ok(None);
    };
    run_migrations(url)
        .await
        .map_err(|error| io_error("database migrations failed", error))?;
    let pool = DbPool::new(PoolConfig::new(url).with_max_size(settings.db_max_connections()))
        .await
        .map_err(|error| io_error("database pool setup failed", error))?;
    Ok(Some(pool))
}

fn configure_payments(
    mut config: ServerConfig,
    payfast: &PayFastSettings,
    stripe: &StripeSettings,
    public_base_url: &str,
) -> std::io::Result<ServerConfig> {
    let merchant = payfast.merchant();
    if let Some(merchant) = merchant.as_ref().filter(|_| payfast.validate_remote) {
        let url = Url::parse(&merchant.validate_url())
            .map_err(|error| io_error("invalid PayFast validate URL", error))?;
        let validator = PayFastHttpValidator::new(url, GATEWAY_TIMEOUT)
            .map_err(|error| io_error("PayFast client setup failed", error))?;
        config = config.with_payfast_validator(Arc::new(validator));
    }
    if merchant.is_none() {
        warn!("PayFast merchant not configured; PayFast checkout disabled");
    }

    if let Some(secret_key) = stripe.secret_key() {
        let api_base = Url::parse(stripe.api_base())
            .map_err(|error| io_error("invalid Stripe API base", error))?;
        let gateway = StripeHttpGateway::new(&api_base, secret_key, GATEWAY_TIMEOUT)
            .map_err(|error| io_error("Stripe client setup failed", error))?;
        config = config.with_stripe_gateway(Arc::new(gateway));
    } else {
        warn!("Stripe secret key not configured; Stripe checkout disabled");
    }

    Ok(config.with_checkout(CheckoutSettings {
        payfast: merchant,
        verify_payfast_source: payfast.validate_remote,
        stripe_webhook_secret: stripe.webhook_secret(),
        public_base_url: public_base_url.to_owned(),
    }))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let session = session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
        .map_err(|error| io_error("invalid session configuration", error))?;
    info!(key_fingerprint = %session.key_fingerprint(), "session key loaded");

    let server_settings = ServerSettings::load_from_iter(program_args())
        .map_err(|error| io_error("invalid server settings", error))?;
    let payfast = PayFastSettings::load_from_iter(program_args())
        .map_err(|error| io_error("invalid PayFast settings", error))?;
    let stripe = StripeSettings::load_from_iter(program_args())
        .map_err(|error| io_error("invalid Stripe settings", error))?;
    let accounts = AccountSettings::load_from_iter(program_args())
        .map_err(|error| io_error("invalid account settings", error))?;
    let approved_admins = accounts
        .approved_admins()
        .map_err(|error| io_error("invalid approved admin email", error))?;

    let bind_addr = server_settings
        .bind_addr()
        .map_err(|error| io_error("invalid bind address", error))?;
    let mut config = ServerConfig::new(session, bind_addr)
        .with_approved_admins(approved_admins);
    if let Some(pool) = connect_database(&server_settings).await? {
        config = config.with_db_pool(pool);
    }
    let config = configure_payments(
        config,
        &payfast,
        &stripe,
        server_settings.public_base_url(),
    )?;

    info!(bind_addr = %config.bind_addr(), "starting server");
    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    server.await
}
