//! Deployment settings loaded via OrthoConfig.
//!
//! Each struct reads its own environment prefix and the optional config
//! file; the server and `ait-admin` share them.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

use crate::domain::payments::payfast::PayFastMerchant;
use crate::domain::{EmailAddress, UserValidationError};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Gateway request timeout.
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Listener and persistence settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AIT")]
pub struct ServerSettings {
    /// Socket address to listen on.
    #[ortho_config(default = DEFAULT_BIND_ADDR.to_owned())]
    pub bind_addr: String,
    /// PostgreSQL URL; without it the server runs on fixture ports.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[ortho_config(default = DEFAULT_DB_MAX_CONNECTIONS)]
    pub db_max_connections: u32,
    /// External base URL used in gateway return and notify links.
    #[ortho_config(default = DEFAULT_PUBLIC_BASE_URL.to_owned())]
    pub public_base_url: String,
}

impl ServerSettings {
    /// Parsed listener address.
    ///
    /// # Errors
    ///
    /// Returns the parse error when `bind_addr` is not `host:port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.bind_addr.trim().parse()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.max(1)
    }

    pub fn public_base_url(&self) -> &str {
        non_blank(Some(&self.public_base_url)).unwrap_or(DEFAULT_PUBLIC_BASE_URL)
    }
}

/// PayFast merchant account.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AIT_PAYFAST")]
pub struct PayFastSettings {
    /// Numeric in PayFast's dashboard, so the environment layer may hand
    /// it over as an integer.
    #[serde(default, deserialize_with = "text_or_number")]
    pub merchant_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub merchant_key: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub passphrase: Option<String>,
    /// Post to the sandbox host.
    #[ortho_config(default = true)]
    pub sandbox: bool,
    /// Confirm every notification with PayFast's validate endpoint and
    /// check the source address.
    #[ortho_config(default = true)]
    pub validate_remote: bool,
}

impl PayFastSettings {
    /// Merchant credentials, when both id and key are set.
    pub fn merchant(&self) -> Option<PayFastMerchant> {
        let merchant_id = non_blank(self.merchant_id.as_deref())?;
        let merchant_key = non_blank(self.merchant_key.as_deref())?;
        Some(PayFastMerchant {
            merchant_id: merchant_id.to_owned(),
            merchant_key: merchant_key.to_owned(),
            passphrase: non_blank(self.passphrase.as_deref())
                .map(|phrase| Zeroizing::new(phrase.to_owned())),
            sandbox: self.sandbox,
        })
    }
}

/// Stripe API credentials.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AIT_STRIPE")]
pub struct StripeSettings {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[ortho_config(default = DEFAULT_STRIPE_API_BASE.to_owned())]
    pub api_base: String,
}

impl StripeSettings {
    pub fn secret_key(&self) -> Option<Zeroizing<String>> {
        non_blank(self.secret_key.as_deref()).map(|key| Zeroizing::new(key.to_owned()))
    }

    pub fn webhook_secret(&self) -> Option<Zeroizing<String>> {
        non_blank(self.webhook_secret.as_deref()).map(|key| Zeroizing::new(key.to_owned()))
    }

    pub fn api_base(&self) -> &str {
        non_blank(Some(&self.api_base)).unwrap_or(DEFAULT_STRIPE_API_BASE)
    }
}

/// Account policy.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "AIT_ACCOUNTS")]
pub struct AccountSettings {
    /// Comma-separated emails allowed to register as admin.
    #[ortho_config(default = String::new())]
    pub approved_admins: String,
}

impl AccountSettings {
    /// Canonical approved admin emails.
    ///
    /// # Errors
    ///
    /// Returns the first entry that is not a valid email address.
    pub fn approved_admins(&self) -> Result<Vec<EmailAddress>, UserValidationError> {
        self.approved_admins
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(EmailAddress::parse)
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Whole(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Whole(number) => number.to_string(),
    }))
}
