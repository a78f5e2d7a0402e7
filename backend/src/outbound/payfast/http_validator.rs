//! Reqwest-backed PayFast notification validation.
//!
//! PayFast expects the notification fields posted back verbatim to its
//! `/eng/query/validate` endpoint and answers with a plain-text `VALID` or
//! `INVALID`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::warn;

use crate::domain::ports::{PayFastValidator, PaymentGatewayError};
use crate::outbound::gateway_http::{map_status_error, map_transport_error};

const VALID_RESPONSE: &str = "VALID";

/// Validator that posts notifications back to PayFast.
pub struct PayFastHttpValidator {
    client: Client,
    validate_url: Url,
}

impl PayFastHttpValidator {
    /// Build a validator for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(validate_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            validate_url,
        })
    }
}

fn is_valid_answer(body: &[u8]) -> bool {
    String::from_utf8_lossy(body).trim() == VALID_RESPONSE
}

#[async_trait]
impl PayFastValidator for PayFastHttpValidator {
    async fn validate(&self, fields: &[(String, String)]) -> Result<bool, PaymentGatewayError> {
        let response = self
            .client
            .post(self.validate_url.clone())
            .form(fields)
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| map_transport_error(&error))?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let valid = is_valid_answer(body.as_ref());
        if !valid {
            warn!(status = status.as_u16(), "payfast rejected notification validation");
        }
        Ok(valid)
    }
}
