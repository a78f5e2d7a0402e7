//! Reqwest-backed Stripe Checkout Sessions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::info;
use zeroize::Zeroizing;

use crate::domain::payments::stripe::{CheckoutSessionRequest, CreatedCheckoutSession};
use crate::domain::ports::{PaymentGatewayError, StripeGateway};
use crate::outbound::gateway_http::{map_status_error, map_transport_error};

const SESSIONS_PATH: &str = "v1/checkout/sessions";

/// Stripe API client authenticated with a secret key.
pub struct StripeHttpGateway {
    client: Client,
    sessions_url: Url,
    secret_key: Zeroizing<String>,
}

impl StripeHttpGateway {
    /// Build a gateway against `api_base` (normally `https://api.stripe.com`).
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL cannot be joined or the reqwest
    /// client cannot be constructed.
    pub fn new(
        api_base: &Url,
        secret_key: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentGatewayError> {
        let sessions_url = sessions_url(api_base)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PaymentGatewayError::unavailable(error.to_string()))?;
        Ok(Self {
            client,
            sessions_url,
            secret_key,
        })
    }
}

fn sessions_url(api_base: &Url) -> Result<Url, PaymentGatewayError> {
    let mut base = api_base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(SESSIONS_PATH)
        .map_err(|error| PaymentGatewayError::not_configured(format!("stripe api base: {error}")))
}

fn decode_session(body: &[u8]) -> Result<CreatedCheckoutSession, PaymentGatewayError> {
    serde_json::from_slice(body).map_err(|error| {
        PaymentGatewayError::unavailable(format!("invalid checkout session payload: {error}"))
    })
}

#[async_trait]
impl StripeGateway for StripeHttpGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession, PaymentGatewayError> {
        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(self.secret_key.as_str())
            .form(&request.form_params())
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

        let session = decode_session(body.as_ref())?;
        info!(session_id = %session.id, reference = %request.reference, "stripe checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://api.stripe.com", "https://api.stripe.com/v1/checkout/sessions")]
    #[case("http://localhost:12111/", "http://localhost:12111/v1/checkout/sessions")]
    #[case("http://mock/stripe", "http://mock/stripe/v1/checkout/sessions")]
    fn sessions_url_joins_base(#[case] base: &str, #[case] expected: &str) {
        let base = Url::parse(base).expect("base url");
        let url = sessions_url(&base).expect("joined");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    fn decodes_created_sessions() {
        let session =
            decode_session(br#"{"id":"cs_test_1","url":"https://checkout.stripe.com/c/pay/cs_test_1","object":"checkout.session"}"#)
                .expect("decodes");
        assert_eq!(session.id, "cs_test_1");
        assert!(session.url.is_some());
    }

    #[rstest]
    fn rejects_non_json_bodies() {
        assert!(decode_session(b"<html>").is_err());
    }
}
