//! Payment checkout sessions.
//!
//! The server only needs one thing from the payment provider: a hosted
//! checkout URL for a single line item. [`CheckoutProvider`] is that seam;
//! [`StripeCheckout`] implements it against the Stripe Checkout Sessions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Errors creating a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Transport failure talking to the provider.
    #[error("checkout request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("checkout provider returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The provider's response could not be parsed.
    #[error("malformed checkout response: {0}")]
    Malformed(String),
}

/// Something that can open a hosted checkout session.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a session and return its URL, if the provider gave one.
    async fn create_session(&self) -> Result<Option<String>, CheckoutError>;
}

/// Settings for Stripe checkout sessions.
#[derive(Debug, Clone)]
pub struct StripeCheckoutConfig {
    /// Stripe secret key.
    pub api_key: String,
    /// Price of the single line item.
    pub price_id: String,
    /// Used as both success and cancel URL.
    pub return_url: String,
    /// API base URL.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl StripeCheckoutConfig {
    pub fn new(
        api_key: impl Into<String>,
        price_id: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            price_id: price_id.into(),
            return_url: return_url.into(),
            base_url: leadline_config::defaults::STRIPE_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    url: Option<String>,
}

/// Stripe Checkout Sessions client.
#[derive(Debug, Clone)]
pub struct StripeCheckout {
    client: Client,
    config: StripeCheckoutConfig,
}

impl StripeCheckout {
    pub fn new(config: StripeCheckoutConfig) -> Result<Self, CheckoutError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn form(&self) -> [(&'static str, &str); 7] {
        [
            ("mode", "payment"),
            ("payment_method_types[]", "card"),
            ("line_items[0][price]", self.config.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.config.return_url.as_str()),
            ("cancel_url", self.config.return_url.as_str()),
            ("customer_creation", "always"),
        ]
    }
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn create_session(&self) -> Result<Option<String>, CheckoutError> {
        let endpoint = format!(
            "{}/v1/checkout/sessions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .form(&self.form())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CheckoutError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| CheckoutError::Malformed(e.to_string()))?;
        tracing::debug!(has_url = session.url.is_some(), "Checkout session created");
        Ok(session.url)
    }
}
