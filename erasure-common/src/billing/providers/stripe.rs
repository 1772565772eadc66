use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::billing::{BillingError, BillingProvider};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    message: Option<String>,
}

pub struct StripeBillingProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: Zeroizing<String>,
}

impl StripeBillingProvider {
    pub fn new(
        secret_key: &str,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| BillingError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_base: String::from(api_base.trim_end_matches('/')),
            secret_key: Zeroizing::new(String::from(secret_key)),
        })
    }
}

#[async_trait]
impl BillingProvider for StripeBillingProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<(), BillingError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.api_base, provider_subscription_id
        );

        let response = self
            .client
            .delete(&url)
            .bearer_auth(self.secret_key.as_str())
            .send()
            .await
            .map_err(|e| BillingError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::NOT_FOUND {
            log::info!(
                "Stripe has no subscription {provider_subscription_id}; treating as cancelled"
            );
            return Ok(());
        }

        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => body
                .error
                .message
                .unwrap_or_else(|| String::from("No message")),
            Err(_) => String::from("Unreadable error body"),
        };

        Err(BillingError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
