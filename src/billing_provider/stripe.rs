//! Stripe implementation of [`SubscriptionProvider`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Price, ProviderError, Subscription, SubscriptionItem, SubscriptionProvider};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    #[serde(default)]
    status: Option<String>,
    items: StripeList<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    id: String,
    price: StripePrice,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<StripeSubscription> for Subscription {
    fn from(value: StripeSubscription) -> Self {
        Subscription {
            id: value.id,
            status: value.status,
            items: value
                .items
                .data
                .into_iter()
                .map(|item| SubscriptionItem {
                    id: item.id,
                    price: Price {
                        id: item.price.id,
                        currency: item.price.currency,
                    },
                })
                .collect(),
        }
    }
}

/// Thin Stripe REST client covering the subscription calls the billing core needs.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http_client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!("{}/v1/subscriptions/{}", self.api_base, subscription_id)
    }

    async fn parse_subscription(
        response: reqwest::Response,
    ) -> Result<Subscription, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let subscription: StripeSubscription = response.json().await?;
        Ok(subscription.into())
    }
}

fn api_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<StripeErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message.or(envelope.error.kind))
        .unwrap_or_else(|| "Stripe request failed".to_string());

    ProviderError::Api { status, message }
}

#[async_trait]
impl SubscriptionProvider for StripeClient {
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, ProviderError> {
        let response = self
            .http_client
            .get(self.subscription_url(subscription_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::parse_subscription(response).await
    }

    async fn update_subscription_item_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        new_price_id: &str,
    ) -> Result<Subscription, ProviderError> {
        let form = [
            ("items[0][id]", item_id),
            ("items[0][price]", new_price_id),
            ("proration_behavior", "none"),
        ];

        let response = self
            .http_client
            .post(self.subscription_url(subscription_id))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let subscription = Self::parse_subscription(response).await?;
        tracing::debug!(
            subscription_id,
            item_id,
            new_price_id,
            "Stripe subscription item price updated"
        );
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_prefers_stripe_message() {
        let body = r#"{"error": {"message": "No such subscription: 'sub_x'", "type": "invalid_request_error"}}"#;
        match api_error(404, body) {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such subscription: 'sub_x'");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_for_unparseable_body() {
        let err = api_error(502, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "Stripe request failed (status 502)");
    }

    #[test]
    fn subscription_wire_format_flattens_item_list() {
        let json = r#"{
            "id": "sub_123",
            "object": "subscription",
            "status": "active",
            "items": {"object": "list", "data": [
                {"id": "si_1", "price": {"id": "price_old", "currency": "gbp"}}
            ]}
        }"#;
        let wire: StripeSubscription = serde_json::from_str(json).unwrap();
        let subscription: Subscription = wire.into();
        assert_eq!(subscription.id, "sub_123");
        assert_eq!(subscription.primary_item().map(|i| i.id.as_str()), Some("si_1"));
        assert_eq!(subscription.items[0].price.id, "price_old");
        assert_eq!(subscription.items[0].price.currency.as_deref(), Some("gbp"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let client =
            StripeClient::new("sk_test", "http://localhost:1234/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.subscription_url("sub_1"),
            "http://localhost:1234/v1/subscriptions/sub_1"
        );
    }
}
