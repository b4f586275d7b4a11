//! # Subscription Provider
//!
//! Abstraction over the payment processor that owns customers' live
//! subscriptions. The migration engine reads the current subscription item
//! and swaps its price through this trait.

pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("subscription {0} has no items")]
    NoSubscriptionItems(String),

    #[error("provider not configured: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Network(error.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub items: Vec<SubscriptionItem>,
}

impl Subscription {
    /// Primary item of the subscription. Plans are single-item subscriptions.
    pub fn primary_item(&self) -> Option<&SubscriptionItem> {
        self.items.first()
    }
}

#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn retrieve_subscription(&self, subscription_id: &str)
    -> Result<Subscription, ProviderError>;

    /// Replace the price of one subscription item. Proration is disabled so
    /// the new price applies from the next billing cycle.
    async fn update_subscription_item_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        new_price_id: &str,
    ) -> Result<Subscription, ProviderError>;
}

/// Provider used when no API key is configured. Every call fails, so
/// migrations record the problem per customer instead of crashing.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredProvider;

#[async_trait]
impl SubscriptionProvider for UnconfiguredProvider {
    async fn retrieve_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<Subscription, ProviderError> {
        Err(ProviderError::Configuration(
            "STRIPE_SECRET_KEY is not set".to_string(),
        ))
    }

    async fn update_subscription_item_price(
        &self,
        _subscription_id: &str,
        _item_id: &str,
        _new_price_id: &str,
    ) -> Result<Subscription, ProviderError> {
        Err(ProviderError::Configuration(
            "STRIPE_SECRET_KEY is not set".to_string(),
        ))
    }
}
