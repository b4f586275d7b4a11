//! # Notifier
//!
//! Outbound email delivery. Delivery problems are reported back to the
//! caller as a [`DeliveryReport`] so batch senders can record them per
//! recipient and keep going.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("mailer not configured: {0}")]
    Configuration(String),
}

/// A single outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Recipient display name, usually the organisation name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn delivered() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Result<(), MailError>> for DeliveryReport {
    fn from(result: Result<(), MailError>) -> Self {
        match result {
            Ok(()) => DeliveryReport::delivered(),
            Err(error) => DeliveryReport::failed(error.to_string()),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryReport;
}

/// Notifier used when no mail API key is configured.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredNotifier;

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryReport {
        tracing::warn!(to = %message.to, "Mail API key not set; email not sent");
        DeliveryReport::failed("Email service not configured")
    }
}
