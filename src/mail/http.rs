//! JSON-over-HTTP transactional mail API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{DeliveryReport, EmailMessage, MailError, Notifier};

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: Vec<String>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpMailer {
    http_client: Client,
    api_key: String,
    api_base: String,
    from_address: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        from_address: impl Into<String>,
        from_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            from_address: from_address.into(),
            from_name: from_name.into(),
        })
    }

    fn sender(&self) -> String {
        if self.from_name.is_empty() {
            self.from_address.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_address)
        }
    }

    async fn deliver(&self, message: &EmailMessage) -> Result<(), MailError> {
        let recipient = match &message.display_name {
            Some(name) if !name.trim().is_empty() => {
                format!("{} <{}>", name.replace(['<', '>', '"'], ""), message.to)
            }
            _ => message.to.clone(),
        };

        let request = SendEmailRequest {
            from: self.sender(),
            to: vec![recipient],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .http_client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);

        Err(MailError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryReport {
        let result = self.deliver(message).await;
        match &result {
            Ok(()) => {
                metrics::counter!("billing_emails_total", "outcome" => "sent").increment(1);
                tracing::debug!(to = %message.to, subject = %message.subject, "Email delivered");
            }
            Err(error) => {
                metrics::counter!("billing_emails_total", "outcome" => "failed").increment(1);
                tracing::warn!(to = %message.to, error = %error, "Email delivery failed");
            }
        }
        result.into()
    }
}
