use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// Best-effort dispatch to the notification service (email/SMS fan-out
/// happens on its side). Fired after the payment state is committed and
/// never awaited by the request path; failures are logged and swallowed.
pub struct NotificationDispatcher {
    http_client: Client,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub template: &'static str,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn payment_confirmed(
        recipient: &str,
        payment_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Self {
        Self {
            recipient: recipient.to_string(),
            template: "payment_confirmed",
            data: serde_json::json!({
                "payment_id": payment_id,
                "amount": format!("{:.2}", amount_minor as f64 / 100.0),
                "currency": currency,
            }),
        }
    }
}

impl NotificationDispatcher {
    pub fn new(config: &NotificationConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        if config.endpoint.is_none() {
            tracing::info!("Notification endpoint not configured, dispatch disabled");
        }

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Launch-and-forget. The spawned task owns its own error boundary.
    pub fn dispatch(self: &Arc<Self>, notification: Notification) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.send(&notification).await;
        });
    }

    async fn send(&self, notification: &Notification) {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return;
        };

        match self
            .http_client
            .post(endpoint)
            .json(notification)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    template = notification.template,
                    "Notification dispatched"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    template = notification.template,
                    status = %response.status(),
                    "Notification service rejected the request"
                );
            }
            Err(e) => {
                tracing::warn!(
                    template = notification.template,
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        }
    }
}
