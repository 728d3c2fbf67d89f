use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::RazorpayConfig;
use crate::error::{AppError, AppResult};

const RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

/// Thin authenticated client for the Razorpay REST API. Every call has a
/// bounded timeout; a timeout is a failure of that call, never a payment
/// state transition.
#[derive(Clone)]
pub struct RazorpayClient {
    http_client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &RazorpayConfig) -> AppResult<Self> {
        Self::with_base_url(config, RAZORPAY_API_URL)
    }

    /// Point the client at a different API host. Used by tests to target a
    /// local mock server.
    pub fn with_base_url(config: &RazorpayConfig, base_url: &str) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                tracing::error!("Failed to parse Razorpay response: {} - Body: {}", e, body);
                AppError::Gateway(format!("Failed to parse gateway response: {}", e))
            })
        } else {
            tracing::error!("Razorpay API error: {} - {}", status, body);

            let error_msg = match status {
                StatusCode::BAD_REQUEST => {
                    if let Ok(error) = serde_json::from_str::<RazorpayError>(&body) {
                        error.error.description
                    } else {
                        "Bad request".to_string()
                    }
                }
                StatusCode::UNAUTHORIZED => "Invalid API credentials".to_string(),
                StatusCode::NOT_FOUND => "Resource not found".to_string(),
                StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded".to_string(),
                _ => format!("API error: {}", status),
            };

            Err(AppError::Gateway(error_msg))
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct RazorpayError {
    error: RazorpayErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
#[allow(dead_code)]
struct RazorpayErrorDetail {
    code: String,
    description: String,
}
