use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Razorpay webhook endpoint. Takes the body as raw bytes: the signature
/// covers the exact transport bytes, so parsing happens after verification
/// inside the processor.
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookResponse>> {
    let signature = headers
        .get("X-Razorpay-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::WebhookVerification("Missing signature header".to_string())
        })?;

    state
        .processor
        .handle_webhook(state.store.as_ref(), &body, signature)
        .await?;

    Ok(Json(WebhookResponse { ok: true }))
}
